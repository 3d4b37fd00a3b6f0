//! Image drift detector: watches the published container image registry
//! snapshot for new and modified tags.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::{Monitor, MonitorError};
use crate::clients::ThornodeDataSource;
use crate::notify::{Alert, Webhooks};

/// Only images matching this pattern are tracked.
const IMAGE_FILTER: &str = r"^thorchain/((devops/node-launcher.*)|(thornode:(chaosnet-multichain|mainnet)-\d+\.\d+\.\d+)|(midgard:\d+\.\d+\.\d+))$";

/// Modified tags matching this substring are also routed to the
/// security channel.
const SECURITY_PATTERN: &str = "thornode";

pub struct ImageChangeMonitor {
    source: Arc<dyn ThornodeDataSource>,
    activity: Webhooks,
    security: Webhooks,
    filter: Regex,
    seen: HashMap<String, String>,
}

impl ImageChangeMonitor {
    pub fn new(
        source: Arc<dyn ThornodeDataSource>,
        activity: Webhooks,
        security: Webhooks,
    ) -> Self {
        Self {
            source,
            activity,
            security,
            filter: Regex::new(IMAGE_FILTER).expect("valid image filter pattern"),
            seen: HashMap::new(),
        }
    }
}

fn modified_message(key: &str, old: &str, new: &str) -> String {
    format!(
        "Modified image tag: `{}`\n\tOld: `{}`\n\tNew: `{}`",
        key, old, new
    )
}

#[async_trait]
impl Monitor for ImageChangeMonitor {
    fn name(&self) -> &'static str {
        "ImageChangeMonitor"
    }

    async fn check(&mut self) -> Result<Vec<Alert>, MonitorError> {
        log::info!("Checking for image changes...");
        let images = self.source.get_images().await?;

        // First run: seed the baseline without alerting.
        if self.seen.is_empty() {
            for image in &images {
                let key = format!("{}:{}", image.repo, image.tag);
                if self.filter.is_match(&key) {
                    self.seen.insert(key, image.hash.clone());
                }
            }
            return Ok(Vec::new());
        }

        let mut new_tags: Vec<String> = Vec::new();
        let mut modified: BTreeMap<String, (String, String)> = BTreeMap::new();
        for image in &images {
            if image.hash.is_empty() {
                log::warn!("image hash not found for {}:{}", image.repo, image.tag);
                continue;
            }
            let key = format!("{}:{}", image.repo, image.tag);
            if !self.filter.is_match(&key) {
                continue;
            }
            match self.seen.get(&key) {
                None => new_tags.push(key.clone()),
                Some(old) if *old != image.hash => {
                    modified.insert(key.clone(), (old.clone(), image.hash.clone()));
                }
                Some(_) => {}
            }
            self.seen.insert(key, image.hash.clone());
        }
        log::debug!("seen images after processing: {:?}", self.seen);

        let mut alerts = Vec::new();
        for (key, (old, new)) in &modified {
            alerts.push(Alert::new(
                self.activity.clone(),
                modified_message(key, old, new),
            ));
        }
        for key in &new_tags {
            alerts.push(Alert::new(
                self.activity.clone(),
                format!("New image tag: `{}`", key),
            ));
        }
        for (key, (old, new)) in &modified {
            if key.contains(SECURITY_PATTERN) {
                alerts.push(Alert::new(
                    self.security.clone(),
                    modified_message(key, old, new),
                ));
            }
        }

        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::thornode::MockThornodeDataSource;
    use crate::clients::Image;

    fn image(repo: &str, tag: &str, hash: &str) -> Image {
        Image {
            repo: repo.to_string(),
            tag: tag.to_string(),
            hash: hash.to_string(),
        }
    }

    fn activity_hooks() -> Webhooks {
        Webhooks {
            slack: "https://hooks.slack.com/services/activity".to_string(),
            discord: String::new(),
        }
    }

    fn security_hooks() -> Webhooks {
        Webhooks {
            slack: "https://hooks.slack.com/services/security".to_string(),
            discord: String::new(),
        }
    }

    fn monitor_with_snapshots(snapshots: Vec<Vec<Image>>) -> ImageChangeMonitor {
        let mut source = MockThornodeDataSource::new();
        let mut snapshots = snapshots.into_iter();
        source
            .expect_get_images()
            .returning(move || Ok(snapshots.next().unwrap_or_default()));
        ImageChangeMonitor::new(Arc::new(source), activity_hooks(), security_hooks())
    }

    #[tokio::test]
    async fn test_first_observation_is_a_silent_baseline() {
        let snapshot = vec![
            image("thorchain/thornode", "mainnet-1.114.0", "abc123"),
            image("thorchain/midgard", "2.21.3", "def456"),
        ];
        let mut monitor = monitor_with_snapshots(vec![snapshot.clone(), snapshot]);

        assert!(monitor.check().await.unwrap().is_empty());
        // Same snapshot again: nothing new, nothing modified.
        assert!(monitor.check().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_modified_thornode_tag_alerts_activity_and_security() {
        let mut monitor = monitor_with_snapshots(vec![
            vec![
                image("thorchain/thornode", "mainnet-1.114.0", "abc123"),
                image("thorchain/midgard", "2.21.3", "def456"),
            ],
            vec![
                image("thorchain/thornode", "mainnet-1.114.0", "new789"),
                image("thorchain/midgard", "2.21.3", "def456"),
            ],
        ]);

        monitor.check().await.unwrap();
        let alerts = monitor.check().await.unwrap();
        assert_eq!(alerts.len(), 2);

        let expected = "Modified image tag: `thorchain/thornode:mainnet-1.114.0`\n\
                        \tOld: `abc123`\n\
                        \tNew: `new789`";
        assert_eq!(alerts[0].message, expected);
        assert_eq!(alerts[0].webhooks, activity_hooks());
        assert_eq!(alerts[1].message, expected);
        assert_eq!(alerts[1].webhooks, security_hooks());
    }

    #[tokio::test]
    async fn test_new_tag_alerts_activity_only() {
        let mut monitor = monitor_with_snapshots(vec![
            vec![image("thorchain/midgard", "2.21.3", "def456")],
            vec![
                image("thorchain/midgard", "2.21.3", "def456"),
                image("thorchain/midgard", "2.22.0", "aaa111"),
            ],
        ]);

        monitor.check().await.unwrap();
        let alerts = monitor.check().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "New image tag: `thorchain/midgard:2.22.0`");
        assert_eq!(alerts[0].webhooks, activity_hooks());
    }

    #[tokio::test]
    async fn test_filtered_out_images_never_alert() {
        let mut monitor = monitor_with_snapshots(vec![
            vec![
                image("someorg/junk", "1.0", "aaa"),
                image("thorchain/thornode", "stagenet-1.114.0", "bbb"),
            ],
            vec![
                image("someorg/junk", "1.0", "changed"),
                image("thorchain/thornode", "stagenet-1.114.0", "changed"),
            ],
        ]);

        assert!(monitor.check().await.unwrap().is_empty());
        assert!(monitor.check().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_hash_is_skipped_and_state_kept() {
        let mut monitor = monitor_with_snapshots(vec![
            vec![image("thorchain/midgard", "2.21.3", "def456")],
            vec![image("thorchain/midgard", "2.21.3", "")],
            vec![image("thorchain/midgard", "2.21.3", "def456")],
        ]);

        assert!(monitor.check().await.unwrap().is_empty());
        // A missing hash is not treated as a modification.
        assert!(monitor.check().await.unwrap().is_empty());
        // Nor did it clobber the recorded hash in the meantime.
        assert!(monitor.check().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_alerts_are_ordered_modified_new_security() {
        let mut monitor = monitor_with_snapshots(vec![
            vec![image("thorchain/thornode", "mainnet-1.114.0", "abc123")],
            vec![
                image("thorchain/thornode", "mainnet-1.114.0", "new789"),
                image("thorchain/thornode", "mainnet-1.115.0", "fresh"),
            ],
        ]);

        monitor.check().await.unwrap();
        let alerts = monitor.check().await.unwrap();
        assert_eq!(alerts.len(), 3);
        assert!(alerts[0].message.starts_with("Modified image tag:"));
        assert_eq!(alerts[0].webhooks, activity_hooks());
        assert_eq!(
            alerts[1].message,
            "New image tag: `thorchain/thornode:mainnet-1.115.0`"
        );
        assert_eq!(alerts[1].webhooks, activity_hooks());
        assert!(alerts[2].message.starts_with("Modified image tag:"));
        assert_eq!(alerts[2].webhooks, security_hooks());
    }
}
