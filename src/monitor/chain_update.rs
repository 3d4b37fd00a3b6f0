//! Chain daemon release watcher: compares the latest GitHub release of
//! each tracked daemon against a confirmed version persisted on disk.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Monitor, MonitorError};
use crate::clients::GithubSource;
use crate::config::{ChainUpdateConfig, DaemonConfig};
use crate::notify::{Alert, Webhooks};

/// Consecutive polls a new tag must survive before it is alerted on.
/// GitHub releases are occasionally retagged or deleted shortly after
/// publishing; the debounce keeps those from paging anyone.
const CONFIRM_POLLS: u32 = 3;

pub struct ChainUpdateMonitor {
    source: Arc<dyn GithubSource>,
    data_dir: PathBuf,
    daemons: Vec<DaemonConfig>,
    activity: Webhooks,
    errors: Webhooks,
    pending: HashMap<String, u32>,
}

impl ChainUpdateMonitor {
    pub fn new(
        source: Arc<dyn GithubSource>,
        cfg: ChainUpdateConfig,
        activity: Webhooks,
        errors: Webhooks,
    ) -> Self {
        Self {
            source,
            data_dir: cfg.data_dir,
            daemons: cfg.daemons,
            activity,
            errors,
            pending: HashMap::new(),
        }
    }

    fn marker_path(&self, daemon: &str) -> PathBuf {
        self.data_dir.join(daemon)
    }

    /// Reads the confirmed version for a daemon. A missing marker file
    /// means the daemon has never been seen before.
    fn read_confirmed(&self, daemon: &str) -> Result<Option<String>, MonitorError> {
        match fs::read_to_string(self.marker_path(daemon)) {
            Ok(version) => Ok(Some(version)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MonitorError::Io(e.to_string())),
        }
    }

    fn write_confirmed(&self, daemon: &str, version: &str) -> Result<(), MonitorError> {
        fs::write(self.marker_path(daemon), version).map_err(|e| MonitorError::Io(e.to_string()))
    }
}

#[async_trait]
impl Monitor for ChainUpdateMonitor {
    fn name(&self) -> &'static str {
        "ChainUpdateMonitor"
    }

    async fn check(&mut self) -> Result<Vec<Alert>, MonitorError> {
        log::info!("Checking for chain updates...");
        let mut alerts = Vec::new();

        for daemon in &self.daemons {
            let releases = self.source.releases(&daemon.github).await?;
            let latest = match releases.first() {
                Some(release) => release,
                None => {
                    log::warn!("no releases found for {}", daemon.name);
                    alerts.push(Alert::new(
                        self.errors.clone(),
                        format!("No releases found for {}", daemon.name),
                    ));
                    continue;
                }
            };

            let confirmed = match self.read_confirmed(&daemon.name)? {
                Some(version) => version,
                None => {
                    // First sighting: record the version without alerting.
                    self.write_confirmed(&daemon.name, &latest.tag_name)?;
                    continue;
                }
            };

            if confirmed == latest.tag_name {
                continue;
            }

            let count = self.pending.entry(daemon.name.clone()).or_insert(0);
            *count += 1;
            log::debug!(
                "{} release {} differs from confirmed {} ({}/{})",
                daemon.name,
                latest.tag_name,
                confirmed,
                count,
                CONFIRM_POLLS
            );
            if *count < CONFIRM_POLLS {
                continue;
            }

            alerts.push(Alert::new(
                self.activity.clone(),
                format!(
                    "{} Update: current={} latest={} {}",
                    daemon.name, confirmed, latest.tag_name, latest.html_url
                ),
            ));
            self.write_confirmed(&daemon.name, &latest.tag_name)?;
            self.pending.insert(daemon.name.clone(), 0);
        }

        Ok(alerts)
    }
}
