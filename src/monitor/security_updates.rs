//! Security update watcher: alerts on new commits, branches, and pull
//! requests in repositories that ship security-sensitive code.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Monitor, MonitorError};
use crate::clients::GithubSource;
use crate::notify::{Alert, Webhooks};

pub struct SecurityUpdatesMonitor {
    source: Arc<dyn GithubSource>,
    repos: Vec<String>,
    security: Webhooks,
    heads: HashMap<String, String>,
    branches: HashMap<String, HashSet<String>>,
    pulls: HashMap<String, HashSet<u64>>,
}

impl SecurityUpdatesMonitor {
    pub fn new(source: Arc<dyn GithubSource>, repos: Vec<String>, security: Webhooks) -> Self {
        Self {
            source,
            repos,
            security,
            heads: HashMap::new(),
            branches: HashMap::new(),
            pulls: HashMap::new(),
        }
    }
}

#[async_trait]
impl Monitor for SecurityUpdatesMonitor {
    fn name(&self) -> &'static str {
        "SecurityUpdatesMonitor"
    }

    async fn check(&mut self) -> Result<Vec<Alert>, MonitorError> {
        log::info!("Checking for security updates...");
        let mut alerts = Vec::new();

        for repo in &self.repos {
            // Master head commit. The first sighting is recorded without
            // alerting; only a change from a known head fires.
            let head = self.source.master_head(repo).await?;
            if let Some(prev) = self.heads.get(repo) {
                if *prev != head.sha {
                    let first_line = head.message.lines().next().unwrap_or("");
                    alerts.push(Alert::new(
                        self.security.clone(),
                        format!(
                            "### New Commit Detected\n> **Repo:** https://github.com/{}\n> **Message:** `{}`",
                            repo, first_line
                        ),
                    ));
                }
            }
            self.heads.insert(repo.clone(), head.sha);

            // Branches. One alert lists every branch added since the
            // last cycle, in the order GitHub returns them.
            let fetched = self.source.branches(repo).await?;
            if let Some(known) = self.branches.get(repo) {
                let new: Vec<_> = fetched.iter().filter(|b| !known.contains(*b)).collect();
                if !new.is_empty() {
                    let mut msg = format!(
                        "### New Branch Detected\n> **Repo:** https://github.com/{}",
                        repo
                    );
                    for branch in new {
                        msg.push_str(&format!("\n> **Branch:** `{}`", branch));
                    }
                    alerts.push(Alert::new(self.security.clone(), msg));
                }
            }
            self.branches.insert(repo.clone(), fetched.into_iter().collect());

            // Open pull requests, diffed by number.
            let fetched = self.source.pulls(repo).await?;
            if let Some(known) = self.pulls.get(repo) {
                let new: Vec<_> = fetched
                    .iter()
                    .filter(|pr| !known.contains(&pr.number))
                    .collect();
                if !new.is_empty() {
                    let mut msg = format!(
                        "### New PR Detected\n> **Repo:** https://github.com/{}",
                        repo
                    );
                    for pr in new {
                        msg.push_str(&format!("\n> **PR:** [{}]({})", pr.title, pr.html_url));
                    }
                    alerts.push(Alert::new(self.security.clone(), msg));
                }
            }
            self.pulls
                .insert(repo.clone(), fetched.iter().map(|pr| pr.number).collect());
        }

        Ok(alerts)
    }
}
