//! Invariant detector: latches on newly broken network invariants and
//! stays quiet until they resolve.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Monitor, MonitorError};
use crate::clients::ThornodeDataSource;
use crate::notify::{Alert, Webhooks};

// Pseudo-invariants that are expected to drift and never alert.
const IGNORED_INVARIANTS: [&str; 2] = ["asgard", "pools"];

pub struct InvariantsMonitor {
    source: Arc<dyn ThornodeDataSource>,
    thornode_url: String,
    activity: Webhooks,
    tripped: HashSet<String>,
}

impl InvariantsMonitor {
    pub fn new(
        source: Arc<dyn ThornodeDataSource>,
        thornode_url: String,
        activity: Webhooks,
    ) -> Self {
        Self {
            source,
            thornode_url,
            activity,
            tripped: HashSet::new(),
        }
    }

    /// Fetches each invariant's status and returns the ones that broke
    /// since the last cycle. Already-tripped invariants stay silent until
    /// they resolve; resolving clears the latch. Any fetch failure aborts
    /// the whole cycle.
    async fn scan(&mut self, invariants: &[String]) -> Result<Vec<String>, MonitorError> {
        let mut broken = Vec::new();

        for invariant in invariants {
            if IGNORED_INVARIANTS.contains(&invariant.as_str()) {
                continue;
            }

            let status = match self.source.get_invariant(invariant).await {
                Ok(status) => status,
                Err(e) => {
                    log::error!("error getting invariant {}: {}", invariant, e);
                    return Err(e.into());
                }
            };

            if status.broken && !self.tripped.contains(&status.invariant) {
                broken.push(status.invariant.clone());
                self.tripped.insert(status.invariant);
            } else if !status.broken {
                self.tripped.remove(&status.invariant);
            }
        }

        Ok(broken)
    }
}

#[async_trait]
impl Monitor for InvariantsMonitor {
    fn name(&self) -> &'static str {
        "InvariantsMonitor"
    }

    async fn check(&mut self) -> Result<Vec<Alert>, MonitorError> {
        log::info!("Checking invariants...");
        let invariants = self.source.get_invariants().await?;
        let broken = self.scan(&invariants).await?;

        log::info!("{} new broken invariants", broken.len());
        if broken.is_empty() {
            return Ok(Vec::new());
        }

        let mut msgs = vec!["> ### Broken Invariants:".to_string()];
        for name in &broken {
            msgs.push(format!("> {}/thorchain/invariant/{}", self.thornode_url, name));
        }
        Ok(vec![Alert::new(self.activity.clone(), msgs.join("\n"))])
    }
}
