//! Chain-lag detector: flags external chains where too many active nodes
//! trail the best observed height.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{Monitor, MonitorError};
use crate::clients::{Node, ThornodeDataSource};
use crate::config::ChainLagConfig;
use crate::notify::{Alert, Webhooks};

const ALERT_COOLDOWN: Duration = Duration::from_secs(60 * 60);

pub struct ChainLagMonitor {
    cfg: ChainLagConfig,
    source: Arc<dyn ThornodeDataSource>,
    activity: Webhooks,
    last_lag: HashMap<String, usize>,
    last_alert: Option<Instant>,
}

impl ChainLagMonitor {
    pub fn new(cfg: ChainLagConfig, source: Arc<dyn ThornodeDataSource>, activity: Webhooks) -> Self {
        Self {
            cfg,
            source,
            activity,
            last_lag: HashMap::new(),
            last_alert: None,
        }
    }
}

/// Groups observed heights by chain across active nodes and flags each
/// configured chain where more than a quarter of active nodes trail the
/// maximum height by over the allowed lag. Returns the per-chain alert
/// messages and the lag flag (1 or 0) per evaluated chain.
fn calculate_chain_lag(
    nodes: &[Node],
    max_chain_lag: &HashMap<String, i64>,
) -> (Vec<String>, HashMap<String, usize>) {
    let mut chain_heights: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
    let mut active_nodes = 0;
    for node in nodes {
        if node.status != "Active" {
            continue;
        }
        for observed in &node.observe_chains {
            chain_heights
                .entry(observed.chain.as_str())
                .or_default()
                .push(observed.height);
        }
        active_nodes += 1;
    }

    let mut msgs = Vec::new();
    let mut new_lag_counts = HashMap::new();
    for (chain, heights) in chain_heights {
        let Some(&max_lag) = max_chain_lag.get(chain) else {
            continue;
        };

        let max_height = heights.iter().copied().max().unwrap_or(0);
        let lag_count = heights.iter().filter(|&&h| max_height - h > max_lag).count();

        if lag_count > active_nodes / 4 {
            msgs.push(format!(
                "[{}] Lagging by over {} blocks on {} nodes.",
                chain, max_lag, lag_count
            ));
            log::warn!(
                "chain {} lagging by over {} blocks on {} nodes",
                chain,
                max_lag,
                lag_count
            );
            new_lag_counts.insert(chain.to_string(), 1);
        } else {
            new_lag_counts.insert(chain.to_string(), 0);
        }
    }
    (msgs, new_lag_counts)
}

#[async_trait]
impl Monitor for ChainLagMonitor {
    fn name(&self) -> &'static str {
        "ChainLagMonitor"
    }

    async fn check(&mut self) -> Result<Vec<Alert>, MonitorError> {
        log::info!("Checking chain lag...");
        let nodes = self.source.get_nodes().await?;

        let (msgs, new_lag_counts) = calculate_chain_lag(&nodes, &self.cfg.max_chain_lag);
        for (chain, count) in new_lag_counts {
            self.last_lag.insert(chain, count);
        }
        log::debug!("chain lag flags: {:?}", self.last_lag);

        let cooled_down = match self.last_alert {
            None => true,
            Some(at) => at.elapsed() > ALERT_COOLDOWN,
        };

        if !msgs.is_empty() && cooled_down {
            self.last_alert = Some(Instant::now());
            let message = format!("```{}\n```", msgs.join("\n"));
            return Ok(vec![Alert::new(self.activity.clone(), message)]);
        }
        Ok(Vec::new())
    }
}
