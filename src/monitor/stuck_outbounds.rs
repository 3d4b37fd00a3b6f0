//! Stuck outbound detector: flags pending outbound transactions whose
//! finalised height is too far behind the current chain height.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Monitor, MonitorError};
use crate::clients::ThornodeDataSource;
use crate::config::StuckOutboundConfig;
use crate::notify::{Alert, Webhooks};

pub struct StuckOutboundMonitor {
    source: Arc<dyn ThornodeDataSource>,
    cfg: StuckOutboundConfig,
    explorer_url: String,
    activity: Webhooks,
    seen: HashSet<String>,
}

impl StuckOutboundMonitor {
    pub fn new(
        source: Arc<dyn ThornodeDataSource>,
        cfg: StuckOutboundConfig,
        explorer_url: String,
        activity: Webhooks,
    ) -> Self {
        Self {
            source,
            cfg,
            explorer_url,
            activity,
            seen: HashSet::new(),
        }
    }
}

#[async_trait]
impl Monitor for StuckOutboundMonitor {
    fn name(&self) -> &'static str {
        "StuckOutboundMonitor"
    }

    async fn check(&mut self) -> Result<Vec<Alert>, MonitorError> {
        log::info!("Checking for stuck outbound txs...");
        let current_height = self.source.get_latest_height().await?;
        let outbounds = self.source.get_pending_outbounds().await?;

        let mut alerts = Vec::new();
        for outbound in &outbounds {
            let in_hash = match &outbound.in_hash {
                Some(hash) => hash,
                None => continue,
            };
            if self.seen.contains(in_hash) {
                continue;
            }

            let details = match self.source.get_tx_details(in_hash).await {
                Ok(details) => details,
                Err(e) => {
                    // One broken lookup should not hide other stuck txs.
                    log::error!("error fetching transaction details for {}: {}", in_hash, e);
                    continue;
                }
            };

            let finalised_height = match details.finalised_height {
                Some(height) => height,
                None => {
                    log::error!("missing finalised height, cannot calculate age: {}", in_hash);
                    continue;
                }
            };

            let age = current_height - finalised_height;
            if age > self.cfg.block_age_threshold {
                alerts.push(Alert::new(
                    self.activity.clone(),
                    format!(
                        "Stuck transaction detected: {}/tx/{} ({} {})",
                        self.explorer_url, in_hash, outbound.coin.amount, outbound.coin.asset
                    ),
                ));
                self.seen.insert(in_hash.clone());
            }
        }

        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::thornode::MockThornodeDataSource;
    use crate::clients::{ClientError, OutboundCoin, TxDetails, TxOutItem};

    fn outbound(in_hash: Option<&str>, amount: &str, asset: &str) -> TxOutItem {
        TxOutItem {
            in_hash: in_hash.map(str::to_string),
            coin: OutboundCoin {
                asset: asset.to_string(),
                amount: amount.to_string(),
            },
        }
    }

    fn monitor(source: MockThornodeDataSource) -> StuckOutboundMonitor {
        StuckOutboundMonitor::new(
            Arc::new(source),
            StuckOutboundConfig {
                block_age_threshold: 7200,
            },
            "https://viewblock.io/thorchain".to_string(),
            Webhooks::default(),
        )
    }

    #[tokio::test]
    async fn test_stuck_transaction_alerts_once() {
        let mut source = MockThornodeDataSource::new();
        source
            .expect_get_latest_height()
            .times(2)
            .returning(|| Ok(100_000));
        source
            .expect_get_pending_outbounds()
            .times(2)
            .returning(|| Ok(vec![outbound(Some("ABC"), "5000000000", "BTC.BTC")]));
        source
            .expect_get_tx_details()
            .withf(|hash| hash == "ABC")
            .times(1)
            .returning(|_| {
                Ok(TxDetails {
                    finalised_height: Some(90_000),
                })
            });
        let mut monitor = monitor(source);

        let alerts = monitor.check().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(
            alerts[0].message,
            "Stuck transaction detected: \
             https://viewblock.io/thorchain/tx/ABC (5000000000 BTC.BTC)"
        );

        // Already alerted: the details are not even refetched.
        assert!(monitor.check().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_alerts_only_after_it_ages_past_threshold() {
        let mut source = MockThornodeDataSource::new();
        let mut heights = vec![95_000_i64, 103_000].into_iter();
        source
            .expect_get_latest_height()
            .times(2)
            .returning(move || Ok(heights.next().unwrap()));
        source
            .expect_get_pending_outbounds()
            .times(2)
            .returning(|| Ok(vec![outbound(Some("ABC"), "1", "ETH.ETH")]));
        source
            .expect_get_tx_details()
            .times(2)
            .returning(|_| {
                Ok(TxDetails {
                    finalised_height: Some(90_000),
                })
            });
        let mut monitor = monitor(source);

        // Age 5000 is under the threshold.
        assert!(monitor.check().await.unwrap().is_empty());
        // Age 13000 is over it.
        assert_eq!(monitor.check().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_age_equal_to_threshold_does_not_alert() {
        let mut source = MockThornodeDataSource::new();
        source
            .expect_get_latest_height()
            .times(1)
            .returning(|| Ok(97_200));
        source
            .expect_get_pending_outbounds()
            .times(1)
            .returning(|| Ok(vec![outbound(Some("ABC"), "1", "ETH.ETH")]));
        source.expect_get_tx_details().times(1).returning(|_| {
            Ok(TxDetails {
                finalised_height: Some(90_000),
            })
        });
        let mut monitor = monitor(source);

        assert!(monitor.check().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_finalised_height_is_skipped() {
        let mut source = MockThornodeDataSource::new();
        source
            .expect_get_latest_height()
            .times(2)
            .returning(|| Ok(100_000));
        source
            .expect_get_pending_outbounds()
            .times(2)
            .returning(|| Ok(vec![outbound(Some("ABC"), "1", "ETH.ETH")]));
        // Not marked seen, so the details are fetched again next cycle.
        source
            .expect_get_tx_details()
            .times(2)
            .returning(|_| {
                Ok(TxDetails {
                    finalised_height: None,
                })
            });
        let mut monitor = monitor(source);

        assert!(monitor.check().await.unwrap().is_empty());
        assert!(monitor.check().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_details_error_skips_only_that_transaction() {
        let mut source = MockThornodeDataSource::new();
        source
            .expect_get_latest_height()
            .times(1)
            .returning(|| Ok(100_000));
        source.expect_get_pending_outbounds().times(1).returning(|| {
            Ok(vec![
                outbound(Some("BAD"), "1", "ETH.ETH"),
                outbound(Some("STUCK"), "42", "BTC.BTC"),
            ])
        });
        source
            .expect_get_tx_details()
            .withf(|hash| hash == "BAD")
            .times(1)
            .returning(|_| Err(ClientError::Api("boom".to_string())));
        source
            .expect_get_tx_details()
            .withf(|hash| hash == "STUCK")
            .times(1)
            .returning(|_| {
                Ok(TxDetails {
                    finalised_height: Some(90_000),
                })
            });
        let mut monitor = monitor(source);

        let alerts = monitor.check().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("STUCK"));
    }

    #[tokio::test]
    async fn test_outbound_without_in_hash_is_ignored() {
        let mut source = MockThornodeDataSource::new();
        source
            .expect_get_latest_height()
            .times(1)
            .returning(|| Ok(100_000));
        source
            .expect_get_pending_outbounds()
            .times(1)
            .returning(|| Ok(vec![outbound(None, "1", "ETH.ETH")]));
        source.expect_get_tx_details().never();
        let mut monitor = monitor(source);

        assert!(monitor.check().await.unwrap().is_empty());
    }
}
