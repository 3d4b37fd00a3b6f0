//! Solvency detector: compares on-chain vault balances against the ledger
//! view and alerts when a vault is short past the configured thresholds.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Monitor, MonitorError};
use crate::clients::{PriceCache, ThornodeDataSource, Vault, VaultAddress};
use crate::config::SolvencyConfig;
use crate::format::{format_percent, shorten_address, shorten_pubkey};
use crate::notify::{Alert, Webhooks};

pub struct SolvencyMonitor {
    cfg: SolvencyConfig,
    source: Arc<dyn ThornodeDataSource>,
    prices: Arc<PriceCache>,
    activity: Webhooks,
}

impl SolvencyMonitor {
    pub fn new(
        cfg: SolvencyConfig,
        source: Arc<dyn ThornodeDataSource>,
        prices: Arc<PriceCache>,
        activity: Webhooks,
    ) -> Self {
        Self {
            cfg,
            source,
            prices,
            activity,
        }
    }
}

fn find_address(addresses: &[VaultAddress], asset: &str) -> String {
    let asset_chain = asset.split('.').next().unwrap_or_default();
    addresses
        .iter()
        .find(|a| a.chain == asset_chain)
        .map(|a| a.address.clone())
        .unwrap_or_default()
}

/// Evaluates every coin of every active vault. A coin is insolvent when the
/// chain balance is short of the ledger balance by more than the percent
/// threshold while the USD difference stays under the USD threshold. Note
/// the USD comparison is signed, not absolute.
fn check_solvency(
    cfg: &SolvencyConfig,
    activity: &Webhooks,
    vaults: &[Vault],
    asset_prices: &HashMap<String, f64>,
) -> Vec<Alert> {
    let mut msgs = Vec::new();

    for vault in vaults {
        if vault.status != "ActiveVault" {
            continue;
        }

        for coin in &vault.coins {
            let Ok(chain_amount) = coin.chain_amount.parse::<i64>() else {
                continue;
            };
            if chain_amount == 0 {
                continue;
            }
            let Ok(amount) = coin.amount.parse::<i64>() else {
                continue;
            };

            let diff = chain_amount - amount;
            let pct_diff = diff as f64 / chain_amount as f64;

            // Assets without a known price are skipped, not assumed solvent.
            let Some(asset_price) = asset_prices.get(&coin.asset) else {
                continue;
            };
            let usd_diff = diff as f64 * asset_price;

            if pct_diff <= -cfg.alert_percent_threshold && usd_diff < cfg.alert_usd_threshold {
                let address = shorten_address(&find_address(&vault.addresses, &coin.asset));
                log::warn!(
                    "insolvency: asset={} address={} vault={} type={} ledger={} chain={} pct={} usd={:.2}",
                    coin.asset,
                    address,
                    shorten_pubkey(&vault.pub_key),
                    vault.vault_type,
                    amount,
                    chain_amount,
                    format_percent(pct_diff),
                    usd_diff
                );
                msgs.push(format!("Insolvency detected for {} at {}", coin.asset, address));
            }
        }
    }

    if msgs.is_empty() {
        return Vec::new();
    }
    let message = format!("```{}```", msgs.join("\n"));
    vec![Alert::new(activity.clone(), message)]
}

#[async_trait]
impl Monitor for SolvencyMonitor {
    fn name(&self) -> &'static str {
        "SolvencyMonitor"
    }

    async fn check(&mut self) -> Result<Vec<Alert>, MonitorError> {
        log::info!("Checking solvency...");
        let vaults = self.source.get_asgard_vaults().await?;
        let asset_prices = self.prices.get().await?;
        Ok(check_solvency(
            &self.cfg,
            &self.activity,
            &vaults,
            &asset_prices,
        ))
    }
}
