//! TTL-bounded USD price cache backed by the Midgard pools endpoint.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::ClientError;

const PRICE_TTL: Duration = Duration::from_secs(120);

#[derive(Deserialize)]
struct Pool {
    asset: String,
    #[serde(rename = "assetPriceUSD")]
    asset_price_usd: String,
}

struct CacheState {
    prices: HashMap<String, f64>,
    last_updated: Option<Instant>,
}

/// Shared asset→USD price cache. Refreshes at most once per TTL window;
/// concurrent callers during a refresh wait on the lock instead of issuing
/// duplicate upstream fetches.
pub struct PriceCache {
    client: Client,
    midgard_url: String,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl PriceCache {
    pub fn new(midgard_url: String) -> Self {
        Self::with_ttl(midgard_url, PRICE_TTL)
    }

    /// Builds a cache with a custom TTL, used in tests.
    pub fn with_ttl(midgard_url: String, ttl: Duration) -> Self {
        Self {
            client: Client::new(),
            midgard_url,
            ttl,
            state: Mutex::new(CacheState {
                prices: HashMap::new(),
                last_updated: None,
            }),
        }
    }

    /// Returns the cached prices, refreshing them first when the cache is
    /// older than the TTL. A failed refresh leaves the previous prices in
    /// place and surfaces the error only to the caller whose turn triggered
    /// the fetch; waiters behind the lock retry on their own turn.
    pub async fn get(&self) -> Result<HashMap<String, f64>, ClientError> {
        let mut state = self.state.lock().await;

        if let Some(at) = state.last_updated {
            if at.elapsed() < self.ttl {
                return Ok(state.prices.clone());
            }
        }

        let fresh = self.fetch_pools().await?;
        state.prices = fresh;
        state.last_updated = Some(Instant::now());
        Ok(state.prices.clone())
    }

    async fn fetch_pools(&self) -> Result<HashMap<String, f64>, ClientError> {
        let response = self
            .client
            .get(format!("{}/v2/pools", self.midgard_url))
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(ClientError::Api(format!(
                "failed to get pools: status code {}",
                response.status().as_u16()
            )));
        }

        let pools: Vec<Pool> = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let mut prices = HashMap::with_capacity(pools.len());
        for pool in pools {
            // Pools with unparsable prices are dropped rather than failing
            // the whole refresh.
            match pool.asset_price_usd.parse::<f64>() {
                Ok(price) => {
                    prices.insert(pool.asset, price);
                }
                Err(_) => {
                    log::warn!("skipping pool {} with bad price", pool.asset);
                }
            }
        }
        Ok(prices)
    }
}
