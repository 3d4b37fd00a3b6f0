//! Environment-driven configuration with the deployed defaults baked in.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::notify::Webhooks;

/// Configuration error type
#[derive(Debug, Clone)]
pub enum ConfigError {
    InvalidThreshold(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidThreshold(msg) => write!(f, "Invalid threshold: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Base URLs of the external services the monitors poll.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub thornode_api: String,
    pub thornode_rpc: String,
    pub ninerealms_api: String,
    pub midgard_api: String,
    pub explorer_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            thornode_api: "https://thornode.ninerealms.com".to_string(),
            thornode_rpc: "https://rpc.ninerealms.com".to_string(),
            ninerealms_api: "https://api.ninerealms.com".to_string(),
            midgard_api: "https://midgard.ninerealms.com".to_string(),
            explorer_url: "https://viewblock.io/thorchain".to_string(),
        }
    }
}

/// Webhook destinations grouped by alert category.
#[derive(Debug, Clone, Default)]
pub struct WebhookGroups {
    pub activity: Webhooks,
    pub security: Webhooks,
    pub errors: Webhooks,
}

/// Per-chain maximum allowed block lag.
#[derive(Debug, Clone)]
pub struct ChainLagConfig {
    pub max_chain_lag: HashMap<String, i64>,
}

impl Default for ChainLagConfig {
    fn default() -> Self {
        let max_chain_lag = [
            ("BCH", 3),
            ("BTC", 3),
            ("BNB", 1800),
            ("DOGE", 30),
            ("ETH", 70),
            ("LTC", 6),
            ("GAIA", 175),
            ("AVAX", 900),
        ]
        .into_iter()
        .map(|(chain, lag)| (chain.to_string(), lag))
        .collect();
        Self { max_chain_lag }
    }
}

impl ChainLagConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (chain, max_lag) in &self.max_chain_lag {
            if *max_lag == 0 {
                return Err(ConfigError::InvalidThreshold(format!(
                    "max chain lag cannot be 0 for chain {}",
                    chain
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SolvencyConfig {
    pub alert_window_threshold: u64,
    pub alert_percent_threshold: f64,
    pub alert_usd_threshold: f64,
    pub alert_cooldown_seconds: u64,
}

impl Default for SolvencyConfig {
    fn default() -> Self {
        Self {
            alert_window_threshold: 60,
            alert_percent_threshold: 0.02,
            alert_usd_threshold: 5000.0,
            alert_cooldown_seconds: 60 * 60 * 12,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StuckOutboundConfig {
    pub block_age_threshold: i64,
}

impl Default for StuckOutboundConfig {
    fn default() -> Self {
        Self {
            block_age_threshold: 7200,
        }
    }
}

/// One tracked chain daemon and the GitHub repo its releases come from.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub name: String,
    pub github: String,
}

#[derive(Debug, Clone)]
pub struct ChainUpdateConfig {
    pub data_dir: PathBuf,
    pub daemons: Vec<DaemonConfig>,
}

impl Default for ChainUpdateConfig {
    fn default() -> Self {
        let daemons = [
            ("binance-smart", "bnb-chain/bsc"),
            ("bitcoin", "bitcoin/bitcoin"),
            ("bitcoin-cash", "bitcoin-cash-node/bitcoin-cash-node"),
            ("dogecoin", "dogecoin/dogecoin"),
            ("ethereum", "ethereum/go-ethereum"),
            ("gaia", "cosmos/gaia"),
            ("litecoin", "litecoin-project/litecoin"),
            ("avalanche", "ava-labs/avalanchego"),
            ("prysm", "prysmaticlabs/prysm"),
        ]
        .into_iter()
        .map(|(name, github)| DaemonConfig {
            name: name.to_string(),
            github: github.to_string(),
        })
        .collect();
        Self {
            data_dir: PathBuf::from("./data"),
            daemons,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityUpdatesConfig {
    pub repos: Vec<String>,
}

impl Default for SecurityUpdatesConfig {
    fn default() -> Self {
        Self {
            repos: vec!["bnb-chain/tss-lib".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub endpoints: Endpoints,
    pub webhooks: WebhookGroups,
    pub chain_lag: ChainLagConfig,
    pub solvency: SolvencyConfig,
    pub stuck_outbound: StuckOutboundConfig,
    pub chain_update: ChainUpdateConfig,
    pub security_updates: SecurityUpdatesConfig,
}

fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_or_empty(key: &str) -> String {
    env::var(key).unwrap_or_default()
}

impl Config {
    /// Loads the configuration from the environment, falling back to the
    /// deployed defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            thornode_api: env_or("ENDPOINTS_THORNODE_API", &defaults.thornode_api),
            thornode_rpc: env_or("ENDPOINTS_THORNODE_RPC", &defaults.thornode_rpc),
            ninerealms_api: env_or("ENDPOINTS_NINEREALMS_API", &defaults.ninerealms_api),
            midgard_api: env_or("ENDPOINTS_MIDGARD_API", &defaults.midgard_api),
            explorer_url: env_or("ENDPOINTS_EXPLORER_URL", &defaults.explorer_url),
        };

        let webhooks = WebhookGroups {
            activity: Webhooks {
                slack: env_or_empty("WEBHOOKS_ACTIVITY_SLACK"),
                discord: env_or_empty("WEBHOOKS_ACTIVITY_DISCORD"),
            },
            security: Webhooks {
                slack: env_or_empty("WEBHOOKS_SECURITY_SLACK"),
                discord: env_or_empty("WEBHOOKS_SECURITY_DISCORD"),
            },
            errors: Webhooks {
                slack: env_or_empty("WEBHOOKS_ERRORS_SLACK"),
                discord: env_or_empty("WEBHOOKS_ERRORS_DISCORD"),
            },
        };

        let mut chain_update = ChainUpdateConfig::default();
        match env::var("DATA_DIR") {
            Ok(dir) if !dir.is_empty() => chain_update.data_dir = PathBuf::from(dir),
            _ => {}
        }

        Self {
            endpoints,
            webhooks,
            chain_update,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain_lag.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_chain_lag_config() {
        let valid = ChainLagConfig {
            max_chain_lag: [("BTC".to_string(), 1), ("ETH".to_string(), 1)]
                .into_iter()
                .collect(),
        };
        assert!(valid.validate().is_ok());

        let invalid = ChainLagConfig {
            max_chain_lag: [("BTC".to_string(), 0), ("ETH".to_string(), 1)]
                .into_iter()
                .collect(),
        };
        let err = invalid.validate().unwrap_err();
        assert!(err.to_string().contains("BTC"));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chain_lag.max_chain_lag["BTC"], 3);
        assert_eq!(config.chain_lag.max_chain_lag["BNB"], 1800);
        assert_eq!(config.solvency.alert_cooldown_seconds, 43_200);
        assert_eq!(config.stuck_outbound.block_age_threshold, 7200);
        assert_eq!(config.chain_update.daemons.len(), 9);
        assert_eq!(config.chain_update.daemons[0].name, "binance-smart");
        assert_eq!(config.security_updates.repos, vec!["bnb-chain/tss-lib"]);
    }

    // All env manipulation lives in this one test: the test runner is
    // multi-threaded and the environment is process-global.
    #[test]
    fn test_from_env_overrides_and_defaults() {
        env::set_var("ENDPOINTS_THORNODE_API", "http://localhost:1317");
        env::set_var("WEBHOOKS_ACTIVITY_SLACK", "https://hooks.slack.com/services/T00/act");
        env::set_var("WEBHOOKS_SECURITY_SLACK", "https://hooks.slack.com/services/T00/sec");
        env::set_var("DATA_DIR", "/var/lib/chainwatch");

        let config = Config::from_env();
        assert_eq!(config.endpoints.thornode_api, "http://localhost:1317");
        assert_eq!(
            config.endpoints.midgard_api,
            "https://midgard.ninerealms.com"
        );
        assert_eq!(
            config.webhooks.activity.slack,
            "https://hooks.slack.com/services/T00/act"
        );
        assert_eq!(
            config.webhooks.security.slack,
            "https://hooks.slack.com/services/T00/sec"
        );
        assert!(config.webhooks.errors.slack.is_empty());
        assert_eq!(
            config.chain_update.data_dir,
            PathBuf::from("/var/lib/chainwatch")
        );

        env::remove_var("ENDPOINTS_THORNODE_API");
        env::remove_var("WEBHOOKS_ACTIVITY_SLACK");
        env::remove_var("WEBHOOKS_SECURITY_SLACK");
        env::remove_var("DATA_DIR");

        let config = Config::from_env();
        assert_eq!(
            config.endpoints.thornode_api,
            "https://thornode.ninerealms.com"
        );
        assert!(config.webhooks.activity.slack.is_empty());
        assert_eq!(config.chain_update.data_dir, PathBuf::from("./data"));
    }
}
