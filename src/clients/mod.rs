//! HTTP clients for the upstream data sources the monitors poll.

pub mod github;
pub mod prices;
pub mod thornode;

pub use github::{BranchHead, GithubClient, GithubSource, PullRequest, Release};
pub use prices::PriceCache;
pub use thornode::{
    ChainHeight, Image, InvariantResponse, Node, OutboundCoin, ThornodeClient,
    ThornodeDataSource, TxDetails, TxOutItem, Vault, VaultAddress, VaultCoin,
};

/// Error raised by any upstream data-source call.
#[derive(Debug, Clone)]
pub enum ClientError {
    Network(String),
    Api(String),
    Parse(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Network(msg) => write!(f, "Network error: {}", msg),
            ClientError::Api(msg) => write!(f, "API error: {}", msg),
            ClientError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}
