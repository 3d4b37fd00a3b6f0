pub mod format;
pub mod logging;
pub mod notify;
pub mod queue;
pub mod config;
pub mod clients;
pub mod monitor;

pub use format::{format_percent, shorten_address, shorten_pubkey};
pub use logging::init_logging;
pub use notify::{Alert, Channel, Notifier, NotifyError, Webhooks};
pub use queue::{alert_channel, run_delivery_loop, AlertReceiver, AlertSender};
pub use config::{Config, ConfigError};
pub use clients::{
    ClientError, GithubClient, GithubSource, PriceCache, ThornodeClient, ThornodeDataSource,
};
pub use monitor::{
    spawn, ChainLagMonitor, ChainUpdateMonitor, ImageChangeMonitor, InvariantsMonitor, Monitor,
    MonitorError, SecurityUpdatesMonitor, SolvencyMonitor, StuckOutboundMonitor,
};
