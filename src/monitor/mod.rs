//! Monitor contract and the supervisor loop that schedules each monitor
//! on its own task.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::clients::ClientError;
use crate::notify::{Alert, Webhooks};
use crate::queue::AlertSender;

pub mod chain_lag;
pub mod chain_update;
pub mod image_changes;
pub mod invariants;
pub mod security_updates;
pub mod solvency;
pub mod stuck_outbounds;

pub use chain_lag::ChainLagMonitor;
pub use chain_update::ChainUpdateMonitor;
pub use image_changes::ImageChangeMonitor;
pub use invariants::InvariantsMonitor;
pub use security_updates::SecurityUpdatesMonitor;
pub use solvency::SolvencyMonitor;
pub use stuck_outbounds::StuckOutboundMonitor;

/// Error returned by a failed check cycle.
#[derive(Debug)]
pub enum MonitorError {
    Client(ClientError),
    Io(String),
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::Client(e) => write!(f, "{}", e),
            MonitorError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for MonitorError {}

impl From<ClientError> for MonitorError {
    fn from(e: ClientError) -> Self {
        MonitorError::Client(e)
    }
}

/// One health signal, polled on a fixed interval by the supervisor.
#[async_trait]
pub trait Monitor: Send {
    fn name(&self) -> &'static str;

    /// Runs one poll cycle and returns the alerts it produced. An error
    /// fails the whole cycle; the supervisor reports it and keeps polling.
    async fn check(&mut self) -> Result<Vec<Alert>, MonitorError>;
}

/// Runs a monitor forever on its own task. The first check happens only
/// after one full interval. A check error becomes one internal alert and
/// the monitor keeps running; a panic inside a check is reported and then
/// terminates the process, since a monitor in an unknown state could emit
/// corrupted alerts.
pub fn spawn<M>(mut monitor: M, sink: AlertSender, interval: Duration, error_hooks: Webhooks)
where
    M: Monitor + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            match AssertUnwindSafe(monitor.check()).catch_unwind().await {
                Ok(Ok(alerts)) => {
                    for alert in alerts {
                        if sink.send(alert).await.is_err() {
                            fatal_queue_closed(monitor.name());
                        }
                    }
                }
                Ok(Err(err)) => {
                    let message = format!(
                        "```[ERROR] chainwatch: error running monitor {}: {}```",
                        monitor.name(),
                        err
                    );
                    log::error!("{}", message);
                    let alert = Alert::new(error_hooks.clone(), message);
                    if sink.send(alert).await.is_err() {
                        fatal_queue_closed(monitor.name());
                    }
                }
                Err(panic) => {
                    let message = format!(
                        "```[ERROR] chainwatch: monitor {} panicked: {}```",
                        monitor.name(),
                        panic_message(panic.as_ref())
                    );
                    log::error!("{}", message);
                    let _ = sink.send(Alert::new(error_hooks.clone(), message)).await;
                    std::process::exit(1);
                }
            }
        }
    });
}

fn fatal_queue_closed(name: &str) -> ! {
    log::error!("alert queue closed while monitor {} was reporting", name);
    std::process::exit(1);
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
