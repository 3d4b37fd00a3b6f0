//! Bounded alert queue and the single consumer that drains it.

use tokio::sync::mpsc;

use crate::notify::{Alert, Notifier};

pub type AlertSender = mpsc::Sender<Alert>;
pub type AlertReceiver = mpsc::Receiver<Alert>;

/// Creates the bounded hand-off channel between monitors and the delivery
/// loop. Monitors block on a full queue until the consumer catches up.
pub fn alert_channel(capacity: usize) -> (AlertSender, AlertReceiver) {
    mpsc::channel(capacity)
}

/// Drains the queue in FIFO order, delivering one alert at a time. The
/// next alert is not taken until the previous fan-out completes. Delivery
/// failures are logged and dropped, never re-queued. Returns only when the
/// channel is closed, which the caller must treat as fatal.
pub async fn run_delivery_loop(mut rx: AlertReceiver, notifier: &Notifier) {
    while let Some(alert) = rx.recv().await {
        for err in notifier.notify(&alert).await {
            log::error!("alert delivery failed: {}", err);
        }
    }
}
