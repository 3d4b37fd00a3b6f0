use chainwatch::{
    clients::{GithubClient, GithubSource, PriceCache, ThornodeClient, ThornodeDataSource},
    config::Config,
    init_logging,
    monitor::{
        spawn, ChainLagMonitor, ChainUpdateMonitor, ImageChangeMonitor, InvariantsMonitor,
        SecurityUpdatesMonitor, SolvencyMonitor, StuckOutboundMonitor,
    },
    notify::{Alert, Notifier},
    queue::{alert_channel, run_delivery_loop},
};
use log::{error, info};
use std::env;
use std::fs;
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let level = env::var("CHAINWATCH_LOG").unwrap_or_else(|_| "info".to_string());
    init_logging(&level, None)?;

    info!("Starting chainwatch");

    let config = Config::from_env();
    config.validate()?;
    fs::create_dir_all(&config.chain_update.data_dir)?;

    let thornode: Arc<dyn ThornodeDataSource> = Arc::new(ThornodeClient::new(
        config.endpoints.thornode_api.clone(),
        config.endpoints.thornode_rpc.clone(),
        config.endpoints.ninerealms_api.clone(),
    )?);
    let github: Arc<dyn GithubSource> = Arc::new(GithubClient::new()?);
    let prices = Arc::new(PriceCache::new(config.endpoints.midgard_api.clone()));
    let notifier = Notifier::new();

    let activity = config.webhooks.activity.clone();
    let security = config.webhooks.security.clone();
    let errors = config.webhooks.errors.clone();

    let (tx, rx) = alert_channel(1);

    // Chain lag, polled every 5 minutes.
    spawn(
        ChainLagMonitor::new(config.chain_lag.clone(), thornode.clone(), activity.clone()),
        tx.clone(),
        Duration::from_secs(5 * 60),
        errors.clone(),
    );

    // Solvency, polled every minute.
    spawn(
        SolvencyMonitor::new(
            config.solvency.clone(),
            thornode.clone(),
            prices.clone(),
            activity.clone(),
        ),
        tx.clone(),
        Duration::from_secs(60),
        errors.clone(),
    );

    // Invariants, polled every 5 minutes.
    spawn(
        InvariantsMonitor::new(
            thornode.clone(),
            config.endpoints.thornode_api.clone(),
            activity.clone(),
        ),
        tx.clone(),
        Duration::from_secs(5 * 60),
        errors.clone(),
    );

    // Stuck outbounds, polled every 10 minutes.
    spawn(
        StuckOutboundMonitor::new(
            thornode.clone(),
            config.stuck_outbound.clone(),
            config.endpoints.explorer_url.clone(),
            activity.clone(),
        ),
        tx.clone(),
        Duration::from_secs(10 * 60),
        errors.clone(),
    );

    // Chain daemon updates, polled every 10 minutes.
    spawn(
        ChainUpdateMonitor::new(
            github.clone(),
            config.chain_update.clone(),
            activity.clone(),
            errors.clone(),
        ),
        tx.clone(),
        Duration::from_secs(10 * 60),
        errors.clone(),
    );

    // Image changes, polled every 10 minutes.
    spawn(
        ImageChangeMonitor::new(thornode.clone(), activity.clone(), security.clone()),
        tx.clone(),
        Duration::from_secs(10 * 60),
        errors.clone(),
    );

    // Security updates, polled every 10 minutes.
    spawn(
        SecurityUpdatesMonitor::new(
            github.clone(),
            config.security_updates.repos.clone(),
            security.clone(),
        ),
        tx.clone(),
        Duration::from_secs(10 * 60),
        errors.clone(),
    );

    // The monitor tasks hold the only remaining senders; the delivery
    // loop runs until every one of them is gone.
    drop(tx);
    run_delivery_loop(rx, &notifier).await;

    // All senders dropped: something took the monitors down.
    let message = "```[ERROR] alert queue was unexpectedly closed```".to_string();
    let alert = Alert::new(config.webhooks.errors.clone(), message);
    for err in notifier.notify(&alert).await {
        error!("alert delivery failed: {}", err);
    }
    error!("alert queue was unexpectedly closed");
    process::exit(1)
}
