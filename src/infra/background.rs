use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::use_cases::{
    subscription_scheduler::SubscriptionScheduler, token_revocation::TokenRevocationUseCases,
};

/// Purges revoked-token rows whose tokens have expired anyway.
pub async fn run_token_cleanup_loop(revocation: Arc<TokenRevocationUseCases>, every_secs: u64) {
    let mut ticker = interval(Duration::from_secs(every_secs));

    info!("Revoked token cleanup started (every {}s)", every_secs);

    loop {
        ticker.tick().await;

        match revocation.cleanup_expired().await {
            Ok(removed) => info!(removed, "Expired revoked tokens purged"),
            Err(e) => error!(error = ?e, "Failed to purge expired revoked tokens"),
        }
    }
}

/// Renewals, expirations, reminders and usage recounts.
pub async fn run_subscription_maintenance_loop(
    scheduler: Arc<SubscriptionScheduler>,
    every_secs: u64,
) {
    let mut ticker = interval(Duration::from_secs(every_secs));

    info!("Subscription maintenance started (every {}s)", every_secs);

    loop {
        ticker.tick().await;
        // run_all logs its own report and per-step failures.
        scheduler.run_all().await;
    }
}
