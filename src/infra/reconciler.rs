use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use crate::use_cases::subscription::SubscriptionUseCases;

const BATCH_SIZE: i64 = 500;

/// Periodically expire active subscriptions whose paid period has elapsed,
/// covering users with no open session.
pub async fn run_expiry_sweep_loop(subscriptions: Arc<SubscriptionUseCases>, every: Duration) {
    let mut ticker = interval(every);

    info!("Subscription expiry sweep started (every {}s)", every.as_secs());

    loop {
        ticker.tick().await;

        match subscriptions.expire_elapsed(Utc::now(), BATCH_SIZE).await {
            Ok(0) => {}
            Ok(expired) => info!(expired, "Expired elapsed subscriptions"),
            Err(e) => error!(error = %e, "Subscription expiry sweep failed"),
        }
    }
}
