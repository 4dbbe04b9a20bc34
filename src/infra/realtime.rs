//! Realtime mirror of the `subscriptions` table.
//!
//! A trigger on the table `pg_notify`s every INSERT/UPDATE on
//! [`SUBSCRIPTION_CHANNEL`] with `{op, record}`. One listener per process turns
//! those into typed changes on a broadcast [`ChangeHub`]; sessions subscribe
//! to the hub and filter to their own user.

use std::time::Duration;

use serde::Deserialize;
use sqlx::{PgPool, postgres::PgListener};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::subscription::{ChangeOp, Subscription, SubscriptionChange, SubscriptionRow},
};

pub const SUBSCRIPTION_CHANNEL: &str = "subscription_changes";
pub const DEFAULT_HUB_CAPACITY: usize = 1024;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<SubscriptionChange>,
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SubscriptionChange> {
        self.tx.subscribe()
    }

    /// Returns how many sessions received the change. Zero listeners is fine.
    pub fn publish(&self, change: SubscriptionChange) -> usize {
        self.tx.send(change).unwrap_or(0)
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[derive(Deserialize)]
struct NotifyPayload {
    op: ChangeOp,
    record: SubscriptionRow,
}

/// Parse and validate one notification payload.
pub fn parse_notification(payload: &str) -> AppResult<SubscriptionChange> {
    let raw: NotifyPayload = serde_json::from_str(payload)
        .map_err(|e| AppError::InvalidInput(format!("Malformed change payload: {}", e)))?;
    Ok(SubscriptionChange {
        op: raw.op,
        record: Subscription::try_from(raw.record)?,
    })
}

/// Forward database notifications to the hub for the life of the process.
pub async fn run_change_listener(pool: PgPool, hub: ChangeHub) {
    loop {
        match listen(&pool, &hub).await {
            Ok(()) => return,
            Err(e) => {
                error!(error = %e, "Subscription change listener failed, reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

async fn listen(pool: &PgPool, hub: &ChangeHub) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(SUBSCRIPTION_CHANNEL).await?;
    info!(channel = SUBSCRIPTION_CHANNEL, "Listening for subscription changes");

    loop {
        let notification = listener.recv().await?;
        match parse_notification(notification.payload()) {
            Ok(change) => {
                let delivered = hub.publish(change);
                tracing::debug!(delivered, "Subscription change published");
            }
            Err(e) => warn!(error = %e, "Dropping invalid subscription change"),
        }
    }
}
