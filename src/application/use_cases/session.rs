use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::subscription::{ReconcileOutcome, SubscriptionUseCases};
use crate::domain::{
    entities::subscription::{Subscription, SubscriptionChange},
    status::{AccessStatus, evaluate},
};

pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Latest known state for one connected user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub subscription: Option<Subscription>,
    pub access: AccessStatus,
}

impl SessionSnapshot {
    fn from_record(record: Option<Subscription>, now: DateTime<Utc>) -> Self {
        let access = evaluate(record.as_ref(), now);
        Self {
            subscription: record,
            access,
        }
    }
}

/// Per-connection subscription context: holds the user's record, re-checks it
/// on a fixed cadence and mirrors row changes published on the change hub.
///
/// Lives exactly as long as someone holds the snapshot receiver.
pub struct SubscriptionSession {
    user_id: Uuid,
    subscriptions: SubscriptionUseCases,
    changes: broadcast::Receiver<SubscriptionChange>,
    snapshot: watch::Sender<SessionSnapshot>,
    recheck_interval: Duration,
}

impl SubscriptionSession {
    /// Load the record (starting a trial if needed), evaluate it and return the
    /// session together with the receiver its snapshots are published on.
    #[instrument(skip(subscriptions, changes))]
    pub async fn start(
        user_id: Uuid,
        subscriptions: SubscriptionUseCases,
        changes: broadcast::Receiver<SubscriptionChange>,
        recheck_interval: Duration,
        now: DateTime<Utc>,
    ) -> (Self, watch::Receiver<SessionSnapshot>) {
        let (snapshot, rx) = watch::channel(SessionSnapshot::from_record(None, now));

        let session = Self {
            user_id,
            subscriptions,
            changes,
            snapshot,
            recheck_interval,
        };
        // Loads the record and corrects one that lapsed while nobody was watching.
        session.tick(now).await;
        (session, rx)
    }

    pub fn current(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Drive the session until every receiver is gone or the hub shuts down.
    pub async fn run(mut self) {
        let period = self.recheck_interval;
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.snapshot.closed() => {
                    debug!(user_id = %self.user_id, "Session receiver dropped, stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.tick(Utc::now()).await;
                }
                change = self.changes.recv() => match change {
                    Ok(change) => self.apply_change(change, Utc::now()),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(user_id = %self.user_id, skipped, "Change feed lagged, reloading");
                        self.reload(Utc::now()).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(user_id = %self.user_id, "Change hub closed, stopping session");
                        break;
                    }
                },
            }
        }
    }

    /// One reconciliation pass over the held record. Without one (the initial
    /// load failed) the load is retried first.
    pub async fn tick(&self, now: DateTime<Utc>) {
        let record = match self.current().subscription {
            Some(record) => record,
            None => match self.subscriptions.load_or_start_trial(self.user_id, now).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(user_id = %self.user_id, error = %e, "Failed to load subscription, retrying next tick");
                    return;
                }
            },
        };

        let next = match self.subscriptions.reconcile(&record, now).await {
            ReconcileOutcome::Expired(updated) => Some(updated),
            ReconcileOutcome::Superseded(latest) => latest,
            ReconcileOutcome::Unchanged | ReconcileOutcome::Failed => Some(record),
        };
        self.publish(next, now);
    }

    /// Mirror a row change if it belongs to this session's user.
    pub fn apply_change(&self, change: SubscriptionChange, now: DateTime<Utc>) {
        if change.record.user_id != self.user_id {
            return;
        }
        debug!(user_id = %self.user_id, op = %change.op, "Mirroring subscription change");
        self.publish(Some(change.record), now);
    }

    async fn reload(&self, now: DateTime<Utc>) {
        match self.subscriptions.get(self.user_id).await {
            Ok(record) => self.publish(record, now),
            Err(e) => warn!(user_id = %self.user_id, error = %e, "Reload after lag failed"),
        }
    }

    fn publish(&self, record: Option<Subscription>, now: DateTime<Utc>) {
        let next = SessionSnapshot::from_record(record, now);
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
