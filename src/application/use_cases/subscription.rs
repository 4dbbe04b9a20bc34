use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::{
        entities::subscription::{PlanType, Subscription, SubscriptionStatus},
        status::{AccessStatus, evaluate, needs_expiry},
    },
};

// ============================================================================
// Write Inputs
// ============================================================================

/// Audit row recorded alongside every applied provider callback.
#[derive(Debug, Clone)]
pub struct ProviderEventLog {
    pub provider_event_id: String,
    pub event_type: String,
    pub previous_status: Option<SubscriptionStatus>,
    pub metadata: serde_json::Value,
}

/// Full target state for a user's record, produced from a provider callback.
/// Applied as an upsert keyed on `user_id`.
#[derive(Debug, Clone)]
pub struct ProviderWrite {
    pub user_id: Uuid,
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub provider_subscription_id: Option<String>,
    pub event: ProviderEventLog,
}

#[derive(Debug, Clone)]
pub enum ProviderWriteOutcome {
    Applied(Subscription),
    /// The event id was already recorded; nothing was written.
    Duplicate,
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>>;

    /// Insert a trial record unless the user already has one.
    /// Returns whichever record is stored afterwards.
    async fn create_trial_if_absent(
        &self,
        user_id: Uuid,
        trial_start: DateTime<Utc>,
        trial_end: DateTime<Utc>,
    ) -> AppResult<Subscription>;

    /// Set `status = expired` only if the row is still `active`, its period has
    /// ended by `now`, and `updated_at` equals what the caller last observed.
    /// Returns `None` when the guard did not match.
    async fn expire_if_unchanged(
        &self,
        user_id: Uuid,
        observed_updated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Subscription>>;

    /// Active rows whose period ended at or before `now`.
    async fn list_elapsed_active(&self, now: DateTime<Utc>, limit: i64)
    -> AppResult<Vec<Subscription>>;

    async fn is_event_recorded(&self, provider_event_id: &str) -> AppResult<bool>;

    /// Upsert the record and log the event in one transaction.
    async fn apply_provider_write(&self, write: &ProviderWrite) -> AppResult<ProviderWriteOutcome>;
}

// ============================================================================
// Use Cases
// ============================================================================

/// Result of one reconciliation pass over a held record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Stored status still matches what the record grants.
    Unchanged,
    /// The elapsed active record was written as expired.
    Expired(Subscription),
    /// Someone else wrote the row after we read it; carries the latest row.
    Superseded(Option<Subscription>),
    /// The corrective write failed; it will be retried on the next pass.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub subscription: Option<Subscription>,
    pub access: AccessStatus,
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    repo: Arc<dyn SubscriptionRepo>,
    trial_days: i64,
}

impl SubscriptionUseCases {
    pub fn new(repo: Arc<dyn SubscriptionRepo>, trial_days: i64) -> Self {
        Self { repo, trial_days }
    }

    pub async fn get(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        self.repo.get_by_user(user_id).await
    }

    /// Load the user's record, starting their trial on first evaluation.
    #[instrument(skip(self))]
    pub async fn load_or_start_trial(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        if let Some(existing) = self.repo.get_by_user(user_id).await? {
            return Ok(existing);
        }
        let trial_end = now + Duration::days(self.trial_days);
        let record = self
            .repo
            .create_trial_if_absent(user_id, now, trial_end)
            .await?;
        info!(%user_id, trial_end = %record.trial_end_date.unwrap_or(trial_end), "Trial started");
        Ok(record)
    }

    pub async fn view(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<SubscriptionView> {
        let record = self.load_or_start_trial(user_id, now).await?;
        let access = evaluate(Some(&record), now);
        Ok(SubscriptionView {
            subscription: Some(record),
            access,
        })
    }

    /// Issue the corrective expiry write for a held record if it is due.
    /// Errors are logged and reported as `Failed`; callers do not retry.
    #[instrument(skip(self, record), fields(user_id = %record.user_id))]
    pub async fn reconcile(&self, record: &Subscription, now: DateTime<Utc>) -> ReconcileOutcome {
        if !needs_expiry(record, now) {
            return ReconcileOutcome::Unchanged;
        }

        match self
            .repo
            .expire_if_unchanged(record.user_id, record.updated_at, now)
            .await
        {
            Ok(Some(updated)) => {
                info!(
                    period_end = ?record.current_period_end,
                    "Elapsed active subscription marked expired"
                );
                ReconcileOutcome::Expired(updated)
            }
            Ok(None) => {
                warn!("Expiry skipped: subscription changed since it was read");
                match self.repo.get_by_user(record.user_id).await {
                    Ok(latest) => ReconcileOutcome::Superseded(latest),
                    Err(e) => {
                        error!(error = %e, "Failed to reload superseded subscription");
                        ReconcileOutcome::Failed
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to mark subscription expired");
                ReconcileOutcome::Failed
            }
        }
    }

    /// Manual refresh: reload, reconcile, and report. Database errors surface.
    #[instrument(skip(self))]
    pub async fn refresh(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<SubscriptionView> {
        let record = self.load_or_start_trial(user_id, now).await?;
        let record = if needs_expiry(&record, now) {
            match self
                .repo
                .expire_if_unchanged(user_id, record.updated_at, now)
                .await?
            {
                Some(updated) => updated,
                None => self.repo.get_by_user(user_id).await?.unwrap_or(record),
            }
        } else {
            record
        };
        let access = evaluate(Some(&record), now);
        Ok(SubscriptionView {
            subscription: Some(record),
            access,
        })
    }

    /// Server-side sweep over every elapsed active record. Returns how many were expired.
    #[instrument(skip(self))]
    pub async fn expire_elapsed(&self, now: DateTime<Utc>, batch_size: i64) -> AppResult<usize> {
        let elapsed = self.repo.list_elapsed_active(now, batch_size).await?;
        let mut expired = 0;
        for record in &elapsed {
            if let ReconcileOutcome::Expired(_) = self.reconcile(record, now).await {
                expired += 1;
            }
        }
        Ok(expired)
    }
}
