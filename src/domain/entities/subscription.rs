use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::app_error::AppError;

/// Lifecycle status of a user's subscription record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Expired,
    Canceled,
}

impl SubscriptionStatus {
    /// Map a PayPal subscription `status` field (e.g. `ACTIVE`) to ours.
    /// Returns `None` for states that carry no access decision (`APPROVAL_PENDING`, ...).
    pub fn from_paypal(status: &str) -> Option<Self> {
        match status.to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(SubscriptionStatus::Active),
            "CANCELLED" | "CANCELED" => Some(SubscriptionStatus::Canceled),
            "SUSPENDED" | "EXPIRED" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }
}

/// Billing cadence chosen at checkout.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
    Default,
)]
#[sqlx(type_name = "plan_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PlanType {
    #[default]
    Monthly,
    Yearly,
}

impl PlanType {
    fn months(&self) -> u32 {
        match self {
            PlanType::Monthly => 1,
            PlanType::Yearly => 12,
        }
    }

    /// End of a paid period starting at `start`, in calendar months
    /// (Jan 31 + 1 month clamps to the last day of February).
    pub fn period_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start
            .checked_add_months(Months::new(self.months()))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Raw subscription row as read from Postgres or a change notification.
///
/// Never handed to business logic directly; convert with `Subscription::try_from`.
#[derive(Debug, Clone, Deserialize, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: SubscriptionStatus,
    pub plan_type: PlanType,
    pub trial_start_date: Option<DateTime<Utc>>,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub provider_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated subscription record. At most one exists per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: SubscriptionStatus,
    pub plan_type: PlanType,
    pub trial_start_date: Option<DateTime<Utc>>,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub provider_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = AppError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        if row.status == SubscriptionStatus::Trial && row.trial_end_date.is_none() {
            return Err(AppError::InvalidInput(format!(
                "subscription {} is in trial without a trial_end_date",
                row.id
            )));
        }
        if let (Some(start), Some(end)) = (row.trial_start_date, row.trial_end_date)
            && end < start
        {
            return Err(AppError::InvalidInput(format!(
                "subscription {} has trial_end_date before trial_start_date",
                row.id
            )));
        }
        if let (Some(start), Some(end)) = (row.current_period_start, row.current_period_end)
            && end < start
        {
            return Err(AppError::InvalidInput(format!(
                "subscription {} has current_period_end before current_period_start",
                row.id
            )));
        }

        Ok(Subscription {
            id: row.id,
            user_id: row.user_id,
            status: row.status,
            plan_type: row.plan_type,
            trial_start_date: row.trial_start_date,
            trial_end_date: row.trial_end_date,
            current_period_start: row.current_period_start,
            current_period_end: row.current_period_end,
            provider_subscription_id: row.provider_subscription_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Kind of row-level change carried on the realtime feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
}

/// A change to one user's subscription row, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub op: ChangeOp,
    pub record: Subscription,
}
