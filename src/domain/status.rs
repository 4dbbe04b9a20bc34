//! Access evaluation for a subscription record.
//!
//! Everything here is pure: the caller supplies `now`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::subscription::{Subscription, SubscriptionStatus};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// What a record grants at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessStatus {
    pub is_active: bool,
    pub is_trial_active: bool,
    /// Whole days left in an active trial, rounded up. Zero otherwise;
    /// paid periods do not report a countdown.
    pub days_remaining: i64,
}

impl AccessStatus {
    pub const NONE: AccessStatus = AccessStatus {
        is_active: false,
        is_trial_active: false,
        days_remaining: 0,
    };
}

pub fn evaluate(record: Option<&Subscription>, now: DateTime<Utc>) -> AccessStatus {
    let Some(record) = record else {
        return AccessStatus::NONE;
    };

    match record.status {
        SubscriptionStatus::Trial => match record.trial_end_date {
            Some(end) if end > now => AccessStatus {
                is_active: true,
                is_trial_active: true,
                days_remaining: ceil_days(end - now),
            },
            _ => AccessStatus::NONE,
        },
        SubscriptionStatus::Active => match record.current_period_end {
            Some(end) if end <= now => AccessStatus::NONE,
            // No period end means the plan does not lapse on its own.
            _ => AccessStatus {
                is_active: true,
                is_trial_active: false,
                days_remaining: 0,
            },
        },
        SubscriptionStatus::Expired | SubscriptionStatus::Canceled => AccessStatus::NONE,
    }
}

/// True when a record is stored as `active` but no longer grants access,
/// i.e. its paid period has silently elapsed and a corrective write is due.
pub fn needs_expiry(record: &Subscription, now: DateTime<Utc>) -> bool {
    record.status == SubscriptionStatus::Active && !evaluate(Some(record), now).is_active
}

fn ceil_days(delta: chrono::TimeDelta) -> i64 {
    let millis = delta.num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
}
