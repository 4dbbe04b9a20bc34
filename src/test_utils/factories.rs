//! Test data factories.
//!
//! Each factory returns a complete, valid object. Use the closure to override fields.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::entities::subscription::{PlanType, Subscription, SubscriptionStatus};

/// A fixed point well in the past, so any version issued by the in-memory
/// repos compares newer.
pub fn test_datetime() -> DateTime<Utc> {
    Utc::now() - Duration::days(30)
}

/// Create a trial subscription with sensible defaults.
pub fn create_test_subscription(
    user_id: Uuid,
    overrides: impl FnOnce(&mut Subscription),
) -> Subscription {
    let created = test_datetime();
    let mut sub = Subscription {
        id: Uuid::new_v4(),
        user_id,
        status: SubscriptionStatus::Trial,
        plan_type: PlanType::Monthly,
        trial_start_date: Some(created),
        trial_end_date: Some(Utc::now() + Duration::days(7)),
        current_period_start: None,
        current_period_end: None,
        provider_subscription_id: None,
        created_at: created,
        updated_at: created,
    };
    overrides(&mut sub);
    sub
}
