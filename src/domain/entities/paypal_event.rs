use strum::{AsRefStr, Display, EnumString};

use super::subscription::SubscriptionStatus;

/// PayPal webhook event types this service reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
pub enum PaypalEventType {
    #[strum(serialize = "BILLING.SUBSCRIPTION.ACTIVATED")]
    SubscriptionActivated,
    #[strum(serialize = "BILLING.SUBSCRIPTION.RE-ACTIVATED")]
    SubscriptionReactivated,
    #[strum(serialize = "PAYMENT.SALE.COMPLETED")]
    PaymentSaleCompleted,
    #[strum(serialize = "BILLING.SUBSCRIPTION.UPDATED")]
    SubscriptionUpdated,
    #[strum(serialize = "BILLING.SUBSCRIPTION.CANCELLED")]
    SubscriptionCancelled,
    #[strum(serialize = "BILLING.SUBSCRIPTION.SUSPENDED")]
    SubscriptionSuspended,
    #[strum(serialize = "BILLING.SUBSCRIPTION.EXPIRED")]
    SubscriptionExpired,
}

/// What an event asks us to do with the user's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Start a fresh paid period. `renewal` extends even an unexpired period.
    Activate { renewal: bool },
    Cancel,
    Expire,
}

impl Transition {
    pub fn target_status(&self) -> SubscriptionStatus {
        match self {
            Transition::Activate { .. } => SubscriptionStatus::Active,
            Transition::Cancel => SubscriptionStatus::Canceled,
            Transition::Expire => SubscriptionStatus::Expired,
        }
    }
}

impl PaypalEventType {
    /// Map to a transition. `resource_status` is the event's own `resource.status`,
    /// consulted for generic update events.
    pub fn transition(&self, resource_status: Option<&str>) -> Option<Transition> {
        match self {
            PaypalEventType::SubscriptionActivated | PaypalEventType::SubscriptionReactivated => {
                Some(Transition::Activate { renewal: false })
            }
            PaypalEventType::PaymentSaleCompleted => Some(Transition::Activate { renewal: true }),
            PaypalEventType::SubscriptionCancelled => Some(Transition::Cancel),
            PaypalEventType::SubscriptionSuspended | PaypalEventType::SubscriptionExpired => {
                Some(Transition::Expire)
            }
            PaypalEventType::SubscriptionUpdated => {
                match resource_status.and_then(SubscriptionStatus::from_paypal)? {
                    SubscriptionStatus::Active => Some(Transition::Activate { renewal: false }),
                    SubscriptionStatus::Canceled => Some(Transition::Cancel),
                    SubscriptionStatus::Expired => Some(Transition::Expire),
                    SubscriptionStatus::Trial => None,
                }
            }
        }
    }
}
