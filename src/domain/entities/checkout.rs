use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscription::PlanType;
use crate::app_error::{AppError, AppResult};

/// Opaque data embedded in the hosted checkout and echoed back by PayPal
/// as `custom_id` on subscription resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutCustomData {
    pub user_id: Uuid,
    pub plan_type: PlanType,
}

impl CheckoutCustomData {
    pub fn to_custom_id(&self) -> AppResult<String> {
        serde_json::to_string(self).map_err(|e| AppError::Internal(e.to_string()))
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw.trim())
            .map_err(|e| AppError::InvalidInput(format!("Invalid custom_id payload: {}", e)))
    }
}

/// How the user came back from the hosted checkout page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutReturn {
    Success,
    Canceled,
    Unknown,
}

impl CheckoutReturn {
    /// Interpret the redirect's query flags. Nothing is verified here; the
    /// authoritative status change only arrives through the webhook.
    pub fn from_flags(success: Option<&str>, canceled: Option<&str>) -> Self {
        let is_set = |v: Option<&str>| matches!(v, Some(s) if s.eq_ignore_ascii_case("true") || s == "1");
        if is_set(canceled) {
            CheckoutReturn::Canceled
        } else if is_set(success) {
            CheckoutReturn::Success
        } else {
            CheckoutReturn::Unknown
        }
    }
}
