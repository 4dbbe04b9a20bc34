use async_trait::async_trait;
use serde::Serialize;
use serde_json::value::RawValue;

use crate::app_error::{AppError, AppResult};

// ============================================================================
// Port Types
// ============================================================================

/// Transmission headers PayPal attaches to every webhook delivery.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookHeaders {
    pub transmission_id: String,
    pub transmission_time: String,
    pub transmission_sig: String,
    pub cert_url: String,
    pub auth_algo: String,
}

impl WebhookHeaders {
    pub const TRANSMISSION_ID: &'static str = "paypal-transmission-id";
    pub const TRANSMISSION_TIME: &'static str = "paypal-transmission-time";
    pub const TRANSMISSION_SIG: &'static str = "paypal-transmission-sig";
    pub const CERT_URL: &'static str = "paypal-cert-url";
    pub const AUTH_ALGO: &'static str = "paypal-auth-algo";

    /// Collect the headers through a lookup function. Any missing or empty
    /// header is a signature failure.
    pub fn from_lookup<'a>(get: impl Fn(&str) -> Option<&'a str>) -> AppResult<Self> {
        let required = |name: &str| {
            get(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(AppError::InvalidSignature)
        };
        Ok(Self {
            transmission_id: required(Self::TRANSMISSION_ID)?,
            transmission_time: required(Self::TRANSMISSION_TIME)?,
            transmission_sig: required(Self::TRANSMISSION_SIG)?,
            cert_url: required(Self::CERT_URL)?,
            auth_algo: required(Self::AUTH_ALGO)?,
        })
    }
}

// ============================================================================
// Port Trait
// ============================================================================

/// Confirms that a webhook body was sent by the payment provider.
#[async_trait]
pub trait WebhookVerifier: Send + Sync {
    /// `Ok(true)` when the provider vouches for the delivery, `Ok(false)` when it
    /// does not. Transport failures are errors so the delivery gets retried.
    ///
    /// `event` is the body exactly as delivered; the signature covers those bytes.
    async fn verify(&self, headers: &WebhookHeaders, event: &RawValue) -> AppResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_headers() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (WebhookHeaders::TRANSMISSION_ID, "abc"),
            (WebhookHeaders::TRANSMISSION_TIME, "2026-01-01T00:00:00Z"),
            (WebhookHeaders::TRANSMISSION_SIG, "sig"),
            (WebhookHeaders::CERT_URL, "https://api.paypal.com/cert"),
            (WebhookHeaders::AUTH_ALGO, "SHA256withRSA"),
        ])
    }

    #[test]
    fn collects_all_headers() {
        let map = full_headers();
        let headers = WebhookHeaders::from_lookup(|k| map.get(k).copied()).unwrap();
        assert_eq!(headers.transmission_id, "abc");
        assert_eq!(headers.auth_algo, "SHA256withRSA");
    }

    #[test]
    fn missing_or_blank_header_is_invalid_signature() {
        let mut map = full_headers();
        map.insert(WebhookHeaders::TRANSMISSION_SIG, "  ");
        assert!(matches!(
            WebhookHeaders::from_lookup(|k| map.get(k).copied()),
            Err(AppError::InvalidSignature)
        ));

        map.remove(WebhookHeaders::CERT_URL);
        assert!(WebhookHeaders::from_lookup(|k| map.get(k).copied()).is_err());
    }
}
