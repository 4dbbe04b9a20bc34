use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::value::RawValue;
use tokio::sync::Mutex;
use tracing::{debug, error};
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::webhook_verifier::{WebhookHeaders, WebhookVerifier},
};

/// Refresh the OAuth token this long before PayPal says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Serialize)]
struct VerifySignatureRequest<'a> {
    auth_algo: &'a str,
    cert_url: &'a str,
    transmission_id: &'a str,
    transmission_sig: &'a str,
    transmission_time: &'a str,
    webhook_id: &'a str,
    webhook_event: &'a RawValue,
}

#[derive(Deserialize)]
struct VerifySignatureResponse {
    verification_status: String,
}

/// REST client for the few PayPal endpoints this service calls.
pub struct PaypalClient {
    client: Client,
    api_base: Url,
    client_id: String,
    client_secret: SecretString,
    webhook_id: String,
    token: Mutex<Option<CachedToken>>,
}

impl PaypalClient {
    pub fn new(
        client: Client,
        api_base: Url,
        client_id: String,
        client_secret: SecretString,
        webhook_id: String,
    ) -> Self {
        Self {
            client,
            api_base,
            client_id,
            client_secret,
            webhook_id,
            token: Mutex::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.api_base
            .join(path)
            .map_err(|e| AppError::Internal(format!("Invalid PayPal URL: {}", e)))
    }

    async fn access_token(&self) -> AppResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .post(self.endpoint("/v1/oauth2/token")?)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("PayPal token request failed: {}", e)))?;
        let token: TokenResponse = handle_response(response).await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        debug!(expires_in = token.expires_in, "Fetched PayPal access token");
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl WebhookVerifier for PaypalClient {
    async fn verify(&self, headers: &WebhookHeaders, event: &RawValue) -> AppResult<bool> {
        if self.webhook_id.is_empty() {
            return Err(AppError::Internal("PAYPAL_WEBHOOK_ID is not configured".into()));
        }
        let token = self.access_token().await?;
        let body = VerifySignatureRequest {
            auth_algo: &headers.auth_algo,
            cert_url: &headers.cert_url,
            transmission_id: &headers.transmission_id,
            transmission_sig: &headers.transmission_sig,
            transmission_time: &headers.transmission_time,
            webhook_id: &self.webhook_id,
            webhook_event: event,
        };

        let response = self
            .client
            .post(self.endpoint("/v1/notifications/verify-webhook-signature")?)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("PayPal verification request failed: {}", e)))?;
        let result: VerifySignatureResponse = handle_response(response).await?;

        Ok(result.verification_status.eq_ignore_ascii_case("SUCCESS"))
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::Provider(format!("Failed to read PayPal response: {}", e)))?;

    if !status.is_success() {
        error!(%status, body = %body, "PayPal API error");
        return Err(AppError::Provider(format!("PayPal API error: {}", status)));
    }

    serde_json::from_str(&body).map_err(|e| {
        error!(body = %body, error = %e, "Failed to parse PayPal response");
        AppError::Provider(format!("Failed to parse PayPal response: {}", e))
    })
}
