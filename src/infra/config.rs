use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::{ExposeSecret, SecretString};
use time::Duration;
use url::Url;
use uuid::Uuid;

use super::InfraError;
use crate::{
    domain::entities::execution_mode::ExecutionMode,
    use_cases::session::DEFAULT_RECHECK_INTERVAL,
};

pub struct AppConfig {
    pub jwt_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub app_origin: Url,
    pub cors_origin: HeaderValue,
    pub magic_link_ttl_minutes: i64,
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub redis_url: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_per_ip: u64,
    pub rate_limit_per_email: u64,
    /// Trust X-Forwarded-For / X-Real-IP. Only enable behind a reverse proxy.
    pub trust_proxy: bool,
    pub resend_api_key: SecretString,
    pub email_from: String,
    pub trial_days: i64,
    /// How often sessions and the server-side sweep re-check records.
    pub reconcile_interval_secs: u64,
    pub execution_mode: ExecutionMode,
    /// Only honored in sandbox mode.
    pub sandbox_fallback_user_id: Option<Uuid>,
    pub paypal_api_base: Url,
    pub paypal_client_id: String,
    pub paypal_client_secret: SecretString,
    pub paypal_webhook_id: String,
    pub checkout_base_url: Url,
    pub paypal_plan_monthly: String,
    pub paypal_plan_yearly: String,
    pub checkout_return_url: Url,
    pub checkout_cancel_url: Url,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret = SecretString::new(get_env::<String>("JWT_SECRET").into());
        let refresh_token_ttl_days: i64 = get_env_default("REFRESH_TOKEN_TTL_DAYS", 30);
        let access_token_ttl_secs: i64 = get_env_default("ACCESS_TOKEN_TTL_SECS", 86_400);

        let app_origin: Url = get_env("APP_ORIGIN");
        let magic_link_ttl_minutes: i64 = get_env_default("MAGIC_LINK_TTL_MINUTES", 15);
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");

        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3001)));
        let database_url: String = get_env("DATABASE_URL");
        let redis_url: String = get_env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string());
        let rate_limit_window_secs: u64 = get_env_default("RATE_LIMIT_WINDOW_SECS", 60);
        let rate_limit_per_ip: u64 = get_env_default("RATE_LIMIT_PER_IP", 20);
        let rate_limit_per_email: u64 = get_env_default("RATE_LIMIT_PER_EMAIL", 5);
        let trust_proxy: bool = get_env_default("TRUST_PROXY", false);

        let resend_api_key = SecretString::new(get_env::<String>("RESEND_API_KEY").into());
        let email_from: String = get_env("EMAIL_FROM");

        let trial_days: i64 = get_env_default("TRIAL_DAYS", 7);
        let reconcile_interval_secs: u64 = get_env_default(
            "RECONCILE_INTERVAL_SECS",
            DEFAULT_RECHECK_INTERVAL.as_secs(),
        );

        let execution_mode: ExecutionMode =
            get_env_default("PAYMENT_EXECUTION_MODE", String::from("live"))
                .parse()
                .expect("PAYMENT_EXECUTION_MODE must be one of live, sandbox, dry_run");
        let sandbox_fallback_user_id =
            parse_fallback_user(std::env::var("SANDBOX_FALLBACK_USER_ID").ok().as_deref())
                .expect("SANDBOX_FALLBACK_USER_ID must be a UUID");

        let paypal_api_base: Url = get_env_default(
            "PAYPAL_API_BASE",
            Url::parse("https://api-m.sandbox.paypal.com").expect("static URL"),
        );
        let paypal_client_id: String = get_env_default("PAYPAL_CLIENT_ID", String::new());
        let paypal_client_secret =
            SecretString::new(get_env_default("PAYPAL_CLIENT_SECRET", String::new()).into());
        let paypal_webhook_id: String = get_env_default("PAYPAL_WEBHOOK_ID", String::new());

        let checkout_base_url: Url = get_env_default(
            "CHECKOUT_BASE_URL",
            Url::parse("https://www.sandbox.paypal.com/webapps/billing/subscriptions")
                .expect("static URL"),
        );
        let paypal_plan_monthly: String = get_env_default("PAYPAL_PLAN_MONTHLY", String::new());
        let paypal_plan_yearly: String = get_env_default("PAYPAL_PLAN_YEARLY", String::new());
        let checkout_return_url: Url = get_env_default(
            "CHECKOUT_RETURN_URL",
            app_origin.join("/billing/return").expect("APP_ORIGIN is a base URL"),
        );
        let checkout_cancel_url: Url =
            get_env_default("CHECKOUT_CANCEL_URL", checkout_return_url.clone());

        Self {
            jwt_secret,
            access_token_ttl: Duration::seconds(access_token_ttl_secs),
            refresh_token_ttl: Duration::days(refresh_token_ttl_days),
            app_origin,
            cors_origin,
            magic_link_ttl_minutes,
            bind_addr,
            database_url,
            redis_url,
            rate_limit_window_secs,
            rate_limit_per_ip,
            rate_limit_per_email,
            trust_proxy,
            resend_api_key,
            email_from,
            trial_days,
            reconcile_interval_secs,
            execution_mode,
            sandbox_fallback_user_id,
            paypal_api_base,
            paypal_client_id,
            paypal_client_secret,
            paypal_webhook_id,
            checkout_base_url,
            paypal_plan_monthly,
            paypal_plan_yearly,
            checkout_return_url,
            checkout_cancel_url,
        }
    }

    /// Payment settings the execution mode depends on. Live mode cannot verify
    /// a single delivery without the webhook id and API credentials.
    pub fn validate(&self) -> Result<(), InfraError> {
        if !self.execution_mode.verifies_signatures() {
            return Ok(());
        }
        let missing: Vec<&str> = [
            ("PAYPAL_WEBHOOK_ID", self.paypal_webhook_id.as_str()),
            ("PAYPAL_CLIENT_ID", self.paypal_client_id.as_str()),
            ("PAYPAL_CLIENT_SECRET", self.paypal_client_secret.expose_secret()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(InfraError::Config(format!(
                "{} must be set when PAYMENT_EXECUTION_MODE is {}",
                missing.join(", "),
                self.execution_mode
            )))
        }
    }

    pub fn reconcile_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reconcile_interval_secs.max(1))
    }
}

/// Unset or blank means no fallback user; anything else must be a UUID.
fn parse_fallback_user(raw: Option<&str>) -> Result<Option<Uuid>, uuid::Error> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}
