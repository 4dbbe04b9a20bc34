//! `TestAppStateBuilder` creates an `AppState` backed by in-memory mocks so
//! routes can be exercised through `axum_test::TestServer`.

use std::{net::SocketAddr, sync::Arc};

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::Duration;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::ports::webhook_verifier::WebhookVerifier,
    domain::entities::execution_mode::ExecutionMode,
    infra::{RateLimiterTrait, config::AppConfig, realtime::ChangeHub},
    test_utils::{
        InMemoryRateLimiter, InMemorySubscriptionRepo, InMemoryUserRepo, RecordingEmailSender,
        StubWebhookVerifier,
    },
    use_cases::{
        checkout::{CheckoutConfig, CheckoutUseCases},
        paypal_webhook::PaypalWebhookUseCases,
        subscription::{SubscriptionRepo, SubscriptionUseCases},
        user::{AuthUseCases, EmailSender, UserRepo},
    },
};

fn test_url(raw: &str) -> Url {
    Url::parse(raw).expect("test URL should parse")
}

/// Complete config with placeholder values; live mode validates.
pub fn test_app_config(execution_mode: ExecutionMode) -> AppConfig {
    AppConfig {
        jwt_secret: SecretString::new("test-jwt-secret-with-plenty-of-entropy".into()),
        access_token_ttl: Duration::minutes(15),
        refresh_token_ttl: Duration::days(30),
        app_origin: test_url("http://taskpro.test"),
        cors_origin: HeaderValue::from_static("http://taskpro.test"),
        magic_link_ttl_minutes: 15,
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: "postgres://unused".to_string(),
        redis_url: "redis://unused".to_string(),
        rate_limit_window_secs: 60,
        rate_limit_per_ip: 1_000,
        rate_limit_per_email: 1_000,
        trust_proxy: false,
        resend_api_key: SecretString::new("re_test".into()),
        email_from: "TaskPro <noreply@taskpro.test>".to_string(),
        trial_days: 7,
        reconcile_interval_secs: 3_600,
        execution_mode,
        sandbox_fallback_user_id: None,
        paypal_api_base: test_url("https://api-m.sandbox.paypal.com"),
        paypal_client_id: "client".to_string(),
        paypal_client_secret: SecretString::new("secret".into()),
        paypal_webhook_id: "WH-CONFIG".to_string(),
        checkout_base_url: test_url("https://paypal.test/subscribe"),
        paypal_plan_monthly: "P-MONTHLY".to_string(),
        paypal_plan_yearly: "P-YEARLY".to_string(),
        checkout_return_url: test_url("http://taskpro.test/billing/return"),
        checkout_cancel_url: test_url("http://taskpro.test/billing/return"),
    }
}

/// Builder for an `AppState` wired to in-memory mocks.
///
/// ```ignore
/// let repo = Arc::new(InMemorySubscriptionRepo::new());
/// let state = TestAppStateBuilder::new()
///     .with_subscription_repo(repo.clone())
///     .with_execution_mode(ExecutionMode::DryRun)
///     .build();
/// ```
pub struct TestAppStateBuilder {
    config: AppConfig,
    user_repo: Arc<dyn UserRepo>,
    email_sender: Arc<dyn EmailSender>,
    subscription_repo: Arc<dyn SubscriptionRepo>,
    webhook_verifier: Arc<dyn WebhookVerifier>,
    rate_limiter: Arc<dyn RateLimiterTrait>,
    changes: ChangeHub,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            config: test_app_config(ExecutionMode::Live),
            user_repo: Arc::new(InMemoryUserRepo::new()),
            email_sender: Arc::new(RecordingEmailSender::new()),
            subscription_repo: Arc::new(InMemorySubscriptionRepo::new()),
            webhook_verifier: Arc::new(StubWebhookVerifier::accepting()),
            rate_limiter: Arc::new(InMemoryRateLimiter::permissive()),
            changes: ChangeHub::new(16),
        }
    }

    pub fn with_user_repo(mut self, repo: InMemoryUserRepo) -> Self {
        self.user_repo = Arc::new(repo);
        self
    }

    pub fn with_email_sender(mut self, sender: Arc<RecordingEmailSender>) -> Self {
        self.email_sender = sender;
        self
    }

    pub fn with_subscription_repo(mut self, repo: Arc<InMemorySubscriptionRepo>) -> Self {
        self.subscription_repo = repo;
        self
    }

    pub fn with_webhook_verifier(mut self, verifier: Arc<StubWebhookVerifier>) -> Self {
        self.webhook_verifier = verifier;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<InMemoryRateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.config.execution_mode = mode;
        self
    }

    pub fn jwt_secret(&self) -> &SecretString {
        &self.config.jwt_secret
    }

    pub fn build(self) -> AppState {
        let config = self.config;

        let auth_use_cases = AuthUseCases::new(
            self.user_repo,
            self.email_sender,
            config.app_origin.to_string(),
        );
        let subscription_use_cases =
            SubscriptionUseCases::new(self.subscription_repo.clone(), config.trial_days);
        let paypal_webhook_use_cases = PaypalWebhookUseCases::new(
            self.subscription_repo,
            self.webhook_verifier,
            config.execution_mode,
            config.sandbox_fallback_user_id,
        );
        let checkout_use_cases = CheckoutUseCases::new(CheckoutConfig {
            base_url: config.checkout_base_url.clone(),
            monthly_plan_id: config.paypal_plan_monthly.clone(),
            yearly_plan_id: config.paypal_plan_yearly.clone(),
            return_url: config.checkout_return_url.clone(),
            cancel_url: config.checkout_cancel_url.clone(),
        });

        AppState {
            config: Arc::new(config),
            auth_use_cases: Arc::new(auth_use_cases),
            subscription_use_cases: Arc::new(subscription_use_cases),
            paypal_webhook_use_cases: Arc::new(paypal_webhook_use_cases),
            checkout_use_cases: Arc::new(checkout_use_cases),
            changes: self.changes,
            rate_limiter: self.rate_limiter,
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
