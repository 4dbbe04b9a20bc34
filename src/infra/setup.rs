use crate::{
    adapters::{
        email::resend::ResendEmailSender, http::app_state::AppState, paypal::PaypalClient,
    },
    application::ports::webhook_verifier::WebhookVerifier,
    infra::{
        config::AppConfig,
        http_client::build_client,
        postgres_persistence,
        rate_limit::RedisRateLimiter,
        realtime::{ChangeHub, DEFAULT_HUB_CAPACITY},
    },
    use_cases::{
        checkout::{CheckoutConfig, CheckoutUseCases},
        paypal_webhook::PaypalWebhookUseCases,
        subscription::{SubscriptionRepo, SubscriptionUseCases},
        user::{AuthUseCases, UserRepo},
    },
};
use sqlx::PgPool;
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Application state plus the pool the background listeners need.
pub struct Bootstrap {
    pub app_state: AppState,
    pub pool: PgPool,
}

pub async fn init_app_state() -> anyhow::Result<Bootstrap> {
    let config = AppConfig::from_env();
    config.validate()?;

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let pool = postgres_arc.pool().clone();

    let rate_limiter = Arc::new(
        RedisRateLimiter::new(
            &config.redis_url,
            config.rate_limit_window_secs,
            config.rate_limit_per_ip,
            config.rate_limit_per_email,
        )
        .await?,
    );

    let http = build_client()?;

    let email = Arc::new(ResendEmailSender::new(
        http.clone(),
        config.resend_api_key.clone(),
        config.email_from.clone(),
    ));

    let paypal = Arc::new(PaypalClient::new(
        http,
        config.paypal_api_base.clone(),
        config.paypal_client_id.clone(),
        config.paypal_client_secret.clone(),
        config.paypal_webhook_id.clone(),
    ));

    let user_repo_arc = postgres_arc.clone() as Arc<dyn UserRepo>;
    let subscription_repo_arc = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;

    let auth_use_cases = AuthUseCases::new(user_repo_arc, email, config.app_origin.to_string());

    let subscription_use_cases =
        SubscriptionUseCases::new(subscription_repo_arc.clone(), config.trial_days);

    let paypal_webhook_use_cases = PaypalWebhookUseCases::new(
        subscription_repo_arc,
        paypal as Arc<dyn WebhookVerifier>,
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

    let app_state = AppState {
        config: Arc::new(config),
        auth_use_cases: Arc::new(auth_use_cases),
        subscription_use_cases: Arc::new(subscription_use_cases),
        paypal_webhook_use_cases: Arc::new(paypal_webhook_use_cases),
        checkout_use_cases: Arc::new(checkout_use_cases),
        changes: ChangeHub::new(DEFAULT_HUB_CAPACITY),
        rate_limiter,
    };

    Ok(Bootstrap { app_state, pool })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskpro=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer().with_target(false).with_level(true).pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
