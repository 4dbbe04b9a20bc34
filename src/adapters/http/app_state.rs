use std::sync::Arc;

use crate::{
    infra::{config::AppConfig, rate_limit::RateLimiterTrait, realtime::ChangeHub},
    use_cases::{
        checkout::CheckoutUseCases, paypal_webhook::PaypalWebhookUseCases,
        subscription::SubscriptionUseCases, user::AuthUseCases,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth_use_cases: Arc<AuthUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub paypal_webhook_use_cases: Arc<PaypalWebhookUseCases>,
    pub checkout_use_cases: Arc<CheckoutUseCases>,
    pub changes: ChangeHub,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
}
