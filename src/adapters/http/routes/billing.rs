use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::current_user;
use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::ports::webhook_verifier::WebhookHeaders,
    domain::entities::{
        checkout::CheckoutReturn,
        subscription::{PlanType, SubscriptionStatus},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/paypal/webhook", post(paypal_webhook))
        .route("/checkout", post(create_checkout))
        .route("/checkout/return", get(checkout_return))
}

// ============================================================================
// Webhook
// ============================================================================

#[derive(Serialize)]
struct WebhookResponse {
    received: bool,
    applied: bool,
    status: Option<SubscriptionStatus>,
}

/// POST /api/billing/paypal/webhook
///
/// Transient failures answer 5xx so PayPal redelivers; everything else is
/// either acknowledged or rejected with a 4xx.
async fn paypal_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let transmission =
        WebhookHeaders::from_lookup(|name| headers.get(name).and_then(|v| v.to_str().ok())).ok();

    let outcome = app_state
        .paypal_webhook_use_cases
        .handle(transmission, &body, Utc::now())
        .await
        .inspect_err(|e| {
            if e.is_retryable() {
                error!(
                    error = %e,
                    retryable = true,
                    "Webhook processing failed, returning 5xx for PayPal retry"
                );
            }
        })?;

    Ok(Json(WebhookResponse {
        received: true,
        applied: outcome.applied(),
        status: outcome.status(),
    }))
}

// ============================================================================
// Checkout
// ============================================================================

#[derive(Deserialize)]
struct CheckoutRequest {
    plan_type: String,
}

#[derive(Serialize)]
struct CheckoutResponse {
    checkout_url: String,
}

/// POST /api/billing/checkout
async fn create_checkout(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let plan_type: PlanType = payload
        .plan_type
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Unknown plan_type: {}", payload.plan_type)))?;

    let checkout_url = app_state
        .checkout_use_cases
        .build_checkout_url(user_id, plan_type)?;
    Ok(Json(CheckoutResponse { checkout_url }))
}

#[derive(Deserialize)]
struct CheckoutReturnQuery {
    success: Option<String>,
    canceled: Option<String>,
}

#[derive(Serialize)]
struct CheckoutReturnResponse {
    outcome: CheckoutReturn,
}

/// GET /api/billing/checkout/return
async fn checkout_return(Query(query): Query<CheckoutReturnQuery>) -> impl IntoResponse {
    Json(CheckoutReturnResponse {
        outcome: CheckoutReturn::from_flags(query.success.as_deref(), query.canceled.as_deref()),
    })
}
