use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use super::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, clear_session_cookies, session_cookie};
use crate::{
    adapters::http::{app_state::AppState, middleware::ClientIp},
    app_error::{AppError, AppResult},
    application::jwt,
};

#[derive(Deserialize)]
struct RequestPayload {
    email: String,
}

#[derive(Deserialize)]
struct ConsumePayload {
    token: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/request", post(request))
        .route("/consume", post(consume))
        .route("/logout", post(logout))
}

async fn request(
    State(app_state): State<AppState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(payload): Json<RequestPayload>,
) -> AppResult<StatusCode> {
    app_state
        .rate_limiter
        .check(&ip, Some(payload.email.as_str()))
        .await?;

    app_state
        .auth_use_cases
        .request_magic_link(&payload.email, app_state.config.magic_link_ttl_minutes)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

async fn consume(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<ConsumePayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = app_state
        .auth_use_cases
        .consume_magic_link(&payload.token)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let config = &app_state.config;
    let access = jwt::issue(user_id, &config.jwt_secret, config.access_token_ttl)?;
    let refresh = jwt::issue(user_id, &config.jwt_secret, config.refresh_token_ttl)?;

    tracing::info!(%user_id, "User signed in");
    let jar = jar
        .add(session_cookie(
            ACCESS_TOKEN_COOKIE,
            access,
            config.access_token_ttl,
        ))
        .add(session_cookie(
            REFRESH_TOKEN_COOKIE,
            refresh,
            config.refresh_token_ttl,
        ));
    Ok((StatusCode::OK, jar))
}

async fn logout(jar: CookieJar) -> impl IntoResponse {
    (StatusCode::NO_CONTENT, clear_session_cookies(jar))
}
