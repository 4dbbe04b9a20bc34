use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use super::{clear_session_cookies, current_user};
use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", delete(delete_account))
        .route("/me", get(get_me))
}

#[derive(Serialize)]
struct MeResponse {
    email: String,
}

async fn get_me(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let email = app_state.auth_use_cases.email_for(user_id).await?;
    Ok(Json(MeResponse { email }))
}

async fn delete_account(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    app_state.auth_use_cases.delete_account(user_id).await?;
    Ok((StatusCode::NO_CONTENT, clear_session_cookies(jar)))
}
