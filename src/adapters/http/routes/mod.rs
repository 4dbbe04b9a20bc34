pub mod auth;
pub mod billing;
pub mod subscription;
pub mod user;

use axum::Router;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::jwt,
};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/user", user::router())
        .nest("/subscription", subscription::router())
        .nest("/billing", billing::router())
}

/// User behind the request's access token cookie.
pub(crate) fn current_user(jar: &CookieJar, app_state: &AppState) -> AppResult<Uuid> {
    let access = jar
        .get(ACCESS_TOKEN_COOKIE)
        .ok_or(AppError::InvalidCredentials)?;
    jwt::verify_user(access.value(), &app_state.config.jwt_secret)
}

/// Session cookie with the shared attributes.
pub(crate) fn session_cookie(
    name: &'static str,
    value: String,
    max_age: time::Duration,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

pub(crate) fn clear_session_cookies(jar: CookieJar) -> CookieJar {
    [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE]
        .into_iter()
        .fold(jar, |jar, name| {
            jar.add(session_cookie(name, String::new(), time::Duration::ZERO))
        })
}
