use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::adapters::http::app_state::AppState;

/// Best-known address of the caller, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

pub async fn client_ip_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let connect_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    // Forwarded headers are only trusted behind a reverse proxy.
    let ip = if app_state.config.trust_proxy {
        forwarded_ip(&request).or(connect_ip)
    } else {
        connect_ip
    }
    .unwrap_or_else(|| "unknown".to_string());

    request.extensions_mut().insert(ClientIp(ip));
    next.run(request).await
}

fn forwarded_ip(req: &Request) -> Option<String> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let trimmed = first.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    if let Some(real) = req.headers().get("x-real-ip")
        && let Ok(val) = real.to_str()
        && !val.trim().is_empty()
    {
        return Some(val.trim().to_string());
    }
    None
}
