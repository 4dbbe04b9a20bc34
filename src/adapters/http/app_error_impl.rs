use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::app_error::{AppError, ErrorCode};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::DatabaseError,
                None,
            ),
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, ErrorCode::InvalidCredentials, None)
            }
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, ErrorCode::RateLimited, None),
            AppError::InvalidInput(ref msg) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidInput,
                Some(msg.clone()),
            ),
            AppError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, ErrorCode::InvalidSignature, None)
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Provider(_) => (StatusCode::BAD_GATEWAY, ErrorCode::ProviderError, None),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                None,
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, %status, "Request failed");
        } else {
            tracing::warn!(error = %self, %status, "Request rejected");
        }

        error_resp(status, code, message)
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
