use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Too many requests. Please slow down.")]
    RateLimited,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Webhook signature could not be verified")]
    InvalidSignature,

    #[error("Not found")]
    NotFound,

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a payment provider should redeliver a callback that failed with this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(_) | AppError::Internal(_) | AppError::Provider(_) => true,
            AppError::RateLimited => true,
            AppError::InvalidCredentials
            | AppError::InvalidInput(_)
            | AppError::InvalidSignature
            | AppError::NotFound => false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidCredentials,
    RateLimited,
    InvalidInput,
    InvalidSignature,
    NotFound,
    ProviderError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ProviderError => "PROVIDER_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
