use thiserror::Error;

use crate::domain::entities::usage_metric::LimitType;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Too many requests. Please slow down.")]
    RateLimited,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict on {field}: {message}")]
    Conflict {
        field: &'static str,
        message: String,
    },

    #[error("Not found")]
    NotFound,

    #[error("Subscription limit exceeded: {}", .0.message)]
    SubscriptionLimitExceeded(LimitExceeded),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Details reported when a store hits a limit of its subscription plan.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitExceeded {
    pub limit_type: LimitType,
    pub message: String,
    pub current_value: i64,
    pub max_allowed: i64,
}

impl LimitExceeded {
    pub fn new(limit_type: LimitType, message: impl Into<String>) -> Self {
        Self {
            limit_type,
            message: message.into(),
            current_value: 0,
            max_allowed: 0,
        }
    }

    pub fn with_usage(mut self, current_value: i64, max_allowed: i64) -> Self {
        self.current_value = current_value;
        self.max_allowed = max_allowed;
        self
    }

    /// Rounded usage percentage, only meaningful when a maximum is known.
    pub fn usage_percentage(&self) -> Option<i64> {
        if self.current_value <= 0 || self.max_allowed <= 0 {
            return None;
        }
        Some(((self.current_value as f64 / self.max_allowed as f64) * 100.0).round() as i64)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidCredentials,
    InvalidToken,
    Forbidden,
    RateLimited,
    InvalidInput,
    Conflict,
    NotFound,
    SubscriptionLimitExceeded,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::SubscriptionLimitExceeded => "SUBSCRIPTION_LIMIT_EXCEEDED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
