use crate::app_error::{AppError, ErrorCode, LimitExceeded};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

const UPGRADE_SOLUTION: &str = "Upgrade your subscription plan to increase this limit.";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        tracing::error!(error = ?self, "Request failed");

        match self {
            AppError::Database(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::RateLimited => {
                error_resp(StatusCode::TOO_MANY_REQUESTS, ErrorCode::RateLimited, None)
            }
            AppError::InvalidCredentials => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::InvalidCredentials, None)
            }
            AppError::InvalidToken => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::InvalidToken, None)
            }
            AppError::Forbidden => error_resp(StatusCode::FORBIDDEN, ErrorCode::Forbidden, None),
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::Conflict { field, message } => (
                StatusCode::CONFLICT,
                Json(serde_json::json!({
                    "code": ErrorCode::Conflict.as_str(),
                    "field": field,
                    "message": message,
                })),
            )
                .into_response(),
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::SubscriptionLimitExceeded(limit) => limit_resp(limit),
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}

fn limit_resp(limit: LimitExceeded) -> Response {
    let mut body = serde_json::json!({
        "code": ErrorCode::SubscriptionLimitExceeded.as_str(),
        "message": limit.message,
        "limit_type": limit.limit_type.as_str(),
        "current_value": limit.current_value,
        "max_allowed": limit.max_allowed,
        "solution": UPGRADE_SOLUTION,
    });
    if let Some(pct) = limit.usage_percentage() {
        body["usage_percentage"] = serde_json::Value::String(format!("{pct}%"));
    }
    (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
}
