use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::OrderError;

/// HTTP-facing error. Every domain error kind maps to a distinct status so
/// callers can tell validation failures, missing entities, frozen orders and
/// conflicts apart.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    UnprocessableEntity(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        let message = e.to_string();
        match e {
            OrderError::InvalidOrderProducts
            | OrderError::InvalidStatusTransition { .. }
            | OrderError::ReportFailed(_) => AppError::BadRequest(message),
            OrderError::ProductsNotFound(_) | OrderError::OrderNotFound => {
                AppError::NotFound(message)
            }
            OrderError::OrderNotModifiable => AppError::Forbidden(message),
            OrderError::CreateConflict => AppError::Conflict(message),
            // Distinct from the 400 report wrapper on purpose: a bad range is
            // the caller's input, not a query failure.
            OrderError::InvalidDateRange => AppError::UnprocessableEntity(message),
            OrderError::Cancelled => AppError::Cancelled,
            OrderError::Store { .. } => AppError::Internal(message),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            // Store details stay in the logs, not in responses.
            AppError::Internal(_) => serde_json::json!({ "error": "Internal server error" }),
            other => serde_json::json!({ "error": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
