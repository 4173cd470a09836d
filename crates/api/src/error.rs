use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{ReservationError, StoreError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict { code: &'static str, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { code: &'static str, message: String },
}

impl ApiError {
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable { code, message } => {
                tracing::warn!(code = code, "Service unavailable: {}", message);
                (StatusCode::SERVICE_UNAVAILABLE, code, message)
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ReservationError> for ApiError {
    fn from(err: ReservationError) -> Self {
        let message = err.to_string();
        match err {
            ReservationError::Validation(msg) => ApiError::Validation(msg),
            ReservationError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            ReservationError::InsufficientStock { .. } => {
                ApiError::conflict("insufficient_stock", message)
            }
            ReservationError::EquipmentUnavailable(_) => {
                ApiError::conflict("equipment_unavailable", message)
            }
            ReservationError::EquipmentInUse(_) => ApiError::conflict("equipment_in_use", message),
            ReservationError::EventFull(_) => ApiError::conflict("event_full", message),
            ReservationError::AlreadyRegistered { .. } => {
                ApiError::conflict("already_registered", message)
            }
            ReservationError::AlreadyCancelled(_) => {
                ApiError::conflict("already_cancelled", message)
            }
            ReservationError::TicketCollision { .. } => {
                ApiError::unavailable("ticket_collision", message)
            }
            ReservationError::DataIntegrity(_) | ReservationError::Rendering(_) => {
                ApiError::Internal(message)
            }
            ReservationError::Persistence(StoreError::UniqueViolation(_)) => {
                ApiError::conflict("conflict", "Resource already exists")
            }
            ReservationError::Persistence(_) => ApiError::unavailable(
                "service_unavailable",
                "The service is temporarily unavailable, please retry",
            ),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ReservationError::from(errors).into()
    }
}
