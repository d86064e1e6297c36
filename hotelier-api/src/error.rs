use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hotelier_core::CoreError;
use hotelier_shared::models::events::ErrorPayload;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    Core(CoreError),
    InternalServerError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Core(err) => core_status(err),
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::InvalidRange | CoreError::EmptyItems | CoreError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        CoreError::InvalidSignature => StatusCode::UNAUTHORIZED,
        CoreError::Forbidden => StatusCode::FORBIDDEN,
        CoreError::BookingNotFound(_) | CoreError::PaymentNotFound(_) | CoreError::RoomTypeNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        CoreError::InsufficientCapacity { .. }
        | CoreError::NotPaidYet(_)
        | CoreError::AlreadyHandled(_)
        | CoreError::InvalidPaymentStatus { .. }
        | CoreError::InvalidBookingStatus { .. }
        | CoreError::StorageConflict(_) => StatusCode::CONFLICT,
        CoreError::GatewayUnavailable(_) | CoreError::NotifierUnavailable(_) => StatusCode::BAD_GATEWAY,
        CoreError::NotifierTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Body shared by every error response. Infrastructure detail stays in the logs.
pub fn error_payload(err: &CoreError) -> ErrorPayload {
    let error = match err {
        CoreError::Storage(_) => "Internal Server Error".to_string(),
        CoreError::StorageConflict(_) => "conflicting concurrent update".to_string(),
        CoreError::GatewayUnavailable(_) => "payment gateway unavailable".to_string(),
        CoreError::NotifierUnavailable(_) => "dependent service unavailable".to_string(),
        CoreError::NotifierTimeout(_) => "dependent service timed out".to_string(),
        other => other.to_string(),
    };
    ErrorPayload {
        code: err.code().to_string(),
        error,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let payload = match self {
            AppError::AuthenticationError(msg) => ErrorPayload {
                code: "UNAUTHENTICATED".to_string(),
                error: msg,
            },
            AppError::AuthorizationError(msg) => ErrorPayload {
                code: "FORBIDDEN".to_string(),
                error: msg,
            },
            AppError::ValidationError(msg) => ErrorPayload {
                code: "INVALID_REQUEST".to_string(),
                error: msg,
            },
            AppError::Core(err) => {
                match &err {
                    CoreError::Storage(_) | CoreError::GatewayUnavailable(_) => {
                        tracing::error!("Request failed: {}", err);
                    }
                    CoreError::NotifierTimeout(_) | CoreError::NotifierUnavailable(_) | CoreError::StorageConflict(_) => {
                        tracing::warn!("Request failed: {}", err);
                    }
                    _ => {}
                }
                error_payload(&err)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                ErrorPayload {
                    code: "INTERNAL_ERROR".to_string(),
                    error: "Internal Server Error".to_string(),
                }
            }
        };

        (status, Json(payload)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        AppError::Core(err.fold_conflict())
    }
}
