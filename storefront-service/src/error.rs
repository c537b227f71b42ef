use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::PoolError;
use serde::Serialize;
use storefront_shared::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Storage or pool failure. The detail is logged, never sent to clients.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub error: String,
}

impl ApiError {
    pub fn not_found(entity: &str) -> Self {
        ApiError::NotFound(format!("{} not found", entity))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(error) => ErrorResponse {
                message: "Invalid request".to_string(),
                error,
            },
            ApiError::NotFound(error) => ErrorResponse {
                message: "Not found".to_string(),
                error,
            },
            ApiError::Conflict(error) => ErrorResponse {
                message: "Conflict".to_string(),
                error,
            },
            ApiError::Internal(detail) => {
                tracing::error!("Request failed: {}", detail);
                ErrorResponse {
                    message: "Internal server error".to_string(),
                    error: "internal server error".to_string(),
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ApiError::NotFound("record not found".to_string()),
            DieselError::DatabaseError(kind, info) => {
                let message = match info.details() {
                    Some(details) => format!("{}: {}", info.message(), details),
                    None => info.message().to_string(),
                };
                match kind {
                    DatabaseErrorKind::UniqueViolation => ApiError::Conflict(message),
                    DatabaseErrorKind::ForeignKeyViolation
                    | DatabaseErrorKind::CheckViolation
                    | DatabaseErrorKind::NotNullViolation => ApiError::BadRequest(message),
                    _ => ApiError::Internal(message),
                }
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<bb8::RunError<PoolError>> for ApiError {
    fn from(err: bb8::RunError<PoolError>) -> Self {
        ApiError::Internal(format!("connection pool: {}", err))
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<base64::DecodeError> for ApiError {
    fn from(err: base64::DecodeError) -> Self {
        ApiError::BadRequest(format!("invalid base64 image: {}", err))
    }
}
