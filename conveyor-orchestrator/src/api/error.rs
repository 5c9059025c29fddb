//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::EngineError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    DatabaseError(sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Database(err) => ApiError::DatabaseError(err),
            err @ EngineError::NotFound(_) => ApiError::NotFound(err.to_string()),
            err @ EngineError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            err @ EngineError::External(_) => ApiError::BadGateway(err.to_string()),
            err @ (EngineError::Config(_)
            | EngineError::SettingKind { .. }
            | EngineError::InvalidState(_)
            | EngineError::Validation(_)
            | EngineError::Manifest(_)) => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::domain::publish::TransitionError;

    fn status(err: EngineError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_engine_error_status_mapping() {
        assert_eq!(status(EngineError::not_found("job 1")), StatusCode::NOT_FOUND);
        assert_eq!(status(EngineError::conflict(&[4, 5])), StatusCode::CONFLICT);
        assert_eq!(
            status(EngineError::InvalidState(TransitionError::AlreadyTerminated)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(EngineError::Config("no env".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(EngineError::External("ci down".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(EngineError::Database(sqlx::Error::RowNotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
