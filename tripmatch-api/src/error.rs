use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tripmatch_match::{ErrorKind, TravelError};

#[derive(Debug)]
pub enum AppError {
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<TravelError> for AppError {
    fn from(err: TravelError) -> Self {
        match err.kind() {
            ErrorKind::Validation => AppError::ValidationError(err.to_string()),
            ErrorKind::Authorization => AppError::AuthorizationError(err.to_string()),
            ErrorKind::State => AppError::ConflictError(err.to_string()),
            ErrorKind::NotFound => AppError::NotFoundError(err.to_string()),
            ErrorKind::Internal => AppError::Anyhow(err.into()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripmatch_core::CoreError;

    fn status_of(err: TravelError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_travel_errors_map_to_status() {
        assert_eq!(status_of(TravelError::LanguagesType), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(TravelError::NotOwner), StatusCode::FORBIDDEN);
        assert_eq!(status_of(TravelError::DuplicateMatch), StatusCode::CONFLICT);
        assert_eq!(status_of(TravelError::TripNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(TravelError::Storage(CoreError::StorageError("pool timed out".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
