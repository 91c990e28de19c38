use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use folia_core::ErrorKind;
use serde::Serialize;

/// Failures outside the operation contract: bad credentials at login, a
/// lost blocking task, an unreadable library root.
#[derive(Debug)]
pub enum AppError {
    Auth(String),
    BadRequest(JsonRejection),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::BadRequest(rejection) => (rejection.status(), rejection.body_text()),
            AppError::Internal(msg) => {
                // Log the real error server-side, return generic message to client
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            ok: false,
            error: message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", e);
        AppError::Internal("Internal server error".to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection)
    }
}

impl From<folia_core::CoreError> for AppError {
    fn from(e: folia_core::CoreError) -> Self {
        AppError::Internal(e.to_string())
    }
}

/// HTTP status reported for an operation failure.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidName | ErrorKind::InvalidPath | ErrorKind::InvalidQuery => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Exists => StatusCode::CONFLICT,
        ErrorKind::WriteFailed | ErrorKind::ReadFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_errors_map_to_statuses() {
        assert_eq!(status_for(ErrorKind::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::InvalidName), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::InvalidQuery), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Exists), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::ReadFailed), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = AppError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
