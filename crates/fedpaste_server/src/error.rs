//! HTTP error mapping for API handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fedpaste_core::AppError;
use serde_json::json;

/// Handler error: an [`AppError`] rendered as a JSON body.
#[derive(Debug)]
pub struct HttpError(pub AppError);

impl From<AppError> for HttpError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl HttpError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::Validation(_) | AppError::Encryption(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::Locked(_) => StatusCode::LOCKED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::FederationUnreachable(_) | AppError::Remote(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.0.is_fault() {
            tracing::error!("Request failed: {}", self.0);
            "Internal server error".to_string()
        } else {
            self.0.message()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_keep_their_message_and_faults_are_masked() {
        let cases = [
            (AppError::NotFound("gone".to_string()), StatusCode::NOT_FOUND),
            (AppError::Locked("locked".to_string()), StatusCode::LOCKED),
            (
                AppError::FederationUnreachable("refused".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::StorageMessage("disk on fire".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(HttpError::from(err).status(), expected);
        }
    }
}
