use crate::models::ErrorKind;
use crate::services::transcription_service::TranscriptionError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Transcription error: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Filesystem paths and collaborator stderr stay in the logs.
        let (status, message) = match self {
            AppError::Transcription(e) => match e.kind() {
                ErrorKind::InvalidUpload => {
                    tracing::warn!("Rejected upload: {}", e);
                    (
                        StatusCode::BAD_REQUEST,
                        "Invalid upload: expected a non-empty audio file".to_string(),
                    )
                }
                kind => {
                    tracing::error!(kind = %kind, "Transcription error: {:?}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Transcription failed".to_string(),
                    )
                }
            },
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
