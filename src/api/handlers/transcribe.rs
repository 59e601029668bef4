use crate::AppState;
use crate::api::error::AppError;
use crate::models::UploadRequest;
use crate::services::transcription_service::TranscriptionError;
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Name of the multipart field carrying the recording
pub const UPLOAD_FIELD: &str = "file";

#[derive(Serialize, Deserialize, ToSchema)]
pub struct MidiResponse {
    /// Standard MIDI File bytes as lowercase hex
    #[schema(example = "4d546864000000060000000101e0")]
    pub midi: String,
}

/// Multipart body accepted by `/upload-audio/`
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadAudioForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/upload-audio/",
    request_body(content = UploadAudioForm, content_type = "multipart/form-data", description = "Audio recording (WAV)"),
    responses(
        (status = 200, description = "Recording transcribed", body = MidiResponse),
        (status = 400, description = "Missing, empty or unreadable upload"),
        (status = 413, description = "Upload exceeds the configured body limit"),
        (status = 500, description = "Transcription failed")
    ),
    tag = "transcription"
)]
pub async fn upload_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MidiResponse>, AppError> {
    let mut multipart =
        multipart.map_err(|e| TranscriptionError::InvalidUpload(e.body_text()))?;
    let upload = read_upload(&mut multipart).await?;

    tracing::info!(
        "🎵 Received {} bytes ({})",
        upload.payload.len(),
        upload.media_type().unwrap_or_else(|| "unknown type".to_string())
    );

    // Once started, a transcription runs to completion even if the client
    // goes away; a panic inside it surfaces here as a JoinError.
    let service = state.transcription_service.clone();
    let midi = tokio::spawn(async move { service.handle(&upload).await })
        .await
        .map_err(|e| AppError::Internal(format!("transcription task aborted: {}", e)))??;

    Ok(Json(MidiResponse {
        midi: midi.into_inner(),
    }))
}

async fn read_upload(multipart: &mut Multipart) -> Result<UploadRequest, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            tracing::debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }

        let declared_type = field.content_type().map(str::to_string);
        let payload = field.bytes().await.map_err(multipart_error)?;
        return Ok(UploadRequest::new(payload, declared_type));
    }

    Err(TranscriptionError::InvalidUpload(format!("missing `{}` field", UPLOAD_FIELD)).into())
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        TranscriptionError::InvalidUpload(e.body_text()).into()
    }
}
