use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub transcriber: String,
    pub transcriber_available: bool,
    pub scratch_dir: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let service = &state.transcription_service;
    let transcriber_available = service.transcriber().health_check().await;

    let scratch_status = match tokio::fs::metadata(service.scratch().dir()).await {
        Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => "writable",
        Ok(_) => "read-only",
        Err(_) => "missing",
    };

    let status = if transcriber_available && scratch_status == "writable" {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        transcriber: service.transcriber().name().to_string(),
        transcriber_available,
        scratch_dir: scratch_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
