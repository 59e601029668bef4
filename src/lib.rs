pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::TranscriptionConfig;
use crate::services::transcription_service::TranscriptionService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::transcribe::upload_audio,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::transcribe::MidiResponse,
            api::handlers::transcribe::UploadAudioForm,
            api::handlers::health::HealthResponse,
            models::ErrorKind,
        )
    ),
    tags(
        (name = "transcription", description = "Audio to MIDI transcription"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Per-request dependencies. Everything a handler needs is passed in here;
/// there is no process-global application instance.
#[derive(Clone)]
pub struct AppState {
    pub transcription_service: Arc<TranscriptionService>,
    pub config: TranscriptionConfig,
}

pub fn create_app(state: AppState) -> Router {
    // No limit unless configured: the transcription core itself does not
    // bound upload size.
    let body_limit = match state.config.max_upload_size {
        Some(max) => DefaultBodyLimit::max(max),
        None => DefaultBodyLimit::disable(),
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            // The request id layer sits outside this one, so the header is
            // always present by the time the span is created.
            let request_id = request
                .headers()
                .get(api::middleware::request_id::REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/upload-audio/",
            post(api::handlers::transcribe::upload_audio),
        )
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(trace_layer)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(CatchPanicLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(body_limit)
        .with_state(state)
}
