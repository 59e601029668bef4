use crate::config::TranscriptionConfig;
use crate::services::transcriber::{Transcriber, create_transcriber};
use std::sync::Arc;
use tracing::info;

pub async fn setup_transcriber(config: &TranscriptionConfig) -> Arc<dyn Transcriber> {
    let transcriber = create_transcriber(config);

    if transcriber.health_check().await {
        info!("🎹 Transcriber '{}' available", transcriber.name());
    } else {
        tracing::warn!(
            "⚠️  Transcriber '{}' not found! Uploads will fail until it is installed.",
            transcriber.name()
        );
    }

    transcriber.into()
}
