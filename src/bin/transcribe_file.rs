use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use rust_midi_backend::api::handlers::transcribe::MidiResponse;
use rust_midi_backend::config::TranscriptionConfig;
use rust_midi_backend::infrastructure::{scratch, transcriber};
use rust_midi_backend::models::UploadRequest;
use rust_midi_backend::services::transcription_service::TranscriptionService;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Transcribe a local recording to MIDI", long_about = None)]
struct Cli {
    /// Path to the WAV recording
    input: PathBuf,

    /// Write decoded MIDI bytes here instead of printing JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Logs go to stderr so stdout stays clean JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transcribe_file=info,rust_midi_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = TranscriptionConfig::from_env();

    let payload = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let scratch_space = scratch::setup_scratch(&config).await?;
    let transcriber = transcriber::setup_transcriber(&config).await;
    let service = TranscriptionService::from_config(&config, scratch_space, transcriber);

    info!("🎵 Transcribing {}", cli.input.display());
    let midi = service
        .handle(&UploadRequest::new(payload, None))
        .await
        .with_context(|| format!("failed to transcribe {}", cli.input.display()))?;

    match cli.output {
        Some(path) => {
            let bytes = midi.decode()?;
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("💾 Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            let response = MidiResponse {
                midi: midi.into_inner(),
            };
            println!("{}", serde_json::to_string(&response)?);
        }
    }

    Ok(())
}
