use clap::Parser;
use dotenvy::dotenv;
use rust_midi_backend::config::TranscriptionConfig;
use rust_midi_backend::infrastructure::{scratch, transcriber};
use rust_midi_backend::services::janitor::ScratchJanitor;
use rust_midi_backend::services::transcription_service::TranscriptionService;
use rust_midi_backend::{AppState, create_app};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the API server to
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port for the API server
    #[arg(short, long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_midi_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Rust MIDI Backend...");

    let config = TranscriptionConfig::from_env();
    info!(
        "🎛️  Transcription Config: Transcriber={} ({}), Timeout={:?}, Scratch={}",
        config.transcriber_type,
        config.transcriber_command,
        config.transcriber_timeout(),
        config.scratch_dir.display()
    );
    match config.max_upload_size {
        Some(max) => info!("📦 Max upload size: {}MB", max / 1024 / 1024),
        None => warn!(
            "⚠️  No upload size limit configured (MAX_UPLOAD_SIZE); large uploads can exhaust memory and disk"
        ),
    }

    // 2. Infrastructure
    let scratch_space = scratch::setup_scratch(&config).await?;
    let transcriber = transcriber::setup_transcriber(&config).await;
    let transcription_service = Arc::new(TranscriptionService::from_config(
        &config,
        scratch_space.clone(),
        transcriber,
    ));

    // 3. Graceful Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // 4. Scratch Janitor
    let janitor = ScratchJanitor::new(
        scratch_space,
        config.stale_artifact_age(),
        config.janitor_interval(),
        shutdown_rx,
    );
    let janitor_handle = tokio::spawn(janitor.run());

    // 5. API Service
    let state = AppState {
        transcription_service,
        config: config.clone(),
    };

    let app = create_app(state);
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://{}", addr);
    info!("📖 Swagger UI documentation: http://{}/swagger-ui", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    info!("🛑 Shutting down backend services...");
    let _ = shutdown_tx.send(true);
    let _ = janitor_handle.await;

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
