use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tabscribe::{
    create_router, AppState, CaptureSource, Config, FileStore, SessionConfig, SessionManager,
    TranscriptAssembler, WhisperClient,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tabscribe", about = "Live system-audio transcription service")]
struct Cli {
    /// Configuration file (without extension)
    #[arg(short, long, default_value = "config/tabscribe")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let credential = cfg.credential()?;
    let transcriber = Arc::new(WhisperClient::new(
        &cfg.transcriber.endpoint,
        &cfg.transcriber.model,
        &credential,
    )?);

    let store = FileStore::new(&cfg.storage.path);
    let mut assembler = TranscriptAssembler::new(Box::new(store));
    if assembler.restore()?.is_none() {
        info!("No persisted transcript found");
    }

    let defaults = SessionConfig {
        source: CaptureSource::Device(cfg.capture.device.clone()),
        chunk_duration: Duration::from_millis(cfg.recorder.chunk_duration_ms),
        sample_rate: cfg.capture.sample_rate,
        channels: cfg.capture.channels,
        ..SessionConfig::default()
    };

    let manager = Arc::new(SessionManager::new(defaults, transcriber, assembler));
    let app = create_router(AppState::new(Arc::clone(&manager)));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    let shutdown_manager = Arc::clone(&manager);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");

            let recording = shutdown_manager
                .stats()
                .await
                .map(|s| s.is_recording)
                .unwrap_or(false);

            if recording {
                // Stop persists the transcript as part of teardown
                if let Err(e) = shutdown_manager.stop().await {
                    tracing::error!("Failed to stop session on shutdown: {}", e);
                }
            } else if let Err(e) = shutdown_manager.persist_transcript().await {
                tracing::error!("Failed to persist transcript on shutdown: {}", e);
            }
        })
        .await?;

    Ok(())
}
