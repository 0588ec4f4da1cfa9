// Live transcription demo: capture -> fixed-duration segments -> Whisper API
//
// Captures display/tab audio from a loopback device (or streams a WAV file),
// transcribes each segment, and prints timestamped transcript entries as
// they arrive.
//
// Requires a credential for the transcription endpoint:
//   export TABSCRIBE__TRANSCRIBER__API_KEY=sk-...
//
// Usage:
//   cargo run --example live_transcription -- --duration 60
//   cargo run --example live_transcription -- --device "Monitor of Built-in Audio"
//   cargo run --example live_transcription -- --file recording.wav

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tabscribe::{
    CaptureSource, MemoryStore, SessionConfig, SessionEvent, SessionManager,
    TranscriptAssembler, WhisperClient,
};
use tokio::time::sleep;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "live_transcription")]
#[command(about = "Transcribe system audio live")]
struct Args {
    /// Capture device (loopback/monitor source); platform default when omitted
    #[arg(short, long)]
    device: Option<String>,

    /// Transcribe a WAV file instead of a live device
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Seconds to capture before stopping
    #[arg(long, default_value = "60")]
    duration: u64,

    /// Segment length in seconds
    #[arg(long, default_value = "15")]
    chunk: u64,

    /// Transcription endpoint
    #[arg(long, default_value = "https://api.openai.com/v1/audio/transcriptions")]
    endpoint: String,

    /// Model identifier
    #[arg(long, default_value = "whisper-1")]
    model: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();

    let credential = match std::env::var("TABSCRIBE__TRANSCRIBER__API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => bail!("Set TABSCRIBE__TRANSCRIBER__API_KEY to run this demo"),
    };

    let source = match args.file {
        Some(path) => CaptureSource::File(path),
        None => CaptureSource::Device(args.device),
    };

    info!("Capture source: {:?}", source);
    info!("Segment length: {}s", args.chunk);

    let transcriber = Arc::new(WhisperClient::new(&args.endpoint, &args.model, &credential)?);
    let assembler = TranscriptAssembler::new(Box::new(MemoryStore::new()));

    let defaults = SessionConfig {
        source,
        chunk_duration: Duration::from_secs(args.chunk),
        ..SessionConfig::default()
    };

    let manager = Arc::new(SessionManager::new(defaults, transcriber, assembler));

    // Print entries and errors as they arrive
    let mut events = manager.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::EntryAppended { entry } => {
                    println!("[{}] {}", entry.label, entry.text);
                }
                SessionEvent::ErrorOccurred { message } => {
                    warn!("{}", message);
                }
                SessionEvent::StatusChanged { status } => {
                    info!("Status: {:?}", status);
                }
            }
        }
    });

    manager.start().await?;
    info!("Capturing for {} seconds...", args.duration);

    sleep(Duration::from_secs(args.duration)).await;

    let stats = manager.stop().await?;
    info!(
        "Session complete: {} segment(s) dispatched, {} entr(ies) appended in {:.1}s",
        stats.segments_dispatched, stats.entries_appended, stats.duration_secs
    );

    println!("\n--- Transcript ---\n{}", manager.transcript().await);

    printer.abort();

    Ok(())
}
