// Record display/tab audio into fixed-duration WAV segments on disk.
//
// Runs only the capture -> recorder half of the pipeline, which is handy for
// checking that a loopback/monitor device actually delivers audio before
// spending transcription credits.
//
// Usage: cargo run --example record_segments -- --duration 30 --chunk 15

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tabscribe::{
    CaptureBackendConfig, CaptureBackendFactory, CaptureSession, CaptureSource, ChunkRecorder,
    Segment,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "record_segments")]
#[command(about = "Record system audio into WAV segments")]
struct Args {
    /// Capture device (loopback/monitor source); platform default when omitted
    #[arg(long)]
    device: Option<String>,

    /// Duration to record in seconds
    #[arg(short, long, default_value = "30")]
    duration: u64,

    /// Segment length in seconds
    #[arg(short, long, default_value = "15")]
    chunk: u64,

    /// Output directory
    #[arg(short, long, default_value = "recordings")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();

    info!("Recording for {} seconds ({}s segments)", args.duration, args.chunk);
    info!("Output directory: {}", args.output_dir.display());

    std::fs::create_dir_all(&args.output_dir)?;

    let mut backend = CaptureBackendFactory::create(
        &CaptureSource::Device(args.device),
        CaptureBackendConfig::default(),
    )?;

    let mut capture = CaptureSession::acquire(backend.as_mut()).await?;
    let frames = capture
        .take_frames()
        .expect("freshly acquired session has a frame channel");

    let (segment_tx, mut segment_rx) = mpsc::channel::<Segment>(1);
    let (stop_tx, stop_rx) = oneshot::channel();

    let recorder = ChunkRecorder::new(Duration::from_secs(args.chunk));
    let recorder_handle = tokio::spawn(recorder.run(frames, segment_tx, stop_rx));

    // Segments are already WAV bytes; write each one as it lands
    let output_dir = args.output_dir.clone();
    let writer_handle = tokio::spawn(async move {
        let mut written: Vec<(usize, PathBuf, u64)> = Vec::new();

        while let Some(segment) = segment_rx.recv().await {
            let path = output_dir.join(format!("segment-{:03}.wav", segment.index));
            if let Err(e) = std::fs::write(&path, &segment.data) {
                tracing::error!("Failed to write {}: {}", path.display(), e);
                continue;
            }
            info!(
                "Segment {}: {} ({:.1}s{})",
                segment.index,
                path.display(),
                segment.duration_ms as f64 / 1000.0,
                if segment.is_final { ", final" } else { "" }
            );
            written.push((segment.index, path, segment.duration_ms));
        }

        written
    });

    info!("Recording started! Waiting {} seconds...", args.duration);
    sleep(Duration::from_secs(args.duration)).await;

    info!("Stopping...");
    let _ = stop_tx.send(());
    recorder_handle.await??;

    capture.release();

    let written = writer_handle.await?;
    info!("Recording complete! Saved {} segment(s):", written.len());
    for (index, path, duration_ms) in &written {
        info!(
            "  - Segment {}: {} ({:.1}s)",
            index,
            path.display(),
            *duration_ms as f64 / 1000.0
        );
    }

    Ok(())
}
