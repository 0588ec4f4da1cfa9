use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::capture::AudioFrame;

/// Recorder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    /// A final stop was requested; after the final flush no further
    /// segments are ever emitted by this recorder instance.
    StoppingFinal,
}

/// One finalized, immutable slice of captured audio covering one chunk
/// interval (or a shorter final partial interval). Consumed exactly once
/// by the transcription dispatcher.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Emission order (0-indexed)
    pub index: usize,
    /// WAV-encoded audio data
    pub data: Vec<u8>,
    /// Captured audio duration in milliseconds
    pub duration_ms: u64,
    /// Number of samples in this segment
    pub sample_count: usize,
    /// Whether this was the final flush of the session
    pub is_final: bool,
}

/// Chunked segment recorder
///
/// Buffers incoming audio frames and finalizes them into WAV segments once
/// the buffer spans the chunk duration of captured audio. A oneshot stop
/// signal triggers the final flush; `run` consumes the recorder, so a fresh
/// instance is required per session and a stopped recorder can never restart.
pub struct ChunkRecorder {
    chunk_duration_ms: u64,
    state: RecorderState,
    /// Raw pieces collected since the last chunk boundary
    buffer: Vec<i16>,
    /// Timestamp of the first buffered frame
    chunk_start_ms: u64,
    chunk_index: usize,
    sample_rate: u32,
    channels: u16,
}

impl ChunkRecorder {
    pub fn new(chunk_duration: Duration) -> Self {
        Self {
            chunk_duration_ms: chunk_duration.as_millis() as u64,
            state: RecorderState::Idle,
            buffer: Vec::new(),
            chunk_start_ms: 0,
            chunk_index: 0,
            sample_rate: 0,
            channels: 0,
        }
    }

    /// Drive the recorder until the capture source ends or a final stop is
    /// requested over `stop`. Finalized segments are emitted on `segments`;
    /// the last emission (if any) carries `is_final`. An empty final buffer
    /// is skipped entirely, never emitted.
    pub async fn run(
        mut self,
        mut frames: mpsc::Receiver<AudioFrame>,
        segments: mpsc::Sender<Segment>,
        mut stop: oneshot::Receiver<()>,
    ) -> Result<()> {
        self.state = RecorderState::Recording;
        info!(
            "Chunk recorder started ({}ms segments)",
            self.chunk_duration_ms
        );

        loop {
            tokio::select! {
                // Drain already-captured frames before honoring the stop so
                // audio received up to the stop request lands in the final
                // segment
                biased;

                maybe_frame = frames.recv() => match maybe_frame {
                    Some(frame) => {
                        if self.at_chunk_boundary(&frame) {
                            let segment = self.finalize(false)?;
                            if segments.send(segment).await.is_err() {
                                warn!("Segment consumer gone, stopping recorder");
                                return Ok(());
                            }
                        }
                        self.buffer_frame(frame);
                    }
                    None => {
                        // Capture source ended; same path as an explicit stop
                        debug!("Frame channel closed, finalizing");
                        self.state = RecorderState::StoppingFinal;
                        break;
                    }
                },
                _ = &mut stop => {
                    self.state = RecorderState::StoppingFinal;
                    break;
                }
            }
        }

        if self.buffer.is_empty() {
            debug!("Final buffer empty, skipping final segment");
        } else {
            let segment = self.finalize(true)?;
            info!(
                "Final segment {} flushed ({}ms)",
                segment.index, segment.duration_ms
            );
            let _ = segments.send(segment).await;
        }

        info!(
            "Chunk recorder stopped after {} segment(s)",
            self.chunk_index
        );

        Ok(())
    }

    /// True when the buffered audio spans a full chunk interval, measured in
    /// captured media time (frame timestamps), and no final stop intervened.
    fn at_chunk_boundary(&self, frame: &AudioFrame) -> bool {
        if self.buffer.is_empty() || self.state != RecorderState::Recording {
            return false;
        }
        frame.timestamp_ms.saturating_sub(self.chunk_start_ms) >= self.chunk_duration_ms
    }

    fn buffer_frame(&mut self, frame: AudioFrame) {
        if self.buffer.is_empty() {
            self.chunk_start_ms = frame.timestamp_ms;
            self.sample_rate = frame.sample_rate;
            self.channels = frame.channels;
        }
        self.buffer.extend_from_slice(&frame.samples);
    }

    /// Flush the buffered pieces into an immutable segment and begin a new
    /// empty buffer.
    fn finalize(&mut self, is_final: bool) -> Result<Segment> {
        let sample_count = self.buffer.len();
        let duration_ms =
            sample_count as u64 * 1000 / (self.sample_rate as u64 * self.channels as u64).max(1);

        let data = encode_wav(&self.buffer, self.sample_rate, self.channels)?;

        let segment = Segment {
            index: self.chunk_index,
            data,
            duration_ms,
            sample_count,
            is_final,
        };

        debug!(
            "Segment {} finalized: {}ms, {} samples, {} bytes{}",
            segment.index,
            segment.duration_ms,
            segment.sample_count,
            segment.data.len(),
            if is_final { " (final)" } else { "" }
        );

        self.chunk_index += 1;
        self.buffer = Vec::new();

        Ok(segment)
    }
}

/// Encode i16 PCM samples as an in-memory WAV file
fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }

        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(cursor.into_inner())
}
