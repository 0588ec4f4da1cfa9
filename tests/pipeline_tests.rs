// Integration tests for the capture -> recorder -> dispatch -> transcript
// pipeline, driven end to end through the session manager with a WAV file
// capture source and scripted transcribers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tabscribe::{
    CaptureError, CaptureSource, DispatchError, FileStore, MemoryStore, Segment, SessionConfig,
    SessionError, SessionEvent, SessionManager, SessionStatus, Transcriber, TranscriptAssembler,
    TranscriptEntry, TranscriptStore, TRANSCRIPT_KEY,
};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

/// Write a 16kHz mono WAV fixture of the given length
fn write_fixture(path: &Path, millis: u64) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for i in 0..(16 * millis) {
        writer.write_sample((i % 128) as i16)?;
    }
    writer.finalize()?;

    Ok(())
}

/// Transcriber that echoes the segment index, with configurable latency to
/// exercise the in-order guarantee
struct EchoTranscriber {
    calls: Arc<AtomicUsize>,
    /// Extra latency for segment 0; later segments answer fast
    first_segment_delay: Duration,
}

#[async_trait::async_trait]
impl Transcriber for EchoTranscriber {
    async fn transcribe(&self, segment: Segment) -> Result<String, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = if segment.index == 0 {
            self.first_segment_delay
        } else {
            Duration::from_millis(5)
        };
        tokio::time::sleep(delay).await;

        Ok(format!("segment {}", segment.index))
    }
}

/// Transcriber that fails one specific segment with a service error
struct FailingTranscriber {
    calls: Arc<AtomicUsize>,
    fail_index: usize,
}

#[async_trait::async_trait]
impl Transcriber for FailingTranscriber {
    async fn transcribe(&self, segment: Segment) -> Result<String, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if segment.index == self.fail_index {
            return Err(DispatchError::Service {
                status: 500,
                message: "internal error".to_string(),
            });
        }

        Ok(format!("segment {}", segment.index))
    }
}

fn file_manager(
    fixture: PathBuf,
    chunk: Duration,
    transcriber: Arc<dyn Transcriber>,
) -> SessionManager {
    let defaults = SessionConfig {
        source: CaptureSource::File(fixture),
        chunk_duration: chunk,
        ..SessionConfig::default()
    };

    let assembler = TranscriptAssembler::new(Box::new(MemoryStore::new()));
    SessionManager::new(defaults, transcriber, assembler)
}

async fn wait_for_entries(
    events: &mut broadcast::Receiver<SessionEvent>,
    count: usize,
) -> Vec<TranscriptEntry> {
    let mut entries = Vec::new();
    while entries.len() < count {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for transcript entries")
            .expect("event channel closed");

        if let SessionEvent::EntryAppended { entry } = event {
            entries.push(entry);
        }
    }
    entries
}

#[tokio::test]
async fn test_entries_follow_segment_order_despite_latency() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let fixture = temp_dir.path().join("capture.wav");
    // 3.5s with 1s chunks: segments 0..2 plus a short final
    write_fixture(&fixture, 3500)?;

    let calls = Arc::new(AtomicUsize::new(0));
    let transcriber = Arc::new(EchoTranscriber {
        calls: Arc::clone(&calls),
        first_segment_delay: Duration::from_millis(150),
    });

    let manager = file_manager(fixture, Duration::from_secs(1), transcriber);
    let mut events = manager.subscribe();

    manager.start().await?;
    let entries = wait_for_entries(&mut events, 4).await;
    let stats = manager.stop().await?;

    // Segment 0 was the slowest dispatch, yet it must land first
    let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["segment 0", "segment 1", "segment 2", "segment 3"]);

    // Labels never run backwards
    let seconds: Vec<u64> = entries.iter().map(|e| e.elapsed_secs).collect();
    assert!(
        seconds.windows(2).all(|w| w[0] <= w[1]),
        "Elapsed labels must be non-decreasing: {:?}",
        seconds
    );

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(stats.segments_dispatched, 4);
    assert_eq!(stats.entries_appended, 4);
    assert!(!stats.is_recording);

    Ok(())
}

#[tokio::test]
async fn test_failed_segment_does_not_halt_the_session() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let fixture = temp_dir.path().join("capture.wav");
    // 2.5s with 1s chunks: segments 0, 1, and a final 2
    write_fixture(&fixture, 2500)?;

    let calls = Arc::new(AtomicUsize::new(0));
    let transcriber = Arc::new(FailingTranscriber {
        calls: Arc::clone(&calls),
        fail_index: 1,
    });

    let manager = file_manager(fixture, Duration::from_secs(1), transcriber);
    let mut events = manager.subscribe();
    // Second subscription: every event stays buffered here for inspection
    let mut all_events = manager.subscribe();

    manager.start().await?;

    // Segments 0 and 2 produce entries; segment 1 produces an error event
    let entries = wait_for_entries(&mut events, 2).await;
    let stats = manager.stop().await?;

    let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["segment 0", "segment 2"]);

    assert_eq!(
        calls.load(Ordering::SeqCst),
        3,
        "The segment after the failure must still be dispatched"
    );
    assert_eq!(stats.segments_dispatched, 3);
    assert_eq!(stats.entries_appended, 2);

    // The failure was surfaced as an event
    let mut saw_error = false;
    while let Ok(event) = all_events.try_recv() {
        if let SessionEvent::ErrorOccurred { message } = event {
            saw_error = message.contains("500");
            if saw_error {
                break;
            }
        }
    }
    assert!(saw_error, "Dispatch failure must surface an error event");

    Ok(())
}

#[tokio::test]
async fn test_second_start_is_rejected_while_active() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let fixture = temp_dir.path().join("capture.wav");
    write_fixture(&fixture, 1500)?;

    let calls = Arc::new(AtomicUsize::new(0));
    let transcriber = Arc::new(EchoTranscriber {
        calls,
        first_segment_delay: Duration::from_millis(5),
    });

    let manager = file_manager(fixture, Duration::from_secs(1), transcriber);
    let mut events = manager.subscribe();

    manager.start().await?;

    let err = manager.start().await.expect_err("second start must be rejected");
    assert_eq!(err, SessionError::AlreadyActive);

    wait_for_entries(&mut events, 2).await;
    manager.stop().await?;

    // After a stop the next start succeeds
    manager.start().await?;
    wait_for_entries(&mut events, 2).await;
    manager.stop().await?;

    Ok(())
}

#[tokio::test]
async fn test_capture_denied_aborts_start() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let missing = temp_dir.path().join("nope.wav");

    let calls = Arc::new(AtomicUsize::new(0));
    let transcriber = Arc::new(EchoTranscriber {
        calls: Arc::clone(&calls),
        first_segment_delay: Duration::from_millis(5),
    });

    let manager = file_manager(missing, Duration::from_secs(1), transcriber);
    let mut events = manager.subscribe();

    let err = manager.start().await.expect_err("start must fail");
    match err {
        SessionError::Capture(CaptureError::Denied(_)) => {}
        other => panic!("Expected a capture denial, got: {}", other),
    }

    // Never transitioned to recording, never produced a segment
    assert!(manager.stats().await.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let mut saw_failed_status = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::StatusChanged {
                status: SessionStatus::Recording,
            } => panic!("Session must never reach Recording"),
            SessionEvent::StatusChanged {
                status: SessionStatus::FailedToStart,
            } => saw_failed_status = true,
            SessionEvent::EntryAppended { .. } => panic!("No entries expected"),
            _ => {}
        }
    }
    assert!(saw_failed_status);

    Ok(())
}

#[tokio::test]
async fn test_stop_drains_in_flight_dispatches() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let fixture = temp_dir.path().join("capture.wav");
    // 2.5s with 1s chunks: 3 segments
    write_fixture(&fixture, 2500)?;

    // Every dispatch takes a while, so the stop request lands with work
    // still in flight
    struct SlowTranscriber;

    #[async_trait::async_trait]
    impl Transcriber for SlowTranscriber {
        async fn transcribe(&self, segment: Segment) -> Result<String, DispatchError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(format!("segment {}", segment.index))
        }
    }

    let manager = file_manager(fixture, Duration::from_secs(1), Arc::new(SlowTranscriber));
    let mut events = manager.subscribe();

    manager.start().await?;

    // One entry observed; the remaining dispatches are still pending
    wait_for_entries(&mut events, 1).await;
    let stats = manager.stop().await?;

    // Stop returned only after every emitted segment was applied
    assert_eq!(stats.entries_appended, 3);

    let transcript = manager.transcript().await;
    assert!(transcript.contains("segment 0"));
    assert!(transcript.contains("segment 1"));
    assert!(transcript.contains("segment 2"));

    Ok(())
}

#[tokio::test]
async fn test_transcript_is_persisted_on_stop() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let fixture = temp_dir.path().join("capture.wav");
    let store_path = temp_dir.path().join("transcripts.json");
    write_fixture(&fixture, 1500)?;

    let calls = Arc::new(AtomicUsize::new(0));
    let transcriber = Arc::new(EchoTranscriber {
        calls,
        first_segment_delay: Duration::from_millis(5),
    });

    let defaults = SessionConfig {
        source: CaptureSource::File(fixture),
        chunk_duration: Duration::from_secs(1),
        ..SessionConfig::default()
    };
    let assembler = TranscriptAssembler::new(Box::new(FileStore::new(&store_path)));
    let manager = SessionManager::new(defaults, transcriber, assembler);
    let mut events = manager.subscribe();

    manager.start().await?;
    wait_for_entries(&mut events, 2).await;
    manager.stop().await?;

    let persisted = FileStore::new(&store_path)
        .get(TRANSCRIPT_KEY)?
        .expect("transcript persisted on session teardown");

    assert!(persisted.contains("segment 0"));
    assert!(persisted.contains("segment 1"));
    assert_eq!(persisted, manager.transcript().await);

    Ok(())
}

#[tokio::test]
async fn test_status_progression_over_a_session() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let fixture = temp_dir.path().join("capture.wav");
    write_fixture(&fixture, 1200)?;

    let calls = Arc::new(AtomicUsize::new(0));
    let transcriber = Arc::new(EchoTranscriber {
        calls,
        first_segment_delay: Duration::from_millis(5),
    });

    let manager = file_manager(fixture, Duration::from_secs(1), transcriber);
    let mut events = manager.subscribe();
    // Second subscription: every event stays buffered here for inspection
    let mut all_events = manager.subscribe();

    manager.start().await?;
    wait_for_entries(&mut events, 2).await;
    manager.stop().await?;

    let mut statuses = Vec::new();
    while let Ok(event) = all_events.try_recv() {
        if let SessionEvent::StatusChanged { status } = event {
            statuses.push(status);
        }
    }

    assert_eq!(
        statuses.first(),
        Some(&SessionStatus::SelectingSource),
        "A session opens with the capture prompt: {:?}",
        statuses
    );
    assert!(statuses.contains(&SessionStatus::Recording));
    assert!(statuses.contains(&SessionStatus::Transcribing));
    assert_eq!(
        statuses.last(),
        Some(&SessionStatus::Stopped),
        "Teardown ends on Stopped: {:?}",
        statuses
    );

    Ok(())
}
