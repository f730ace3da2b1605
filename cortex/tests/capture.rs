use async_trait::async_trait;
use cortex::capture::{CaptureConfig, CaptureEvent, CaptureState, VoiceCapture};
use cortex::{RecordedAudio, Recorder, Transcriber};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Recorder that returns a fixed number of seconds of silence.
struct FakeMic {
    seconds: f32,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeMic {
    fn with_seconds(seconds: f32) -> Arc<Self> {
        Arc::new(Self {
            seconds,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }
}

impl Recorder for FakeMic {
    fn start(&self) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<RecordedAudio> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let samples = vec![0.0; (16_000.0 * self.seconds) as usize];
        Ok(RecordedAudio {
            samples,
            sample_rate: 16_000,
        })
    }
}

struct FakeWhisper {
    calls: AtomicUsize,
    reply: &'static str,
}

impl FakeWhisper {
    fn saying(reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply,
        })
    }
}

#[async_trait]
impl Transcriber for FakeWhisper {
    async fn transcribe(&self, wav: &Path) -> anyhow::Result<String> {
        assert!(wav.exists(), "transient container file must exist");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.to_string())
    }
}

fn config(min_ms: u64, max_ms: u64) -> CaptureConfig {
    CaptureConfig {
        min_duration: Duration::from_millis(min_ms),
        max_duration: Duration::from_millis(max_ms),
    }
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<CaptureEvent>) -> CaptureEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for capture event")
        .expect("event channel closed")
}

#[tokio::test]
async fn short_recording_errors_without_calling_the_backend() {
    let mic = FakeMic::with_seconds(0.3);
    let whisper = FakeWhisper::saying("should never run");
    let (capture, mut rx) = VoiceCapture::new(mic.clone(), whisper.clone(), config(500, 30_000));

    capture.press();
    capture.release();

    assert_eq!(next_event(&mut rx).await, CaptureEvent::Started);
    assert_eq!(next_event(&mut rx).await, CaptureEvent::Stopped);
    assert_eq!(next_event(&mut rx).await, CaptureEvent::Transcribing);
    match next_event(&mut rx).await {
        CaptureEvent::Failed(reason) => assert!(reason.contains("too short")),
        other => panic!("expected a failure, got {other:?}"),
    }
    assert_eq!(whisper.calls.load(Ordering::SeqCst), 0);
    assert_eq!(capture.state(), CaptureState::Idle);
}

#[tokio::test]
async fn full_session_transcribes_once() {
    let mic = FakeMic::with_seconds(2.0);
    let whisper = FakeWhisper::saying("  hello robot  ");
    let (capture, mut rx) = VoiceCapture::new(mic.clone(), whisper.clone(), config(500, 30_000));

    capture.press();
    capture.release();

    assert_eq!(next_event(&mut rx).await, CaptureEvent::Started);
    assert_eq!(next_event(&mut rx).await, CaptureEvent::Stopped);
    assert_eq!(next_event(&mut rx).await, CaptureEvent::Transcribing);
    assert_eq!(
        next_event(&mut rx).await,
        CaptureEvent::Transcribed("hello robot".into())
    );
    assert_eq!(whisper.calls.load(Ordering::SeqCst), 1);
    assert_eq!(capture.state(), CaptureState::Idle);
}

#[tokio::test]
async fn ceiling_auto_stops_without_a_release() {
    let mic = FakeMic::with_seconds(2.0);
    let whisper = FakeWhisper::saying("caught by the ceiling");
    let (capture, mut rx) = VoiceCapture::new(mic.clone(), whisper.clone(), config(100, 50));

    capture.press();
    assert_eq!(next_event(&mut rx).await, CaptureEvent::Started);

    // No release: the ceiling timer stops the session on its own.
    assert_eq!(next_event(&mut rx).await, CaptureEvent::Stopped);
    assert_eq!(next_event(&mut rx).await, CaptureEvent::Transcribing);
    assert_eq!(
        next_event(&mut rx).await,
        CaptureEvent::Transcribed("caught by the ceiling".into())
    );
    assert_eq!(mic.stops.load(Ordering::SeqCst), 1);
    assert_eq!(whisper.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn press_while_recording_is_a_noop() {
    let mic = FakeMic::with_seconds(2.0);
    let whisper = FakeWhisper::saying("once");
    let (capture, mut rx) = VoiceCapture::new(mic.clone(), whisper.clone(), config(500, 30_000));

    capture.press();
    capture.press();
    capture.press();
    assert_eq!(mic.starts.load(Ordering::SeqCst), 1);

    capture.release();
    assert_eq!(next_event(&mut rx).await, CaptureEvent::Started);
    assert_eq!(next_event(&mut rx).await, CaptureEvent::Stopped);
    assert_eq!(mic.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn release_without_recording_does_nothing() {
    let mic = FakeMic::with_seconds(2.0);
    let whisper = FakeWhisper::saying("never");
    let (capture, mut rx) = VoiceCapture::new(mic.clone(), whisper.clone(), config(500, 30_000));

    capture.release();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(mic.stops.load(Ordering::SeqCst), 0);
}
