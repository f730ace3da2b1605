//! Push-to-talk voice capture.
//!
//! The state machine is a pure transition function so the protocol is
//! testable without a microphone or an event loop; [`VoiceCapture`] is the
//! thin async controller that owns the timers and hands audio to the
//! transcription backend. Event order per session: `Started`, (`Stopped`),
//! `Transcribing`, then exactly one of `Transcribed` / `Failed`.

use crate::ling::{RecordedAudio, Recorder, Transcriber};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Transcribing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Started,
    Stopped,
    Transcribing,
    Transcribed(String),
    Failed(String),
}

impl CaptureState {
    /// Push-to-talk key pressed. A press in any state but `Idle` is a no-op.
    pub fn on_press(self) -> (CaptureState, Option<CaptureEvent>) {
        match self {
            CaptureState::Idle => (CaptureState::Recording, Some(CaptureEvent::Started)),
            other => (other, None),
        }
    }

    /// Push-to-talk key released (or the ceiling timer fired).
    pub fn on_stop(self) -> (CaptureState, Vec<CaptureEvent>) {
        match self {
            CaptureState::Recording => (
                CaptureState::Transcribing,
                vec![CaptureEvent::Stopped, CaptureEvent::Transcribing],
            ),
            other => (other, Vec::new()),
        }
    }

    /// Transcription finished (or was short-circuited by the floor).
    pub fn on_outcome(self, outcome: Result<String, String>) -> (CaptureState, CaptureEvent) {
        debug_assert_eq!(self, CaptureState::Transcribing);
        let event = match outcome {
            Ok(text) => CaptureEvent::Transcribed(text),
            Err(reason) => CaptureEvent::Failed(reason),
        };
        (CaptureState::Idle, event)
    }
}

/// Recording limits. The floor filters out accidental taps without touching
/// the backend; the ceiling bounds a stuck or forgotten key.
#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    pub min_duration: Duration,
    pub max_duration: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_duration: Duration::from_millis(500),
            max_duration: Duration::from_secs(30),
        }
    }
}

/// Push-to-talk controller. At most one recording session is ever active;
/// the epoch counter keeps a stale ceiling timer from stopping a newer
/// session. The handle is cheap to clone and all clones drive one session.
#[derive(Clone)]
pub struct VoiceCapture {
    inner: Arc<CaptureInner>,
}

struct CaptureInner {
    recorder: Arc<dyn Recorder>,
    transcriber: Arc<dyn Transcriber>,
    config: CaptureConfig,
    events: mpsc::UnboundedSender<CaptureEvent>,
    state: Mutex<CaptureState>,
    epoch: AtomicU64,
}

impl VoiceCapture {
    pub fn new(
        recorder: Arc<dyn Recorder>,
        transcriber: Arc<dyn Transcriber>,
        config: CaptureConfig,
    ) -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                inner: Arc::new(CaptureInner {
                    recorder,
                    transcriber,
                    config,
                    events: tx,
                    state: Mutex::new(CaptureState::Idle),
                    epoch: AtomicU64::new(0),
                }),
            },
            rx,
        )
    }

    pub fn state(&self) -> CaptureState {
        *self.inner.state.lock().unwrap()
    }

    /// Push-to-talk pressed. Must be called from within a tokio runtime.
    pub fn press(&self) {
        let inner = &self.inner;
        let epoch = {
            let mut state = inner.state.lock().unwrap();
            let (next, event) = state.on_press();
            if event.is_none() {
                debug!(?state, "press ignored");
                return;
            }
            *state = next;
            inner.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };
        if let Err(e) = inner.recorder.start() {
            warn!(?e, "failed to start recording");
            *inner.state.lock().unwrap() = CaptureState::Idle;
            let _ = inner
                .events
                .send(CaptureEvent::Failed(format!("failed to start recording: {e}")));
            return;
        }
        info!(max_secs = inner.config.max_duration.as_secs(), "recording started");
        let _ = inner.events.send(CaptureEvent::Started);

        // Ceiling: auto-stop without a release.
        let this = self.clone();
        let max = inner.config.max_duration;
        tokio::spawn(async move {
            tokio::time::sleep(max).await;
            this.finish(epoch, true);
        });
    }

    /// Push-to-talk released.
    pub fn release(&self) {
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        self.finish(epoch, false);
    }

    /// Stop the session begun at `epoch` and hand it to transcription. Both
    /// the release path and the ceiling timer land here; whichever comes
    /// second loses the state transition and returns.
    fn finish(&self, epoch: u64, ceiling: bool) {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock().unwrap();
            if *state != CaptureState::Recording || inner.epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            let (next, _events) = state.on_stop();
            *state = next;
        }
        if ceiling {
            info!(max_secs = inner.config.max_duration.as_secs(), "recording ceiling reached");
        }
        let _ = inner.events.send(CaptureEvent::Stopped);
        let _ = inner.events.send(CaptureEvent::Transcribing);

        let audio = match inner.recorder.stop() {
            Ok(audio) => audio,
            Err(e) => {
                warn!(?e, "failed to stop recording");
                self.settle(Err(format!("failed to stop recording: {e}")));
                return;
            }
        };

        let duration = audio.duration();
        if duration < inner.config.min_duration {
            // Floor: reject locally, never call the backend.
            info!(secs = duration.as_secs_f32(), "recording too short");
            self.settle(Err(format!(
                "recording too short ({:.1}s)",
                duration.as_secs_f32()
            )));
            return;
        }

        info!(secs = duration.as_secs_f32(), "recording stopped");
        let this = self.clone();
        tokio::spawn(async move {
            let outcome = match this.transcribe(&audio).await {
                Ok(text) if text.trim().is_empty() => Err("no speech detected".to_string()),
                Ok(text) => Ok(text.trim().to_string()),
                Err(e) => Err(format!("transcription failed: {e}")),
            };
            this.settle(outcome);
        });
    }

    /// Leave `Transcribing` with exactly one terminal event.
    fn settle(&self, outcome: Result<String, String>) {
        let event = {
            let mut state = self.inner.state.lock().unwrap();
            let (next, event) = state.on_outcome(outcome);
            *state = next;
            event
        };
        match &event {
            CaptureEvent::Transcribed(text) => info!(%text, "transcribed"),
            CaptureEvent::Failed(reason) => warn!(%reason, "capture failed"),
            _ => {}
        }
        let _ = self.inner.events.send(event);
    }

    /// Write the samples to a transient WAV container and transcribe it; the
    /// file is deleted when the handle drops.
    async fn transcribe(&self, audio: &RecordedAudio) -> anyhow::Result<String> {
        let file = write_wav(audio)?;
        self.inner.transcriber.transcribe(file.path()).await
    }
}

/// Encode mono f32 samples as a 16-bit PCM WAV temp file.
fn write_wav(audio: &RecordedAudio) -> anyhow::Result<NamedTempFile> {
    let file = NamedTempFile::new()?;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(file.path(), spec)?;
    for &sample in &audio.samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?;
    }
    writer.finalize()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_only_starts_from_idle() {
        let (state, event) = CaptureState::Idle.on_press();
        assert_eq!(state, CaptureState::Recording);
        assert_eq!(event, Some(CaptureEvent::Started));

        let (state, event) = CaptureState::Recording.on_press();
        assert_eq!(state, CaptureState::Recording);
        assert_eq!(event, None);

        let (state, event) = CaptureState::Transcribing.on_press();
        assert_eq!(state, CaptureState::Transcribing);
        assert_eq!(event, None);
    }

    #[test]
    fn stop_emits_stopped_then_transcribing() {
        let (state, events) = CaptureState::Recording.on_stop();
        assert_eq!(state, CaptureState::Transcribing);
        assert_eq!(events, vec![CaptureEvent::Stopped, CaptureEvent::Transcribing]);

        let (state, events) = CaptureState::Idle.on_stop();
        assert_eq!(state, CaptureState::Idle);
        assert!(events.is_empty());
    }

    #[test]
    fn outcome_returns_to_idle() {
        let (state, event) = CaptureState::Transcribing.on_outcome(Ok("hi".into()));
        assert_eq!(state, CaptureState::Idle);
        assert_eq!(event, CaptureEvent::Transcribed("hi".into()));

        let (state, event) = CaptureState::Transcribing.on_outcome(Err("too short".into()));
        assert_eq!(state, CaptureState::Idle);
        assert_eq!(event, CaptureEvent::Failed("too short".into()));
    }

    #[test]
    fn wav_container_round_trips() {
        let audio = RecordedAudio {
            samples: vec![0.0, 0.5, -0.5, 1.0],
            sample_rate: 16_000,
        };
        let file = write_wav(&audio).unwrap();
        let reader = hound::WavReader::open(file.path()).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(reader.len(), 4);
    }
}
