//! Microphone capture behind the [`cortex::Recorder`] seam.
//!
//! cpal streams are not `Send`, so a dedicated audio thread owns the stream
//! and the controller talks to it over a command channel. Capture is 16 kHz
//! mono f32, matching what the transcription backend expects.

use anyhow::anyhow;
use cortex::{RecordedAudio, Recorder};
use cpal::SampleRate;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};

/// Capture sample rate (16 kHz is what speech models are trained on).
pub const SAMPLE_RATE: u32 = 16_000;

enum MicCmd {
    Start(Sender<anyhow::Result<()>>),
    Stop(Sender<anyhow::Result<RecordedAudio>>),
}

/// [`Recorder`] backed by the default input device.
pub struct MicRecorder {
    cmd: Mutex<Sender<MicCmd>>,
}

impl MicRecorder {
    /// Spawn the audio thread. Fails only if the thread cannot be created;
    /// device problems surface on `start`.
    pub fn spawn() -> anyhow::Result<Self> {
        let (tx, rx) = channel();
        std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || audio_thread(rx))?;
        Ok(Self { cmd: Mutex::new(tx) })
    }

    fn send(&self, cmd: MicCmd) -> anyhow::Result<()> {
        self.cmd
            .lock()
            .unwrap()
            .send(cmd)
            .map_err(|_| anyhow!("audio thread is gone"))
    }
}

impl Recorder for MicRecorder {
    fn start(&self) -> anyhow::Result<()> {
        let (reply_tx, reply_rx) = channel();
        self.send(MicCmd::Start(reply_tx))?;
        reply_rx
            .recv_timeout(Duration::from_secs(2))
            .map_err(|_| anyhow!("audio thread did not answer"))?
    }

    fn stop(&self) -> anyhow::Result<RecordedAudio> {
        let (reply_tx, reply_rx) = channel();
        self.send(MicCmd::Stop(reply_tx))?;
        reply_rx
            .recv_timeout(Duration::from_secs(2))
            .map_err(|_| anyhow!("audio thread did not answer"))?
    }
}

fn audio_thread(rx: Receiver<MicCmd>) {
    let buffer: Arc<Mutex<Vec<f32>>> = Arc::default();
    let mut stream = None;
    while let Ok(cmd) = rx.recv() {
        match cmd {
            MicCmd::Start(reply) => {
                buffer.lock().unwrap().clear();
                match open_stream(buffer.clone()) {
                    Ok(s) => {
                        stream = Some(s);
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            MicCmd::Stop(reply) => {
                // Dropping the stream stops capture.
                drop(stream.take());
                let samples = std::mem::take(&mut *buffer.lock().unwrap());
                debug!(samples = samples.len(), "capture stopped");
                let _ = reply.send(Ok(RecordedAudio {
                    samples,
                    sample_rate: SAMPLE_RATE,
                }));
            }
        }
    }
}

fn open_stream(buffer: Arc<Mutex<Vec<f32>>>) -> anyhow::Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no input device available"))?;

    let supported = device
        .supported_input_configs()?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| anyhow!("no 16 kHz mono input config on the default device"))?;
    let config = supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config();

    info!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        "capture started"
    );

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            buffer.lock().unwrap().extend_from_slice(data);
        },
        |err| error!(%err, "input stream error"),
        None,
    )?;
    stream.play()?;
    Ok(stream)
}
