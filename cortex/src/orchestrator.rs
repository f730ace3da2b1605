//! Wires the conversation engine, tool dispatcher and speaker into worker
//! tasks, and owns the delivery queues the interactive loop drains.

use crate::convo::ConversationEngine;
use crate::speech::{SpeakOutcome, Speaker};
use crate::types::{Event, Utterance};
use robot::{EyeColor, Gesture, Robot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Canned reply for the farewell phrase; spoken without an inference call.
pub const FAREWELL_REPLY: &str = "Goodbye! It was nice talking with you.";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum conversation workers running at once. Further submissions
    /// queue on the pool instead of spawning unbounded.
    pub worker_cap: usize,
    /// Lowercase phrase that deactivates the robot when it appears in a
    /// message.
    pub farewell: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_cap: 4,
            farewell: None,
        }
    }
}

/// Receiving ends of the delivery queues. The embedding event loop drains
/// both once per tick; nothing here blocks.
pub struct Queues {
    pub messages: mpsc::UnboundedReceiver<Event>,
    pub statuses: mpsc::UnboundedReceiver<Event>,
}

impl Queues {
    /// Everything queued on the message channel since the last tick.
    pub fn drain_messages(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.messages.try_recv() {
            out.push(event);
        }
        out
    }

    /// Everything queued on the status channel since the last tick.
    pub fn drain_statuses(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.statuses.try_recv() {
            out.push(event);
        }
        out
    }
}

/// Spawns one worker per inbound message and funnels every state change
/// through the delivery queues.
///
/// Workers are unordered relative to one another by design: a slow
/// search-bound turn may finish after a later quick one, and consumers
/// disambiguate by originating utterance id. A worker failure becomes an
/// [`Event::Error`] entry; it never reaches the event loop or the watchdog.
/// The handle is cheap to clone and all clones share one orchestrator.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    engine: Arc<ConversationEngine>,
    speaker: Arc<Speaker>,
    robot: Arc<dyn Robot>,
    config: OrchestratorConfig,
    messages: mpsc::UnboundedSender<Event>,
    statuses: mpsc::UnboundedSender<Event>,
    limiter: Arc<Semaphore>,
    active: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<ConversationEngine>,
        speaker: Arc<Speaker>,
        robot: Arc<dyn Robot>,
        config: OrchestratorConfig,
    ) -> (Self, Queues) {
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let (statuses_tx, statuses_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        let limiter = Arc::new(Semaphore::new(config.worker_cap));
        (
            Self {
                inner: Arc::new(OrchestratorInner {
                    engine,
                    speaker,
                    robot,
                    config,
                    messages: messages_tx,
                    statuses: statuses_tx,
                    limiter,
                    active: AtomicBool::new(false),
                    workers: Mutex::new(Vec::new()),
                    shutdown,
                }),
            },
            Queues {
                messages: messages_rx,
                statuses: statuses_rx,
            },
        )
    }

    /// Receiver that flips to `true` exactly once, on shutdown. The movement
    /// watchdog runs against this.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Sender for the status queue, for surfaces (watchdog, keyboard, voice
    /// capture) that report outside a conversation worker.
    pub fn status_sender(&self) -> mpsc::UnboundedSender<Event> {
        self.inner.statuses.clone()
    }

    /// Push a status line onto the status queue.
    pub fn post_status(&self, text: impl Into<String>) {
        let _ = self.inner.statuses.send(Event::Status {
            origin: None,
            text: text.into(),
        });
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Toggle between active and idle, mirroring the state on the eye LEDs.
    pub fn set_active(&self, active: bool) {
        self.inner.active.store(active, Ordering::SeqCst);
        let robot = self.inner.robot.clone();
        tokio::spawn(async move {
            robot
                .set_eye_color(if active { EyeColor::Blue } else { EyeColor::White })
                .await;
        });
        self.post_status(if active {
            "robot is now active"
        } else {
            "robot is now idle"
        });
        info!(active, "active state changed");
    }

    /// Submit a typed message.
    pub fn submit_text(&self, text: impl Into<String>) -> Uuid {
        self.submit(Utterance::user_text(text))
    }

    /// Submit a transcribed voice message.
    pub fn submit_voice(&self, text: impl Into<String>) -> Uuid {
        self.submit(Utterance::user_voice(text))
    }

    /// Publish `utterance` and spawn its conversation worker. Returns the
    /// utterance id consumers use to attribute the eventual reply.
    pub fn submit(&self, utterance: Utterance) -> Uuid {
        let id = utterance.id;
        let _ = self.inner.messages.send(Event::from_user(&utterance));

        if !self.is_active() {
            // No backend call while idle.
            let _ = self.inner.statuses.send(Event::Status {
                origin: Some(id),
                text: "robot is idle — press space to activate".into(),
            });
            return id;
        }

        if self.is_farewell(&utterance.text) {
            let this = self.clone();
            self.track(tokio::spawn(async move {
                this.farewell(id).await;
            }));
            return id;
        }

        let this = self.clone();
        self.track(tokio::spawn(async move {
            let inner = &this.inner;
            // Back-pressure: bursts wait here instead of stacking workers.
            let Ok(_permit) = inner.limiter.clone().acquire_owned().await else {
                return; // pool closed: shutting down
            };
            inner.robot.indicate_thinking(true).await;
            let result = inner.engine.take_turn(&utterance).await;
            inner.robot.indicate_thinking(false).await;
            match result {
                Ok(assistant) => {
                    let _ = inner.messages.send(Event::AssistantText {
                        origin: id,
                        text: assistant.text.clone(),
                    });
                    match inner.speaker.speak(&assistant).await {
                        SpeakOutcome::Spoken { tier } => {
                            debug!(origin = %id, %tier, "reply spoken");
                        }
                        SpeakOutcome::Superseded => {
                            let _ = inner.statuses.send(Event::Status {
                                origin: Some(id),
                                text: "reply superseded by a newer one before playback".into(),
                            });
                        }
                    }
                }
                Err(e) => {
                    error!(origin = %id, error = %format!("{e:#}"), "conversation worker failed");
                    let _ = inner.statuses.send(Event::Error {
                        origin: Some(id),
                        text: format!("{e:#}"),
                    });
                }
            }
        }));
        id
    }

    fn is_farewell(&self, text: &str) -> bool {
        self.inner
            .config
            .farewell
            .as_deref()
            .is_some_and(|phrase| text.to_lowercase().contains(phrase))
    }

    /// Canned goodbye: deactivate, wave, speak. No inference call.
    async fn farewell(&self, origin: Uuid) {
        info!("farewell phrase heard");
        let assistant = Utterance::assistant(FAREWELL_REPLY);
        let _ = self.inner.messages.send(Event::AssistantText {
            origin,
            text: assistant.text.clone(),
        });
        self.set_active(false);
        self.inner.robot.perform(Gesture::Wave).await;
        self.inner.speaker.speak(&assistant).await;
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut workers = self.inner.workers.lock().unwrap();
        workers.retain(|h| !h.is_finished());
        workers.push(handle);
    }

    /// Stop accepting work, interrupt in-flight workers and force an
    /// immediate hardware stop.
    pub async fn shutdown(&self) {
        info!("orchestrator shutting down");
        let _ = self.inner.shutdown.send(true);
        self.inner.limiter.close();
        for handle in self.inner.workers.lock().unwrap().drain(..) {
            handle.abort();
        }
        self.inner.robot.halt().await;
        self.inner.robot.rest().await;
    }
}
