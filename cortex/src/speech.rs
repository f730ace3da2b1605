//! Speech serialization and tiered synthesis.
//!
//! [`SpeechLock`] guarantees at most one utterance is ever audible;
//! [`Speaker`] renders assistant text through an ordered list of synthesis
//! tiers and plays it inside a lock permit, falling back to the robot's
//! built-in voice so a reply is never silent.

use crate::ling::Synthesizer;
use crate::types::Utterance;
use robot::Robot;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Mutual exclusion for playback with a single most-recent-wins pending slot.
///
/// While BUSY, at most one waiter is parked; a newer request replaces it and
/// the replaced waiter resolves as [`Acquisition::Superseded`] instead of
/// being dropped on the floor. This bounds the backlog of stale speech to one
/// utterance no matter how fast replies arrive. The handle is cheap to clone
/// and all clones share one lock.
#[derive(Clone, Default)]
pub struct SpeechLock {
    inner: Arc<Mutex<LockState>>,
}

#[derive(Default)]
struct LockState {
    busy: Option<Uuid>,
    pending: Option<(Uuid, oneshot::Sender<SpeechPermit>)>,
}

/// Outcome of [`SpeechLock::acquire`].
pub enum Acquisition {
    /// The caller owns playback until the permit drops.
    Acquired(SpeechPermit),
    /// A newer request took the pending slot while this one waited.
    Superseded,
}

/// RAII ownership of the speech channel. Dropping the permit releases the
/// lock on every path, including panics and failed playback.
pub struct SpeechPermit {
    lock: SpeechLock,
    id: Uuid,
}

impl SpeechLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for utterance `id`, parking in the pending slot when
    /// playback is already in progress.
    pub async fn acquire(&self, id: Uuid) -> Acquisition {
        let rx = {
            let mut state = self.inner.lock().unwrap();
            if state.busy.is_none() {
                state.busy = Some(id);
                return Acquisition::Acquired(SpeechPermit {
                    lock: self.clone(),
                    id,
                });
            }
            let (tx, rx) = oneshot::channel();
            if let Some((old, _old_tx)) = state.pending.replace((id, tx)) {
                // Dropping the old sender resolves that waiter as superseded.
                debug!(%old, newer = %id, "pending speech replaced");
            }
            rx
        };
        // The permit itself travels through the channel, so a grant to a
        // waiter whose task has gone away is dropped and releases the lock
        // instead of wedging it.
        match rx.await {
            Ok(permit) => Acquisition::Acquired(permit),
            Err(_) => Acquisition::Superseded,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock().unwrap().busy.is_some()
    }

    fn release(&self, id: Uuid) {
        let granted = {
            let mut state = self.inner.lock().unwrap();
            debug_assert_eq!(state.busy, Some(id));
            match state.pending.take() {
                Some((next, tx)) => {
                    state.busy = Some(next);
                    Some((next, tx))
                }
                None => {
                    state.busy = None;
                    None
                }
            }
        };
        if let Some((next, tx)) = granted {
            let permit = SpeechPermit {
                lock: self.clone(),
                id: next,
            };
            if let Err(unclaimed) = tx.send(permit) {
                // The parked waiter gave up; dropping the permit releases
                // again, outside the state mutex.
                drop(unclaimed);
            }
        }
    }
}

impl Drop for SpeechPermit {
    fn drop(&mut self) {
        self.lock.release(self.id);
    }
}

/// One synthesis tier: a backend plus its own deadline.
pub struct SpeechTier {
    pub name: String,
    pub synth: Arc<dyn Synthesizer>,
    pub timeout: Duration,
}

impl SpeechTier {
    pub fn new(name: impl Into<String>, synth: Arc<dyn Synthesizer>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            synth,
            timeout,
        }
    }
}

/// Outcome of a [`Speaker::speak`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Played exactly once, naming the tier that produced the audio
    /// (`"builtin"` when every hosted tier fell through).
    Spoken { tier: String },
    /// Replaced in the pending slot by a newer utterance; nothing played.
    Superseded,
}

/// Drives tiered synthesis and serializes playback via the [`SpeechLock`].
///
/// Tier selection is stateless per call: a tier that failed for one
/// utterance is tried again for the next.
pub struct Speaker {
    lock: SpeechLock,
    tiers: Vec<SpeechTier>,
    robot: Arc<dyn Robot>,
}

impl Speaker {
    pub fn new(robot: Arc<dyn Robot>, tiers: Vec<SpeechTier>) -> Self {
        Self {
            lock: SpeechLock::new(),
            tiers,
            robot,
        }
    }

    /// Handle to the lock, shared with tests and diagnostics.
    pub fn lock(&self) -> SpeechLock {
        self.lock.clone()
    }

    /// Render and play `utterance`, holding the speech lock for the whole
    /// playback window.
    pub async fn speak(&self, utterance: &Utterance) -> SpeakOutcome {
        let permit = match self.lock.acquire(utterance.id).await {
            Acquisition::Acquired(permit) => permit,
            Acquisition::Superseded => {
                debug!(id = %utterance.id, "speech superseded before playback");
                return SpeakOutcome::Superseded;
            }
        };
        let tier = self.render(&utterance.text).await;
        info!(id = %utterance.id, %tier, "utterance played");
        drop(permit);
        SpeakOutcome::Spoken { tier }
    }

    /// Try each tier in priority order; fall back to the built-in voice so
    /// the reply is never silent. Returns the name of the tier that played.
    async fn render(&self, text: &str) -> String {
        for tier in &self.tiers {
            match timeout(tier.timeout, tier.synth.synthesize(text)).await {
                Ok(Ok(clip)) => match self.robot.play_clip(&clip).await {
                    Ok(()) => return tier.name.clone(),
                    Err(e) => {
                        // The clip rendered but the speakers refused it;
                        // retrying other tiers would hit the same playback
                        // path, so go straight to the built-in voice.
                        warn!(tier = %tier.name, ?e, "clip playback failed");
                        break;
                    }
                },
                Ok(Err(e)) => warn!(tier = %tier.name, ?e, "synthesis failed"),
                Err(_) => warn!(tier = %tier.name, "synthesis timed out"),
            }
        }
        self.robot.say(text).await;
        "builtin".to_string()
    }
}
