use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Who produced an [`Utterance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Assistant,
}

/// How an [`Utterance`] entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Voice,
}

/// One line of dialogue. Immutable once created; workers and queue consumers
/// refer to it by `id`.
#[derive(Debug, Clone, Serialize)]
pub struct Utterance {
    pub id: Uuid,
    pub origin: Origin,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub modality: Modality,
}

impl Utterance {
    pub fn new(origin: Origin, text: impl Into<String>, modality: Modality) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            text: text.into(),
            timestamp: Utc::now(),
            modality,
        }
    }

    /// A message the operator typed.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Origin::User, text, Modality::Text)
    }

    /// A message transcribed from the operator's voice.
    pub fn user_voice(text: impl Into<String>) -> Self {
        Self::new(Origin::User, text, Modality::Voice)
    }

    /// A reply produced by the conversation engine.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Origin::Assistant, text, Modality::Text)
    }
}

/// Entry delivered on the orchestrator's queues.
///
/// Every entry carries the id of the *originating* user utterance so the
/// consumer can attribute replies: workers finish in any order, and a slow
/// search-bound turn may land after a later quick one.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    UserText { origin: Uuid, text: String },
    UserVoice { origin: Uuid, text: String },
    AssistantText { origin: Uuid, text: String },
    Status { origin: Option<Uuid>, text: String },
    Error { origin: Option<Uuid>, text: String },
}

impl Event {
    /// Queue entry announcing an inbound user utterance.
    pub fn from_user(utterance: &Utterance) -> Self {
        match utterance.modality {
            Modality::Text => Event::UserText {
                origin: utterance.id,
                text: utterance.text.clone(),
            },
            Modality::Voice => Event::UserVoice {
                origin: utterance.id,
                text: utterance.text.clone(),
            },
        }
    }

    /// The originating utterance id, when the entry has one.
    pub fn origin(&self) -> Option<Uuid> {
        match self {
            Event::UserText { origin, .. }
            | Event::UserVoice { origin, .. }
            | Event::AssistantText { origin, .. } => Some(*origin),
            Event::Status { origin, .. } | Event::Error { origin, .. } => *origin,
        }
    }
}
