//! Message types and backend seams for conversational inference.
//!
//! The concrete network clients live in their own crates and implement these
//! traits; everything in `cortex` is written against the traits so the whole
//! orchestration layer is testable with in-memory stand-ins.

use async_trait::async_trait;
use robot::AudioClip;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Speaker role of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A structured action request emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    /// Parsed argument object; `{}` when the model sent none.
    pub arguments: Value,
}

/// Host-side outcome of one [`ToolCallRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// One message in the inference request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Assistant message echoing the tool calls it issued, required by the
    /// wire protocol before the matching tool results.
    pub fn assistant_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    /// Tool-role message carrying one [`ToolCallResult`]. An error result
    /// stays visible to the model so it can explain instead of going silent.
    pub fn tool_result(result: &ToolCallResult) -> Self {
        let content = if result.is_error {
            format!("ERROR: {}", result.content)
        } else {
            result.content.clone()
        };
        Self {
            role: Role::Tool,
            content,
            tool_calls: Vec::new(),
            tool_call_id: Some(result.call_id.clone()),
        }
    }
}

/// Tool advertised to the model. `parameters` is a JSON Schema object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One inference response: assistant text plus zero or more tool calls.
#[derive(Debug, Clone, Default)]
pub struct ChatReply {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Conversational inference backend.
#[async_trait]
pub trait Chatter: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], tools: &[ToolSpec])
    -> anyhow::Result<ChatReply>;
}

/// Speech-recognition backend. Consumes the transient WAV container written
/// by the capture controller; the file is discarded by the caller afterwards.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, wav: &Path) -> anyhow::Result<String>;
}

/// Web-search backend. Returns text already formatted for the model.
#[async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, query: &str) -> anyhow::Result<String>;
}

/// One speech-synthesis tier.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> anyhow::Result<AudioClip>;
}

/// Captured microphone audio: mono, single-precision samples.
#[derive(Debug, Clone)]
pub struct RecordedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl RecordedAudio {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Microphone seam. `start`/`stop` are quick, synchronous device operations;
/// the capture controller owns all timing.
pub trait Recorder: Send + Sync {
    fn start(&self) -> anyhow::Result<()>;
    fn stop(&self) -> anyhow::Result<RecordedAudio>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_audio_duration() {
        let audio = RecordedAudio {
            samples: vec![0.0; 8000],
            sample_rate: 16_000,
        };
        assert_eq!(audio.duration(), Duration::from_millis(500));
    }

    #[test]
    fn error_results_are_marked_for_the_model() {
        let msg = ChatMessage::tool_result(&ToolCallResult::error("c1", "unknown tool: dance"));
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("c1"));
        assert!(msg.content.starts_with("ERROR:"));
    }
}
