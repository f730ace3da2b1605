//! HTTP clients for the inference and speech-recognition backends.
//!
//! Both clients speak the OpenAI-compatible wire protocol, so any hosted
//! provider exposing `/chat/completions` and `/audio/transcriptions` plugs in
//! via its base URL. They implement the `cortex` backend traits
//! ([`cortex::Chatter`] and [`cortex::Transcriber`]).

pub mod chat;
pub mod transcribe;

pub use chat::ChatClient;
pub use transcribe::WhisperTranscriber;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("response contained no choices")]
    EmptyResponse,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Keep provider error bodies readable in logs and chat-visible errors.
pub(crate) fn truncate_body(body: String) -> String {
    const MAX: usize = 300;
    if body.len() <= MAX {
        return body;
    }
    let mut cut = MAX;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &body[..cut])
}
