//! Hosted speech-synthesis tiers.
//!
//! Each client turns text into an [`robot::AudioClip`] and implements
//! [`cortex::Synthesizer`]; the speaker in `cortex` owns tier ordering,
//! deadlines and the built-in-voice fallback. Clients here are stateless per
//! call: a tier that was rate-limited for one utterance is tried fresh for
//! the next.

pub mod elevenlabs;
pub mod hosted;

pub use elevenlabs::ElevenLabsTts;
pub use hosted::HostedTts;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Keep provider error bodies readable in logs.
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
