//! OpenAI-compatible `/audio/speech` client — the primary tier.

use crate::{truncate_body, TtsError};
use async_trait::async_trait;
use cortex::Synthesizer;
use robot::AudioClip;
use serde::Serialize;
use tracing::{debug, warn};

/// Client for a hosted `/audio/speech` endpoint returning WAV audio.
#[derive(Clone)]
pub struct HostedTts {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
}

impl HostedTts {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            voice: voice.into(),
        }
    }

    pub async fn speech(&self, text: &str) -> Result<AudioClip, TtsError> {
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        debug!(%url, voice = %self.voice, chars = text.len(), "synthesis request");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.model,
                voice: &self.voice,
                input: text,
                response_format: "wav",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = truncate_body(response.text().await.unwrap_or_default());
            // 429s land here too; the speaker falls through to the next tier.
            warn!(status = status.as_u16(), %message, "synthesis rejected");
            return Err(TtsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let audio = response.bytes().await?;
        Ok(AudioClip::wav(audio.to_vec()))
    }
}

#[async_trait]
impl Synthesizer for HostedTts {
    async fn synthesize(&self, text: &str) -> anyhow::Result<AudioClip> {
        Ok(self.speech(text).await?)
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_the_wire_shape() {
        let body = serde_json::to_value(SpeechRequest {
            model: "orpheus",
            voice: "hannah",
            input: "hello",
            response_format: "wav",
        })
        .unwrap();
        assert_eq!(body["voice"], "hannah");
        assert_eq!(body["response_format"], "wav");
    }
}
