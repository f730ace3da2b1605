//! ElevenLabs text-to-speech client — the secondary tier.

use crate::{truncate_body, TtsError};
use async_trait::async_trait;
use cortex::Synthesizer;
use robot::AudioClip;
use serde::Serialize;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_MODEL: &str = "eleven_monolingual_v1";

/// Client for the ElevenLabs `/v1/text-to-speech/{voice}` endpoint. Returns
/// MP3 audio.
#[derive(Clone)]
pub struct ElevenLabsTts {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    voice_id: String,
    model_id: String,
}

impl ElevenLabsTts {
    pub fn new(api_key: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            voice_id: voice_id.into(),
            model_id: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub async fn speech(&self, text: &str) -> Result<AudioClip, TtsError> {
        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.base_url.trim_end_matches('/'),
            self.voice_id
        );
        debug!(%url, chars = text.len(), "synthesis request");
        let response = self
            .client
            .post(url)
            .header("xi-api-key", &self.api_key)
            .json(&SpeechRequest {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = truncate_body(response.text().await.unwrap_or_default());
            warn!(status = status.as_u16(), %message, "synthesis rejected");
            return Err(TtsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let audio = response.bytes().await?;
        Ok(AudioClip::mp3(audio.to_vec()))
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsTts {
    async fn synthesize(&self, text: &str) -> anyhow::Result<AudioClip> {
        Ok(self.speech(text).await?)
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_the_wire_shape() {
        let body = serde_json::to_value(SpeechRequest {
            text: "hello",
            model_id: DEFAULT_MODEL,
        })
        .unwrap();
        assert_eq!(body["text"], "hello");
        assert_eq!(body["model_id"], "eleven_monolingual_v1");
    }
}
