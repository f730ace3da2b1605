//! Whisper-style transcription over the multipart upload endpoint.

use crate::{truncate_body, LlmError};
use async_trait::async_trait;
use cortex::Transcriber;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint.
#[derive(Clone)]
pub struct WhisperTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    language: Option<String>,
}

impl WhisperTranscriber {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            language: None,
        }
    }

    /// Pin the transcription language (ISO 639-1 code).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Upload the WAV container at `wav` and return the transcript.
    pub async fn transcribe_file(&self, wav: &Path) -> Result<String, LlmError> {
        let audio = tokio::fs::read(wav).await?;
        debug!(bytes = audio.len(), model = %self.model, "transcribing");

        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let url = format!(
            "{}/audio/transcriptions",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = truncate_body(response.text().await.unwrap_or_default());
            warn!(status = status.as_u16(), %message, "transcription rejected");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, wav: &Path) -> anyhow::Result<String> {
        Ok(self.transcribe_file(wav).await?)
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_transcription_body() {
        let parsed: TranscriptionResponse =
            serde_json::from_str(r#"{"text": "hello robot"}"#).unwrap();
        assert_eq!(parsed.text, "hello robot");
    }
}
