use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::LanguageCode;
use crate::audio::wav;
use crate::config::SynthesisConfig;
use crate::dub::align::SynthesizedSpeech;

/// Text-to-speech in a given language.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &LanguageCode) -> Result<SynthesizedSpeech>;
}

/// TTS server that answers `POST {base_url}/synthesize` with a WAV body.
#[derive(Clone)]
pub struct HttpSynthesizer {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    language: &'a str,
    format: &'a str,
}

impl HttpSynthesizer {
    pub fn new(config: &SynthesisConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, language: &LanguageCode) -> Result<SynthesizedSpeech> {
        let response = self
            .client
            .post(format!("{}/synthesize", self.base_url))
            .json(&SynthesizeRequest {
                text,
                language: language.as_str(),
                format: "wav",
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("TTS server error: {}", response.status()));
        }

        let bytes = response.bytes().await?;
        let track = wav::decode_wav(&bytes)?;
        debug!(
            language = %language,
            sample_rate = track.sample_rate,
            seconds = track.duration_secs(),
            "Speech synthesized"
        );
        Ok(SynthesizedSpeech::new(track))
    }
}
