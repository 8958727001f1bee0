use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::chunked::{DecodeParams, Seq2SeqModel};
use crate::audio::{wav, AudioTrack};

/// Seq2seq model served by a whisper inference server.
///
/// Each window is posted as a 16-bit mono WAV to `{base_url}/inference`.
#[derive(Clone)]
pub struct WhisperServerModel {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct InferenceResponse {
    text: String,
}

impl WhisperServerModel {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Seq2SeqModel for WhisperServerModel {
    async fn decode(&self, window: &[f32], sample_rate: u32, params: &DecodeParams) -> Result<String> {
        let wav_data = wav::encode_wav(&AudioTrack::mono(window.to_vec(), sample_rate))?;

        let part = Part::bytes(wav_data)
            .file_name("window.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .part("file", part)
            .text("response_format", "json")
            .text("temperature", "0.0")
            .text("beam_size", params.beam_width.to_string())
            .text("max_tokens", params.max_tokens.to_string());

        let response = self
            .client
            .post(format!("{}/inference", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Inference server error: {}", response.status()));
        }

        let body: InferenceResponse = response.json().await?;
        Ok(body.text.trim().to_string())
    }

    fn name(&self) -> &str {
        "whisper_server"
    }
}
