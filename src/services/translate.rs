use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LanguageCode;
use crate::config::TranslationConfig;

/// Opaque text-to-text translation.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: &LanguageCode) -> Result<String>;
}

/// Client for a LibreTranslate-compatible `/translate` endpoint.
#[derive(Clone)]
pub struct LibreTranslateClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl LibreTranslateClient {
    pub fn new(config: &TranslationConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Translator for LibreTranslateClient {
    async fn translate(&self, text: &str, target: &LanguageCode) -> Result<String> {
        let request_body = TranslateRequest {
            q: text,
            source: "auto",
            target: target.as_str(),
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Translation server error: {}", response.status()));
        }

        let body: TranslateResponse = response.json().await?;
        debug!(target = %target, chars = body.translated_text.len(), "Translation received");
        Ok(body.translated_text.trim().to_string())
    }
}
