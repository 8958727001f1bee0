//! Speech-to-text over normalized tracks.
//!
//! Two strategies sit behind [`Transcriber`]: fixed-window seq2seq decoding
//! ([`chunked`]) and block-fed streaming recognition ([`streaming`]). Which
//! one runs is a deployment decision made from configuration.

pub mod chunked;
pub mod streaming;
pub mod vosk_server;
pub mod whisper_server;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audio::AudioTrack;
use crate::config::TranscriptionConfig;
use crate::error::DubError;

pub use chunked::{ChunkedTranscriber, DecodeParams, Seq2SeqModel};
pub use streaming::{LanguageModel, StreamingRecognizer, StreamingTranscriber};
pub use vosk_server::VoskServerModel;
pub use whisper_server::WhisperServerModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Chunked,
    Streaming,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Chunked => f.write_str("chunked"),
            EngineKind::Streaming => f.write_str("streaming"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = DubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chunked" => Ok(EngineKind::Chunked),
            "streaming" => Ok(EngineKind::Streaming),
            other => Err(DubError::Config(format!(
                "unknown transcription engine '{}' (expected chunked or streaming)",
                other
            ))),
        }
    }
}

/// Result of one transcription attempt.
///
/// `Unavailable` is the "no transcription" signal; it can never be mistaken
/// for a transcript that happens to be short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transcript {
    Recognized { engine: EngineKind, text: String },
    Unavailable { engine: EngineKind, reason: String },
}

impl Transcript {
    /// Blank text becomes `Unavailable`.
    pub fn from_text(engine: EngineKind, text: impl Into<String>) -> Self {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            Transcript::unavailable(engine, "recognizer returned no text")
        } else {
            Transcript::Recognized { engine, text }
        }
    }

    pub fn unavailable(engine: EngineKind, reason: impl Into<String>) -> Self {
        Transcript::Unavailable {
            engine,
            reason: reason.into(),
        }
    }

    pub fn engine(&self) -> EngineKind {
        match self {
            Transcript::Recognized { engine, .. } | Transcript::Unavailable { engine, .. } => *engine,
        }
    }

    /// Empty for `Unavailable`.
    pub fn text(&self) -> &str {
        match self {
            Transcript::Recognized { text, .. } => text,
            Transcript::Unavailable { .. } => "",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Transcript::Unavailable { .. })
    }

    pub fn into_text(self) -> Result<String, DubError> {
        match self {
            Transcript::Recognized { text, .. } => Ok(text),
            Transcript::Unavailable { engine, reason } => {
                Err(DubError::TranscriptionFailure { engine, reason })
            }
        }
    }
}

/// A speech-to-text strategy.
///
/// Implementations never fail: model and decode errors are logged and
/// surface as [`Transcript::Unavailable`].
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn kind(&self) -> EngineKind;

    async fn transcribe(&self, track: &AudioTrack) -> Transcript;
}

/// Builds the configured strategy with its model runtime.
pub fn build_transcriber(config: &TranscriptionConfig) -> Result<Arc<dyn Transcriber>, DubError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    match config.engine {
        EngineKind::Chunked => {
            let url = config.whisper_url.as_deref().ok_or_else(|| {
                DubError::Config("chunked engine needs transcription.whisper_url".into())
            })?;
            info!(url, "Using chunked seq2seq transcription");
            let model = Arc::new(WhisperServerModel::new(url, timeout));
            Ok(Arc::new(ChunkedTranscriber::new(model, config)))
        }
        EngineKind::Streaming => {
            let model: Option<Arc<dyn LanguageModel>> = match config.vosk_url.as_deref() {
                Some(url) => {
                    info!(url, "Using streaming transcription");
                    Some(Arc::new(VoskServerModel::new(url)) as Arc<dyn LanguageModel>)
                }
                None => {
                    warn!("Streaming engine selected without transcription.vosk_url; runs will fail closed");
                    None
                }
            };
            Ok(Arc::new(StreamingTranscriber::new(model, config)))
        }
    }
}
