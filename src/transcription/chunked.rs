use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::{EngineKind, Transcriber, Transcript};
use crate::audio::AudioTrack;
use crate::config::TranscriptionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeParams {
    pub beam_width: usize,
    pub max_tokens: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            beam_width: 5,
            max_tokens: 500,
        }
    }
}

/// A sequence-to-sequence speech model that decodes one window at a time.
#[async_trait]
pub trait Seq2SeqModel: Send + Sync {
    /// Decodes mono PCM at `sample_rate` into text.
    async fn decode(
        &self,
        window: &[f32],
        sample_rate: u32,
        params: &DecodeParams,
    ) -> anyhow::Result<String>;

    fn name(&self) -> &str;
}

/// Splits the track into fixed windows and decodes them in order.
///
/// Windows share no context; an utterance cut at a boundary is decoded as
/// two halves.
pub struct ChunkedTranscriber {
    model: Arc<dyn Seq2SeqModel>,
    chunk_seconds: u32,
    params: DecodeParams,
}

impl ChunkedTranscriber {
    pub fn new(model: Arc<dyn Seq2SeqModel>, config: &TranscriptionConfig) -> Self {
        Self {
            model,
            chunk_seconds: config.chunk_seconds.max(1),
            params: DecodeParams {
                beam_width: config.beam_width,
                max_tokens: config.max_tokens,
            },
        }
    }

    pub fn window_len(&self, sample_rate: u32) -> usize {
        (self.chunk_seconds as usize * sample_rate as usize).max(1)
    }
}

#[async_trait]
impl Transcriber for ChunkedTranscriber {
    fn kind(&self) -> EngineKind {
        EngineKind::Chunked
    }

    async fn transcribe(&self, track: &AudioTrack) -> Transcript {
        if track.channels != 1 {
            warn!(channels = track.channels, "Chunked transcription expects mono input");
            return Transcript::unavailable(EngineKind::Chunked, "track is not mono");
        }
        if track.is_empty() {
            return Transcript::unavailable(EngineKind::Chunked, "track has no audio");
        }

        let window_len = self.window_len(track.sample_rate);
        let windows = track.samples.chunks(window_len);
        info!(
            model = self.model.name(),
            windows = windows.len(),
            chunk_seconds = self.chunk_seconds,
            "Transcribing in fixed windows"
        );

        // Strictly sequential: window order is text order.
        let mut pieces = Vec::with_capacity(windows.len());
        for (index, window) in windows.enumerate() {
            match self.model.decode(window, track.sample_rate, &self.params).await {
                Ok(text) => {
                    let text = text.trim();
                    debug!(window = index, chars = text.len(), "Window decoded");
                    if !text.is_empty() {
                        pieces.push(text.to_string());
                    }
                }
                Err(e) => {
                    error!(window = index, error = %e, "Window decode failed");
                    return Transcript::unavailable(
                        EngineKind::Chunked,
                        format!("window {} failed: {}", index, e),
                    );
                }
            }
        }

        Transcript::from_text(EngineKind::Chunked, pieces.join(" "))
    }
}
