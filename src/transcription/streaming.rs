use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::{EngineKind, Transcriber, Transcript};
use crate::audio::AudioTrack;
use crate::config::TranscriptionConfig;

/// One recognition session fed with consecutive PCM blocks.
#[async_trait]
pub trait StreamingRecognizer: Send {
    /// Feeds one block. Returns `true` when the recognizer closed an utterance.
    async fn accept_waveform(&mut self, block: &[i16]) -> anyhow::Result<bool>;

    /// Text of the utterance closed by the last `accept_waveform`.
    async fn result(&mut self) -> anyhow::Result<String>;

    /// Flushes whatever is still buffered and ends the session.
    async fn final_result(&mut self) -> anyhow::Result<String>;
}

/// A loaded language model that can open recognizer sessions.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn recognizer(&self, sample_rate: u32) -> anyhow::Result<Box<dyn StreamingRecognizer>>;

    fn name(&self) -> &str;
}

pub struct StreamingTranscriber {
    model: Option<Arc<dyn LanguageModel>>,
    block_samples: usize,
}

impl StreamingTranscriber {
    pub fn new(model: Option<Arc<dyn LanguageModel>>, config: &TranscriptionConfig) -> Self {
        Self {
            model,
            block_samples: config.block_samples.max(1),
        }
    }

    async fn run(&self, model: &dyn LanguageModel, track: &AudioTrack) -> anyhow::Result<String> {
        let mut recognizer = model.recognizer(track.sample_rate).await?;
        let pcm = track.to_i16();

        let mut pieces: Vec<String> = Vec::new();
        for (index, block) in pcm.chunks(self.block_samples).enumerate() {
            if recognizer.accept_waveform(block).await? {
                let text = recognizer.result().await?;
                debug!(block = index, chars = text.len(), "Utterance boundary");
                pieces.push(text);
            }
        }
        pieces.push(recognizer.final_result().await?);

        let text = pieces
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(text)
    }
}

#[async_trait]
impl Transcriber for StreamingTranscriber {
    fn kind(&self) -> EngineKind {
        EngineKind::Streaming
    }

    async fn transcribe(&self, track: &AudioTrack) -> Transcript {
        let Some(model) = self.model.as_ref() else {
            warn!("No language model loaded, streaming transcription unavailable");
            return Transcript::unavailable(EngineKind::Streaming, "no language model loaded");
        };
        if track.channels != 1 {
            warn!(channels = track.channels, "Streaming transcription expects mono input");
            return Transcript::unavailable(EngineKind::Streaming, "track is not mono");
        }

        info!(
            model = model.name(),
            block_samples = self.block_samples,
            frames = track.frames(),
            "Streaming transcription started"
        );
        match self.run(model.as_ref(), track).await {
            Ok(text) => Transcript::from_text(EngineKind::Streaming, text),
            Err(e) => {
                error!(error = %e, "Streaming recognition failed");
                Transcript::unavailable(EngineKind::Streaming, e.to_string())
            }
        }
    }
}
