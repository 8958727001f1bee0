use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::align::{DurationAligner, StretchDecision};
use super::assemble::{DubAssembler, DubbedVideo};
use crate::audio::{AudioNormalizer, SilenceAnalyzer};
use crate::config::RedubConfig;
use crate::error::DubError;
use crate::media::{FfmpegCodec, MediaCodec, ScratchArea};
use crate::services::{HttpSynthesizer, LanguageCode, LibreTranslateClient, SpeechSynthesizer, Translator};
use crate::transcription::{build_transcriber, Transcriber, Transcript};

#[derive(Debug, Clone, PartialEq)]
pub struct DubRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub target_language: LanguageCode,
}

/// What a successful run produced and the decisions taken on the way.
#[derive(Debug, Clone, Serialize)]
pub struct DubReport {
    pub video: DubbedVideo,
    pub transcript: Transcript,
    pub translated_text: String,
    pub onset_seconds: f64,
    pub target_duration: f64,
    pub stretch: StretchDecision,
}

/// Sequential re-dubbing run over injected collaborators.
///
/// Holds no per-run state, so one pipeline can be shared behind an `Arc`.
#[derive(Clone)]
pub struct DubPipeline {
    codec: Arc<dyn MediaCodec>,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    normalizer: AudioNormalizer,
    analyzer: SilenceAnalyzer,
    aligner: DurationAligner,
    assembler: DubAssembler,
    scratch: ScratchArea,
}

impl DubPipeline {
    pub fn new(
        config: &RedubConfig,
        codec: Arc<dyn MediaCodec>,
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            assembler: DubAssembler::new(codec.clone()),
            codec,
            transcriber,
            translator,
            synthesizer,
            normalizer: AudioNormalizer::new(&config.analysis),
            analyzer: SilenceAnalyzer::new(&config.analysis),
            aligner: DurationAligner::new(&config.alignment),
            scratch: ScratchArea::new(&config.scratch),
        }
    }

    /// Wires the ffmpeg codec and the configured HTTP/websocket services.
    pub fn from_config(config: &RedubConfig) -> Result<Self, DubError> {
        config.validate()?;
        Ok(Self::new(
            config,
            Arc::new(FfmpegCodec::new(&config.media)),
            build_transcriber(&config.transcription)?,
            Arc::new(LibreTranslateClient::new(&config.translation)),
            Arc::new(HttpSynthesizer::new(&config.synthesis)),
        ))
    }

    pub async fn run(&self, request: &DubRequest) -> Result<DubReport, DubError> {
        let started = Instant::now();
        info!(
            input = %request.input.display(),
            output = %request.output.display(),
            language = %request.target_language,
            engine = %self.transcriber.kind(),
            "Starting dub run"
        );

        let scratch = self.scratch.session()?;
        debug!(id = %scratch.id(), "Run scratch ready");

        // 1. Decode
        let decoded = self.codec.read_video(&request.input, &scratch).await?;
        let target_duration = if decoded.duration_seconds.is_finite() && decoded.duration_seconds > 0.0 {
            decoded.duration_seconds
        } else {
            decoded.audio.duration_secs()
        };

        // 2. Normalize
        let normalizer = self.normalizer.clone();
        let source = decoded.audio;
        let normalized = tokio::task::spawn_blocking(move || normalizer.normalize(&source))
            .await
            .map_err(|e| DubError::task("normalization", e))??;

        // 3. Transcribe
        let transcript = self.transcriber.transcribe(&normalized).await;
        let text = transcript.clone().into_text()?;
        info!(engine = %transcript.engine(), chars = text.len(), "Transcript ready");

        // 4. Translate
        let translated_text = self
            .translator
            .translate(&text, &request.target_language)
            .await
            .map_err(|e| DubError::Translation(format!("{:#}", e)))?;
        if translated_text.trim().is_empty() {
            return Err(DubError::Translation("translator returned empty text".into()));
        }

        // 5. Onset
        let silence = self.analyzer.detect_onset(&normalized);
        if !silence.has_speech() {
            warn!("No audible region in source audio, dub starts at 0s");
        }
        let onset_seconds = silence.onset_seconds;
        drop(normalized);

        // 6. Synthesize
        let speech = self
            .synthesizer
            .synthesize(&translated_text, &request.target_language)
            .await
            .map_err(|e| DubError::Synthesis(format!("{:#}", e)))?;

        // 7. Align
        let aligner = self.aligner.clone();
        let aligned = tokio::task::spawn_blocking(move || {
            aligner.align(&speech, target_duration, onset_seconds)
        })
        .await
        .map_err(|e| DubError::task("alignment", e))?;

        // 8. Assemble
        let video = self
            .assembler
            .assemble(&decoded.video, &aligned, &request.output, &scratch)
            .await?;

        info!(
            output = %video.path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dub run complete"
        );
        Ok(DubReport {
            video,
            transcript,
            translated_text,
            onset_seconds,
            target_duration,
            stretch: aligned.stretch,
        })
    }
}
