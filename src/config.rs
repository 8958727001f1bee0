use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::DubError;
use crate::transcription::EngineKind;

/// Top-level configuration, handed to each component at construction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedubConfig {
    pub scratch: ScratchConfig,
    pub media: MediaConfig,
    pub analysis: AnalysisConfig,
    pub transcription: TranscriptionConfig,
    pub translation: TranslationConfig,
    pub synthesis: SynthesisConfig,
    pub alignment: AlignmentConfig,
    /// Caller-level timeout wrapped around one whole dub run.
    pub run_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    /// Root under which each run gets its own unique directory.
    pub root: PathBuf,
    /// Skip cleanup of the per-run directory (debugging aid).
    pub keep_intermediates: bool,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("processed"),
            keep_intermediates: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub audio_codec: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            audio_codec: "aac".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub sample_rate: u32,
    pub silence_threshold_db: f32,
    pub frame_ms: u32,
    pub min_silence_run_ms: u32,
    /// Input frames per resampler call.
    pub resample_chunk_frames: usize,
}

impl AnalysisConfig {
    pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 16_000;
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: Self::DEFAULT_SAMPLE_RATE_HZ,
            silence_threshold_db: -50.0,
            frame_ms: 10,
            min_silence_run_ms: 10,
            resample_chunk_frames: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub engine: EngineKind,
    pub chunk_seconds: u32,
    pub beam_width: usize,
    pub max_tokens: usize,
    pub block_samples: usize,
    /// Seq2seq inference server (chunked engine).
    pub whisper_url: Option<String>,
    /// Vosk-protocol websocket server (streaming engine).
    pub vosk_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Chunked,
            chunk_seconds: 30,
            beam_width: 5,
            max_tokens: 500,
            block_samples: 4000,
            whisper_url: Some("http://localhost:8178".to_string()),
            vosk_url: None,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5002".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    /// Optional clamp on the stretch factor. `None` accepts any factor.
    pub stretch_limits: Option<StretchLimits>,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            stretch_limits: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StretchLimits {
    pub min: f64,
    pub max: f64,
}

impl StretchLimits {
    pub fn clamp(&self, factor: f64) -> f64 {
        factor.clamp(self.min, self.max)
    }
}

impl RedubConfig {
    /// Loads the JSON file at `path` (defaults when `None`), then applies
    /// `REDUB_*` environment overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, DubError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| DubError::io("reading config file", e))?;
                let config: RedubConfig = serde_json::from_str(&raw)
                    .map_err(|e| DubError::Config(format!("{}: {}", path.display(), e)))?;
                info!(path = %path.display(), "Loaded configuration file");
                config
            }
            None => RedubConfig::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), DubError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("REDUB_SCRATCH_DIR") {
            self.scratch.root = PathBuf::from(root);
        }
        if let Some(engine) = lookup("REDUB_ENGINE") {
            self.transcription.engine = engine.parse()?;
        }
        if let Some(ffmpeg) = lookup("REDUB_FFMPEG") {
            self.media.ffmpeg_path = PathBuf::from(ffmpeg);
        }
        if let Some(ffprobe) = lookup("REDUB_FFPROBE") {
            self.media.ffprobe_path = PathBuf::from(ffprobe);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DubError> {
        let a = &self.analysis;
        if a.sample_rate == 0 || a.frame_ms == 0 || a.resample_chunk_frames == 0 {
            return Err(DubError::Config(
                "analysis sample_rate, frame_ms and resample_chunk_frames must be positive".into(),
            ));
        }

        let t = &self.transcription;
        if t.chunk_seconds == 0 || t.block_samples == 0 || t.beam_width == 0 {
            return Err(DubError::Config(
                "transcription chunk_seconds, block_samples and beam_width must be positive".into(),
            ));
        }

        let al = &self.alignment;
        if al.n_fft < 2 || al.hop_length == 0 || al.hop_length > al.n_fft {
            return Err(DubError::Config(format!(
                "alignment needs 0 < hop_length <= n_fft (got hop {} / n_fft {})",
                al.hop_length, al.n_fft
            )));
        }
        if let Some(limits) = al.stretch_limits {
            if !(limits.min > 0.0 && limits.min <= limits.max) {
                return Err(DubError::Config(format!(
                    "stretch_limits must satisfy 0 < min <= max (got {} / {})",
                    limits.min, limits.max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_analysis_format() {
        let config = RedubConfig::default();
        assert_eq!(config.analysis.sample_rate, 16_000);
        assert_eq!(config.analysis.silence_threshold_db, -50.0);
        assert_eq!(config.analysis.min_silence_run_ms, 10);
        assert_eq!(config.transcription.engine, EngineKind::Chunked);
        assert_eq!(config.transcription.chunk_seconds, 30);
        assert_eq!(config.transcription.beam_width, 5);
        assert_eq!(config.transcription.max_tokens, 500);
        assert_eq!(config.transcription.block_samples, 4000);
        assert!(config.alignment.stretch_limits.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{
            "transcription": { "engine": "streaming", "vosk_url": "ws://localhost:2700" },
            "alignment": { "stretch_limits": { "min": 0.5, "max": 2.0 } },
            "run_timeout_secs": 900
        }"#;
        let config: RedubConfig = serde_json::from_str(json).expect("valid config json");
        assert_eq!(config.transcription.engine, EngineKind::Streaming);
        assert_eq!(config.transcription.block_samples, 4000);
        assert_eq!(config.analysis.frame_ms, 10);
        assert_eq!(config.run_timeout_secs, Some(900));
        let limits = config.alignment.stretch_limits.expect("limits parsed");
        assert_eq!(limits.clamp(3.5), 2.0);
        assert_eq!(limits.clamp(0.1), 0.5);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = RedubConfig::default();
        config
            .apply_overrides(|key| match key {
                "REDUB_ENGINE" => Some("streaming".to_string()),
                "REDUB_SCRATCH_DIR" => Some("/tmp/redub".to_string()),
                _ => None,
            })
            .expect("overrides valid");
        assert_eq!(config.transcription.engine, EngineKind::Streaming);
        assert_eq!(config.scratch.root, PathBuf::from("/tmp/redub"));
        assert_eq!(config.media.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn unknown_engine_override_is_rejected() {
        let mut config = RedubConfig::default();
        let err = config
            .apply_overrides(|key| (key == "REDUB_ENGINE").then(|| "wav2letter".to_string()))
            .unwrap_err();
        assert!(matches!(err, DubError::Config(_)));
    }

    #[test]
    fn inverted_stretch_limits_fail_validation() {
        let mut config = RedubConfig::default();
        config.alignment.stretch_limits = Some(StretchLimits { min: 2.0, max: 0.5 });
        assert!(config.validate().is_err());
    }
}
