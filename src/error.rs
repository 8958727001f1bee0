use thiserror::Error;

use crate::transcription::EngineKind;

/// Failure reasons a dub run can end with.
///
/// Every variant is fatal for the run that produced it. Non-fatal
/// conditions (no speech found, degenerate alignment window) are
/// recorded in the run report instead of being raised.
#[derive(Debug, Error)]
pub enum DubError {
    #[error("could not decode source media: {0}")]
    Decode(String),

    #[error("transcription failed ({engine}): {reason}")]
    TranscriptionFailure { engine: EngineKind, reason: String },

    #[error("translation failed: {0}")]
    Translation(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("could not assemble dubbed video: {0}")]
    Mux(String),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("dub run timed out after {0}s")]
    Timeout(u64),

    #[error("{stage} worker failed: {reason}")]
    Task { stage: &'static str, reason: String },
}

impl DubError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    pub(crate) fn mux(err: impl std::fmt::Display) -> Self {
        Self::Mux(err.to_string())
    }

    /// A blocking worker panicked or was cancelled.
    pub(crate) fn task(stage: &'static str, err: tokio::task::JoinError) -> Self {
        Self::Task {
            stage,
            reason: err.to_string(),
        }
    }

    /// Short machine-readable tag for logs and the CLI exit message.
    pub fn kind(&self) -> &'static str {
        match self {
            DubError::Decode(_) => "decode_error",
            DubError::TranscriptionFailure { .. } => "transcription_failure",
            DubError::Translation(_) => "translation_error",
            DubError::Synthesis(_) => "synthesis_error",
            DubError::Mux(_) => "mux_error",
            DubError::Io { .. } => "io_error",
            DubError::Config(_) => "config_error",
            DubError::Timeout(_) => "timeout",
            DubError::Task { .. } => "task_failure",
        }
    }
}

pub type Result<T> = std::result::Result<T, DubError>;
