//! Container decode/encode.

pub mod ffmpeg;
pub mod scratch;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::audio::AudioTrack;
use crate::error::DubError;

pub use ffmpeg::FfmpegCodec;
pub use scratch::{ScratchArea, ScratchDir};

/// Read-only handle to the visual stream of an input container.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoStream {
    pub source: PathBuf,
    pub has_visual: bool,
}

#[derive(Debug, Clone)]
pub struct DecodedVideo {
    pub video: VideoStream,
    pub audio: AudioTrack,
    pub duration_seconds: f64,
}

#[async_trait]
pub trait MediaCodec: Send + Sync {
    /// Fails with [`DubError::Decode`].
    async fn read_video(&self, path: &Path, scratch: &ScratchDir) -> Result<DecodedVideo, DubError>;

    /// Fails with [`DubError::Mux`]. No partial output is left behind.
    async fn write_video(
        &self,
        path: &Path,
        video: &VideoStream,
        audio: &AudioTrack,
        scratch: &ScratchDir,
    ) -> Result<(), DubError>;
}
