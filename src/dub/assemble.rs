use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::align::AlignedSpeech;
use crate::error::DubError;
use crate::media::{MediaCodec, ScratchDir, VideoStream};

/// The finished output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DubbedVideo {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

/// Swaps the source audio for the aligned dub and writes the container.
#[derive(Clone)]
pub struct DubAssembler {
    codec: Arc<dyn MediaCodec>,
}

impl DubAssembler {
    pub fn new(codec: Arc<dyn MediaCodec>) -> Self {
        Self { codec }
    }

    pub async fn assemble(
        &self,
        video: &VideoStream,
        aligned: &AlignedSpeech,
        output: &Path,
        scratch: &ScratchDir,
    ) -> Result<DubbedVideo, DubError> {
        if !video.has_visual {
            return Err(DubError::Mux(format!(
                "{} has no visual stream to keep",
                video.source.display()
            )));
        }
        if same_file(output, &video.source) {
            return Err(DubError::Mux("output path would overwrite the input video".into()));
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DubError::Mux(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        if let Err(e) = self
            .codec
            .write_video(output, video, &aligned.track, scratch)
            .await
        {
            remove_partial(output);
            return Err(e);
        }

        let dubbed = DubbedVideo {
            path: output.to_path_buf(),
            duration_seconds: aligned.duration_secs(),
        };
        info!(path = %dubbed.path.display(), duration_seconds = dubbed.duration_seconds, "Dubbed video written");
        Ok(dubbed)
    }
}

/// Resolves `.`/`..` and symlinks when both paths exist.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn remove_partial(output: &Path) {
    if !output.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_file(output) {
        warn!(path = %output.display(), error = %e, "Failed to remove partial output");
    }
}
