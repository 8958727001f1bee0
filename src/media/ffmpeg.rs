use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DecodedVideo, MediaCodec, ScratchDir, VideoStream};
use crate::audio::{wav, AudioTrack};
use crate::config::MediaConfig;
use crate::error::DubError;

/// Container codec backed by the `ffmpeg` / `ffprobe` executables.
#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    audio_codec: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ProbeSummary {
    duration: Option<f64>,
    has_video: bool,
    has_audio: bool,
}

impl ProbeOutput {
    fn summarize(&self) -> ProbeSummary {
        let has = |kind: &str| {
            self.streams
                .iter()
                .any(|s| s.codec_type.as_deref() == Some(kind))
        };
        ProbeSummary {
            duration: self
                .format
                .duration
                .as_deref()
                .and_then(|d| d.trim().parse::<f64>().ok())
                .filter(|d| d.is_finite() && *d > 0.0),
            has_video: has("video"),
            has_audio: has("audio"),
        }
    }
}

impl FfmpegCodec {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            audio_codec: config.audio_codec.clone(),
        }
    }

    async fn probe(&self, path: &Path) -> Result<ProbeSummary> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-show_entries", "format=duration:stream=codec_type", "-of", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to launch {}", self.ffprobe.display()))?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            ));
        }

        let parsed: ProbeOutput =
            serde_json::from_slice(&output.stdout).context("unreadable ffprobe output")?;
        Ok(parsed.summarize())
    }

    async fn ffmpeg(&self, args: &[&OsStr]) -> Result<()> {
        debug!(program = %self.ffmpeg.display(), ?args, "Running ffmpeg");
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-y", "-loglevel", "error"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to launch {}", self.ffmpeg.display()))?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaCodec for FfmpegCodec {
    async fn read_video(&self, path: &Path, scratch: &ScratchDir) -> Result<DecodedVideo, DubError> {
        if !path.is_file() {
            return Err(DubError::Decode(format!("{} is not a readable file", path.display())));
        }

        let probe = self.probe(path).await.map_err(DubError::decode)?;
        if !probe.has_audio {
            return Err(DubError::Decode(format!("{} has no audio stream", path.display())));
        }
        if !probe.has_video {
            warn!(path = %path.display(), "Input has no visual stream");
        }

        let wav_path = scratch.file("source_audio.wav");
        self.ffmpeg(&[
            OsStr::new("-i"),
            path.as_os_str(),
            OsStr::new("-vn"),
            OsStr::new("-acodec"),
            OsStr::new("pcm_s16le"),
            wav_path.as_os_str(),
        ])
        .await
        .map_err(DubError::decode)?;

        let audio = wav::read_wav_file(&wav_path).map_err(DubError::decode)?;
        let duration_seconds = probe.duration.unwrap_or_else(|| audio.duration_secs());
        info!(
            path = %path.display(),
            duration_seconds,
            sample_rate = audio.sample_rate,
            channels = audio.channels,
            "Decoded source media"
        );

        Ok(DecodedVideo {
            video: VideoStream {
                source: path.to_path_buf(),
                has_visual: probe.has_video,
            },
            audio,
            duration_seconds,
        })
    }

    async fn write_video(
        &self,
        path: &Path,
        video: &VideoStream,
        audio: &AudioTrack,
        scratch: &ScratchDir,
    ) -> Result<(), DubError> {
        let wav_path = scratch.file("dub_audio.wav");
        wav::write_wav_file(&wav_path, audio).map_err(DubError::mux)?;

        // ffmpeg writes next to the destination; the file only appears under
        // its final name once the mux has finished.
        let staged = StagedOutput::new(path)?;
        self.ffmpeg(&[
            OsStr::new("-i"),
            video.source.as_os_str(),
            OsStr::new("-i"),
            wav_path.as_os_str(),
            OsStr::new("-map"),
            OsStr::new("0:v:0"),
            OsStr::new("-map"),
            OsStr::new("1:a:0"),
            OsStr::new("-c:v"),
            OsStr::new("copy"),
            OsStr::new("-c:a"),
            OsStr::new(&self.audio_codec),
            OsStr::new("-shortest"),
            staged.path().as_os_str(),
        ])
        .await
        .map_err(DubError::mux)?;
        staged.commit()?;

        info!(path = %path.display(), "Muxed dubbed video");
        Ok(())
    }
}

/// Temporary sibling of an output file, removed on drop unless committed.
struct StagedOutput {
    staging: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedOutput {
    fn new(target: &Path) -> Result<Self, DubError> {
        let name = target
            .file_name()
            .ok_or_else(|| DubError::Mux(format!("{} has no file name", target.display())))?;
        let staged_name = format!(".redub-{}-{}", Uuid::new_v4(), name.to_string_lossy());
        Ok(Self {
            staging: target.with_file_name(staged_name),
            target: target.to_path_buf(),
            committed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.staging
    }

    fn commit(mut self) -> Result<(), DubError> {
        std::fs::rename(&self.staging, &self.target).map_err(|e| {
            DubError::Mux(format!("cannot move output into {}: {}", self.target.display(), e))
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedOutput {
    fn drop(&mut self) {
        if self.committed || !self.staging.exists() {
            return;
        }
        match std::fs::remove_file(&self.staging) {
            Ok(()) => debug!(path = %self.staging.display(), "Removed unfinished output"),
            Err(e) => warn!(path = %self.staging.display(), error = %e, "Failed to remove unfinished output"),
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(3);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_json_is_summarized() {
        let json = br#"{
            "programs": [],
            "streams": [ { "codec_type": "video" }, { "codec_type": "audio" } ],
            "format": { "duration": "12.011000" }
        }"#;
        let parsed: ProbeOutput = serde_json::from_slice(json).expect("valid probe json");
        let summary = parsed.summarize();
        assert!(summary.has_video && summary.has_audio);
        assert_eq!(summary.duration, Some(12.011));
    }

    #[test]
    fn missing_duration_is_none() {
        let json = br#"{ "streams": [ { "codec_type": "audio" } ], "format": { "duration": "N/A" } }"#;
        let parsed: ProbeOutput = serde_json::from_slice(json).expect("valid probe json");
        let summary = parsed.summarize();
        assert!(!summary.has_video);
        assert_eq!(summary.duration, None);
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let tail = stderr_tail(b"one\n\ntwo\nthree\nfour\n");
        assert_eq!(tail, "two | three | four");
    }
}
