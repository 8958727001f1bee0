#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use redub::audio::AudioTrack;
use redub::config::{MediaConfig, ScratchConfig};
use redub::media::{FfmpegCodec, MediaCodec, ScratchArea, VideoStream};

/// Stand-in encoder: waits, writes its last argument, exits with `status`.
fn fake_ffmpeg(dir: &Path, delay_secs: u32, status: i32) -> PathBuf {
    let path = dir.join(format!("ffmpeg_{}_{}.sh", delay_secs, status));
    let script = format!(
        "#!/bin/sh\nsleep {}\nfor last; do :; done\nprintf 'muxed' > \"$last\"\nexit {}\n",
        delay_secs, status
    );
    std::fs::write(&path, script).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

fn codec(ffmpeg: PathBuf) -> FfmpegCodec {
    FfmpegCodec::new(&MediaConfig {
        ffmpeg_path: ffmpeg,
        ..MediaConfig::default()
    })
}

struct Fixture {
    tmp: tempfile::TempDir,
    out_dir: PathBuf,
    area: ScratchArea,
    video: VideoStream,
    audio: AudioTrack,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().expect("tempdir");
    let out_dir = tmp.path().join("out");
    std::fs::create_dir(&out_dir).expect("out dir");
    let area = ScratchArea::new(&ScratchConfig {
        root: tmp.path().join("scratch"),
        keep_intermediates: false,
    });
    Fixture {
        video: VideoStream {
            source: tmp.path().join("talk.mp4"),
            has_visual: true,
        },
        audio: AudioTrack::mono(vec![0.0; 1_600], 16_000),
        out_dir,
        area,
        tmp,
    }
}

fn entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("readable dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn test_finished_mux_lands_under_final_name() {
    let f = fixture();
    let codec = codec(fake_ffmpeg(f.tmp.path(), 0, 0));
    let scratch = f.area.session().expect("scratch");
    let output = f.out_dir.join("translated_talk.mp4");

    codec
        .write_video(&output, &f.video, &f.audio, &scratch)
        .await
        .expect("mux succeeds");

    assert_eq!(std::fs::read_to_string(&output).expect("output"), "muxed");
    assert_eq!(entries(&f.out_dir), vec!["translated_talk.mp4".to_string()]);
}

#[tokio::test]
async fn test_failed_mux_leaves_nothing_behind() {
    let f = fixture();
    let codec = codec(fake_ffmpeg(f.tmp.path(), 0, 1));
    let scratch = f.area.session().expect("scratch");
    let output = f.out_dir.join("translated_talk.mp4");

    let err = codec
        .write_video(&output, &f.video, &f.audio, &scratch)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "mux_error");
    assert!(entries(&f.out_dir).is_empty());
}

#[tokio::test]
async fn test_timed_out_mux_never_publishes_output() {
    let f = fixture();
    let codec = codec(fake_ffmpeg(f.tmp.path(), 1, 0));
    let scratch = f.area.session().expect("scratch");
    let output = f.out_dir.join("translated_talk.mp4");

    let result = tokio::time::timeout(
        Duration::from_millis(200),
        codec.write_video(&output, &f.video, &f.audio, &scratch),
    )
    .await;
    assert!(result.is_err(), "mux should still be running at the deadline");

    // Give a surviving encoder time to write, had it not been killed.
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(!output.exists());
    assert!(entries(&f.out_dir).is_empty(), "{:?}", entries(&f.out_dir));
}
