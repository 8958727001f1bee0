use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::track::AudioTrack;
use crate::config::AnalysisConfig;

/// Half-open `[start_ms, end_ms)` span of audible signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonSilentInterval {
    pub start_ms: u64,
    pub end_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilenceReport {
    /// Ordered, non-overlapping.
    pub intervals: Vec<NonSilentInterval>,
    pub onset_seconds: f64,
}

impl SilenceReport {
    fn from_intervals(intervals: Vec<NonSilentInterval>) -> Self {
        let onset_seconds = intervals
            .first()
            .map(|i| i.start_ms as f64 / 1000.0)
            .unwrap_or(0.0);
        Self {
            intervals,
            onset_seconds,
        }
    }

    pub fn has_speech(&self) -> bool {
        !self.intervals.is_empty()
    }
}

/// Energy-based scan for where audible signal begins.
#[derive(Debug, Clone)]
pub struct SilenceAnalyzer {
    threshold_db: f32,
    frame_ms: u32,
    min_silence_run_ms: u32,
}

impl SilenceAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            threshold_db: config.silence_threshold_db,
            frame_ms: config.frame_ms.max(1),
            min_silence_run_ms: config.min_silence_run_ms,
        }
    }

    /// Default 10 ms frames; `min_silence_run_ms` only controls absorption.
    pub fn with_threshold(threshold_db: f32, min_silence_run_ms: u32) -> Self {
        Self {
            threshold_db,
            frame_ms: AnalysisConfig::default().frame_ms,
            min_silence_run_ms,
        }
    }

    pub fn detect_onset(&self, track: &AudioTrack) -> SilenceReport {
        if track.is_empty() || track.sample_rate == 0 {
            debug!("Empty track, onset at 0");
            return SilenceReport::from_intervals(Vec::new());
        }

        // Rounded up so a trailing sub-millisecond frame keeps a non-empty span.
        let rate = track.sample_rate as u64;
        let total_ms = (track.frames() as u64 * 1000 + rate - 1) / rate;
        let frame_len = ((track.sample_rate as u64 * self.frame_ms as u64) / 1000).max(1) as usize;
        let step = frame_len * track.channels as usize;

        // 1. Classify frames and run-length encode
        let mut runs: Vec<Run> = Vec::new();
        for (index, frame) in track.samples.chunks(step).enumerate() {
            let silent = rms_db(frame) < self.threshold_db;
            let start_ms = index as u64 * self.frame_ms as u64;
            let end_ms = (start_ms + self.frame_ms as u64).min(total_ms.max(start_ms));
            match runs.last_mut() {
                Some(run) if run.silent == silent => run.end_ms = end_ms,
                _ => runs.push(Run {
                    silent,
                    start_ms,
                    end_ms,
                }),
            }
        }

        // 2. Short silent runs do not break speech
        let mut intervals: Vec<NonSilentInterval> = Vec::new();
        let any_audible = runs.iter().any(|run| !run.silent);
        for run in runs.into_iter().filter(|_| any_audible) {
            let absorbed = run.silent && run.end_ms - run.start_ms < self.min_silence_run_ms as u64;
            if (run.silent && !absorbed) || run.end_ms <= run.start_ms {
                continue;
            }
            match intervals.last_mut() {
                Some(last) if last.end_ms == run.start_ms => last.end_ms = run.end_ms,
                _ => intervals.push(NonSilentInterval {
                    start_ms: run.start_ms,
                    end_ms: run.end_ms,
                }),
            }
        }

        let report = SilenceReport::from_intervals(intervals);
        if report.has_speech() {
            info!(
                onset_seconds = report.onset_seconds,
                regions = report.intervals.len(),
                "Detected speech onset"
            );
        } else {
            info!("No audible region found, dub starts immediately");
        }
        report
    }
}

#[derive(Debug)]
struct Run {
    silent: bool,
    start_ms: u64,
    end_ms: u64,
}

/// RMS level relative to full scale. Digital silence is `-inf`.
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return f32::NEG_INFINITY;
    }
    let sq_sum: f32 = samples.iter().map(|&x| x * x).sum();
    let rms = (sq_sum / samples.len() as f32).sqrt();
    20.0 * rms.log10()
}
