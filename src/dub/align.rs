use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audio::track::seconds_to_frames;
use crate::audio::{AudioTrack, TimeStretcher};
use crate::config::{AlignmentConfig, StretchLimits};

/// Speech as returned by the synthesizer, before any timing changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedSpeech {
    pub track: AudioTrack,
    pub natural_duration: f64,
}

impl SynthesizedSpeech {
    pub fn new(track: AudioTrack) -> Self {
        let natural_duration = track.duration_secs();
        Self {
            track,
            natural_duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The onset delay leaves no room for speech.
    Degenerate { remaining_seconds: f64 },
    /// Natural duration already matches within one frame.
    ExactFit,
    EmptySpeech,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StretchDecision {
    Applied { factor: f64 },
    Clamped { requested: f64, applied: f64 },
    Skipped(SkipReason),
}

impl StretchDecision {
    /// Factor actually handed to the stretcher, if any.
    pub fn factor(&self) -> Option<f64> {
        match self {
            StretchDecision::Applied { factor } => Some(*factor),
            StretchDecision::Clamped { applied, .. } => Some(*applied),
            StretchDecision::Skipped(_) => None,
        }
    }
}

/// Speech laid out on the video's timeline: onset silence, then the
/// (stretched) speech, padded or cut to the target length.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSpeech {
    pub track: AudioTrack,
    pub stretch: StretchDecision,
}

impl AlignedSpeech {
    pub fn duration_secs(&self) -> f64 {
        self.track.duration_secs()
    }
}

#[derive(Debug, Clone)]
pub struct DurationAligner {
    stretcher: TimeStretcher,
    limits: Option<StretchLimits>,
}

impl DurationAligner {
    pub fn new(config: &AlignmentConfig) -> Self {
        Self {
            stretcher: TimeStretcher::new(config.n_fft, config.hop_length),
            limits: config.stretch_limits,
        }
    }

    /// Fits `speech` into `target_duration` seconds, starting `onset_delay`
    /// seconds in. The result is exactly `target_duration` long, rounded to
    /// whole frames.
    pub fn align(
        &self,
        speech: &SynthesizedSpeech,
        target_duration: f64,
        onset_delay: f64,
    ) -> AlignedSpeech {
        let rate = speech.track.sample_rate;
        let channels = speech.track.channels.max(1);
        let onset = if onset_delay.is_finite() { onset_delay.max(0.0) } else { 0.0 };
        let target_frames = seconds_to_frames(target_duration, rate);
        let remaining = target_duration - onset;

        // 1. Decide on a stretch factor
        let (body, stretch) = if speech.track.is_empty() {
            debug!("Synthesized speech is empty, output will be silence");
            (
                AudioTrack::silence(0, rate, channels),
                StretchDecision::Skipped(SkipReason::EmptySpeech),
            )
        } else if remaining <= 0.0 {
            warn!(
                target_duration,
                onset_seconds = onset,
                "Onset leaves no room for speech, skipping stretch"
            );
            (
                speech.track.clone(),
                StretchDecision::Skipped(SkipReason::Degenerate {
                    remaining_seconds: remaining,
                }),
            )
        } else if (speech.natural_duration - remaining).abs() <= 1.0 / rate.max(1) as f64 {
            (
                speech.track.clone(),
                StretchDecision::Skipped(SkipReason::ExactFit),
            )
        } else {
            let requested = speech.natural_duration / remaining;
            let decision = match self.limits {
                Some(limits) if limits.clamp(requested) != requested => {
                    let applied = limits.clamp(requested);
                    warn!(requested, applied, "Stretch factor clamped");
                    StretchDecision::Clamped { requested, applied }
                }
                _ => StretchDecision::Applied { factor: requested },
            };
            let factor = decision.factor().unwrap_or(requested);
            (self.stretcher.stretch_track(&speech.track, factor), decision)
        };

        // 2. Onset silence, then speech
        let onset_frames = seconds_to_frames(onset, rate).min(target_frames);
        let mut samples = Vec::with_capacity(target_frames * channels as usize);
        samples.resize(onset_frames * channels as usize, 0.0);
        samples.extend_from_slice(&body.samples);

        // 3. Pad or cut to the exact target length
        samples.resize(target_frames * channels as usize, 0.0);

        let track = AudioTrack::new(samples, rate, channels);
        info!(
            natural_seconds = speech.natural_duration,
            target_seconds = target_duration,
            onset_seconds = onset,
            stretch = ?stretch,
            "Aligned synthesized speech"
        );
        AlignedSpeech { track, stretch }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(seconds: f64, rate: u32) -> SynthesizedSpeech {
        let frames = seconds_to_frames(seconds, rate);
        let samples = (0..frames)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / rate as f32).sin())
            .collect();
        SynthesizedSpeech::new(AudioTrack::mono(samples, rate))
    }

    #[test]
    fn exact_fit_skips_stretch() {
        let aligner = DurationAligner::new(&AlignmentConfig::default());
        let aligned = aligner.align(&tone(2.0, 16_000), 2.0, 0.0);
        assert_eq!(aligned.stretch, StretchDecision::Skipped(SkipReason::ExactFit));
        assert_eq!(aligned.track.frames(), 32_000);
    }

    #[test]
    fn negative_onset_counts_as_zero() {
        let aligner = DurationAligner::new(&AlignmentConfig::default());
        let aligned = aligner.align(&tone(1.0, 16_000), 1.0, -3.0);
        assert_eq!(aligned.stretch, StretchDecision::Skipped(SkipReason::ExactFit));
        assert!(aligned.track.samples[..100].iter().any(|s| s.abs() > 0.0));
    }

    #[test]
    fn limits_clamp_factor_but_not_length() {
        let config = AlignmentConfig {
            stretch_limits: Some(StretchLimits { min: 0.5, max: 2.0 }),
            ..AlignmentConfig::default()
        };
        let aligner = DurationAligner::new(&config);
        let aligned = aligner.align(&tone(4.0, 16_000), 1.0, 0.0);
        assert_eq!(
            aligned.stretch,
            StretchDecision::Clamped {
                requested: 4.0,
                applied: 2.0
            }
        );
        assert_eq!(aligned.track.frames(), 16_000);
    }

    #[test]
    fn empty_speech_becomes_silence() {
        let aligner = DurationAligner::new(&AlignmentConfig::default());
        let speech = SynthesizedSpeech::new(AudioTrack::mono(Vec::new(), 22_050));
        let aligned = aligner.align(&speech, 1.5, 0.2);
        assert_eq!(aligned.stretch, StretchDecision::Skipped(SkipReason::EmptySpeech));
        assert_eq!(aligned.track.frames(), seconds_to_frames(1.5, 22_050));
        assert!(aligned.track.samples.iter().all(|&s| s == 0.0));
    }
}
