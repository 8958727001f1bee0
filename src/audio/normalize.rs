use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{debug, info};

use super::track::AudioTrack;
use crate::config::AnalysisConfig;
use crate::error::DubError;

/// Forces any decoded track into the analysis format: mono at a fixed rate.
#[derive(Debug, Clone)]
pub struct AudioNormalizer {
    target_rate: u32,
    chunk_frames: usize,
}

impl AudioNormalizer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            target_rate: config.sample_rate,
            chunk_frames: config.resample_chunk_frames.max(1),
        }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn normalize(&self, source: &AudioTrack) -> Result<AudioTrack, DubError> {
        if source.channels == 0 || source.sample_rate == 0 {
            return Err(DubError::Decode(format!(
                "source audio declares {} channels at {} Hz",
                source.channels, source.sample_rate
            )));
        }

        // 1. Downmix
        let mono = downmix(source);

        // 2. Resample
        if source.sample_rate == self.target_rate {
            debug!(frames = mono.len(), "Source already at analysis rate");
            return Ok(AudioTrack::mono(mono, self.target_rate));
        }

        let resampled = self.resample(&mono, source.sample_rate)?;
        info!(
            from_rate = source.sample_rate,
            to_rate = self.target_rate,
            channels = source.channels,
            in_frames = mono.len(),
            out_frames = resampled.len(),
            "Normalized audio"
        );
        Ok(AudioTrack::mono(resampled, self.target_rate))
    }

    fn resample(&self, input: &[f32], source_rate: u32) -> Result<Vec<f32>, DubError> {
        let ratio = self.target_rate as f64 / source_rate as f64;
        let expected = (input.len() as f64 * ratio).round() as usize;
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, self.chunk_frames, 1)
            .map_err(|e| DubError::decode(format!("failed to create resampler: {}", e)))?;

        // The sinc filter delays its output; skip that many frames so the
        // signal keeps its position on the timeline.
        let delay = resampler.output_delay();
        let wanted = delay + expected;
        let mut output: Vec<f32> = Vec::with_capacity(wanted + self.chunk_frames);

        let mut chunks = input.chunks_exact(self.chunk_frames);
        for chunk in chunks.by_ref() {
            let out = resampler
                .process(&[chunk], None)
                .map_err(|e| DubError::decode(format!("resample error: {}", e)))?;
            output.extend_from_slice(&out[0]);
        }

        let rest = chunks.remainder();
        if !rest.is_empty() {
            let out = resampler
                .process_partial(Some(&[rest][..]), None)
                .map_err(|e| DubError::decode(format!("resample error: {}", e)))?;
            output.extend_from_slice(&out[0]);
        }

        // Flush the filter tail with silence until the delayed signal is out.
        while output.len() < wanted {
            let out = resampler
                .process_partial::<&[f32]>(None, None)
                .map_err(|e| DubError::decode(format!("resample flush error: {}", e)))?;
            if out[0].is_empty() {
                break;
            }
            output.extend_from_slice(&out[0]);
        }

        let mut aligned: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();
        aligned.resize(expected, 0.0);
        Ok(aligned)
    }
}

fn downmix(track: &AudioTrack) -> Vec<f32> {
    let channels = track.channels as usize;
    if channels == 1 {
        return track.samples.clone();
    }
    track
        .samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let track = AudioTrack::new(vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 16_000, 2);
        assert_eq!(downmix(&track), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn zero_channel_source_is_a_decode_error() {
        let normalizer = AudioNormalizer::new(&AnalysisConfig::default());
        let err = normalizer
            .normalize(&AudioTrack::new(vec![], 44_100, 0))
            .unwrap_err();
        assert!(matches!(err, DubError::Decode(_)));
    }
}
