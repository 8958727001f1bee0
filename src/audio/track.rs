use serde::{Deserialize, Serialize};

/// Interleaved PCM samples in full-scale `f32` (±1.0).
///
/// Stages never mutate a track they receive; each produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioTrack {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    /// `frames` frames of digital silence.
    pub fn silence(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Whole frames covering `secs` at this track's rate.
    pub fn frames_for(&self, secs: f64) -> usize {
        seconds_to_frames(secs, self.sample_rate)
    }

    /// Splits interleaved samples into one buffer per channel.
    pub fn deinterleave(&self) -> Vec<Vec<f32>> {
        let channels = self.channels.max(1) as usize;
        let mut planes = vec![Vec::with_capacity(self.frames()); channels];
        for frame in self.samples.chunks_exact(channels) {
            for (plane, &sample) in planes.iter_mut().zip(frame) {
                plane.push(sample);
            }
        }
        planes
    }

    /// Inverse of [`AudioTrack::deinterleave`]. Planes are cut to the shortest one.
    pub fn interleave(planes: &[Vec<f32>], sample_rate: u32) -> Self {
        let channels = planes.len();
        let frames = planes.iter().map(Vec::len).min().unwrap_or(0);
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            for plane in planes {
                samples.push(plane[i]);
            }
        }
        Self::new(samples, sample_rate, channels as u16)
    }

    /// Samples as signed 16-bit PCM, clamped to full scale.
    pub fn to_i16(&self) -> Vec<i16> {
        self.samples.iter().map(|&s| sample_to_i16(s)).collect()
    }
}

pub fn seconds_to_frames(secs: f64, sample_rate: u32) -> usize {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * sample_rate as f64).round() as usize
}

pub fn sample_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
