//! Pitch-preserving time-stretch (phase vocoder).
//!
//! The signal is taken to the STFT domain, frames are re-sampled in time
//! with per-bin phase advance so that partials keep their frequency, and the
//! result is overlap-added back with a squared-window normalisation.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use super::track::AudioTrack;

#[derive(Debug, Clone)]
pub struct TimeStretcher {
    n_fft: usize,
    hop: usize,
}

impl TimeStretcher {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let n_fft = n_fft.max(2);
        Self {
            n_fft,
            hop: hop.clamp(1, n_fft),
        }
    }

    /// Stretches every channel of `track` by `rate` (`> 1` is faster / shorter).
    pub fn stretch_track(&self, track: &AudioTrack, rate: f64) -> AudioTrack {
        let planes: Vec<Vec<f32>> = track
            .deinterleave()
            .iter()
            .map(|plane| self.stretch(plane, rate))
            .collect();
        AudioTrack::interleave(&planes, track.sample_rate)
    }

    /// Output length is `round(len / rate)`.
    pub fn stretch(&self, signal: &[f32], rate: f64) -> Vec<f32> {
        if signal.is_empty() || !rate.is_finite() || rate <= 0.0 {
            return signal.to_vec();
        }
        let target_len = (signal.len() as f64 / rate).round() as usize;
        if target_len == 0 {
            return Vec::new();
        }

        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(self.n_fft);
        let inverse = planner.plan_fft_inverse(self.n_fft);
        let window = hann(self.n_fft);

        let spectrum = self.stft(signal, &window, &forward);
        let stretched = self.phase_vocoder(&spectrum, rate);
        self.istft(&stretched, &window, &inverse, target_len)
    }

    fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    fn stft(&self, signal: &[f32], window: &[f32], fft: &Arc<dyn Fft<f32>>) -> Vec<Vec<Complex32>> {
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0f32; signal.len() + 2 * pad];
        padded[pad..pad + signal.len()].copy_from_slice(signal);

        let n_frames = 1 + (padded.len() - self.n_fft) / self.hop;
        let mut frames = Vec::with_capacity(n_frames);
        let mut buf = vec![Complex32::new(0.0, 0.0); self.n_fft];

        for t in 0..n_frames {
            let offset = t * self.hop;
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = Complex32::new(padded[offset + i] * window[i], 0.0);
            }
            fft.process(&mut buf);
            frames.push(buf[..self.bins()].to_vec());
        }
        frames
    }

    fn phase_vocoder(&self, spectrum: &[Vec<Complex32>], rate: f64) -> Vec<Vec<Complex32>> {
        let bins = self.bins();
        let n_frames = spectrum.len();
        let zeros = vec![Complex32::new(0.0, 0.0); bins];

        // Expected phase advance per hop for each bin centre frequency.
        let phi_advance: Vec<f32> = (0..bins)
            .map(|k| 2.0 * PI * self.hop as f32 * k as f32 / self.n_fft as f32)
            .collect();
        let mut phase_acc: Vec<f32> = spectrum[0].iter().map(|c| c.arg()).collect();

        let n_out = (n_frames as f64 / rate).ceil() as usize;
        let mut out = Vec::with_capacity(n_out);

        let mut step = 0usize;
        loop {
            let t = step as f64 * rate;
            if t >= n_frames as f64 {
                break;
            }
            let idx = t.floor() as usize;
            let alpha = (t - idx as f64) as f32;
            let left = &spectrum[idx];
            let right = spectrum.get(idx + 1).unwrap_or(&zeros);

            let mut frame = Vec::with_capacity(bins);
            for k in 0..bins {
                let mag = (1.0 - alpha) * left[k].norm() + alpha * right[k].norm();
                frame.push(Complex32::from_polar(mag, phase_acc[k]));

                let mut dphase = right[k].arg() - left[k].arg() - phi_advance[k];
                dphase -= 2.0 * PI * (dphase / (2.0 * PI)).round();
                // Kept wrapped so f32 precision holds over long signals.
                phase_acc[k] = (phase_acc[k] + phi_advance[k] + dphase).rem_euclid(2.0 * PI);
            }
            out.push(frame);
            step += 1;
        }
        out
    }

    fn istft(
        &self,
        frames: &[Vec<Complex32>],
        window: &[f32],
        ifft: &Arc<dyn Fft<f32>>,
        target_len: usize,
    ) -> Vec<f32> {
        let n = self.n_fft;
        let half = n / 2;
        let span = n + self.hop * frames.len().saturating_sub(1);
        let mut signal = vec![0.0f32; span];
        let mut norm = vec![0.0f32; span];
        let mut buf = vec![Complex32::new(0.0, 0.0); n];

        for (t, frame) in frames.iter().enumerate() {
            // Rebuild the full Hermitian spectrum from the half spectrum.
            for (k, slot) in buf.iter_mut().enumerate() {
                *slot = if k <= half {
                    frame[k]
                } else {
                    frame[n - k].conj()
                };
            }
            buf[0].im = 0.0;
            if n % 2 == 0 {
                buf[half].im = 0.0;
            }
            ifft.process(&mut buf);

            let offset = t * self.hop;
            for i in 0..n {
                let w = window[i];
                signal[offset + i] += buf[i].re / n as f32 * w;
                norm[offset + i] += w * w;
            }
        }

        for (s, &w) in signal.iter_mut().zip(&norm) {
            if w > 1e-8 {
                *s /= w;
            }
        }

        let mut out: Vec<f32> = signal.into_iter().skip(half).take(target_len).collect();
        out.resize(target_len, 0.0);
        out
    }
}

/// Periodic Hann window.
fn hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    /// Zero crossings per second, a cheap pitch estimate.
    fn crossings_per_sec(signal: &[f32], rate: u32) -> f32 {
        let crossings = signal
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count();
        crossings as f32 / (signal.len() as f32 / rate as f32)
    }

    #[test]
    fn output_length_follows_rate() {
        let stretcher = TimeStretcher::new(2048, 512);
        let input = sine(440.0, 16_000, 16_000);
        assert_eq!(stretcher.stretch(&input, 2.0).len(), 8_000);
        assert_eq!(stretcher.stretch(&input, 0.5).len(), 32_000);
        assert_eq!(stretcher.stretch(&input, 1.25).len(), 12_800);
    }

    #[test]
    fn unity_rate_reconstructs_signal() {
        let stretcher = TimeStretcher::new(1024, 256);
        let input = sine(300.0, 16_000, 8_000);
        let output = stretcher.stretch(&input, 1.0);
        assert_eq!(output.len(), input.len());
        // Skip the edges where the window sum is small.
        for i in 1024..7_000 {
            assert!((output[i] - input[i]).abs() < 1e-2, "sample {} differs", i);
        }
    }

    #[test]
    fn pitch_survives_speed_up() {
        let stretcher = TimeStretcher::new(2048, 512);
        let input = sine(440.0, 16_000, 32_000);
        let output = stretcher.stretch(&input, 2.0);
        let core = &output[2_048..output.len() - 2_048];
        let rate = crossings_per_sec(core, 16_000);
        // A 440 Hz tone crosses zero ~880 times a second.
        assert!((rate - 880.0).abs() < 60.0, "crossing rate {}", rate);
    }

    #[test]
    fn invalid_rate_is_identity() {
        let stretcher = TimeStretcher::new(2048, 512);
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(stretcher.stretch(&input, 0.0), input);
        assert_eq!(stretcher.stretch(&input, f64::NAN), input);
    }
}
