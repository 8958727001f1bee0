//! PCM WAV encode/decode for [`AudioTrack`].

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::track::{sample_to_i16, AudioTrack};

pub fn read_wav_file(path: &Path) -> Result<AudioTrack> {
    let reader = WavReader::open(path)
        .with_context(|| format!("opening WAV file {}", path.display()))?;
    read_samples(reader)
}

pub fn decode_wav(bytes: &[u8]) -> Result<AudioTrack> {
    let reader = WavReader::new(Cursor::new(bytes)).context("parsing WAV header")?;
    read_samples(reader)
}

fn read_samples<R: Read + Seek>(mut reader: WavReader<R>) -> Result<AudioTrack> {
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(anyhow!(
            "WAV declares {} channels at {} Hz",
            spec.channels,
            spec.sample_rate
        ));
    }

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("reading float samples")?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(anyhow!("unsupported bit depth {}", spec.bits_per_sample));
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("reading integer samples")?
        }
    };

    Ok(AudioTrack::new(samples, spec.sample_rate, spec.channels))
}

fn pcm16_spec(track: &AudioTrack) -> WavSpec {
    WavSpec {
        channels: track.channels,
        sample_rate: track.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Encodes the track as 16-bit PCM WAV in memory.
pub fn encode_wav(track: &AudioTrack) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, pcm16_spec(track))?;
        for &sample in &track.samples {
            writer.write_sample(sample_to_i16(sample))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

pub fn write_wav_file(path: &Path, track: &AudioTrack) -> Result<()> {
    let mut writer = WavWriter::create(path, pcm16_spec(track))
        .with_context(|| format!("creating WAV file {}", path.display()))?;
    for &sample in &track.samples {
        writer.write_sample(sample_to_i16(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_pcm16_decodes_with_same_layout() {
        let track = AudioTrack::new(vec![0.0, 0.5, -0.5, 0.25], 22_050, 2);
        let bytes = encode_wav(&track).expect("encode");
        assert_eq!(&bytes[..4], b"RIFF");

        let decoded = decode_wav(&bytes).expect("decode");
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.sample_rate, 22_050);
        assert_eq!(decoded.frames(), 2);
        for (a, b) in decoded.samples.iter().zip(&track.samples) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_wav(b"ID3\x03not a wav file").is_err());
    }
}
