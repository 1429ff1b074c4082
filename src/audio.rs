//! Audio loading for the embedding stage.
//!
//! The pipeline receives audio prepared upstream (extracted and transcoded
//! to 16kHz WAV by external tools). Loading here only decodes that fixed
//! format into an in-memory buffer; multi-channel files are downmixed to
//! mono, any other sample rate is rejected.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sample rate the whole pipeline operates at.
pub const SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open wav file {path}: {source}")]
    Open {
        path: PathBuf,
        source: hound::Error,
    },

    #[error("failed to decode wav samples: {0}")]
    Decode(#[from] hound::Error),

    #[error("unsupported sample rate {got} (expected {SAMPLE_RATE})")]
    SampleRate { got: u32 },
}

/// Read a WAV file into mono f32 samples at 16kHz.
pub fn load_wav_mono_16k(path: &Path) -> Result<Vec<f32>, AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|source| AudioError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let spec = reader.spec();

    if spec.sample_rate != SAMPLE_RATE {
        return Err(AudioError::SampleRate {
            got: spec.sample_rate,
        });
    }

    let channels = spec.channels.max(1) as usize;
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()?
        }
    };

    if channels == 1 {
        return Ok(samples);
    }

    let mono = samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok(mono)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_mono_16k() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        write_wav(&path, 16_000, 1, &[0, 16384, -16384, 32767]);

        let samples = load_wav_mono_16k(&path).unwrap();
        assert_eq!(samples.len(), 4);
        assert!((samples[1] - 0.5).abs() < 1e-3);
        assert!((samples[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_stereo_downmix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        // Two frames: (1.0, 0.0) and (-0.5, -0.5) roughly.
        write_wav(&path, 16_000, 2, &[32767, 0, -16384, -16384]);

        let samples = load_wav_mono_16k(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.5).abs() < 1e-3);
        assert!((samples[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_wrong_sample_rate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("44k.wav");
        write_wav(&path, 44_100, 1, &[0; 32]);

        let result = load_wav_mono_16k(&path);
        assert!(matches!(result, Err(AudioError::SampleRate { got: 44_100 })));
    }

    #[test]
    fn test_missing_file() {
        let result = load_wav_mono_16k(Path::new("/nonexistent/audio.wav"));
        assert!(matches!(result, Err(AudioError::Open { .. })));
    }
}
