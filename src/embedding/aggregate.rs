//! Per-speaker embedding aggregation.

use super::{l2_normalize, mean_vector, EmbedError, VoiceEncoder};
use crate::segments::Segment;
use tracing::debug;

/// One speaker's aggregated voice fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedEmbedding {
    /// Unit-norm mean of the per-segment embeddings (all-zero mean passes
    /// through unnormalized).
    pub vector: Vec<f32>,
    /// Number of segments that contributed.
    pub segment_count: usize,
}

/// Derive one embedding from a speaker's segments over `audio`.
///
/// Segments that fall outside the buffer, have no usable samples after
/// clamping, or are shorter than `min_segment_ms` are skipped; so is any
/// segment the encoder fails on. `Ok(None)` means no segment survived and
/// the speaker yields no result. A dimension mismatch between surviving
/// embeddings is an error for this speaker.
pub fn aggregate_embeddings(
    segments: &[Segment],
    audio: &[f32],
    sample_rate: u32,
    min_segment_ms: u64,
    encoder: &mut dyn VoiceEncoder,
) -> Result<Option<AggregatedEmbedding>, EmbedError> {
    let min_samples = (min_segment_ms as usize * sample_rate as usize) / 1000;

    let mut vectors: Vec<Vec<f32>> = Vec::new();
    for seg in segments {
        let start = ms_to_sample(seg.start_ms, sample_rate);
        if start >= audio.len() {
            debug!(
                "segment {}..{}ms starts past the audio buffer, skipping",
                seg.start_ms, seg.end_ms
            );
            continue;
        }
        let end = ms_to_sample(seg.end_ms, sample_rate).min(audio.len());
        if end <= start {
            continue;
        }
        let slice = &audio[start..end];
        if slice.len() < min_samples {
            debug!(
                "segment {}..{}ms too short for a reliable embedding ({} samples, min {})",
                seg.start_ms,
                seg.end_ms,
                slice.len(),
                min_samples
            );
            continue;
        }

        match encoder.embed(slice) {
            Ok(v) => vectors.push(v),
            Err(e) => {
                debug!(
                    "encoder failed on segment {}..{}ms, skipping: {}",
                    seg.start_ms, seg.end_ms, e
                );
            }
        }
    }

    if vectors.is_empty() {
        return Ok(None);
    }

    let mut mean = mean_vector(&vectors)?;
    l2_normalize(&mut mean);

    Ok(Some(AggregatedEmbedding {
        vector: mean,
        segment_count: vectors.len(),
    }))
}

fn ms_to_sample(ms: u64, sample_rate: u32) -> usize {
    (ms as f64 / 1000.0 * sample_rate as f64).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEncoder;

    const SAMPLE_RATE: u32 = 16_000;

    fn speech(seconds: f32) -> Vec<f32> {
        let samples = (seconds * SAMPLE_RATE as f32) as usize;
        (0..samples)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                (2.0 * std::f32::consts::PI * 220.0 * t).sin() * 0.4
            })
            .collect()
    }

    #[test]
    fn test_ms_to_sample_rounds() {
        assert_eq!(ms_to_sample(500, SAMPLE_RATE), 8000);
        assert_eq!(ms_to_sample(1, 44_100), 44);
    }

    #[test]
    fn test_short_segments_yield_no_result() {
        // 400ms is below the 500ms reliability threshold.
        let audio = speech(2.0);
        let mut encoder = MockEncoder::new(16);
        let result = aggregate_embeddings(
            &[Segment::new(0, 400)],
            &audio,
            SAMPLE_RATE,
            500,
            &mut encoder,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_segment_past_buffer_skipped() {
        let audio = speech(1.0);
        let mut encoder = MockEncoder::new(16);
        let result = aggregate_embeddings(
            &[Segment::new(5000, 6000), Segment::new(0, 800)],
            &audio,
            SAMPLE_RATE,
            500,
            &mut encoder,
        )
        .unwrap()
        .unwrap();
        assert_eq!(result.segment_count, 1);
    }

    #[test]
    fn test_segment_end_clamped_to_buffer() {
        // Segment runs past the audio end but keeps enough samples.
        let audio = speech(1.0);
        let mut encoder = MockEncoder::new(16);
        let result = aggregate_embeddings(
            &[Segment::new(200, 3000)],
            &audio,
            SAMPLE_RATE,
            500,
            &mut encoder,
        )
        .unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn test_result_is_unit_norm() {
        let audio = speech(3.0);
        let mut encoder = MockEncoder::new(16);
        let result = aggregate_embeddings(
            &[Segment::new(0, 1000), Segment::new(1200, 2400)],
            &audio,
            SAMPLE_RATE,
            500,
            &mut encoder,
        )
        .unwrap()
        .unwrap();
        assert_eq!(result.segment_count, 2);
        let norm: f32 = result.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_encoder_failure_is_segment_scoped() {
        #[derive(Debug)]
        struct FlakyEncoder {
            calls: usize,
        }
        impl VoiceEncoder for FlakyEncoder {
            fn model_id(&self) -> &str {
                "flaky"
            }
            fn embed(&mut self, samples: &[f32]) -> Result<Vec<f32>, EmbedError> {
                self.calls += 1;
                if self.calls == 1 {
                    return Err(EmbedError::Inference("transient".to_string()));
                }
                let mut v = vec![samples[0].abs() + 1.0, 0.0];
                l2_normalize(&mut v);
                Ok(v)
            }
        }

        let audio = speech(3.0);
        let mut encoder = FlakyEncoder { calls: 0 };
        let result = aggregate_embeddings(
            &[Segment::new(0, 1000), Segment::new(1200, 2400)],
            &audio,
            SAMPLE_RATE,
            500,
            &mut encoder,
        )
        .unwrap()
        .unwrap();
        // First segment failed and was excluded; the speaker still resolves.
        assert_eq!(result.segment_count, 1);
    }

    #[test]
    fn test_dimension_mismatch_is_speaker_fatal() {
        #[derive(Debug)]
        struct ShapeShifter {
            calls: usize,
        }
        impl VoiceEncoder for ShapeShifter {
            fn model_id(&self) -> &str {
                "shapeshifter"
            }
            fn embed(&mut self, _samples: &[f32]) -> Result<Vec<f32>, EmbedError> {
                self.calls += 1;
                Ok(vec![1.0; if self.calls == 1 { 4 } else { 8 }])
            }
        }

        let audio = speech(3.0);
        let mut encoder = ShapeShifter { calls: 0 };
        let result = aggregate_embeddings(
            &[Segment::new(0, 1000), Segment::new(1200, 2400)],
            &audio,
            SAMPLE_RATE,
            500,
            &mut encoder,
        );
        assert!(matches!(
            result,
            Err(EmbedError::DimensionMismatch { expected: 4, got: 8 })
        ));
    }
}
