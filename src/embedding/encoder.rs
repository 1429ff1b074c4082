//! Voice encoder seam.
//!
//! The embedding model is an external black box: it receives one segment's
//! 16kHz mono samples and returns a fixed-dimension d-vector. The ONNX
//! implementation is optional; the mock encoder keeps development and tests
//! independent of model files.

use super::{l2_normalize, EmbedError};
use std::path::Path;

#[cfg(feature = "onnx")]
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};

/// External speaker-embedding model boundary.
pub trait VoiceEncoder: std::fmt::Debug {
    /// Model identifier reported in result payloads.
    fn model_id(&self) -> &str;

    /// Embed one segment's samples into a d-vector.
    fn embed(&mut self, samples: &[f32]) -> Result<Vec<f32>, EmbedError>;
}

/// Deterministic stand-in encoder.
///
/// Buckets the segment into equal windows and uses per-window energy as the
/// vector, so identical audio always embeds identically and distinct audio
/// tends to separate. Not a voice model; useful for development and tests.
#[derive(Debug)]
pub struct MockEncoder {
    dim: usize,
}

impl MockEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl VoiceEncoder for MockEncoder {
    fn model_id(&self) -> &str {
        "mock"
    }

    fn embed(&mut self, samples: &[f32]) -> Result<Vec<f32>, EmbedError> {
        if samples.is_empty() {
            return Err(EmbedError::Inference("empty sample slice".to_string()));
        }
        let window = (samples.len() / self.dim).max(1);
        let mut v: Vec<f32> = samples
            .chunks(window)
            .take(self.dim)
            .map(|c| c.iter().map(|s| s * s).sum::<f32>() / c.len() as f32)
            .collect();
        v.resize(self.dim, 0.0);
        l2_normalize(&mut v);
        Ok(v)
    }
}

/// ONNX-based speaker embedding encoder.
///
/// Expects a raw-waveform model (input shape `[batch, samples]`, output
/// `[batch, dim]`), e.g. the WeSpeaker exports with a built-in feature
/// frontend.
#[cfg(feature = "onnx")]
pub struct OnnxEncoder {
    session: Session,
    model_id: String,
}

#[cfg(feature = "onnx")]
impl std::fmt::Debug for OnnxEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEncoder")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "onnx")]
impl OnnxEncoder {
    pub fn new(model_path: &Path, n_threads: usize) -> Result<Self, EmbedError> {
        if !model_path.exists() {
            return Err(EmbedError::ModelNotFound(model_path.to_path_buf()));
        }

        let session = Session::builder()
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?
            .with_intra_threads(n_threads)
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?;

        let model_id = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        tracing::info!("Loaded speaker embedding model from {:?}", model_path);

        Ok(Self { session, model_id })
    }
}

#[cfg(feature = "onnx")]
impl VoiceEncoder for OnnxEncoder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&mut self, samples: &[f32]) -> Result<Vec<f32>, EmbedError> {
        let input_shape = [1_usize, samples.len()];
        let input_tensor = Value::from_array((input_shape, samples.to_vec()))
            .map_err(|e: ort::Error| EmbedError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| EmbedError::Inference("no output tensor".to_string()))?;

        let embedding_data = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        Ok(embedding_data.1.iter().copied().collect())
    }
}

// Stub implementation when the feature is not enabled
#[cfg(not(feature = "onnx"))]
#[derive(Debug)]
pub struct OnnxEncoder;

#[cfg(not(feature = "onnx"))]
impl OnnxEncoder {
    pub fn new(_model_path: &Path, _n_threads: usize) -> Result<Self, EmbedError> {
        Err(EmbedError::FeatureNotEnabled)
    }
}

#[cfg(not(feature = "onnx"))]
impl VoiceEncoder for OnnxEncoder {
    fn model_id(&self) -> &str {
        "onnx"
    }

    fn embed(&mut self, _samples: &[f32]) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError::FeatureNotEnabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_encoder_deterministic() {
        let samples: Vec<f32> = (0..8000).map(|i| (i as f32 * 0.01).sin()).collect();
        let mut encoder = MockEncoder::new(16);
        let a = encoder.embed(&samples).unwrap();
        let b = encoder.embed(&samples).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_mock_encoder_unit_norm() {
        let samples: Vec<f32> = (0..8000).map(|i| (i as f32 * 0.01).sin()).collect();
        let mut encoder = MockEncoder::new(16);
        let v = encoder.embed(&samples).unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_mock_encoder_short_slice_pads() {
        // Fewer samples than dims still yields a full-width vector.
        let mut encoder = MockEncoder::new(32);
        let v = encoder.embed(&[0.5; 8]).unwrap();
        assert_eq!(v.len(), 32);
    }

    #[test]
    fn test_mock_encoder_empty_slice_fails() {
        let mut encoder = MockEncoder::new(16);
        assert!(encoder.embed(&[]).is_err());
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_onnx_stub_reports_feature_missing() {
        let result = OnnxEncoder::new(Path::new("/nonexistent/model.onnx"), 1);
        assert!(matches!(result, Err(EmbedError::FeatureNotEnabled)));
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_onnx_encoder_model_not_found() {
        let result = OnnxEncoder::new(Path::new("/nonexistent/model.onnx"), 1);
        assert!(matches!(result, Err(EmbedError::ModelNotFound(_))));
    }
}
