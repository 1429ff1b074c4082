use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables scanned for a HuggingFace token, first non-empty
/// wins. The token gates fetching the encoder model, which happens outside
/// this worker.
const TOKEN_ENV_VARS: [&str; 4] = [
    "DIARIZE_HF_TOKEN",
    "HUGGINGFACE_TOKEN",
    "HF_TOKEN",
    "PYANNOTE_AUTH_TOKEN",
];

/// Environment variable overriding the reported compute device.
const DEVICE_ENV_VAR: &str = "DIARIZE_DEVICE";

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub schema_version: u32,

    /// Gap below which two same-speaker segments always merge (ms)
    pub max_gap_ms: u64,

    /// Segments shorter than this are too unreliable to embed (ms)
    pub min_segment_ms: u64,

    /// Voice encoder backend
    pub encoder: EncoderBackend,

    /// Override path to the encoder ONNX model
    pub model_path: Option<PathBuf>,

    /// Number of threads for encoder inference
    pub n_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            max_gap_ms: 200,
            min_segment_ms: 500,
            encoder: EncoderBackend::Mock,
            model_path: None,
            n_threads: 2,
        }
    }
}

impl Config {
    /// Load config from file, or create default
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".diarize-cli"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Get the default models directory
    pub fn default_models_dir() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("models"))
    }

    /// Get the encoder model file path
    pub fn encoder_model_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.model_path {
            Ok(path.clone())
        } else {
            let models_dir = Self::default_models_dir()?;
            Ok(models_dir.join("wespeaker-voxceleb-resnet34.onnx"))
        }
    }
}

/// Voice encoder backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderBackend {
    Mock,
    Onnx,
}

impl Default for EncoderBackend {
    fn default() -> Self {
        Self::Mock
    }
}

impl std::str::FromStr for EncoderBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "onnx" => Ok(Self::Onnx),
            _ => Err(format!("Unknown encoder backend: {}", s)),
        }
    }
}

/// Compute device reported in result payloads.
///
/// Honors an explicit override, otherwise cpu; actual placement belongs to
/// the encoder runtime.
pub fn pick_device() -> String {
    std::env::var(DEVICE_ENV_VAR)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "cpu".to_string())
}

/// Resolve the HuggingFace token from the accepted environment variables.
pub fn auth_token() -> Option<String> {
    TOKEN_ENV_VARS.iter().find_map(|k| {
        std::env::var(k)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Names of the accepted token variables, for error messages.
pub fn token_env_names() -> String {
    TOKEN_ENV_VARS.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.max_gap_ms, 200);
        assert_eq!(config.min_segment_ms, 500);
        assert_eq!(config.encoder, EncoderBackend::Mock);
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("mock".parse::<EncoderBackend>().unwrap(), EncoderBackend::Mock);
        assert_eq!("ONNX".parse::<EncoderBackend>().unwrap(), EncoderBackend::Onnx);
        assert!("cuda".parse::<EncoderBackend>().is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.max_gap_ms = 350;
        config.encoder = EncoderBackend::Onnx;
        let content = serde_json::to_string_pretty(&config).unwrap();
        std::fs::write(&path, content).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.max_gap_ms, 350);
        assert_eq!(loaded.encoder, EncoderBackend::Onnx);
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.max_gap_ms, Config::default().max_gap_ms);
    }

    #[test]
    fn test_explicit_model_path_wins() {
        let mut config = Config::default();
        config.model_path = Some(PathBuf::from("/models/custom.onnx"));
        assert_eq!(
            config.encoder_model_path().unwrap(),
            PathBuf::from("/models/custom.onnx")
        );
    }
}
