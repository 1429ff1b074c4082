use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use uuid::Uuid;

use diarize_cli::audio;
use diarize_cli::config::{Config, EncoderBackend};
use diarize_cli::payload::{
    EmbedDocument, EmbedSpeaker, ErrEnvelope, OkEnvelope, SegmentsRequest, SegmentsRequestWire,
};
use diarize_cli::pipeline::{self, PipelineError};

/// Headless worker CLI for speaker-segment consolidation and voice
/// embedding aggregation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file (defaults to ~/.diarize-cli/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Trace id echoed in the result payload (generated when absent)
    #[arg(long, global = true)]
    trace_id: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consolidate raw diarizer turns into per-speaker segment timelines
    Segments {
        /// Input JSON document ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Clamp turns to the transcript's known duration (ms)
        #[arg(long)]
        transcript_end_ms: Option<u64>,

        /// Gap below which two same-speaker segments merge (ms)
        #[arg(long)]
        max_gap_ms: Option<u64>,

        /// Report which diarization backend produced the input
        #[arg(long)]
        backend: Option<String>,

        /// Report which diarization model produced the input
        #[arg(long)]
        model: Option<String>,

        /// Report which device the diarizer ran on
        #[arg(long)]
        device: Option<String>,
    },

    /// Aggregate per-speaker voice embeddings from audio
    Embed {
        /// Path to the audio file (WAV, 16kHz)
        #[arg(long)]
        audio_path: PathBuf,

        /// Path to JSON with speaker segments ("-" for stdin)
        #[arg(long, default_value = "-")]
        segments_json: String,

        /// Segments shorter than this are skipped (ms)
        #[arg(long)]
        min_segment_ms: Option<u64>,

        /// Encoder backend: "mock" or "onnx"
        #[arg(long)]
        backend: Option<String>,

        /// Override the encoder model path
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Match speakers between two embed results by cosine similarity
    Match {
        /// Left embed result (JSON file)
        #[arg(long)]
        left: PathBuf,

        /// Right embed result (JSON file)
        #[arg(long)]
        right: PathBuf,

        /// Minimum similarity for a match
        #[arg(long, default_value = "0.85")]
        threshold: f32,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Diagnostics go to stderr; stdout carries exactly one JSON document.
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            let envelope = serde_json::to_string(&ErrEnvelope::new(format!("{err:#}")))
                .unwrap_or_else(|_| {
                    r#"{"ok":false,"error":"failed to serialize error"}"#.to_string()
                });
            println!("{envelope}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<String> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let mut config = Config::load(&config_path)?;
    let trace_id = args
        .trace_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match args.command {
        Command::Segments {
            input,
            transcript_end_ms,
            max_gap_ms,
            backend,
            model,
            device,
        } => {
            let wire: SegmentsRequestWire =
                read_json(&input).context("Failed to read segments request")?;
            let mut request = SegmentsRequest::from(wire);
            if backend.is_some() {
                request.backend = backend;
            }
            if model.is_some() {
                request.model = model;
            }
            if device.is_some() {
                request.device = device;
            }

            let payload = pipeline::run_segments(
                request,
                max_gap_ms.unwrap_or(config.max_gap_ms),
                transcript_end_ms,
                trace_id,
            );
            to_envelope(payload)
        }

        Command::Embed {
            audio_path,
            segments_json,
            min_segment_ms,
            backend,
            model,
        } => {
            if let Some(backend) = backend {
                config.encoder = backend
                    .parse::<EncoderBackend>()
                    .map_err(PipelineError::InvalidInput)?;
            }
            if let Some(model) = model {
                config.model_path = Some(model);
            }

            let request: Vec<EmbedSpeaker> =
                read_json(&segments_json).context("Failed to read speaker segments")?;

            info!("Loading audio from {:?}", audio_path);
            let samples = pipeline::load_audio(&audio_path)?;

            let mut encoder = pipeline::build_encoder(&config)?;
            let payload = pipeline::run_embed(
                &request,
                &samples,
                audio::SAMPLE_RATE,
                min_segment_ms.unwrap_or(config.min_segment_ms),
                encoder.as_mut(),
                trace_id,
            );
            to_envelope(payload)
        }

        Command::Match {
            left,
            right,
            threshold,
        } => {
            let left: EmbedDocument = read_json(&left.to_string_lossy())
                .context("Failed to read left embed result")?;
            let right: EmbedDocument = read_json(&right.to_string_lossy())
                .context("Failed to read right embed result")?;

            let payload = pipeline::run_match(&left, &right, threshold, trace_id);
            to_envelope(payload)
        }
    }
}

/// Read a JSON document from a file path, or from stdin for "-".
fn read_json<T: serde::de::DeserializeOwned>(source: &str) -> Result<T, PipelineError> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source)?
    };
    Ok(serde_json::from_str(&content)?)
}

fn to_envelope<T: serde::Serialize>(payload: T) -> Result<String> {
    serde_json::to_string(&OkEnvelope::new(payload)).context("Failed to serialize result")
}
