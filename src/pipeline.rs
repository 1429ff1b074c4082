//! Pipeline drivers for the worker's operations.
//!
//! Each driver runs one invocation start-to-finish, synchronously, and
//! returns the full success payload. Failure is all-or-nothing: anything
//! that prevents a complete result surfaces as a single [`PipelineError`]
//! and no partial speaker data is emitted. Unit-scoped problems (one
//! segment, one speaker) are logged and skipped instead.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::AudioError;
use crate::config::{auth_token, pick_device, token_env_names, Config, EncoderBackend};
use crate::embedding::{
    aggregate_embeddings, cosine_similarity, EmbedError, MockEncoder, OnnxEncoder,
    VoiceEncoder, EMBEDDING_DIM,
};
use crate::payload::{
    EmbedDocument, EmbedPayload, EmbedSpeaker, MatchPayload, RawTurn, SegmentsPayload,
    SegmentsRequest, SpeakerEmbedding, SpeakerMatch, SpeakerSegments,
};
use crate::segments::{clip, merge_turns, Segment, SpeakerKey, SpeakerLabelMap, Turn};

/// Invocation-scoped failures, reported through the error envelope.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Consolidate raw diarizer turns into per-speaker segment timelines.
///
/// Turns are sorted by start time first so key assignment reflects first
/// speaking time, then clipped to `transcript_end_ms`, merged per speaker
/// across gaps up to `max_gap_ms`, and grouped under their stable keys.
pub fn run_segments(
    request: SegmentsRequest,
    max_gap_ms: u64,
    transcript_end_ms: Option<u64>,
    trace_id: String,
) -> SegmentsPayload {
    let started = Instant::now();

    let mut raw: Vec<RawTurn> = request.turns;
    raw.sort_by_key(|t| (t.start_ms, t.end_ms));

    let mut labels = SpeakerLabelMap::new();
    let mut turns: Vec<Turn> = Vec::with_capacity(raw.len());
    for t in &raw {
        // Keys are allocated even when the turn is clipped away, so a
        // speaker's identity does not depend on the transcript bound.
        let key = labels.assign(&t.speaker_label);
        if let Some(segment) = clip(t.start_ms, t.end_ms, transcript_end_ms) {
            turns.push(Turn::new(key, segment));
        }
    }

    let merged = merge_turns(turns, max_gap_ms);

    let mut grouped: BTreeMap<SpeakerKey, Vec<Segment>> = BTreeMap::new();
    for turn in merged {
        grouped.entry(turn.key).or_default().push(turn.segment);
    }

    let speakers: Vec<SpeakerSegments> = grouped
        .into_iter()
        .map(|(key, segments)| SpeakerSegments {
            key: key.to_string(),
            segments,
        })
        .collect();

    info!(
        "consolidated {} turns into {} speakers ({} labels seen)",
        raw.len(),
        speakers.len(),
        labels.label_count()
    );

    SegmentsPayload {
        backend: request.backend,
        model: request.model,
        device: request.device,
        duration_ms: started.elapsed().as_millis() as u64,
        trace_id,
        speakers,
    }
}

/// Aggregate one voice embedding per speaker from `audio`.
///
/// Speakers whose segments all fail the usability checks are absent from
/// the result; a dimension mismatch skips the speaker with a warning.
pub fn run_embed(
    request: &[EmbedSpeaker],
    audio: &[f32],
    sample_rate: u32,
    min_segment_ms: u64,
    encoder: &mut dyn VoiceEncoder,
    trace_id: String,
) -> EmbedPayload {
    let started = Instant::now();

    let mut speakers: Vec<SpeakerEmbedding> = Vec::new();
    for speaker in request {
        if speaker.segments.is_empty() {
            continue;
        }
        match aggregate_embeddings(
            &speaker.segments,
            audio,
            sample_rate,
            min_segment_ms,
            encoder,
        ) {
            Ok(Some(agg)) => {
                debug!(
                    "speaker {} embedded from {} segments",
                    speaker.label, agg.segment_count
                );
                speakers.push(SpeakerEmbedding {
                    label: speaker.label.clone(),
                    embedding: agg.vector,
                    segment_count: agg.segment_count,
                });
            }
            Ok(None) => {
                debug!("speaker {} has no usable segments, omitted", speaker.label);
            }
            Err(e) => {
                warn!("speaker {} skipped: {}", speaker.label, e);
            }
        }
    }

    info!(
        "embedded {} of {} speakers",
        speakers.len(),
        request.len()
    );

    EmbedPayload {
        model: encoder.model_id().to_string(),
        device: pick_device(),
        duration_ms: started.elapsed().as_millis() as u64,
        trace_id,
        speakers,
    }
}

/// Match speakers between two embedding documents by cosine similarity.
///
/// Reports the best right-hand match per left speaker when it clears
/// `threshold`. Pairs with differing dimensions cannot be compared and are
/// skipped.
pub fn run_match(
    left: &EmbedDocument,
    right: &EmbedDocument,
    threshold: f32,
    trace_id: String,
) -> MatchPayload {
    let started = Instant::now();

    let mut matches: Vec<SpeakerMatch> = Vec::new();
    for l in &left.speakers {
        let best = right
            .speakers
            .iter()
            .filter(|r| r.embedding.len() == l.embedding.len())
            .map(|r| (r, cosine_similarity(&l.embedding, &r.embedding)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((r, similarity)) = best {
            if similarity >= threshold {
                matches.push(SpeakerMatch {
                    left_label: l.label.clone(),
                    right_label: r.label.clone(),
                    similarity,
                });
            }
        }
    }

    MatchPayload {
        threshold,
        duration_ms: started.elapsed().as_millis() as u64,
        trace_id,
        matches,
    }
}

/// Load the embed stage's audio input (16kHz mono WAV).
pub fn load_audio(path: &Path) -> Result<Vec<f32>, PipelineError> {
    Ok(crate::audio::load_wav_mono_16k(path)?)
}

/// Build the configured voice encoder.
///
/// The onnx backend needs its model on disk; when the file is absent the
/// error distinguishes a missing HuggingFace token (required to fetch the
/// model) from a plain missing download.
pub fn build_encoder(config: &Config) -> Result<Box<dyn VoiceEncoder>, PipelineError> {
    match config.encoder {
        EncoderBackend::Mock => Ok(Box::new(MockEncoder::new(EMBEDDING_DIM))),
        EncoderBackend::Onnx => {
            let path = config
                .encoder_model_path()
                .map_err(|e| PipelineError::MissingDependency(e.to_string()))?;
            if !path.exists() {
                return Err(match auth_token() {
                    None => PipelineError::MissingCredential(format!(
                        "encoder model missing and no HuggingFace token set ({}) to fetch it",
                        token_env_names()
                    )),
                    Some(_) => PipelineError::MissingDependency(format!(
                        "encoder model not found at {}",
                        path.display()
                    )),
                });
            }
            let encoder = OnnxEncoder::new(&path, config.n_threads).map_err(|e| match e {
                EmbedError::FeatureNotEnabled => PipelineError::MissingDependency(e.to_string()),
                other => PipelineError::MissingDependency(other.to_string()),
            })?;
            Ok(Box::new(encoder))
        }
    }
}
