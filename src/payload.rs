//! Wire payloads exchanged with the surrounding job worker.
//!
//! Every invocation prints exactly one JSON document on stdout: either an
//! ok-envelope with the operation payload flattened into it, or
//! `{"ok": false, "error": "..."}`. Field names are part of the
//! collaborator contract and must not change.

use crate::segments::Segment;
use serde::{Deserialize, Serialize};

/// One raw diarizer turn, as produced by the upstream diarization model.
///
/// Bounds are signed: model noise can place a turn start before zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTurn {
    pub speaker_label: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Input document for the `segments` operation.
///
/// Accepted on the wire either as this object or as a bare array of turns
/// (see [`SegmentsRequestWire`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentsRequest {
    pub turns: Vec<RawTurn>,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
}

/// Wire shapes accepted for the `segments` input.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SegmentsRequestWire {
    Document(SegmentsRequest),
    BareTurns(Vec<RawTurn>),
}

impl From<SegmentsRequestWire> for SegmentsRequest {
    fn from(wire: SegmentsRequestWire) -> Self {
        match wire {
            SegmentsRequestWire::Document(request) => request,
            SegmentsRequestWire::BareTurns(turns) => SegmentsRequest {
                turns,
                backend: None,
                model: None,
                device: None,
            },
        }
    }
}

/// One speaker's consolidated timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerSegments {
    pub key: String,
    pub segments: Vec<Segment>,
}

/// Success payload of the `segments` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentsPayload {
    pub backend: Option<String>,
    pub model: Option<String>,
    pub device: Option<String>,
    pub duration_ms: u64,
    pub trace_id: String,
    pub speakers: Vec<SpeakerSegments>,
}

/// One entry of the `embed` input document (a bare JSON array of these).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedSpeaker {
    pub label: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// One speaker's aggregated voice fingerprint on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerEmbedding {
    pub label: String,
    pub embedding: Vec<f32>,
    pub segment_count: usize,
}

/// Success payload of the `embed` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedPayload {
    pub model: String,
    pub device: String,
    pub duration_ms: u64,
    pub trace_id: String,
    pub speakers: Vec<SpeakerEmbedding>,
}

/// A stored embed result, as read back by the `match` operation.
///
/// Unknown fields (envelope flag, metadata) are ignored so a saved stdout
/// document can be fed back in directly.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedDocument {
    pub speakers: Vec<SpeakerEmbedding>,
}

/// One cross-document speaker match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerMatch {
    pub left_label: String,
    pub right_label: String,
    pub similarity: f32,
}

/// Success payload of the `match` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPayload {
    pub threshold: f32,
    pub duration_ms: u64,
    pub trace_id: String,
    pub matches: Vec<SpeakerMatch>,
}

/// Success envelope: `{"ok": true}` with the payload flattened in.
#[derive(Debug, Serialize)]
pub struct OkEnvelope<T: Serialize> {
    pub ok: bool,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> OkEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self { ok: true, payload }
    }
}

/// Failure envelope, the uniform collaborator contract for every entry
/// point.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrEnvelope {
    pub ok: bool,
    pub error: String,
}

impl ErrEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}
