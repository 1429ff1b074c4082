//! Per-speaker interval merging.

use super::{Segment, SpeakerKey};

/// One diarization turn attributed to a stable speaker key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    pub key: SpeakerKey,
    pub segment: Segment,
}

impl Turn {
    pub fn new(key: SpeakerKey, segment: Segment) -> Self {
        Self { key, segment }
    }
}

/// Collapse turns into minimal non-overlapping runs per speaker.
///
/// Two same-speaker turns merge when the later one starts within
/// `max_gap_ms` of the earlier one's end; the tolerance is inclusive, so
/// turns exactly `max_gap_ms` apart still merge. Exact duplicates collapse
/// to one. The output is re-sorted into pure chronological order (consumers
/// want a timeline, not a per-speaker grouping), with ties on identical
/// `(start_ms, end_ms)` broken by key so the order is stable.
pub fn merge_turns(mut turns: Vec<Turn>, max_gap_ms: u64) -> Vec<Turn> {
    turns.sort_by_key(|t| (t.key, t.segment.start_ms, t.segment.end_ms));

    let mut out: Vec<Turn> = Vec::with_capacity(turns.len());
    for turn in turns {
        match out.last_mut() {
            Some(open)
                if open.key == turn.key
                    && turn.segment.start_ms <= open.segment.end_ms + max_gap_ms =>
            {
                open.segment.end_ms = open.segment.end_ms.max(turn.segment.end_ms);
            }
            _ => out.push(turn),
        }
    }

    out.sort_by_key(|t| (t.segment.start_ms, t.segment.end_ms, t.key));
    out
}
