//! Speaker segment consolidation.
//!
//! Raw diarizer turns arrive with arbitrary, unstable speaker labels and
//! noisy boundaries. This module turns them into a canonical timeline:
//! stable `speaker_<N>` keys assigned by first speaking time, boundaries
//! clipped to the known transcript extent, and per-speaker runs merged
//! across small gaps.

mod clip;
mod labels;
mod merge;

pub use clip::clip;
pub use labels::{SpeakerKey, SpeakerLabelMap};
pub use merge::{merge_turns, Turn};

use serde::{Deserialize, Serialize};

/// A validated time segment (`end_ms > start_ms` once clipped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Segment {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}
