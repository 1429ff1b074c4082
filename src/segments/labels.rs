//! Stable speaker identity assignment.
//!
//! Diarization models emit opaque labels ("SPEAKER_00", "B", ...) whose
//! ordering carries no meaning and can change between runs. Keys are
//! allocated in order of first appearance instead, so feeding turns in
//! temporal order makes `speaker_0` the first voice heard.

use std::collections::HashMap;
use std::fmt;

/// A stable per-run speaker identity, rendered as `speaker_<N>`.
///
/// Ordering follows the allocation index, so `speaker_2` sorts before
/// `speaker_10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpeakerKey(usize);

impl SpeakerKey {
    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SpeakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "speaker_{}", self.index())
    }
}

/// Maps raw diarizer labels to stable [`SpeakerKey`]s within one run.
///
/// The first never-seen label gets index 0, the next gets 1, and so on. A
/// label always maps to the same key for the lifetime of the map; indices
/// are never reused. Nothing persists across runs.
#[derive(Debug, Default)]
pub struct SpeakerLabelMap {
    assigned: HashMap<String, SpeakerKey>,
    next_index: usize,
}

impl SpeakerLabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the key for `raw_label`, allocating the next index on first
    /// sight.
    pub fn assign(&mut self, raw_label: &str) -> SpeakerKey {
        if let Some(key) = self.assigned.get(raw_label) {
            return *key;
        }
        let key = SpeakerKey(self.next_index);
        self.next_index += 1;
        self.assigned.insert(raw_label.to_string(), key);
        key
    }

    /// Number of distinct labels seen so far.
    pub fn label_count(&self) -> usize {
        self.assigned.len()
    }
}
