use super::Segment;

/// Clamp a raw turn to `[0, upper_bound_ms]`.
///
/// Diarizer output can start before zero or run past the transcript's known
/// duration; turns that end up with zero or negative length are dropped.
pub fn clip(start_ms: i64, end_ms: i64, upper_bound_ms: Option<u64>) -> Option<Segment> {
    let start = start_ms.max(0) as u64;
    let mut end = end_ms.max(0) as u64;
    if let Some(bound) = upper_bound_ms {
        end = end.min(bound);
    }
    (end > start).then(|| Segment::new(start, end))
}
