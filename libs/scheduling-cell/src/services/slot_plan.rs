// libs/scheduling-cell/src/services/slot_plan.rs
//
// Pure interval arithmetic behind session adjustment: merging occupied time,
// carving a range into consultation-sized pieces, and filling the free gaps
// of a working window. Storage-free so the trickiest logic is testable on
// its own.
use chrono::Duration;
use std::cmp::{max, min};

use shared_models::TimeRange;

/// Sort by start and coalesce overlapping or adjacent ranges
/// (`next.start <= last.end`). Empty ranges are discarded.
pub fn merge_ranges(mut ranges: Vec<TimeRange>) -> Vec<TimeRange> {
    ranges.retain(|range| !range.is_empty());
    ranges.sort_by_key(|range| range.start);

    let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => {
                last.end = max(last.end, range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Carve `range` into consecutive pieces of `duration`, the final piece
/// truncated at `range.end`. A non-positive duration yields nothing.
pub fn split_range(range: TimeRange, duration: Duration) -> Vec<TimeRange> {
    let mut pieces = Vec::new();
    if duration <= Duration::zero() {
        return pieces;
    }

    let mut cursor = range.start;
    while cursor < range.end {
        let end = min(cursor + duration, range.end);
        pieces.push(TimeRange::new(cursor, end));
        cursor = end;
    }
    pieces
}

/// Walk `window` against an already-merged, ascending `occupied` set and
/// carve every uncovered gap into `duration`-sized pieces. Zero-length gaps
/// produce nothing.
pub fn plan_free_slots(
    window: TimeRange,
    occupied: &[TimeRange],
    duration: Duration,
) -> Vec<TimeRange> {
    let mut pieces = Vec::new();
    let mut cursor = window.start;

    for busy in occupied {
        if busy.end <= cursor {
            continue;
        }
        if busy.start >= window.end {
            break;
        }
        if busy.start > cursor {
            let gap = TimeRange::new(cursor, min(busy.start, window.end));
            pieces.extend(split_range(gap, duration));
        }
        cursor = max(cursor, busy.end);
        if cursor >= window.end {
            break;
        }
    }

    if cursor < window.end {
        pieces.extend(split_range(TimeRange::new(cursor, window.end), duration));
    }
    pieces
}
