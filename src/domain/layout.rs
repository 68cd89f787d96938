use crate::domain::models::TimeInterval;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("invalid interval '{id}': end ({end}) must be after start ({start})")]
    InvalidInterval { id: String, start: u32, end: u32 },
    #[error("ring layout requires at least one band")]
    NoRingBands,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    #[default]
    StartThenEnd,
    ShortestFirst,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingBand {
    pub inner_radius: f32,
    pub outer_radius: f32,
}

pub const DEFAULT_RING_BANDS: [RingBand; 3] = [
    RingBand {
        inner_radius: 33.0,
        outer_radius: 44.0,
    },
    RingBand {
        inner_radius: 21.0,
        outer_radius: 32.0,
    },
    RingBand {
        inner_radius: 9.0,
        outer_radius: 20.0,
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSlot {
    pub offset: u32,
    pub length: u32,
    pub lateral_position: f32,
    pub lateral_width: f32,
    pub column_index: usize,
    pub total_columns: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RingSlot {
    pub ring_index: usize,
    pub inner_radius: f32,
    pub outer_radius: f32,
}

pub fn column_layout(
    intervals: &[TimeInterval],
    tie_break: TieBreak,
) -> Result<HashMap<String, ColumnSlot>, LayoutError> {
    validate(intervals)?;

    let mut slots = HashMap::with_capacity(intervals.len());
    for mut cluster in clusters(intervals) {
        order_cluster(&mut cluster, tie_break);
        let columns = assign_columns(&cluster);
        let total_columns = columns.iter().copied().max().map_or(1, |max| max + 1);
        let lateral_width = 1.0 / total_columns as f32;

        for (interval, column_index) in cluster.iter().zip(columns) {
            slots.insert(
                interval.id.clone(),
                ColumnSlot {
                    offset: interval.start,
                    length: interval.duration(),
                    lateral_position: column_index as f32 * lateral_width,
                    lateral_width,
                    column_index,
                    total_columns,
                },
            );
        }
    }
    Ok(slots)
}

pub fn ring_layout(
    intervals: &[TimeInterval],
    bands: &[RingBand],
    tie_break: TieBreak,
) -> Result<HashMap<String, RingSlot>, LayoutError> {
    validate(intervals)?;
    if bands.is_empty() {
        return Err(LayoutError::NoRingBands);
    }

    let innermost = bands.len() - 1;
    let mut slots = HashMap::with_capacity(intervals.len());
    for mut cluster in clusters(intervals) {
        order_cluster(&mut cluster, tie_break);
        for (interval, column_index) in cluster.iter().zip(assign_columns(&cluster)) {
            // Overflow beyond the available bands collapses into the
            // innermost band rather than failing.
            let ring_index = column_index.min(innermost);
            let band = bands[ring_index];
            slots.insert(
                interval.id.clone(),
                RingSlot {
                    ring_index,
                    inner_radius: band.inner_radius,
                    outer_radius: band.outer_radius,
                },
            );
        }
    }
    Ok(slots)
}

pub fn clusters(intervals: &[TimeInterval]) -> Vec<Vec<TimeInterval>> {
    let mut sorted: Vec<&TimeInterval> = intervals.iter().collect();
    sorted.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(a.end.cmp(&b.end))
            .then(a.id.cmp(&b.id))
    });

    let mut out: Vec<Vec<TimeInterval>> = Vec::new();
    let mut current: Vec<TimeInterval> = Vec::new();
    let mut current_end = 0u32;

    for interval in sorted {
        if current.is_empty() || interval.start < current_end {
            current_end = current_end.max(interval.end);
            current.push(interval.clone());
        } else {
            out.push(std::mem::take(&mut current));
            current.push(interval.clone());
            current_end = interval.end;
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

pub fn fill_gaps(intervals: &[TimeInterval], range_start: u32, range_end: u32) -> Vec<TimeInterval> {
    let mut sorted: Vec<&TimeInterval> = intervals.iter().collect();
    sorted.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(a.end.cmp(&b.end))
            .then(a.id.cmp(&b.id))
    });

    let mut filled = Vec::new();
    let mut cursor = range_start;
    for interval in sorted {
        let start = interval.start.clamp(range_start, range_end);
        let end = interval.end.clamp(range_start, range_end);
        if end <= start {
            continue;
        }
        if start > cursor {
            filled.push(gap_interval(cursor, start));
        }
        filled.push(TimeInterval::new(interval.id.clone(), start, end));
        cursor = cursor.max(end);
    }
    if cursor < range_end {
        filled.push(gap_interval(cursor, range_end));
    }
    filled
}

pub fn is_gap_id(id: &str) -> bool {
    id.starts_with("gap-")
}

fn gap_interval(start: u32, end: u32) -> TimeInterval {
    TimeInterval::new(format!("gap-{}", Uuid::new_v4()), start, end)
}

fn validate(intervals: &[TimeInterval]) -> Result<(), LayoutError> {
    for interval in intervals {
        if interval.end <= interval.start {
            return Err(LayoutError::InvalidInterval {
                id: interval.id.clone(),
                start: interval.start,
                end: interval.end,
            });
        }
    }
    Ok(())
}

fn order_cluster(cluster: &mut [TimeInterval], tie_break: TieBreak) {
    match tie_break {
        TieBreak::StartThenEnd => cluster.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(a.end.cmp(&b.end))
                .then(a.id.cmp(&b.id))
        }),
        TieBreak::ShortestFirst => cluster.sort_by(|a, b| {
            a.duration()
                .cmp(&b.duration())
                .then(a.start.cmp(&b.start))
                .then(a.id.cmp(&b.id))
        }),
    }
}

fn assign_columns(ordered: &[TimeInterval]) -> Vec<usize> {
    let mut frontiers: Vec<u32> = Vec::new();
    let mut columns = Vec::with_capacity(ordered.len());

    for interval in ordered {
        let column = frontiers
            .iter()
            .position(|&frontier| frontier <= interval.start);
        match column {
            Some(index) => {
                frontiers[index] = interval.end;
                columns.push(index);
            }
            None => {
                frontiers.push(interval.end);
                columns.push(frontiers.len() - 1);
            }
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn iv(id: &str, start: u32, end: u32) -> TimeInterval {
        TimeInterval::new(id, start, end)
    }

    // Independent check: maximum number of simultaneously active intervals.
    fn sweep_max_concurrency(intervals: &[TimeInterval]) -> usize {
        let mut events: Vec<(u32, i32)> = Vec::new();
        for interval in intervals {
            events.push((interval.start, 1));
            events.push((interval.end, -1));
        }
        // Ends sort before starts at the same instant, so touching
        // intervals do not count as concurrent.
        events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut active = 0i32;
        let mut max = 0i32;
        for (_, delta) in events {
            active += delta;
            max = max.max(active);
        }
        max as usize
    }

    fn interval_set() -> impl Strategy<Value = Vec<TimeInterval>> {
        prop::collection::vec((0u32..1380, 1u32..120), 0..24).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(index, (start, length))| iv(&format!("iv-{index}"), start, start + length))
                .collect()
        })
    }

    #[test]
    fn concrete_cluster_gets_exactly_two_columns() {
        let intervals = vec![iv("a", 540, 630), iv("b", 570, 600), iv("c", 615, 660)];
        let slots = column_layout(&intervals, TieBreak::StartThenEnd).expect("layout");

        assert_eq!(clusters(&intervals).len(), 1);
        assert_eq!(slots["a"].total_columns, 2);
        assert_eq!(slots["a"].column_index, 0);
        assert_eq!(slots["b"].column_index, 1);
        assert_eq!(slots["c"].column_index, 1);
        assert!((slots["a"].lateral_width - 0.5).abs() < f32::EPSILON);
        assert!((slots["b"].lateral_position - 0.5).abs() < f32::EPSILON);
        assert_eq!(slots["c"].offset, 615);
        assert_eq!(slots["c"].length, 45);
    }

    #[test]
    fn disjoint_intervals_each_get_full_width() {
        let intervals = vec![iv("a", 0, 60), iv("b", 60, 120), iv("c", 300, 360)];
        let slots = column_layout(&intervals, TieBreak::StartThenEnd).expect("layout");
        assert_eq!(clusters(&intervals).len(), 3);
        for slot in slots.values() {
            assert_eq!(slot.total_columns, 1);
            assert!((slot.lateral_width - 1.0).abs() < f32::EPSILON);
            assert!((slot.lateral_position).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn tie_break_variants_produce_different_orderings() {
        // Under start order the long interval opens the first column; under
        // shortest-first the short one does.
        let intervals = vec![iv("long", 0, 50), iv("short", 10, 20)];

        let by_start = column_layout(&intervals, TieBreak::StartThenEnd).expect("layout");
        assert_eq!(by_start["long"].column_index, 0);
        assert_eq!(by_start["short"].column_index, 1);

        let by_duration = column_layout(&intervals, TieBreak::ShortestFirst).expect("layout");
        assert_eq!(by_duration["short"].column_index, 0);
        assert_eq!(by_duration["long"].column_index, 1);
    }

    #[test]
    fn ring_layout_assigns_outermost_band_first() {
        let intervals = vec![iv("a", 0, 60), iv("b", 30, 90)];
        let slots = ring_layout(&intervals, &DEFAULT_RING_BANDS, TieBreak::StartThenEnd)
            .expect("layout");
        assert_eq!(slots["a"].ring_index, 0);
        assert!((slots["a"].outer_radius - 44.0).abs() < f32::EPSILON);
        assert_eq!(slots["b"].ring_index, 1);
        assert!((slots["b"].inner_radius - 21.0).abs() < f32::EPSILON);
    }

    #[test]
    fn ring_overflow_collapses_into_innermost_band() {
        let intervals = vec![
            iv("a", 0, 100),
            iv("b", 10, 100),
            iv("c", 20, 100),
            iv("d", 30, 100),
            iv("e", 40, 100),
        ];
        let slots = ring_layout(&intervals, &DEFAULT_RING_BANDS, TieBreak::StartThenEnd)
            .expect("layout");
        assert_eq!(slots["d"].ring_index, 2);
        assert_eq!(slots["e"].ring_index, 2);
        assert_eq!(slots["a"].ring_index, 0);
    }

    #[test]
    fn ring_layout_requires_bands() {
        let intervals = vec![iv("a", 0, 60)];
        assert_eq!(
            ring_layout(&intervals, &[], TieBreak::StartThenEnd),
            Err(LayoutError::NoRingBands)
        );
    }

    #[test]
    fn invalid_interval_is_rejected() {
        let intervals = vec![iv("a", 0, 60), iv("bad", 120, 120)];
        let error = column_layout(&intervals, TieBreak::StartThenEnd).unwrap_err();
        assert_eq!(
            error,
            LayoutError::InvalidInterval {
                id: "bad".to_string(),
                start: 120,
                end: 120,
            }
        );
    }

    #[test]
    fn empty_input_yields_empty_layout() {
        let slots = column_layout(&[], TieBreak::StartThenEnd).expect("layout");
        assert!(slots.is_empty());
    }

    #[test]
    fn fill_gaps_closes_the_range() {
        let intervals = vec![iv("a", 60, 120), iv("b", 180, 240)];
        let filled = fill_gaps(&intervals, 0, 720);

        assert_eq!(filled.len(), 5);
        assert_eq!(filled[0].start, 0);
        assert_eq!(filled[0].end, 60);
        assert!(is_gap_id(&filled[0].id));
        assert_eq!(filled[1].id, "a");
        assert_eq!(filled[2].start, 120);
        assert_eq!(filled[2].end, 180);
        assert_eq!(filled[4].start, 240);
        assert_eq!(filled[4].end, 720);

        let covered: u32 = filled.iter().map(|i| i.end - i.start).sum();
        assert_eq!(covered, 720);
    }

    #[test]
    fn fill_gaps_clamps_to_the_range() {
        // PM half of the day; an AM interval disappears, a straddling one is cut.
        let intervals = vec![iv("am", 0, 120), iv("straddle", 600, 800)];
        let filled = fill_gaps(&intervals, 720, 1440);

        assert_eq!(filled.len(), 2);
        assert_eq!(filled[0].id, "straddle");
        assert_eq!(filled[0].start, 720);
        assert_eq!(filled[0].end, 800);
        assert!(is_gap_id(&filled[1].id));
        assert_eq!(filled[1].start, 800);
        assert_eq!(filled[1].end, 1440);
    }

    proptest! {
        // Property: overlapping intervals never share lateral space.
        #[test]
        fn overlapping_intervals_get_disjoint_lateral_ranges(intervals in interval_set()) {
            let slots = column_layout(&intervals, TieBreak::StartThenEnd).expect("layout");
            for a in &intervals {
                for b in &intervals {
                    if a.id >= b.id || !a.overlaps(b) {
                        continue;
                    }
                    let sa = &slots[&a.id];
                    let sb = &slots[&b.id];
                    let disjoint = sa.lateral_position + sa.lateral_width <= sb.lateral_position + 1e-4
                        || sb.lateral_position + sb.lateral_width <= sa.lateral_position + 1e-4;
                    prop_assert!(disjoint, "{} and {} share lateral space", a.id, b.id);
                }
            }
        }

        // Property: per-cluster column count equals the sweep-line maximum concurrency.
        #[test]
        fn column_count_is_minimal(intervals in interval_set()) {
            let slots = column_layout(&intervals, TieBreak::StartThenEnd).expect("layout");
            for cluster in clusters(&intervals) {
                let expected = sweep_max_concurrency(&cluster);
                for interval in &cluster {
                    prop_assert_eq!(slots[&interval.id].total_columns, expected);
                }
            }
        }

        // Property: output does not depend on input order.
        #[test]
        fn layout_is_input_order_independent(intervals in interval_set(), seed in any::<u64>()) {
            let mut shuffled = intervals.clone();
            let len = shuffled.len().max(1);
            for index in (1..shuffled.len()).rev() {
                let swap_with = (seed as usize).wrapping_mul(index + 31) % (index + 1);
                shuffled.swap(index, swap_with % len);
            }

            let base = column_layout(&intervals, TieBreak::StartThenEnd).expect("layout");
            let reordered = column_layout(&shuffled, TieBreak::StartThenEnd).expect("layout");
            prop_assert_eq!(base, reordered);

            let base_rings = ring_layout(&intervals, &DEFAULT_RING_BANDS, TieBreak::ShortestFirst)
                .expect("layout");
            let reordered_rings = ring_layout(&shuffled, &DEFAULT_RING_BANDS, TieBreak::ShortestFirst)
                .expect("layout");
            prop_assert_eq!(base_rings, reordered_rings);
        }
    }
}
