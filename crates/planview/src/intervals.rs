//! Hidden-interval algebra over a segment's `[0, 1]` parameter range.

use serde::{Deserialize, Serialize};

/// Endpoints closer than this to 0 or 1 snap, and gaps narrower than this merge.
pub const INTERVAL_EPSILON: f64 = 1e-9;

/// A closed sub-range `[start, end]` of `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Start parameter.
    pub start: f64,
    /// End parameter.
    pub end: f64,
}

impl Interval {
    /// The whole segment.
    pub const FULL: Interval = Interval { start: 0.0, end: 1.0 };

    /// Create an interval clamped to `[0, 1]`, with endpoints in either order.
    ///
    /// Returns `None` for NaN endpoints.
    pub fn new(a: f64, b: f64) -> Option<Self> {
        if a.is_nan() || b.is_nan() {
            return None;
        }
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Some(Self {
            start: lo.clamp(0.0, 1.0),
            end: hi.clamp(0.0, 1.0),
        })
    }

    /// Length of the interval.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// True if `t` lies in the interval.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    fn snapped(mut self) -> Self {
        if self.start <= INTERVAL_EPSILON {
            self.start = 0.0;
        }
        if self.end >= 1.0 - INTERVAL_EPSILON {
            self.end = 1.0;
        }
        self
    }
}

/// Sorted, pairwise-disjoint set of hidden intervals for one edge.
///
/// Every insertion re-compresses the set, so the invariant holds between
/// any two operations. Intervals only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from arbitrary intervals.
    pub fn from_intervals(intervals: impl IntoIterator<Item = Interval>) -> Self {
        let mut set = Self {
            intervals: intervals.into_iter().collect(),
        };
        set.compress();
        set
    }

    /// Insert an interval and compress.
    pub fn insert(&mut self, interval: Interval) {
        self.intervals.push(interval);
        self.compress();
    }

    /// Sort, snap and merge overlapping or nearly touching intervals.
    ///
    /// Intervals shorter than [`INTERVAL_EPSILON`] are dropped. Idempotent.
    pub fn compress(&mut self) {
        let mut items: Vec<Interval> = self
            .intervals
            .iter()
            .map(|i| i.snapped())
            .filter(|i| i.length() > INTERVAL_EPSILON)
            .collect();
        items.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut merged: Vec<Interval> = Vec::with_capacity(items.len());
        for item in items {
            match merged.last_mut() {
                Some(last) if item.start <= last.end + INTERVAL_EPSILON => {
                    last.end = last.end.max(item.end);
                }
                _ => merged.push(item),
            }
        }
        self.intervals = merged;
    }

    /// The intervals, sorted and disjoint.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// True if nothing is hidden.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// True if the whole segment is hidden.
    pub fn is_full(&self) -> bool {
        matches!(self.intervals.as_slice(), [only] if *only == Interval::FULL)
    }

    /// Total hidden length.
    pub fn covered_length(&self) -> f64 {
        self.intervals.iter().map(Interval::length).sum()
    }

    /// True if `t` is hidden.
    pub fn contains(&self, t: f64) -> bool {
        self.intervals.iter().any(|i| i.contains(t))
    }

    /// The visible ranges: `[0, 1]` minus the set.
    pub fn complement(&self) -> Vec<Interval> {
        let mut out = Vec::with_capacity(self.intervals.len() + 1);
        let mut cursor = 0.0;
        for i in &self.intervals {
            if i.start > cursor {
                out.push(Interval {
                    start: cursor,
                    end: i.start,
                });
            }
            cursor = i.end;
        }
        if cursor < 1.0 {
            out.push(Interval {
                start: cursor,
                end: 1.0,
            });
        }
        out
    }
}
