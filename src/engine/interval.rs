//! Non-overlapping interval map with overwrite-and-split assignment.
//!
//! [`IntervalMap`] stores half-open intervals `[lo, hi)` mapped to values,
//! kept **sorted and disjoint** at all times. Assigning a new interval
//! overwrites whatever it covers: intervals strictly spanning the new one
//! are split into two flanking pieces, fully covered intervals are erased,
//! and partially covered ones are truncated.
//!
//! ## Role in the runtime
//!
//! Each component column owns an `IntervalMap<usize, TaskId>` keyed by
//! **positional ranges** into the column. When work is scheduled over a
//! range, the map is queried for the task ids that last touched any
//! overlapping positions (these become predecessors) and then updated so
//! later submissions see the new task. Keys are generic so the same type
//! serves positional ranges and signed keys alike.
//!
//! ## Complexity
//!
//! `set` is O(k) in intervals touched plus the insertion shift; the overlap
//! query is a linear scan. The map never holds more intervals than there
//! are live tasks on one component, which is small in steady state.

use std::fmt;

/// Sorted map from disjoint half-open intervals `[lo, hi)` to values.
#[derive(Clone, Debug)]
pub struct IntervalMap<K, V> {
    data: Vec<(K, K, V)>,
}

impl<K, V> Default for IntervalMap<K, V> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<K, V> IntervalMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored intervals.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no intervals are stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Removes every interval.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// The stored `(lo, hi, value)` triples, sorted and disjoint.
    pub fn segments(&self) -> &[(K, K, V)] {
        &self.data
    }
}

impl<K: Ord + Copy, V: Clone> IntervalMap<K, V> {
    /// Assigns `value` to `[lo, hi)`, overwriting anything it covers.
    ///
    /// An existing interval strictly spanning `[lo, hi)` splits into two
    /// flanking pieces that keep their old value; an interval fully inside
    /// `[lo, hi)` is erased; a partially overlapping interval is truncated
    /// at the new boundary. Intervals stay sorted, disjoint, and half-open.
    ///
    /// Requires `lo < hi`.
    pub fn set(&mut self, lo: K, hi: K, value: V) {
        debug_assert!(lo < hi, "half-open interval requires lo < hi");

        let at = self.data.partition_point(|segment| segment.0 < lo);
        self.data.insert(at, (lo, hi, value));

        // Shorten the prior interval, or split it when it spans past hi.
        let mut prev = at;
        while prev > 0 {
            prev -= 1;
            let prev_hi = self.data[prev].1;
            if prev_hi <= lo {
                break;
            }
            self.data[prev].1 = lo;
            if prev_hi > hi {
                let carried = self.data[prev].2.clone();
                self.data.insert(at + 1, (hi, prev_hi, carried));
                return;
            }
        }

        // Erase following intervals that fell inside [lo, hi); truncate the
        // first one reaching past hi.
        let mut next = at + 1;
        while next < self.data.len() {
            let (next_lo, next_hi) = (self.data[next].0, self.data[next].1);
            if next_lo >= hi {
                break;
            }
            if next_hi <= hi {
                self.data.remove(next);
            } else {
                self.data[next].0 = hi;
                break;
            }
        }
    }

    /// Yields the values of every interval overlapping `[lo, hi)`.
    ///
    /// Half-open semantics: coincident boundaries do not overlap, and a
    /// zero-width query yields nothing.
    pub fn overlapping<'a>(&'a self, lo: K, hi: K) -> impl Iterator<Item = &'a V> + 'a {
        let empty = lo >= hi;
        self.data
            .iter()
            .filter(move |segment| !empty && hi > segment.0 && lo < segment.1)
            .map(|segment| &segment.2)
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for IntervalMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (lo, hi, value) in &self.data {
            write!(f, "({lo} {value} {hi})")?;
        }
        write!(f, "]")
    }
}
