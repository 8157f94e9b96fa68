use std::collections::BTreeMap;

use crate::index::ClassId;

/// Draws are taken from `[0, draw_limit)`; totals above this saturate.
pub const MAX_DRAW_TOTAL: u64 = u32::MAX as u64;

/// Cumulative count boundaries over a count table.
///
/// Entry `i` owns the half open interval `[boundary(i-1), boundary(i))`, so
/// the intervals partition `[0, total)` without gaps or overlaps. Classes with
/// a zero count own no interval and are left out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunningTotalTable {
    boundaries: Vec<u64>,
    ids: Vec<ClassId>,
}

impl RunningTotalTable {
    /// Build from `counts`, visiting ids in ascending order. Repeated ids
    /// are summed into one interval. With `ignore_unassigned` every id
    /// `<= 0` is skipped.
    pub fn from_counts<I>(counts: I, ignore_unassigned: bool) -> Self
    where
        I: IntoIterator<Item = (ClassId, u32)>,
    {
        let mut merged: BTreeMap<ClassId, u64> = BTreeMap::new();
        for (id, count) in counts {
            if count > 0 && !(ignore_unassigned && id <= 0) {
                *merged.entry(id).or_default() += count as u64;
            }
        }

        let mut table = Self {
            boundaries: Vec::with_capacity(merged.len()),
            ids: Vec::with_capacity(merged.len()),
        };
        let mut running = 0u64;
        for (id, count) in merged {
            running += count;
            table.boundaries.push(running);
            table.ids.push(id);
        }
        table
    }

    pub fn total(&self) -> u64 {
        self.boundaries.last().copied().unwrap_or(0)
    }

    /// Exclusive upper bound for draws.
    pub fn draw_limit(&self) -> u64 {
        u64::min(self.total(), MAX_DRAW_TOTAL)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Position of the first boundary strictly greater than `r`.
    /// Requires `r < total()`.
    #[inline]
    pub fn find(&self, r: u64) -> usize {
        self.boundaries.partition_point(|&b| b <= r)
    }

    pub fn id(&self, i: usize) -> ClassId {
        self.ids[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, ClassId)> + '_ {
        self.boundaries.iter().copied().zip(self.ids.iter().copied())
    }
}
