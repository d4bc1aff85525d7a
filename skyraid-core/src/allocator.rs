//! Square-spiral placement of territory centers.
//!
//! Placement `n` (starting at 1) maps to a lattice cell. Ring `r` holds the
//! `8r` cells at Chebyshev distance `r` from the origin, walked clockwise
//! starting just right of the top-left corner:
//!
//! ```text
//!   9  2  3        (-1,-1) (0,-1) (1,-1)
//!   8  1  4   =>   (-1, 0) (0, 0) (1, 0)
//!   7  6  5        (-1, 1) (0, 1) (1, 1)
//! ```
//!
//! Cells are then scaled by the stride. Because the counter is never
//! rewound, no two placements ever share a center.

use crate::types::ColumnPos;

/// Deterministic generator of territory centers.
#[derive(Debug, Clone)]
pub struct CoordinateAllocator {
    counter: u64,
    stride: i32,
}

impl CoordinateAllocator {
    /// Fresh allocator; the first call to [`next`](Self::next) yields `(0, 0)`.
    #[must_use]
    pub fn new(stride: i32) -> Self {
        Self::with_counter(1, stride)
    }

    /// Resume from a persisted counter. A counter of 0 is treated as 1.
    #[must_use]
    pub fn with_counter(counter: u64, stride: i32) -> Self {
        Self {
            counter: counter.max(1),
            stride,
        }
    }

    /// The placement index the next call will use.
    #[must_use]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Configured spacing between centers.
    #[must_use]
    pub fn stride(&self) -> i32 {
        self.stride
    }

    /// Produce the next center and advance the counter.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> ColumnPos {
        let center = center_for_index(self.counter, self.stride);
        self.counter = self.counter.saturating_add(1);
        center
    }

    /// Look at the next center without consuming it.
    #[must_use]
    pub fn peek(&self) -> ColumnPos {
        center_for_index(self.counter, self.stride)
    }
}

/// Lattice cell (unscaled) for placement index `n`.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn lattice_cell(n: u64) -> (i64, i64) {
    if n <= 1 {
        return (0, 0);
    }
    let p = n - 1;
    // floor((sqrt(p) - 1) / 2) == floor((isqrt(p) - 1) / 2) for p >= 1
    let r = (p.isqrt() - 1) / 2 + 1;
    let d = 2 * r;
    let perimeter = 4 * d;
    // perimeter * (r - 1) / 2, kept in range for every u64 index
    let before_ring = 4 * r * (r - 1);
    let i = (p - before_ring) % perimeter;

    let (r, d, i) = (r as i64, d as i64, i as i64);
    match i / d {
        0 => (i - r, -r),
        1 => (r, (i % d) - r),
        2 => (r - (i % d), r),
        _ => (-r, r - (i % d)),
    }
}

/// World center for placement index `n` at the given stride.
///
/// Coordinates beyond the `i32` range saturate; at any realistic stride that
/// needs trillions of placements.
#[must_use]
pub fn center_for_index(n: u64, stride: i32) -> ColumnPos {
    let (cx, cz) = lattice_cell(n);
    let stride = i64::from(stride);
    ColumnPos::new(
        saturate(cx.saturating_mul(stride)),
        saturate(cz.saturating_mul(stride)),
    )
}

#[allow(clippy::cast_possible_truncation)]
fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn first_ring_matches_reference_sequence() {
        let mut alloc = CoordinateAllocator::new(1000);
        let expected = [
            (0, 0),
            (0, -1000),
            (1000, -1000),
            (1000, 0),
            (1000, 1000),
            (0, 1000),
            (-1000, 1000),
            (-1000, 0),
            (-1000, -1000),
        ];
        for (x, z) in expected {
            assert_eq!(alloc.next(), ColumnPos::new(x, z));
        }
        assert_eq!(alloc.counter(), 10);
    }

    #[test]
    fn second_ring_starts_and_closes_on_its_corner() {
        assert_eq!(lattice_cell(10), (-1, -2));
        assert_eq!(lattice_cell(25), (-2, -2));
        let ring: HashSet<_> = (10..=25).map(lattice_cell).collect();
        assert_eq!(ring.len(), 16);
        assert!(ring.iter().all(|(x, z)| x.abs().max(z.abs()) == 2));
    }

    #[test]
    fn resumed_allocator_continues_the_sequence() {
        let mut fresh = CoordinateAllocator::new(500);
        for _ in 0..6 {
            fresh.next();
        }
        let mut resumed = CoordinateAllocator::with_counter(fresh.counter(), 500);
        assert_eq!(resumed.peek(), fresh.peek());
        assert_eq!(resumed.next(), fresh.next());
    }

    #[test]
    fn zero_counter_is_clamped() {
        let alloc = CoordinateAllocator::with_counter(0, 1000);
        assert_eq!(alloc.counter(), 1);
        assert_eq!(alloc.peek(), ColumnPos::new(0, 0));
    }

    #[test]
    fn first_thousand_cells_are_unique() {
        let cells: HashSet<_> = (1..=1000).map(lattice_cell).collect();
        assert_eq!(cells.len(), 1000);
    }

    #[test]
    fn huge_indices_saturate_instead_of_wrapping() {
        let c = center_for_index(u64::MAX, i32::MAX);
        assert!(c.x == i32::MIN || c.x == i32::MAX || c.z == i32::MIN || c.z == i32::MAX);
    }
}
