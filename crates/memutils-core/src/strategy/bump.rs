//! Bump placement: one monotonic cursor per region.

use super::{aligned_offset, Placement, Placer};

/// Cursor state of a single region.
#[derive(Clone, Copy, Debug)]
struct Lane {
    base: usize,
    capacity: usize,
    /// Next free byte offset.
    cursor: usize,
}

impl Lane {
    fn bump(&mut self, size: usize, align: usize) -> Option<usize> {
        let start = aligned_offset(self.base, self.cursor, align)?;
        let end = start.checked_add(size)?;
        if end > self.capacity {
            return None;
        }
        self.cursor = end;
        Some(start)
    }
}

/// Bump placement across a growable list of regions.
///
/// Requests that do not fit the current region move on to the next one;
/// there is no splitting across regions. Freed placements are not reused
/// until [`reset`](Placer::reset).
pub(crate) struct Bump {
    lanes: Vec<Lane>,
    /// Index of the lane currently being filled.
    current: usize,
}

impl Bump {
    pub(crate) fn new() -> Self {
        Self {
            lanes: Vec::new(),
            current: 0,
        }
    }

    /// Bytes behind the cursors, i.e. still available before a reset.
    pub(crate) fn free_bytes(&self) -> usize {
        self.lanes.iter().map(|l| l.capacity - l.cursor).sum()
    }
}

impl Placer for Bump {
    fn add_region(&mut self, index: u32, base: usize, capacity: usize) {
        debug_assert_eq!(index as usize, self.lanes.len());
        self.lanes.push(Lane {
            base,
            capacity,
            cursor: 0,
        });
    }

    #[inline]
    fn place(&mut self, size: usize, align: usize) -> Option<Placement> {
        for index in self.current..self.lanes.len() {
            if let Some(offset) = self.lanes[index].bump(size, align) {
                self.current = index;
                return Some(Placement {
                    region: index as u32,
                    offset,
                    reserved: size,
                    class: None,
                });
            }
        }
        None
    }

    fn reclaim(&mut self, _placement: Placement) {}

    fn reset(&mut self) {
        for lane in &mut self.lanes {
            lane.cursor = 0;
        }
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump(capacities: &[usize]) -> Bump {
        let mut b = Bump::new();
        for (i, &cap) in capacities.iter().enumerate() {
            b.add_region(i as u32, 4096 * (i + 1), cap);
        }
        b
    }

    #[test]
    fn sequential_placements_advance_cursor() {
        let mut b = bump(&[1024]);
        let p1 = b.place(100, 1).unwrap();
        let p2 = b.place(200, 1).unwrap();
        assert_eq!(p1.offset, 0);
        assert_eq!(p2.offset, 100);
        assert_eq!(b.free_bytes(), 724);
    }

    #[test]
    fn alignment_pads_cursor() {
        let mut b = bump(&[1024]);
        b.place(3, 1).unwrap();
        let p = b.place(8, 8).unwrap();
        assert_eq!(p.offset, 8);
    }

    #[test]
    fn full_region_returns_none() {
        let mut b = bump(&[100]);
        assert!(b.place(100, 1).is_some());
        assert!(b.place(1, 1).is_none());
    }

    #[test]
    fn overflow_moves_to_next_region() {
        let mut b = bump(&[100, 100]);
        b.place(80, 1).unwrap();
        let p = b.place(50, 1).unwrap();
        assert_eq!(p.region, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn reclaim_does_not_reuse() {
        let mut b = bump(&[100]);
        let p = b.place(60, 1).unwrap();
        b.reclaim(p);
        assert!(b.place(60, 1).is_none());
    }

    #[test]
    fn reset_starts_from_first_region() {
        let mut b = bump(&[100, 100]);
        b.place(80, 1).unwrap();
        b.place(80, 1).unwrap();
        b.reset();
        assert_eq!(b.free_bytes(), 200);
        let p = b.place(10, 1).unwrap();
        assert_eq!((p.region, p.offset), (0, 0));
    }
}
