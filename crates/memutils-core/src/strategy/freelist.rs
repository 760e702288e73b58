//! Free-list placement with coalescing.
//!
//! Free blocks are kept in a `BTreeMap` keyed by `(region, offset)`, which
//! makes the scan order the address order. First-fit therefore always picks
//! the lowest-addressed block that fits, and best-fit breaks ties the same
//! way, keeping placement deterministic for a given request history.

use std::collections::BTreeMap;

use super::{aligned_offset, Placement, Placer};
use crate::config::Fit;

/// A free block chosen for a request.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    region: u32,
    offset: usize,
    len: usize,
    /// Alignment padding at the front of the block.
    pad: usize,
}

/// Ordered free-block list over all regions.
pub(crate) struct FreeList {
    fit: Fit,
    /// `(base address, capacity)` per region index.
    regions: Vec<(usize, usize)>,
    /// `(region, offset) -> len` for every free block.
    free: BTreeMap<(u32, usize), usize>,
}

impl FreeList {
    pub(crate) fn new(fit: Fit) -> Self {
        Self {
            fit,
            regions: Vec::new(),
            free: BTreeMap::new(),
        }
    }

    fn candidate(&self, size: usize, align: usize) -> Option<Candidate> {
        let mut best: Option<(usize, Candidate)> = None;
        for (&(region, offset), &len) in &self.free {
            let (base, _) = self.regions[region as usize];
            let Some(start) = aligned_offset(base, offset, align) else {
                continue;
            };
            let pad = start - offset;
            let Some(need) = pad.checked_add(size) else {
                continue;
            };
            if need > len {
                continue;
            }
            let found = Candidate {
                region,
                offset,
                len,
                pad,
            };
            match self.fit {
                Fit::First => return Some(found),
                Fit::Best => {
                    let waste = len - need;
                    if best.is_none_or(|(w, _)| waste < w) {
                        best = Some((waste, found));
                    }
                    if waste == 0 {
                        break;
                    }
                }
            }
        }
        best.map(|(_, c)| c)
    }

    /// Bytes currently free across all regions.
    pub(crate) fn free_bytes(&self) -> usize {
        self.free.values().sum()
    }

    /// Number of free blocks (a fragmentation measure).
    pub(crate) fn block_count(&self) -> usize {
        self.free.len()
    }
}

impl Placer for FreeList {
    fn add_region(&mut self, index: u32, base: usize, capacity: usize) {
        debug_assert_eq!(index as usize, self.regions.len());
        self.regions.push((base, capacity));
        self.free.insert((index, 0), capacity);
    }

    fn place(&mut self, size: usize, align: usize) -> Option<Placement> {
        let c = self.candidate(size, align)?;
        self.free.remove(&(c.region, c.offset));
        if c.pad > 0 {
            self.free.insert((c.region, c.offset), c.pad);
        }
        let start = c.offset + c.pad;
        let tail = c.len - c.pad - size;
        if tail > 0 {
            self.free.insert((c.region, start + size), tail);
        }
        Some(Placement {
            region: c.region,
            offset: start,
            reserved: size,
            class: None,
        })
    }

    fn reclaim(&mut self, placement: Placement) {
        let region = placement.region;
        let mut start = placement.offset;
        let mut len = placement.reserved;

        // Merge with the block that ends exactly where this one starts.
        let before = self
            .free
            .range((region, 0)..(region, start))
            .next_back()
            .map(|(&(_, off), &l)| (off, l));
        if let Some((off, l)) = before {
            if off + l == start {
                self.free.remove(&(region, off));
                start = off;
                len += l;
            }
        }

        // Merge with the block that starts exactly where this one ends.
        if let Some(l) = self.free.remove(&(region, start + len)) {
            len += l;
        }

        self.free.insert((region, start), len);
    }

    fn reset(&mut self) {
        self.free.clear();
        for (index, &(_, capacity)) in self.regions.iter().enumerate() {
            self.free.insert((index as u32, 0), capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(fit: Fit, capacities: &[usize]) -> FreeList {
        let mut f = FreeList::new(fit);
        for (i, &cap) in capacities.iter().enumerate() {
            f.add_region(i as u32, 1 << 20, cap);
        }
        f
    }

    #[test]
    fn freed_block_is_reused_at_same_offset() {
        let mut f = list(Fit::First, &[4096]);
        let a = f.place(64, 8).unwrap();
        let _b = f.place(64, 8).unwrap();
        f.reclaim(a);
        let c = f.place(64, 8).unwrap();
        assert_eq!((c.region, c.offset), (a.region, a.offset));
    }

    #[test]
    fn reclaim_coalesces_both_neighbours() {
        let mut f = list(Fit::First, &[300]);
        let a = f.place(100, 1).unwrap();
        let b = f.place(100, 1).unwrap();
        let c = f.place(100, 1).unwrap();
        f.reclaim(a);
        f.reclaim(c);
        assert_eq!(f.block_count(), 2);
        f.reclaim(b);
        assert_eq!(f.block_count(), 1);
        assert_eq!(f.free_bytes(), 300);
        assert!(f.place(300, 1).is_some());
    }

    #[test]
    fn blocks_in_different_regions_do_not_merge() {
        let mut f = list(Fit::First, &[100, 100]);
        let a = f.place(100, 1).unwrap();
        let b = f.place(100, 1).unwrap();
        assert_eq!(b.region, 1);
        f.reclaim(a);
        f.reclaim(b);
        assert_eq!(f.block_count(), 2);
    }

    #[test]
    fn alignment_padding_stays_free() {
        let mut f = list(Fit::First, &[256]);
        f.place(3, 1).unwrap();
        let p = f.place(16, 16).unwrap();
        assert_eq!(p.offset, 16);
        // Padding 3..16 is still usable.
        let q = f.place(13, 1).unwrap();
        assert_eq!(q.offset, 3);
    }

    #[test]
    fn best_fit_prefers_tightest_block() {
        let mut f = list(Fit::Best, &[1024]);
        let a = f.place(200, 1).unwrap();
        let _gap1 = f.place(8, 1).unwrap();
        let b = f.place(64, 1).unwrap();
        let _gap2 = f.place(8, 1).unwrap();
        f.reclaim(a);
        f.reclaim(b);
        let c = f.place(64, 1).unwrap();
        assert_eq!(c.offset, b.offset);
    }

    #[test]
    fn first_fit_prefers_lowest_address() {
        let mut f = list(Fit::First, &[1024]);
        let a = f.place(200, 1).unwrap();
        let _gap1 = f.place(8, 1).unwrap();
        let b = f.place(64, 1).unwrap();
        let _gap2 = f.place(8, 1).unwrap();
        f.reclaim(a);
        f.reclaim(b);
        let c = f.place(64, 1).unwrap();
        assert_eq!(c.offset, a.offset);
    }

    #[test]
    fn exhaustion_returns_none() {
        let mut f = list(Fit::First, &[64]);
        assert!(f.place(65, 1).is_none());
        f.place(64, 1).unwrap();
        assert!(f.place(1, 1).is_none());
    }

    #[test]
    fn reset_restores_whole_regions() {
        let mut f = list(Fit::First, &[64, 32]);
        f.place(60, 1).unwrap();
        f.place(30, 1).unwrap();
        f.reset();
        assert_eq!(f.free_bytes(), 96);
        assert_eq!(f.block_count(), 2);
    }
}
