//! Pooled placement: fixed-size slots per power-of-two size class.
//!
//! Each class keeps a LIFO stack of vacated slots, so allocate and free are
//! O(1) once a class is warm. Cold classes carve new slots from a backing
//! [`FreeList`], aligned to the class size so that any alignment up to the
//! class size is satisfied. Slots stay parked in their class after a free
//! and are only handed back to the backing store on reset. Requests larger
//! than the largest class are served by the backing store directly.

use smallvec::SmallVec;

use super::{FreeList, Placement, Placer};
use crate::config::Fit;

/// Size-class pools over a backing free-list.
pub(crate) struct Pooled {
    /// log2 of the smallest class.
    min_shift: u32,
    max_class: usize,
    /// Vacated `(region, offset)` slots per class, smallest class first.
    classes: SmallVec<[Vec<(u32, usize)>; 16]>,
    backing: FreeList,
}

impl Pooled {
    pub(crate) fn new(min_class: usize, max_class: usize) -> Self {
        let min_shift = min_class.trailing_zeros();
        let count = (max_class.trailing_zeros() - min_shift + 1) as usize;
        Self {
            min_shift,
            max_class,
            classes: (0..count).map(|_| Vec::new()).collect(),
            backing: FreeList::new(Fit::First),
        }
    }

    /// Class index serving `size` bytes at `align`, if any class is large enough.
    fn class_of(&self, size: usize, align: usize) -> Option<usize> {
        let need = size
            .max(align)
            .max(1 << self.min_shift)
            .checked_next_power_of_two()?;
        if need > self.max_class {
            return None;
        }
        Some((need.trailing_zeros() - self.min_shift) as usize)
    }

    fn class_size(&self, class: usize) -> usize {
        1 << (self.min_shift as usize + class)
    }

    /// Slots parked across all classes.
    pub(crate) fn free_slots(&self) -> usize {
        self.classes.iter().map(Vec::len).sum()
    }

    /// Bytes available without touching new memory: parked slots plus
    /// free backing blocks.
    pub(crate) fn free_bytes(&self) -> usize {
        let parked: usize = self
            .classes
            .iter()
            .enumerate()
            .map(|(class, stack)| stack.len() * self.class_size(class))
            .sum();
        parked + self.backing.free_bytes()
    }

    pub(crate) fn backing(&self) -> &FreeList {
        &self.backing
    }
}

impl Placer for Pooled {
    fn add_region(&mut self, index: u32, base: usize, capacity: usize) {
        self.backing.add_region(index, base, capacity);
    }

    #[inline]
    fn place(&mut self, size: usize, align: usize) -> Option<Placement> {
        let Some(class) = self.class_of(size, align) else {
            return self.backing.place(size, align);
        };
        let class_size = self.class_size(class);
        let (region, offset) = match self.classes[class].pop() {
            Some(slot) => slot,
            None => {
                let carved = self.backing.place(class_size, class_size)?;
                (carved.region, carved.offset)
            }
        };
        Some(Placement {
            region,
            offset,
            reserved: class_size,
            class: Some(class as u8),
        })
    }

    #[inline]
    fn reclaim(&mut self, placement: Placement) {
        match placement.class {
            Some(class) => self.classes[class as usize].push((placement.region, placement.offset)),
            None => self.backing.reclaim(placement),
        }
    }

    fn reset(&mut self) {
        for stack in &mut self.classes {
            stack.clear();
        }
        self.backing.reset();
    }

    fn footprint(&self, size: usize, align: usize) -> Option<usize> {
        match self.class_of(size, align) {
            // A class-aligned slot of class size, wherever the base falls.
            Some(class) => self.class_size(class).checked_mul(2)?.checked_sub(1),
            None => self.backing.footprint(size, align),
        }
    }
}
