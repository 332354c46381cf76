//! Bucket arena: slot-addressed chain storage with free-list recycling.

use crate::model::{SlotIndex, Waypoint};

/// Ordered waypoint sequence for one logical post-contraction edge.
pub type EdgeBucket = Vec<Waypoint>;

/// Number of empty buckets added per growth step. Tunable, not semantically
/// significant.
pub const FREE_LIST_BATCH: usize = 100;

/// Fixed-growth array of geometry buckets plus a LIFO stack of reusable slot
/// indices.
///
/// The arena manages pure index space: it has no notion of edge identifiers,
/// and a bucket is only ever reached through a [`SlotIndex`] obtained from
/// [`BucketArena::allocate`]. Growth never shrinks; released slots are
/// cleared and handed out again most-recently-freed first.
#[derive(Debug)]
pub struct BucketArena {
    buckets: Vec<EdgeBucket>,
    free_list: Vec<SlotIndex>,
}

impl Default for BucketArena {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketArena {
    /// Creates an arena with one batch of empty slots ready to hand out.
    pub fn new() -> Self {
        let mut arena = Self {
            buckets: Vec::new(),
            free_list: Vec::with_capacity(FREE_LIST_BATCH),
        };
        arena.grow();
        arena
    }

    fn grow(&mut self) {
        let start = self.buckets.len();
        self.buckets
            .resize_with(start + FREE_LIST_BATCH, EdgeBucket::new);
        for index in start..self.buckets.len() {
            self.free_list.push(SlotIndex(index as u32));
        }
    }

    /// Pops a free slot, growing by [`FREE_LIST_BATCH`] first if none is
    /// left. The returned bucket is empty.
    pub fn allocate(&mut self) -> SlotIndex {
        if self.free_list.is_empty() {
            self.grow();
        }
        self.free_list.pop().expect("free list refilled by grow")
    }

    /// Clears the slot's bucket and pushes the slot back onto the free list.
    ///
    /// The caller must already have removed every registry entry pointing at
    /// `slot`; the arena itself cannot check that.
    pub fn release(&mut self, slot: SlotIndex) {
        self.buckets[slot.0 as usize].clear();
        self.free_list.push(slot);
    }

    /// Immutable view of the bucket stored at `slot`.
    pub fn bucket(&self, slot: SlotIndex) -> &EdgeBucket {
        &self.buckets[slot.0 as usize]
    }

    /// Mutable view of the bucket stored at `slot`.
    pub fn bucket_mut(&mut self, slot: SlotIndex) -> &mut EdgeBucket {
        &mut self.buckets[slot.0 as usize]
    }

    /// Moves the chain out of `slot`, leaving an empty bucket behind.
    ///
    /// Used when splicing a donor chain onto another bucket: taking the
    /// waypoints by value keeps the two buckets from ever being borrowed at
    /// once.
    pub fn take(&mut self, slot: SlotIndex) -> EdgeBucket {
        std::mem::take(&mut self.buckets[slot.0 as usize])
    }

    /// Total number of slots ever created, free or live. Diagnostics only.
    pub fn slot_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of slots currently available for reuse. Diagnostics only.
    pub fn free_slots(&self) -> usize {
        self.free_list.len()
    }

    /// The free list itself, most-recently-freed last. Diagnostics only.
    pub fn free_list(&self) -> &[SlotIndex] {
        &self.free_list
    }

    /// True if no slot has been handed out yet.
    pub fn is_empty(&self) -> bool {
        self.free_list.len() == self.buckets.len()
    }

    /// Buckets in slot order, including empty ones; the serializer depends
    /// on this order being stable.
    pub fn iter(&self) -> impl Iterator<Item = &EdgeBucket> {
        self.buckets.iter()
    }
}
