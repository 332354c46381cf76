//! Edge-identifier to arena-slot registry.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;

use crate::error::{GeometryError, Result};
use crate::model::{EdgeId, SlotIndex};

/// Mapping from pre-contraction edge identifier to the arena slot holding
/// its chain.
///
/// In steady state every live identifier maps to exactly one slot; a forward
/// edge and its logical reverse share a slot, and interior edges of a merged
/// chain are unbound and not separately addressable. Binding an identifier
/// twice is a logic error except through [`EdgeRegistry::rebind`], the one
/// sanctioned overwrite used when a chain boundary is re-pointed during a
/// merge.
#[derive(Debug, Default)]
pub struct EdgeRegistry {
    map: FxHashMap<EdgeId, SlotIndex>,
}

impl EdgeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `edge` is currently bound to a slot.
    pub fn has(&self, edge: EdgeId) -> bool {
        self.map.contains_key(&edge)
    }

    /// Slot bound to `edge`, or [`GeometryError::UnknownEdge`].
    pub fn slot_of(&self, edge: EdgeId) -> Result<SlotIndex> {
        self.map
            .get(&edge)
            .copied()
            .ok_or(GeometryError::UnknownEdge(edge))
    }

    /// Binds `edge` to `slot`, failing fast if it is already bound.
    pub fn bind(&mut self, edge: EdgeId, slot: SlotIndex) -> Result<()> {
        match self.map.entry(edge) {
            Entry::Occupied(occupied) => Err(GeometryError::StructuralInconsistency(format!(
                "edge {edge} already bound to slot {}, refusing bind to {slot}",
                occupied.get()
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                Ok(())
            }
        }
    }

    /// Binds `edge` to `slot`, replacing any existing binding.
    pub fn rebind(&mut self, edge: EdgeId, slot: SlotIndex) {
        self.map.insert(edge, slot);
    }

    /// Removes `edge`'s binding, returning the slot it pointed at so callers
    /// can cross-check it against their expectation.
    pub fn unbind(&mut self, edge: EdgeId) -> Result<SlotIndex> {
        self.map
            .remove(&edge)
            .ok_or(GeometryError::UnknownEdge(edge))
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All live bindings, in no particular order. Diagnostics and tests.
    pub fn iter(&self) -> impl Iterator<Item = (EdgeId, SlotIndex)> + '_ {
        self.map.iter().map(|(&edge, &slot)| (edge, slot))
    }
}
