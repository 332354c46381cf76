//! The compressed-edge container: chain merging, read-only queries and
//! build-phase statistics.

use std::path::Path;

use tracing::info;

use crate::arena::BucketArena;
use crate::error::{GeometryError, Result};
use crate::model::{EdgeId, NodeId, Segment, SlotIndex, Waypoint, Weight};
use crate::registry::EdgeRegistry;
use crate::ser;

/// Stores the original node chains and directional weights of edges merged
/// away by graph contraction, keyed by the surviving edge identifiers.
///
/// The contraction pass owns exactly one container for the duration of a
/// build, calls [`CompressedEdgeContainer::compress_edge`] once per
/// eliminated node (in arbitrary elimination order) and
/// [`CompressedEdgeContainer::add_uncompressed_edge`] for edges whose via
/// node survived, then serializes the result with
/// [`CompressedEdgeContainer::write_to`]. Afterwards the container is
/// read-only; route unpacking uses the query surface exclusively.
///
/// Any `Err` from a mutating call means the upstream input was corrupt and
/// the whole build run must be aborted; the container's state is
/// unspecified past that point.
#[derive(Debug)]
pub struct CompressedEdgeContainer {
    arena: BucketArena,
    registry: EdgeRegistry,
}

impl Default for CompressedEdgeContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressedEdgeContainer {
    /// Creates an empty container with one batch of arena slots ready.
    pub fn new() -> Self {
        Self {
            arena: BucketArena::new(),
            registry: EdgeRegistry::new(),
        }
    }

    /// Records the elimination of via node `v` between `u` and `w`.
    ///
    /// `fwd1` is the u→v segment and `fwd2` the v→w segment of the forward
    /// direction; `rev1` (w→v) and `rev2` (v→u) are their logical reverses.
    /// Either side may already be a multi-node chain from earlier merges:
    /// the left side is extended in place, and an already-compressed right
    /// side is spliced in wholesale, after which its slot is recycled. On
    /// return exactly `fwd1.id` and `rev1.id` address the merged u→w chain.
    pub fn compress_edge(
        &mut self,
        fwd1: Segment,
        fwd2: Segment,
        rev1: Segment,
        rev2: Segment,
        u: NodeId,
        v: NodeId,
        w: NodeId,
    ) -> Result<()> {
        for segment in [fwd1, fwd2, rev1, rev2] {
            if !segment.id.is_valid() {
                return Err(GeometryError::InvalidIdentifier("sentinel edge id"));
            }
            if !segment.weight.is_valid() {
                return Err(GeometryError::InvalidIdentifier("sentinel weight"));
            }
        }
        for node in [u, v, w] {
            if !node.is_valid() {
                return Err(GeometryError::InvalidIdentifier("sentinel node id"));
            }
        }

        let left_exists = self.registry.has(fwd1.id);
        let right_exists = self.registry.has(fwd2.id);

        // An edge and its logical reverse are compressed in lock-step; a
        // one-sided registration means the upstream pass fed us garbage.
        if left_exists != self.registry.has(rev2.id) {
            return Err(GeometryError::StructuralInconsistency(format!(
                "edges {} and {} are not registered in lock-step",
                fwd1.id, rev2.id
            )));
        }
        if right_exists != self.registry.has(rev1.id) {
            return Err(GeometryError::StructuralInconsistency(format!(
                "edges {} and {} are not registered in lock-step",
                fwd2.id, rev1.id
            )));
        }

        let slot = if left_exists {
            let slot = self.registry.slot_of(fwd1.id)?;
            // The chain gets appended to, so rev2 is an interior edge from
            // here on and must no longer be addressable.
            let freed = self.registry.unbind(rev2.id)?;
            if freed != slot {
                return Err(GeometryError::StructuralInconsistency(format!(
                    "reverse edge {} bound to slot {freed}, expected slot {slot}",
                    rev2.id
                )));
            }
            slot
        } else {
            let slot = self.arena.allocate();
            self.registry.bind(fwd1.id, slot)?;
            slot
        };

        let bucket = self.arena.bucket_mut(slot);
        if bucket.is_empty() {
            // First compression touching this edge: record source and via.
            bucket.push(Waypoint {
                node: u,
                forward_weight: Weight::INVALID,
                reverse_weight: rev2.weight,
            });
            bucket.push(Waypoint {
                node: v,
                forward_weight: fwd1.weight,
                reverse_weight: rev1.weight,
            });
        } else {
            let front = bucket[0];
            let back_index = bucket.len() - 1;
            let back = bucket[back_index];
            if front.node != u {
                return Err(GeometryError::StructuralInconsistency(format!(
                    "chain front node {} does not match source {u}",
                    front.node
                )));
            }
            if back.node != v {
                return Err(GeometryError::StructuralInconsistency(format!(
                    "chain back node {} does not match via {v}",
                    back.node
                )));
            }
            if front.forward_weight.is_valid() {
                return Err(GeometryError::StructuralInconsistency(
                    "chain front forward weight already set".into(),
                ));
            }
            if back.reverse_weight.is_valid() {
                return Err(GeometryError::StructuralInconsistency(
                    "chain back reverse weight already set".into(),
                ));
            }
            // Provisional: a spliced right-hand chain replaces this with the
            // per-step value it recorded when it was first compressed.
            bucket[back_index].reverse_weight = rev1.weight;
        }

        if right_exists {
            self.splice_right_chain(slot, fwd2, rev1)?;
        } else {
            // The second segment is atomic: the chain ends at w.
            self.arena.bucket_mut(slot).push(Waypoint {
                node: w,
                forward_weight: fwd2.weight,
                reverse_weight: Weight::INVALID,
            });
            self.registry.bind(rev1.id, slot)?;
        }
        Ok(())
    }

    /// Splices the already-compressed chain keyed by `fwd2`/`rev1` onto the
    /// chain at `slot`, re-keys `rev1` and recycles the donor slot.
    fn splice_right_chain(&mut self, slot: SlotIndex, fwd2: Segment, rev1: Segment) -> Result<()> {
        let donor_slot = self.registry.slot_of(fwd2.id)?;
        let rev_slot = self.registry.slot_of(rev1.id)?;
        if donor_slot != rev_slot {
            return Err(GeometryError::StructuralInconsistency(format!(
                "edges {} and {} address different slots {donor_slot} and {rev_slot}",
                fwd2.id, rev1.id
            )));
        }
        if donor_slot == slot {
            return Err(GeometryError::StructuralInconsistency(format!(
                "edge {} already shares slot {slot} with the left chain",
                fwd2.id
            )));
        }

        let donor = self.arena.take(donor_slot);
        let Some(donor_front) = donor.first().copied() else {
            return Err(GeometryError::StructuralInconsistency(format!(
                "edge {} is bound to empty slot {donor_slot}",
                fwd2.id
            )));
        };
        if donor_front.forward_weight.is_valid() {
            // A valid forward weight on the front record means this is an
            // atomic one-waypoint registration, never a mergeable chain.
            return Err(GeometryError::StructuralInconsistency(format!(
                "donor chain front in slot {donor_slot} carries a forward weight"
            )));
        }
        if donor.len() < 2 {
            return Err(GeometryError::StructuralInconsistency(format!(
                "donor chain in slot {donor_slot} has a single waypoint"
            )));
        }

        // The supplied reverse weight must equal the per-step reverse costs
        // accumulated along the donor chain back to its source. This is an
        // always-on cross-check against upstream weight computation.
        let mut accumulated = Weight(0);
        for waypoint in &donor[..donor.len() - 1] {
            if !waypoint.reverse_weight.is_valid() {
                return Err(GeometryError::StructuralInconsistency(format!(
                    "donor chain in slot {donor_slot} has an unset interior reverse weight"
                )));
            }
            accumulated = accumulated
                .checked_add(waypoint.reverse_weight)
                .ok_or(GeometryError::CapacityOverflow("reverse weight sum"))?;
        }
        if accumulated != rev1.weight {
            return Err(GeometryError::StructuralInconsistency(format!(
                "reverse weight {} does not match accumulated chain weight {accumulated}",
                rev1.weight
            )));
        }

        let chain = self.arena.bucket_mut(slot);
        let back_index = chain.len() - 1;
        if chain[back_index].node != donor_front.node {
            return Err(GeometryError::StructuralInconsistency(format!(
                "chain back node {} does not adjoin donor front node {}",
                chain[back_index].node, donor_front.node
            )));
        }
        // The donor's front record holds the correct reverse weight for the
        // joining node, computed when that chain was first built.
        chain[back_index].reverse_weight = donor_front.reverse_weight;
        chain.extend(donor.into_iter().skip(1));

        let freed = self.registry.unbind(fwd2.id)?;
        if freed != donor_slot {
            return Err(GeometryError::StructuralInconsistency(format!(
                "edge {} bound to slot {freed}, expected slot {donor_slot}",
                fwd2.id
            )));
        }
        self.registry.rebind(rev1.id, slot);
        self.arena.release(donor_slot);
        Ok(())
    }

    /// Registers a one-step chain for an edge whose via node was never
    /// eliminated. Idempotent: repeated calls leave the single waypoint
    /// untouched.
    pub fn add_uncompressed_edge(
        &mut self,
        edge: EdgeId,
        target: NodeId,
        weight: Weight,
    ) -> Result<()> {
        if !edge.is_valid() {
            return Err(GeometryError::InvalidIdentifier("sentinel edge id"));
        }
        if !target.is_valid() {
            return Err(GeometryError::InvalidIdentifier("sentinel node id"));
        }
        if !weight.is_valid() {
            return Err(GeometryError::InvalidIdentifier("sentinel weight"));
        }

        let slot = if self.registry.has(edge) {
            self.registry.slot_of(edge)?
        } else {
            let slot = self.arena.allocate();
            self.registry.bind(edge, slot)?;
            slot
        };

        let bucket = self.arena.bucket_mut(slot);
        if bucket.is_empty() {
            // The start node is implied by the edge identifier; only the
            // forward hop to the target is recorded.
            bucket.push(Waypoint {
                node: target,
                forward_weight: weight,
                reverse_weight: Weight::INVALID,
            });
        }
        Ok(())
    }

    /// True if `edge` currently addresses a chain.
    pub fn has_entry(&self, edge: EdgeId) -> bool {
        self.registry.has(edge)
    }

    /// Arena slot addressed by `edge`.
    pub fn slot_of(&self, edge: EdgeId) -> Result<SlotIndex> {
        self.registry.slot_of(edge)
    }

    /// The waypoint chain addressed by `edge`, source first, target last.
    pub fn bucket(&self, edge: EdgeId) -> Result<&[Waypoint]> {
        let slot = self.registry.slot_of(edge)?;
        Ok(self.arena.bucket(slot))
    }

    /// True iff `edge` still holds a single original segment: registered via
    /// [`CompressedEdgeContainer::add_uncompressed_edge`] and never merged.
    /// A single merge already produces a three-waypoint chain, so this
    /// cleanly separates "never compressed" from "compressed at least once".
    pub fn is_trivial(&self, edge: EdgeId) -> Result<bool> {
        Ok(self.bucket(edge)?.len() == 1)
    }

    /// Node of the chain's front waypoint (the chain's source).
    pub fn first_node(&self, edge: EdgeId) -> Result<NodeId> {
        let bucket = self.bucket(edge)?;
        bucket.first().map(|waypoint| waypoint.node).ok_or_else(|| {
            GeometryError::StructuralInconsistency(format!("chain for edge {edge} is empty"))
        })
    }

    /// Node of the chain's back waypoint (the chain's target).
    pub fn last_node(&self, edge: EdgeId) -> Result<NodeId> {
        let bucket = self.bucket(edge)?;
        bucket.last().map(|waypoint| waypoint.node).ok_or_else(|| {
            GeometryError::StructuralInconsistency(format!("chain for edge {edge} is empty"))
        })
    }

    /// Node one before the chain's back waypoint, used to reconstruct the
    /// final approach direction when unpacking a route.
    pub fn second_to_last_node(&self, edge: EdgeId) -> Result<NodeId> {
        let bucket = self.bucket(edge)?;
        if bucket.len() < 2 {
            return Err(GeometryError::StructuralInconsistency(format!(
                "chain for edge {edge} has fewer than two waypoints"
            )));
        }
        Ok(bucket[bucket.len() - 2].node)
    }

    /// Read-only view of the bucket arena.
    pub fn arena(&self) -> &BucketArena {
        &self.arena
    }

    /// Read-only view of the edge registry.
    pub fn registry(&self) -> &EdgeRegistry {
        &self.registry
    }

    /// Writes the arena to `path` in the flat geometry file format.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        ser::write_geometry(&self.arena, path)
    }

    /// Emits a one-line structured summary of the finished compression.
    pub fn log_statistics(&self) {
        let mut chains = 0usize;
        let mut waypoints = 0usize;
        let mut longest_chain = 0usize;
        for bucket in self.arena.iter() {
            if bucket.is_empty() {
                continue;
            }
            chains += 1;
            waypoints += bucket.len();
            longest_chain = longest_chain.max(bucket.len());
        }
        let avg_chain_len = waypoints as f64 / chains.max(1) as f64;
        let compression_ratio = chains as f64 / waypoints.max(1) as f64;
        info!(
            slots = self.arena.slot_count(),
            free_slots = self.arena.free_slots(),
            bound_edges = self.registry.len(),
            chains,
            waypoints,
            longest_chain,
            avg_chain_len,
            compression_ratio,
            "geometry.compression.stats"
        );
    }
}
