//! Compressed edge-geometry storage for road-network graph contraction.
//!
//! When a preprocessing pass eliminates a degree-two node, the two edges
//! meeting there collapse into one logical edge. This crate keeps the
//! original per-segment node chain and directional weights recoverable under
//! the surviving edge identifier: chains live in a slot-recycled bucket
//! arena, an identifier registry tracks which edge addresses which slot, and
//! the finished arena flattens to a prefix-sum-indexed binary artifact that
//! route unpacking consumes later.
//!
//! The container is a build-time artifact producer: single-threaded,
//! mutated only through [`CompressedEdgeContainer::compress_edge`] and
//! [`CompressedEdgeContainer::add_uncompressed_edge`], then read-only.

#![forbid(unsafe_code)]

pub mod arena;
pub mod container;
pub mod error;
pub mod model;
pub mod registry;
pub mod ser;

pub use arena::{BucketArena, EdgeBucket};
pub use container::CompressedEdgeContainer;
pub use error::{GeometryError, Result};
pub use model::{EdgeId, NodeId, Segment, SlotIndex, Waypoint, Weight};
pub use registry::EdgeRegistry;
pub use ser::{read_geometry, write_geometry};
