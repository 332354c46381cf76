//! Error taxonomy for geometry compression and serialization.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::EdgeId;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GeometryError>;

/// Failures surfaced by the compressed-edge container.
///
/// Everything except [`GeometryError::UnknownEdge`] on the read-only query
/// surface indicates corrupt upstream input or a broken artifact; a build
/// run observing one of those must be aborted rather than continued, since
/// persisting a half-merged chain produces wrong routes later.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// A reserved sentinel identifier or weight was supplied as real input.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(&'static str),
    /// Lookup on an edge identifier the registry has never seen.
    #[error("edge {0} not found")]
    UnknownEdge(EdgeId),
    /// A merge-time invariant did not hold: adjoining-node mismatch,
    /// reverse-weight-sum mismatch, endpoint-field violation or a registry
    /// binding conflict.
    #[error("structural inconsistency: {0}")]
    StructuralInconsistency(String),
    /// A weight or count left the representable range.
    #[error("capacity overflow: {0}")]
    CapacityOverflow(&'static str),
    /// A serialized geometry artifact does not match the documented layout.
    #[error("corruption detected: {0}")]
    Corruption(String),
    /// Underlying storage failed while writing or reading the artifact.
    #[error("I/O failure on {} at byte {offset}: {source}", path.display())]
    Io {
        /// File the serializer was working on.
        path: PathBuf,
        /// Byte offset of the failed operation.
        offset: u64,
        /// Originating I/O error.
        source: io::Error,
    },
}
