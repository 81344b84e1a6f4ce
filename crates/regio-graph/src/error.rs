//! # Graph and Store Errors

use regio_core::{CanonicalizationError, CommodityId, Geography, ProcessId};
use thiserror::Error;

/// Structural errors in the process graph.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A process with this identity is already in the graph.
    #[error("duplicate process identity {0}")]
    DuplicateProcess(ProcessId),

    /// No process with this identity exists.
    #[error("unknown process {0}")]
    UnknownProcess(ProcessId),

    /// A process must carry exactly one production exchange.
    #[error("{id} has {found} production exchanges, expected exactly one")]
    ProductionExchangeCount {
        /// Offending process.
        id: ProcessId,
        /// Number of production exchanges found.
        found: usize,
    },

    /// The production exchange points somewhere other than the process itself.
    #[error("production exchange of {0} does not reference the process itself")]
    ProductionNotSelf(ProcessId),

    /// Two processes share the same lookup key.
    #[error("processes {first} and {second} share key ({commodity}, {geography}, {activity:?})")]
    DuplicateKey {
        /// Reference product.
        commodity: CommodityId,
        /// Location.
        geography: Geography,
        /// Activity name.
        activity: String,
        /// Identity already indexed.
        first: ProcessId,
        /// Identity that collided.
        second: ProcessId,
    },
}

/// Errors raised by a [`ProcessStore`](crate::store::ProcessStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    /// A slice file could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The slice could not be canonicalized for digesting.
    #[error("slice digest failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Slice names become file names and must stay inside the namespace.
    #[error("invalid slice name {0:?}")]
    InvalidSliceName(String),
}
