//! # regio-graph: Process Graph Model and Store
//!
//! The data model the regionalization engine operates on, and the boundary
//! to the store that receives its output.
//!
//! ## Modules
//!
//! - **model**: [`Process`], [`Exchange`] and their enums. Every process has
//!   exactly one production exchange referencing itself.
//! - **graph**: [`ProcessGraph`], an arena keyed by [`ProcessId`], and
//!   [`GraphDelta`], the unit of change a pass returns.
//! - **index**: [`ProcessIndex`], exact `(commodity, geography, activity)`
//!   lookups built once per run.
//! - **store**: the [`ProcessStore`] trait with [`MemoryStore`] and
//!   [`JsonDirStore`] implementations.
//!
//! ## Crate Policy
//!
//! - Templates are never mutated. Passes stage new or replacement nodes in a
//!   delta; the graph validates a delta before applying any of it.
//! - Iteration over graphs and indexes is in a total order, so output is
//!   reproducible run to run.
//!
//! [`ProcessId`]: regio_core::ProcessId

pub mod error;
pub mod graph;
pub mod index;
pub mod model;
pub mod store;

pub use error::{GraphError, StoreError};
pub use graph::{GraphDelta, ProcessGraph};
pub use index::{IndexEntry, ProcessIndex};
pub use model::{
    ElementaryFlow, Exchange, ExchangeRole, ExchangeTarget, Process, ProcessKey, ProcessKind,
};
pub use store::{slice_digest, JsonDirStore, MemoryStore, ProcessStore};
