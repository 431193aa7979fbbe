//! Data model for TreeSync
//!
//! This crate holds the synchronization vocabulary shared by the whole
//! workspace:
//!
//! - **Resource identity**: [`ResourcePath`], [`Resource`], [`ResourceKind`]
//! - **State classification**: [`Direction`], [`ChangeType`], [`SyncState`]
//!   and its predicate set
//! - **The tree**: arena-backed [`SyncTree`] with [`NodeId`] handles and
//!   the exhaustive [`NodeKind`] variant
//! - **Working selections**: [`SyncSet`] with aggregate queries and
//!   destructive filters
//!
//! No I/O happens here; the tree is produced by an external three-way
//! comparison and consumed by the reconciliation engine.

pub mod error;
pub mod resource;
pub mod set;
pub mod state;
pub mod tree;

pub use error::{Error, Result};
pub use resource::{Resource, ResourceKind, ResourcePath};
pub use set::{ChangeStats, SyncSet};
pub use state::{ChangeType, Direction, SyncState};
pub use tree::{NodeId, NodeKind, SyncNode, SyncTree};
