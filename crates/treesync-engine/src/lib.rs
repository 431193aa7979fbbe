//! Reconciliation engine for TreeSync
//!
//! This crate implements the orchestration layer that applies
//! synchronization operations to a [`treesync_model::SyncTree`]:
//!
//! - **Engine**: the per-invocation state machine — filter, pre-flight
//!   prompting, classification, prerequisite resolution, batch
//!   application, fold
//! - **Operation specializations**: publish, force-publish, update
//!   (optionally auto-mergeable-only), force-update, register-new, and
//!   fetch-only, each with its eligibility predicate and
//!   classification table
//! - **Collaborator traits**: [`Store`] primitives, conflict/comment
//!   prompts, and progress/cancellation tokens, all injected for
//!   deterministic testing
//!
//! # Architecture
//!
//! ```text
//!       caller / frontend
//!              |
//!       treesync-engine
//!              |
//!       treesync-model
//! ```
//!
//! The engine owns no wire format and performs no I/O of its own; every
//! remote effect goes through the injected [`Store`].

mod batch;

pub mod engine;
pub mod error;
pub mod logging;
pub mod operation;
pub mod progress;
pub mod prompt;
pub mod store;

pub use engine::Engine;
pub use error::{EngineError, Result, StorePrimitive};
pub use operation::OperationKind;
pub use progress::{NullProgress, ProgressToken};
pub use prompt::{CommentPrompt, ConflictDecision, ConflictPrompt};
pub use store::{FetchOptions, Store, StoreError, StoreResult};
