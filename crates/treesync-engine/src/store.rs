//! Store facade trait for remote-side primitives
//!
//! The engine never talks a wire protocol itself; it drives an injected
//! [`Store`] implementation through a small set of blocking primitives.
//! Implementations handle the specifics of the remote system; fakes in
//! `treesync-test-utils` record calls for deterministic testing.

use treesync_model::{Direction, Resource};

/// Result type for store primitives
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors a store implementation can surface to the engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The resource is unknown to the store
    #[error("resource not tracked by the store: {path}")]
    NotTracked { path: String },

    /// The remote side rejected the operation
    #[error("remote store rejected {path}: {reason}")]
    Rejected { path: String, reason: String },

    /// A batch primitive failed partway through its slice.
    ///
    /// `applied` counts the resources at the front of the slice whose
    /// effects did take hold; the engine folds exactly that prefix and
    /// leaves the rest classified for a retry.
    #[error("batch failed after {applied} resources: {reason}")]
    Partial { applied: usize, reason: String },

    /// The remote store could not be reached
    #[error("remote store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl StoreError {
    /// The applied-prefix length for partial batch failures, 0 otherwise.
    pub fn applied_prefix(&self) -> usize {
        match self {
            StoreError::Partial { applied, .. } => *applied,
            _ => 0,
        }
    }
}

/// How a fetch addresses depth and local edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Descend into folder contents
    pub recursive: bool,
    /// Overwrite local modifications instead of refusing
    pub ignore_local_changes: bool,
}

impl FetchOptions {
    /// Shallow fetch preserving local modifications.
    pub fn shallow() -> Self {
        Self {
            recursive: false,
            ignore_local_changes: false,
        }
    }

    /// Recursive fetch preserving local modifications.
    pub fn deep() -> Self {
        Self {
            recursive: true,
            ignore_local_changes: false,
        }
    }

    /// Shallow fetch overwriting local modifications.
    pub fn shallow_ignore_local() -> Self {
        Self {
            recursive: false,
            ignore_local_changes: true,
        }
    }
}

/// Blocking primitives the engine composes into operations.
///
/// Contract notes:
///
/// - `register` begins tracking a resource: remote-side bookkeeping for
///   folders, content registration for later publish for files. It is
///   idempotent — registering an already-registered resource is a
///   store-level no-op, not an error.
/// - Slice-taking primitives apply their resources in order; on failure
///   they may report the applied prefix via [`StoreError::Partial`].
/// - `convert_direction` flips which side a recorded change belongs to;
///   only [`Direction::Incoming`] and [`Direction::Outgoing`] are
///   meaningful targets.
pub trait Store {
    /// Is this resource already tracked by the store?
    fn is_tracked(&self, resource: &Resource) -> StoreResult<bool>;

    /// Begin tracking a resource. Idempotent.
    fn register(&mut self, resource: &Resource) -> StoreResult<()>;

    /// Stop tracking a resource without touching content.
    fn unregister(&mut self, resource: &Resource) -> StoreResult<()>;

    /// Remove the local copy of a resource.
    fn delete_local(&mut self, resource: &Resource) -> StoreResult<()>;

    /// Record remote-side deletions for the given resources.
    fn delete_remote(&mut self, resources: &[Resource]) -> StoreResult<()>;

    /// Publish local content for the given resources with a message.
    fn publish(&mut self, resources: &[Resource], message: &str) -> StoreResult<()>;

    /// Bring remote content into the local copies of the given resources.
    fn fetch(&mut self, resources: &[Resource], options: FetchOptions) -> StoreResult<()>;

    /// Record that conflicts on the given resources were merged.
    fn mark_merged(&mut self, resources: &[Resource]) -> StoreResult<()>;

    /// Re-attribute a recorded change to the given direction.
    fn convert_direction(&mut self, resource: &Resource, to: Direction) -> StoreResult<()>;
}
