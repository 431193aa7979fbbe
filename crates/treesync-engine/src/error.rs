//! Error types for treesync-engine

use crate::store::StoreError;

/// Result type for treesync-engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Which store primitive a failure occurred in, for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePrimitive {
    IsTracked,
    Register,
    Unregister,
    DeleteLocal,
    DeleteRemote,
    Publish,
    Fetch,
    MarkMerged,
    ConvertDirection,
}

impl std::fmt::Display for StorePrimitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StorePrimitive::IsTracked => "is-tracked",
            StorePrimitive::Register => "register",
            StorePrimitive::Unregister => "unregister",
            StorePrimitive::DeleteLocal => "delete-local",
            StorePrimitive::DeleteRemote => "delete-remote",
            StorePrimitive::Publish => "publish",
            StorePrimitive::Fetch => "fetch",
            StorePrimitive::MarkMerged => "mark-merged",
            StorePrimitive::ConvertDirection => "convert-direction",
        };
        write!(f, "{label}")
    }
}

/// Errors that can terminate an engine invocation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A pre-flight prompt was answered with abort/cancel.
    /// No store primitive was invoked; the tree is unchanged.
    #[error("cancelled before any store operation")]
    UserCancelled,

    /// The progress token signalled cancellation between primitives.
    /// Nodes applied before the cancellation are folded into the tree;
    /// the rest keep their pre-invocation classification.
    #[error("cancelled after {applied} of {total} nodes were applied")]
    OperationCancelled { applied: usize, total: usize },

    /// A store primitive failed. Nodes applied before the failing call
    /// are folded in; the failing node and all subsequent ones keep
    /// their classification, so a retry is safe.
    #[error("{primitive} failed for {resource}: {source}")]
    StoreFailure {
        primitive: StorePrimitive,
        resource: String,
        #[source]
        source: StoreError,
    },

    /// An internal invariant was violated. Fatal for the invocation;
    /// nothing was applied for the affected subtree.
    #[error("sync tree inconsistency: {message}")]
    Inconsistency { message: String },
}

impl From<treesync_model::Error> for EngineError {
    fn from(err: treesync_model::Error) -> Self {
        EngineError::Inconsistency {
            message: err.to_string(),
        }
    }
}
