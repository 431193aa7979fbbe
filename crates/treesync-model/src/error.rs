//! Error types for treesync-model

/// Result type for treesync-model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating a sync tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A node handle does not belong to this tree
    #[error("node {index} does not exist in this tree")]
    NoSuchNode { index: usize },

    /// A node handle points at a slot that was already removed
    #[error("node {index} was removed from the tree")]
    NodeRemoved { index: usize },

    /// A child was attached to a leaf node
    #[error("{path} is a leaf and cannot have children")]
    NotAContainer { path: String },
}
