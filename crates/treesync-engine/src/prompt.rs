//! Decision collaborators consulted before a batch runs
//!
//! Both prompts are injected into the engine so tests can script them;
//! an interactive frontend would put a dialog behind each trait.

use treesync_model::{SyncSet, SyncTree};

/// Outcome of the pre-flight conflict consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Apply the operation to the whole set, conflicts included
    ProceedAll,
    /// Drop the threatened members and apply to the rest
    ProceedNonConflicting,
    /// Terminate the invocation with no side effects
    Abort,
}

/// Consulted when an operation would touch conflicting work.
pub trait ConflictPrompt {
    /// Decide how to treat a set that still contains threatened members.
    fn ask(&self, tree: &SyncTree, set: &SyncSet) -> ConflictDecision;
}

/// Captures the message attached to published changes.
pub trait CommentPrompt {
    /// Returns the publish message, or `None` to cancel the operation.
    fn ask(&self) -> Option<String>;
}
