//! Synchronization state vocabulary
//!
//! Every resource in a synchronized tree carries a [`SyncState`]: the
//! direction a change flows in, the nature of the change, and — for
//! conflicts only — whether an automatic content merge can resolve it.
//! All filtering and batching decisions elsewhere in the workspace go
//! through the predicate methods on [`SyncState`]; nothing inspects the
//! representation directly.

use serde::{Deserialize, Serialize};

/// Where a change originates relative to the common ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Local and remote agree with the base
    InSync,
    /// The remote side changed; pulling applies it locally
    Incoming,
    /// The local side changed; publishing applies it remotely
    Outgoing,
    /// Both sides changed incompatibly
    Conflicting,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Direction::InSync => "in-sync",
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
            Direction::Conflicting => "conflicting",
        };
        write!(f, "{label}")
    }
}

/// The nature of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    /// No change
    None,
    /// The resource was added
    Addition,
    /// The resource was deleted
    Deletion,
    /// The resource content or metadata changed
    Modification,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChangeType::None => "none",
            ChangeType::Addition => "addition",
            ChangeType::Deletion => "deletion",
            ChangeType::Modification => "modification",
        };
        write!(f, "{label}")
    }
}

/// The synchronization state of one resource.
///
/// Constructors maintain the invariant that an in-sync state never
/// carries a change type, and that the auto-mergeable flag is only set
/// on conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncState {
    direction: Direction,
    change: ChangeType,
    auto_mergeable: bool,
}

impl SyncState {
    /// The in-sync state.
    pub fn in_sync() -> Self {
        Self {
            direction: Direction::InSync,
            change: ChangeType::None,
            auto_mergeable: false,
        }
    }

    /// An incoming or outgoing change.
    ///
    /// An `InSync` direction or a `None` change collapses to the plain
    /// in-sync state; a `Conflicting` direction gets a non-mergeable
    /// conflict (use [`SyncState::conflict`] to control mergeability).
    pub fn change(direction: Direction, change: ChangeType) -> Self {
        if direction == Direction::InSync || change == ChangeType::None {
            return Self::in_sync();
        }
        Self {
            direction,
            change,
            auto_mergeable: false,
        }
    }

    /// A conflicting change.
    pub fn conflict(change: ChangeType, auto_mergeable: bool) -> Self {
        if change == ChangeType::None {
            return Self::in_sync();
        }
        Self {
            direction: Direction::Conflicting,
            change,
            auto_mergeable,
        }
    }

    /// The direction axis of this state.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The change-type axis of this state.
    pub fn change_type(&self) -> ChangeType {
        self.change
    }

    /// True when local and remote agree.
    pub fn is_in_sync(&self) -> bool {
        self.direction == Direction::InSync
    }

    /// True when this state carries any change at all.
    pub fn has_change(&self) -> bool {
        self.direction != Direction::InSync
    }

    /// True for conflicting changes.
    pub fn is_conflict(&self) -> bool {
        self.direction == Direction::Conflicting
    }

    /// True for remote-originated changes.
    pub fn is_incoming(&self) -> bool {
        self.direction == Direction::Incoming
    }

    /// True for locally-originated changes.
    pub fn is_outgoing(&self) -> bool {
        self.direction == Direction::Outgoing
    }

    /// True when the resource was added.
    pub fn is_addition(&self) -> bool {
        self.change == ChangeType::Addition
    }

    /// True when the resource was deleted.
    pub fn is_deletion(&self) -> bool {
        self.change == ChangeType::Deletion
    }

    /// True when the resource was modified in place.
    pub fn is_modification(&self) -> bool {
        self.change == ChangeType::Modification
    }

    /// True for conflicts an automatic content merge can resolve.
    pub fn is_automergeable_conflict(&self) -> bool {
        self.is_conflict() && self.auto_mergeable
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::in_sync()
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_in_sync() {
            write!(f, "in-sync")
        } else if self.is_automergeable_conflict() {
            write!(f, "{} {} (auto-mergeable)", self.direction, self.change)
        } else {
            write!(f, "{} {}", self.direction, self.change)
        }
    }
}
