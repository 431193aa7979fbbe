//! Operation specializations
//!
//! Each operation supplies an eligibility predicate, a prompt policy,
//! and a classification table mapping a leaf's `(direction, change)`
//! pair to the ordered store steps that synchronize it. The tables are
//! total: pairs an operation never observes still map to an answer
//! instead of panicking.

use treesync_model::{ChangeType, Direction, SyncSet, SyncState, SyncTree};

/// The synchronization operations a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Publish local changes to the remote store ("commit")
    Publish,
    /// Publish, overriding conflicting and incoming work
    ForcePublish,
    /// Pull remote changes into the working tree ("update").
    ///
    /// With `mergeable_only` set, conflicts that cannot be auto-merged
    /// are filtered out and the rest are fetched without discarding
    /// local work.
    Update {
        /// Restrict conflict handling to auto-mergeable conflicts
        mergeable_only: bool,
    },
    /// Pull, overriding conflicting and outgoing work
    ForceUpdate,
    /// Begin tracking brand-new local resources ("add")
    Register,
    /// Fetch remote content without publishing anything ("get")
    Fetch,
}

/// One store step a classified node requires, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Register,
    /// Unregister then register; used when the remote counterpart is gone
    Reregister,
    ConvertOutgoing,
    ConvertIncoming,
    DeleteRemote,
    DeleteLocal,
    MarkMerged,
    Publish,
    FetchShallow,
    FetchDeep,
    FetchIgnoreLocal,
}

impl Step {
    /// Weighted work units for progress apportioning.
    pub(crate) fn units(self) -> u32 {
        match self {
            Step::Reregister | Step::DeleteRemote | Step::DeleteLocal => 2,
            _ => 1,
        }
    }
}

/// When the pre-flight conflict prompt fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromptPolicy {
    /// Prompt on every invocation
    Always,
    /// Prompt only when the set contains threatened members
    WhenThreatened,
    /// Never prompt
    Never,
}

impl OperationKind {
    /// Short label for logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Publish => "publish",
            OperationKind::ForcePublish => "force-publish",
            OperationKind::Update { .. } => "update",
            OperationKind::ForceUpdate => "force-update",
            OperationKind::Register => "register-new",
            OperationKind::Fetch => "fetch",
        }
    }

    /// Whether this operation publishes and therefore needs a message.
    pub(crate) fn is_publish_kind(&self) -> bool {
        matches!(self, OperationKind::Publish | OperationKind::ForcePublish)
    }

    /// Leaf-level eligibility for this operation.
    ///
    /// Container enablement is a depth-first OR over descendants, done
    /// by the engine.
    pub fn is_eligible(&self, state: SyncState) -> bool {
        match self {
            OperationKind::Publish => state.is_outgoing() || state.is_conflict(),
            OperationKind::ForcePublish => state.is_conflict() || state.is_incoming(),
            OperationKind::Update { .. } => state.has_change(),
            OperationKind::ForceUpdate => state.is_conflict() || state.is_outgoing(),
            OperationKind::Register => state.is_outgoing() && state.is_addition(),
            OperationKind::Fetch => state.is_incoming() || state.is_conflict(),
        }
    }

    pub(crate) fn prompt_policy(&self) -> PromptPolicy {
        match self {
            OperationKind::Publish | OperationKind::Update { .. } | OperationKind::Fetch => {
                PromptPolicy::WhenThreatened
            }
            OperationKind::ForcePublish | OperationKind::ForceUpdate => PromptPolicy::Always,
            OperationKind::Register => PromptPolicy::Never,
        }
    }

    /// Does the set contain members this operation would override?
    ///
    /// Publish-type operations threaten remote work (conflicts and
    /// incoming changes); pull-type operations threaten local work
    /// (conflicts and outgoing changes).
    pub(crate) fn threatens(&self, tree: &SyncTree, set: &SyncSet) -> bool {
        if set.has_conflicts(tree) {
            return true;
        }
        if self.is_publish_kind() {
            set.has_incoming_changes(tree)
        } else {
            set.has_outgoing_changes(tree)
        }
    }

    /// Drop the members a proceed-non-conflicting answer excludes.
    pub(crate) fn drop_threatened(&self, tree: &SyncTree, set: &mut SyncSet) {
        set.remove_conflicting(tree);
        if self.is_publish_kind() {
            set.remove_incoming(tree);
        } else {
            set.remove_outgoing(tree);
        }
    }

    /// The ordered store steps for a leaf in the given state.
    ///
    /// An empty slice means the pair needs no work under this operation.
    pub(crate) fn classify(&self, state: SyncState) -> &'static [Step] {
        use ChangeType::*;
        use Direction::*;

        let pair = (state.direction(), state.change_type());
        match self {
            OperationKind::Publish => match pair {
                (Outgoing, Addition) => &[Step::Register, Step::Publish],
                (Outgoing, Deletion) => &[Step::DeleteRemote, Step::Publish],
                (Outgoing, _) => &[Step::Publish],
                (Incoming, _) => &[Step::ConvertOutgoing, Step::Publish],
                (Conflicting, _) if state.is_automergeable_conflict() => &[Step::Publish],
                (Conflicting, _) => &[Step::MarkMerged, Step::Publish],
                (InSync, _) => &[],
            },
            OperationKind::ForcePublish => match pair {
                (Outgoing, Addition) => &[Step::Register, Step::Publish],
                (Outgoing, Deletion) => &[Step::DeleteRemote, Step::Publish],
                (Outgoing, _) => &[Step::Publish],
                // The remote counterpart of an incoming deletion is
                // gone; converting would dangle, so re-register the
                // local copy from scratch.
                (Incoming, Deletion) => &[Step::Reregister, Step::Publish],
                (Incoming, _) => &[Step::ConvertOutgoing, Step::Publish],
                (Conflicting, _) => &[Step::MarkMerged, Step::Publish],
                (InSync, _) => &[],
            },
            OperationKind::Update { mergeable_only } => match pair {
                (Outgoing, Addition) => &[Step::ConvertIncoming, Step::DeleteLocal],
                (Outgoing, Deletion) => &[Step::FetchDeep],
                (Outgoing, _) => &[Step::FetchIgnoreLocal],
                (Incoming, Addition) => &[Step::FetchIgnoreLocal],
                (Incoming, _) => &[Step::FetchDeep],
                (Conflicting, _) if *mergeable_only => &[Step::FetchShallow],
                (Conflicting, _) => &[Step::FetchIgnoreLocal],
                (InSync, _) => &[],
            },
            OperationKind::ForceUpdate => match pair {
                (Outgoing, Addition) => &[Step::ConvertIncoming, Step::DeleteLocal],
                (Outgoing, Deletion) => &[Step::FetchDeep],
                (Outgoing, _) => &[Step::FetchIgnoreLocal],
                (Incoming, Addition) => &[Step::FetchIgnoreLocal],
                (Incoming, _) => &[Step::FetchDeep],
                (Conflicting, _) => &[Step::FetchIgnoreLocal],
                (InSync, _) => &[],
            },
            OperationKind::Register => match pair {
                (Outgoing, Addition) => &[Step::Register],
                _ => &[],
            },
            OperationKind::Fetch => match pair {
                (Incoming, Addition) => &[Step::FetchIgnoreLocal],
                (Incoming, _) => &[Step::FetchDeep],
                (Conflicting, _) => &[Step::FetchIgnoreLocal],
                _ => &[],
            },
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treesync_model::{ChangeType, Direction, SyncState};

    fn all_states() -> Vec<SyncState> {
        let directions = [
            Direction::InSync,
            Direction::Incoming,
            Direction::Outgoing,
            Direction::Conflicting,
        ];
        let changes = [
            ChangeType::None,
            ChangeType::Addition,
            ChangeType::Deletion,
            ChangeType::Modification,
        ];
        let mut states = Vec::new();
        for direction in directions {
            for change in changes {
                if direction == Direction::Conflicting {
                    states.push(SyncState::conflict(change, false));
                    states.push(SyncState::conflict(change, true));
                } else {
                    states.push(SyncState::change(direction, change));
                }
            }
        }
        states
    }

    fn all_operations() -> Vec<OperationKind> {
        vec![
            OperationKind::Publish,
            OperationKind::ForcePublish,
            OperationKind::Update {
                mergeable_only: false,
            },
            OperationKind::Update {
                mergeable_only: true,
            },
            OperationKind::ForceUpdate,
            OperationKind::Register,
            OperationKind::Fetch,
        ]
    }

    #[test]
    fn classification_is_total_and_never_empty_for_eligible_changes() {
        // Every operation must map every reachable pair to exactly one
        // step list, and an eligible changed leaf always gets work.
        for op in all_operations() {
            for state in all_states() {
                let steps = op.classify(state);
                if state.is_in_sync() {
                    assert!(steps.is_empty(), "{op} classified an in-sync node");
                }
                if op.is_eligible(state) {
                    assert!(
                        !steps.is_empty(),
                        "{op} dropped an eligible node in state {state}"
                    );
                }
            }
        }
    }

    #[test]
    fn publish_kinds_always_end_in_publish() {
        for op in [OperationKind::Publish, OperationKind::ForcePublish] {
            for state in all_states() {
                let steps = op.classify(state);
                if !steps.is_empty() {
                    assert_eq!(steps.last(), Some(&Step::Publish));
                }
            }
        }
    }

    #[test]
    fn force_publish_reregisters_incoming_deletions() {
        let state = SyncState::change(Direction::Incoming, ChangeType::Deletion);
        assert_eq!(
            OperationKind::ForcePublish.classify(state),
            &[Step::Reregister, Step::Publish]
        );
        assert_eq!(
            OperationKind::Publish.classify(state),
            &[Step::ConvertOutgoing, Step::Publish]
        );
    }

    #[test]
    fn mergeable_only_update_preserves_local_sides() {
        let conflict = SyncState::conflict(ChangeType::Modification, true);
        assert_eq!(
            OperationKind::Update {
                mergeable_only: true
            }
            .classify(conflict),
            &[Step::FetchShallow]
        );
        assert_eq!(
            OperationKind::Update {
                mergeable_only: false
            }
            .classify(conflict),
            &[Step::FetchIgnoreLocal]
        );
    }
}
