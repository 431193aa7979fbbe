//! Mutable working selection over a sync tree
//!
//! A [`SyncSet`] is the unit an operation works on: a flat, ordered,
//! duplicate-free collection of changed leaf nodes drawn from one
//! backing tree. Construction flattens selected containers into their
//! changed leaf descendants; the destructive filters only ever shrink
//! the set, so applying one twice is a no-op.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::resource::Resource;
use crate::tree::{NodeId, SyncTree};

/// Per-direction counts over a working set, for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    /// Members with remote-originated changes
    pub incoming: usize,
    /// Members with locally-originated changes
    pub outgoing: usize,
    /// Members changed on both sides
    pub conflicting: usize,
    /// The subset of `conflicting` an automatic merge can resolve
    pub auto_mergeable: usize,
}

/// A working selection of changed leaves from one sync tree.
#[derive(Debug, Clone, Default)]
pub struct SyncSet {
    members: Vec<NodeId>,
}

impl SyncSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from an arbitrary selection of nodes.
    ///
    /// Containers are flattened into their changed leaf descendants;
    /// in-sync leaves are dropped; duplicates (a folder and a file
    /// inside it both selected, say) collapse to one membership.
    pub fn from_selection(tree: &SyncTree, selection: impl IntoIterator<Item = NodeId>) -> Self {
        let mut seen = BTreeSet::new();
        let mut members = Vec::new();
        for picked in selection {
            for leaf in tree.changed_leaves_under(picked) {
                if seen.insert(leaf) {
                    members.push(leaf);
                }
            }
        }
        Self { members }
    }

    /// Build a set from already-flattened leaf handles.
    ///
    /// Used for result sets after a fold, where the handles are
    /// tombstoned but still readable. Order is preserved, duplicates
    /// collapse.
    pub fn from_leaves(leaves: impl IntoIterator<Item = NodeId>) -> Self {
        let mut seen = BTreeSet::new();
        let mut members = Vec::new();
        for leaf in leaves {
            if seen.insert(leaf) {
                members.push(leaf);
            }
        }
        Self { members }
    }

    /// The leaf-level changed nodes in this set.
    pub fn changed_nodes(&self) -> &[NodeId] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when no members remain.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether a node is a member.
    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    /// The member resources, in set order.
    pub fn resources(&self, tree: &SyncTree) -> Vec<Resource> {
        self.members
            .iter()
            .filter_map(|id| tree.node(*id).ok())
            .map(|node| node.resource().clone())
            .collect()
    }

    /// Any member in conflict?
    pub fn has_conflicts(&self, tree: &SyncTree) -> bool {
        self.any(tree, |tree, id| state(tree, id).is_conflict())
    }

    /// Any member with a remote-originated change?
    pub fn has_incoming_changes(&self, tree: &SyncTree) -> bool {
        self.any(tree, |tree, id| state(tree, id).is_incoming())
    }

    /// Any member with a locally-originated change?
    pub fn has_outgoing_changes(&self, tree: &SyncTree) -> bool {
        self.any(tree, |tree, id| state(tree, id).is_outgoing())
    }

    /// Any member whose conflict an automatic merge can resolve?
    pub fn has_automergeable_conflicts(&self, tree: &SyncTree) -> bool {
        self.any(tree, |tree, id| state(tree, id).is_automergeable_conflict())
    }

    /// Per-direction counts over the members.
    pub fn stats(&self, tree: &SyncTree) -> ChangeStats {
        let mut stats = ChangeStats::default();
        for id in &self.members {
            let state = state(tree, *id);
            if state.is_incoming() {
                stats.incoming += 1;
            } else if state.is_outgoing() {
                stats.outgoing += 1;
            } else if state.is_conflict() {
                stats.conflicting += 1;
                if state.is_automergeable_conflict() {
                    stats.auto_mergeable += 1;
                }
            }
        }
        stats
    }

    /// Drop all conflicting members.
    pub fn remove_conflicting(&mut self, tree: &SyncTree) {
        self.retain(tree, |state| !state.is_conflict());
    }

    /// Drop all incoming members.
    pub fn remove_incoming(&mut self, tree: &SyncTree) {
        self.retain(tree, |state| !state.is_incoming());
    }

    /// Drop all outgoing members.
    pub fn remove_outgoing(&mut self, tree: &SyncTree) {
        self.retain(tree, |state| !state.is_outgoing());
    }

    /// Keep only auto-mergeable conflicts and non-conflicts.
    pub fn remove_non_mergeable(&mut self, tree: &SyncTree) {
        self.retain(tree, |state| {
            !state.is_conflict() || state.is_automergeable_conflict()
        });
    }

    /// Drop members the store already tracks.
    ///
    /// `is_tracked` answers the external "is this resource already
    /// registered" query; the register-new operation uses this to keep
    /// only brand-new resources.
    pub fn remove_added(&mut self, tree: &SyncTree, mut is_tracked: impl FnMut(&Resource) -> bool) {
        self.members.retain(|id| match tree.node(*id) {
            Ok(node) => !is_tracked(node.resource()),
            Err(_) => false,
        });
    }

    /// Drop members the store does not track yet.
    pub fn remove_non_added(
        &mut self,
        tree: &SyncTree,
        mut is_tracked: impl FnMut(&Resource) -> bool,
    ) {
        self.members.retain(|id| match tree.node(*id) {
            Ok(node) => is_tracked(node.resource()),
            Err(_) => false,
        });
    }

    /// Retain members matching an arbitrary state predicate.
    pub fn retain(
        &mut self,
        tree: &SyncTree,
        mut keep: impl FnMut(crate::state::SyncState) -> bool,
    ) {
        self.members.retain(|id| keep(state(tree, *id)));
    }

    fn any(&self, tree: &SyncTree, mut pred: impl FnMut(&SyncTree, NodeId) -> bool) -> bool {
        self.members.iter().any(|id| pred(tree, *id))
    }
}

fn state(tree: &SyncTree, id: NodeId) -> crate::state::SyncState {
    tree.node(id)
        .map(|node| node.state())
        .unwrap_or_else(|_| crate::state::SyncState::in_sync())
}
