//! Arena-backed synchronization tree
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`]
//! handles: children are owned index lists, the parent link is a plain
//! index. Upward walks (finding ancestors that must be registered
//! first) and downward aggregation are index lookups with no aliasing
//! concerns.
//!
//! Removal is tombstoning: a removed slot is detached from its parent
//! but keeps its data, so node handles held by a caller — for example
//! the result set of a completed operation — stay readable until the
//! tree is rebuilt by the next full refresh.

use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::state::SyncState;

/// Handle to a node in a [`SyncTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The raw arena index, for diagnostics.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What a node is, replacing the original's open-ended runtime type
/// checks with an exhaustive variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A changed (or potentially changed) file
    Leaf,
    /// A container with at least one changed descendant.
    ///
    /// `locally_deleted` marks containers retained purely to report a
    /// local deletion to the remote store; they get the special
    /// reclassification treatment after a batch removes children.
    ChangedContainer { locally_deleted: bool },
    /// A pure pass-through container, kept only so removal of changed
    /// descendants can collapse back to nothing
    UnchangedContainer,
}

impl NodeKind {
    /// True for either container variant.
    pub fn is_container(&self) -> bool {
        !matches!(self, NodeKind::Leaf)
    }

    /// True for containers retained to report a local deletion.
    pub fn is_locally_deleted(&self) -> bool {
        matches!(
            self,
            NodeKind::ChangedContainer {
                locally_deleted: true
            }
        )
    }
}

/// One node of a synchronization tree.
#[derive(Debug, Clone)]
pub struct SyncNode {
    resource: Resource,
    state: SyncState,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SyncNode {
    /// The resource this node stands for.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// The node's synchronization state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// The node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The parent handle, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Handles of the node's live children.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// True for either container variant.
    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }
}

struct Slot {
    node: SyncNode,
    removed: bool,
}

/// The arena holding one synchronized tree.
pub struct SyncTree {
    slots: Vec<Slot>,
    root: NodeId,
}

impl SyncTree {
    /// Create a tree whose root is an unchanged pass-through container.
    pub fn new(root: Resource) -> Self {
        let node = SyncNode {
            resource: root,
            state: SyncState::in_sync(),
            kind: NodeKind::UnchangedContainer,
            parent: None,
            children: Vec::new(),
        };
        Self {
            slots: vec![Slot {
                node,
                removed: false,
            }],
            root: NodeId(0),
        }
    }

    /// The root handle.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node, including tombstoned ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchNode`] for a foreign handle.
    pub fn node(&self, id: NodeId) -> Result<&SyncNode> {
        self.slots
            .get(id.0)
            .map(|slot| &slot.node)
            .ok_or(Error::NoSuchNode { index: id.0 })
    }

    /// Borrow a live node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeRemoved`] for a tombstoned handle.
    pub fn live_node(&self, id: NodeId) -> Result<&SyncNode> {
        let slot = self.slots.get(id.0).ok_or(Error::NoSuchNode { index: id.0 })?;
        if slot.removed {
            return Err(Error::NodeRemoved { index: id.0 });
        }
        Ok(&slot.node)
    }

    /// Whether a handle points at a tombstoned slot.
    pub fn is_removed(&self, id: NodeId) -> bool {
        self.slots.get(id.0).map(|slot| slot.removed).unwrap_or(true)
    }

    /// Add a leaf under `parent`.
    ///
    /// # Errors
    ///
    /// Fails if `parent` is invalid, removed, or a leaf.
    pub fn add_leaf(&mut self, parent: NodeId, resource: Resource, state: SyncState) -> Result<NodeId> {
        self.attach(parent, resource, state, NodeKind::Leaf)
    }

    /// Add a container under `parent`.
    ///
    /// The kind follows the state: a changed state yields a changed
    /// container (marked locally-deleted for outgoing deletions), an
    /// in-sync state yields a pass-through container.
    ///
    /// # Errors
    ///
    /// Fails if `parent` is invalid, removed, or a leaf.
    pub fn add_container(
        &mut self,
        parent: NodeId,
        resource: Resource,
        state: SyncState,
    ) -> Result<NodeId> {
        let kind = if state.has_change() {
            NodeKind::ChangedContainer {
                locally_deleted: state.is_outgoing() && state.is_deletion(),
            }
        } else {
            NodeKind::UnchangedContainer
        };
        self.attach(parent, resource, state, kind)
    }

    /// Add a container retained to report a local deletion even though
    /// its own state reads as a conflict (missing local sync metadata).
    ///
    /// # Errors
    ///
    /// Fails if `parent` is invalid, removed, or a leaf.
    pub fn add_locally_deleted_container(
        &mut self,
        parent: NodeId,
        resource: Resource,
        state: SyncState,
    ) -> Result<NodeId> {
        self.attach(
            parent,
            resource,
            state,
            NodeKind::ChangedContainer {
                locally_deleted: true,
            },
        )
    }

    fn attach(
        &mut self,
        parent: NodeId,
        resource: Resource,
        state: SyncState,
        kind: NodeKind,
    ) -> Result<NodeId> {
        let parent_node = self.live_node(parent)?;
        if !parent_node.is_container() {
            return Err(Error::NotAContainer {
                path: parent_node.resource.path.to_string(),
            });
        }
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            node: SyncNode {
                resource,
                state,
                kind,
                parent: Some(parent),
                children: Vec::new(),
            },
            removed: false,
        });
        self.slots[parent.0].node.children.push(id);
        Ok(id)
    }

    /// Replace a node's state.
    ///
    /// # Errors
    ///
    /// Fails for invalid or removed handles.
    pub fn set_state(&mut self, id: NodeId, state: SyncState) -> Result<()> {
        self.live_node(id)?;
        self.slots[id.0].node.state = state;
        if state.is_outgoing() && state.is_deletion() {
            if let NodeKind::ChangedContainer { .. } = self.slots[id.0].node.kind {
                self.slots[id.0].node.kind = NodeKind::ChangedContainer {
                    locally_deleted: true,
                };
            }
        }
        Ok(())
    }

    /// Reclassify a container from the net effect of its remaining
    /// children.
    ///
    /// The kind follows the new state: an in-sync state demotes to a
    /// pass-through, an outgoing deletion stays (or becomes) a
    /// locally-deleted container, a conflict on a container that was
    /// already locally-deleted keeps that marker so later folds apply
    /// the deletion rules again, and anything else is an ordinary
    /// changed container.
    ///
    /// # Errors
    ///
    /// Fails for invalid or removed handles and for leaves.
    pub fn reclassify_container(&mut self, id: NodeId, state: SyncState) -> Result<()> {
        let node = self.live_node(id)?;
        if !node.is_container() {
            return Err(Error::NotAContainer {
                path: node.resource.path.to_string(),
            });
        }
        let kind = if !state.has_change() {
            NodeKind::UnchangedContainer
        } else {
            let keep_deleted = (state.is_outgoing() && state.is_deletion())
                || (state.is_conflict() && node.kind.is_locally_deleted());
            NodeKind::ChangedContainer {
                locally_deleted: keep_deleted,
            }
        };
        self.slots[id.0].node.state = state;
        self.slots[id.0].node.kind = kind;
        Ok(())
    }

    /// Demote a container to an unchanged pass-through.
    ///
    /// Used once a prerequisite container has been registered with the
    /// store: it no longer represents a change of its own.
    ///
    /// # Errors
    ///
    /// Fails for invalid or removed handles and for leaves.
    pub fn demote_to_unchanged(&mut self, id: NodeId) -> Result<()> {
        let node = self.live_node(id)?;
        if !node.is_container() {
            return Err(Error::NotAContainer {
                path: node.resource.path.to_string(),
            });
        }
        self.slots[id.0].node.state = SyncState::in_sync();
        self.slots[id.0].node.kind = NodeKind::UnchangedContainer;
        Ok(())
    }

    /// Detach a node and its whole subtree, leaving tombstones.
    ///
    /// The root cannot be detached.
    ///
    /// # Errors
    ///
    /// Fails for invalid or removed handles.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        self.live_node(id)?;
        if id == self.root {
            return Ok(());
        }
        if let Some(parent) = self.slots[id.0].node.parent {
            self.slots[parent.0].node.children.retain(|child| *child != id);
        }
        // Tombstone the whole subtree, explicit stack, no recursion.
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.slots[current.0].removed = true;
            stack.extend(self.slots[current.0].node.children.iter().copied());
        }
        Ok(())
    }

    /// Live ancestors of a node, nearest first, root last.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.slots.get(id.0).and_then(|slot| slot.node.parent);
        while let Some(ancestor) = current {
            chain.push(ancestor);
            current = self.slots[ancestor.0].node.parent;
        }
        chain
    }

    /// Depth of a node below the root.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).len()
    }

    /// Live strict descendants of a node, pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let Ok(node) = self.live_node(id) else {
            return out;
        };
        let mut stack: Vec<NodeId> = node.children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.slots[current.0].node.children.iter().rev().copied());
        }
        out
    }

    /// Changed leaves at or below a node, pre-order.
    ///
    /// Containers never appear in the result: an in-sync leaf is not
    /// materialized as changed, and container-level changes are handled
    /// through prerequisite resolution and folding instead.
    pub fn changed_leaves_under(&self, id: NodeId) -> Vec<NodeId> {
        let Ok(node) = self.live_node(id) else {
            return Vec::new();
        };
        if !node.is_container() {
            if node.state.has_change() {
                return vec![id];
            }
            return Vec::new();
        }
        self.descendants(id)
            .into_iter()
            .filter(|desc| {
                let node = &self.slots[desc.0].node;
                !node.is_container() && node.state.has_change()
            })
            .collect()
    }

    /// Whether any live strict descendant carries a change.
    pub fn has_changed_descendant(&self, id: NodeId) -> bool {
        self.descendants(id)
            .into_iter()
            .any(|desc| self.slots[desc.0].node.state.has_change())
    }
}
