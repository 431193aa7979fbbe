//! Fixture builder for sync trees.
//!
//! Paths double as lookup keys: every added node is indexed by its
//! full path so tests can fetch handles back without bookkeeping.

use std::collections::BTreeMap;

use treesync_model::{NodeId, Resource, ResourcePath, SyncState, SyncTree};

/// Assembles a [`SyncTree`] from paths, parent-first.
///
/// # Panics
///
/// All methods panic on malformed fixtures (unknown parent, child of a
/// leaf).
pub struct TreeBuilder {
    tree: SyncTree,
    index: BTreeMap<String, NodeId>,
}

impl TreeBuilder {
    /// Start a tree rooted at an unchanged container.
    pub fn new(root_path: &str) -> Self {
        let tree = SyncTree::new(Resource::folder(root_path));
        let mut index = BTreeMap::new();
        index.insert(ResourcePath::new(root_path).to_string(), tree.root());
        Self { tree, index }
    }

    /// Add a folder; its parent must already exist.
    pub fn folder(mut self, path: &str, state: SyncState) -> Self {
        let parent = self.parent_of(path);
        let id = self
            .tree
            .add_container(parent, Resource::folder(path), state)
            .unwrap_or_else(|e| panic!("TreeBuilder: cannot add folder {path}: {e}"));
        self.index.insert(ResourcePath::new(path).to_string(), id);
        self
    }

    /// Add a container retained to report a local deletion.
    pub fn deleted_folder(mut self, path: &str, state: SyncState) -> Self {
        let parent = self.parent_of(path);
        let id = self
            .tree
            .add_locally_deleted_container(parent, Resource::folder(path), state)
            .unwrap_or_else(|e| panic!("TreeBuilder: cannot add folder {path}: {e}"));
        self.index.insert(ResourcePath::new(path).to_string(), id);
        self
    }

    /// Add a file; its parent must already exist.
    pub fn file(mut self, path: &str, state: SyncState) -> Self {
        let parent = self.parent_of(path);
        let id = self
            .tree
            .add_leaf(parent, Resource::file(path), state)
            .unwrap_or_else(|e| panic!("TreeBuilder: cannot add file {path}: {e}"));
        self.index.insert(ResourcePath::new(path).to_string(), id);
        self
    }

    /// Finish, returning the tree and the path → handle index.
    pub fn finish(self) -> (SyncTree, BTreeMap<String, NodeId>) {
        (self.tree, self.index)
    }

    fn parent_of(&self, path: &str) -> NodeId {
        let normalized = ResourcePath::new(path);
        let parent = normalized
            .parent()
            .unwrap_or_else(|| panic!("TreeBuilder: {path} has no parent component"));
        *self
            .index
            .get(parent.as_str())
            .unwrap_or_else(|| panic!("TreeBuilder: parent {parent} of {path} was not added"))
    }
}
