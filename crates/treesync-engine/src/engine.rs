//! The reconciliation engine
//!
//! One [`Engine::run`] invocation carries a working set through the
//! whole state machine: filter → pre-flight prompt → classify →
//! prerequisite resolution → batch application → fold. The store and
//! both prompts are injected at construction so invocations are
//! deterministic under test; the engine borrows the tree mutably for
//! the duration of a run, which also serializes invocations against
//! the same tree.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use treesync_model::{
    ChangeType, Direction, NodeId, Resource, SyncSet, SyncState, SyncTree,
};

use crate::batch::PendingBatch;
use crate::error::{EngineError, Result, StorePrimitive};
use crate::operation::{OperationKind, PromptPolicy};
use crate::progress::ProgressToken;
use crate::prompt::{CommentPrompt, ConflictDecision, ConflictPrompt};
use crate::store::{FetchOptions, Store, StoreError};

/// Orchestrates synchronization operations against one tree.
pub struct Engine<'a> {
    store: &'a mut dyn Store,
    conflict_prompt: &'a dyn ConflictPrompt,
    comment_prompt: &'a dyn CommentPrompt,
}

impl<'a> Engine<'a> {
    /// Create an engine around its collaborators.
    pub fn new(
        store: &'a mut dyn Store,
        conflict_prompt: &'a dyn ConflictPrompt,
        comment_prompt: &'a dyn CommentPrompt,
    ) -> Self {
        Self {
            store,
            conflict_prompt,
            comment_prompt,
        }
    }

    /// Run one synchronization operation over a selection.
    ///
    /// Returns the subset of nodes actually synchronized (possibly
    /// empty). On [`EngineError::OperationCancelled`] and
    /// [`EngineError::StoreFailure`] the nodes applied before the
    /// interruption are already folded into the tree; everything else
    /// keeps its classification, so re-running the same selection is
    /// safe and never double-applies.
    ///
    /// # Errors
    ///
    /// See [`EngineError`] for the taxonomy.
    pub fn run(
        &mut self,
        tree: &mut SyncTree,
        op: OperationKind,
        selection: SyncSet,
        progress: &dyn ProgressToken,
    ) -> Result<SyncSet> {
        debug!(operation = %op, members = selection.len(), "starting reconciliation");

        let mut set = self.filter_applicable(tree, op, selection)?;
        if set.is_empty() {
            debug!(operation = %op, "nothing applicable, no-op success");
            return Ok(SyncSet::empty());
        }

        if !self.preflight(tree, op, &mut set)? {
            return Ok(SyncSet::empty());
        }

        let message = if op.is_publish_kind() {
            match self.comment_prompt.ask() {
                Some(message) => Some(message),
                None => return Err(EngineError::UserCancelled),
            }
        } else {
            None
        };

        let batch = self
            .classify(tree, op, &set)
            .inspect_err(|err| warn!(operation = %op, error = %err, "classification failed"))?;
        if batch.is_empty() {
            return Ok(SyncSet::empty());
        }

        let registration_order = self
            .prerequisite_order(tree, &batch)
            .inspect_err(|err| warn!(operation = %op, error = %err, "prerequisite resolution failed"))?;

        progress.begin(registration_order.len() as u32 + batch.step_units());

        let mut tally = Tally::new(&batch);
        let outcome = self.apply_batches(
            tree,
            &batch,
            &registration_order,
            message.as_deref().unwrap_or_default(),
            progress,
            &mut tally,
        );

        let completed = tally.completed(set.changed_nodes());
        debug!(
            operation = %op,
            completed = completed.len(),
            classified = batch.classified.len(),
            "folding applied nodes into the tree"
        );
        self.fold(tree, &completed)?;

        match outcome {
            Ok(()) => Ok(SyncSet::from_leaves(completed)),
            Err(err) => {
                warn!(operation = %op, error = %err, "reconciliation aborted");
                Err(err)
            }
        }
    }

    /// Whether a UI affordance for `op` should be enabled on `node`.
    ///
    /// A container is enabled when it or any strict descendant is
    /// eligible; the walk short-circuits on the first match.
    pub fn is_enabled(&self, tree: &SyncTree, op: OperationKind, node: NodeId) -> bool {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Ok(current) = tree.live_node(id) else {
                continue;
            };
            if op.is_eligible(current.state()) {
                return true;
            }
            stack.extend(current.children().iter().copied());
        }
        false
    }

    /// Step 2: shrink the selection to the nodes this operation covers.
    fn filter_applicable(
        &mut self,
        tree: &SyncTree,
        op: OperationKind,
        mut set: SyncSet,
    ) -> Result<SyncSet> {
        set.retain(tree, |state| op.is_eligible(state));
        if let OperationKind::Update {
            mergeable_only: true,
        } = op
        {
            set.remove_non_mergeable(tree);
        }
        if op == OperationKind::Register {
            let mut tracked = BTreeSet::new();
            for resource in set.resources(tree) {
                let known = self
                    .store
                    .is_tracked(&resource)
                    .map_err(|source| store_failure(StorePrimitive::IsTracked, &resource, source))?;
                if known {
                    tracked.insert(resource.path.clone());
                }
            }
            set.remove_added(tree, |resource| tracked.contains(&resource.path));
        }
        Ok(set)
    }

    /// Step 3: consult the conflict prompt when the operation would
    /// override somebody's work. Returns false when the set emptied.
    fn preflight(&mut self, tree: &SyncTree, op: OperationKind, set: &mut SyncSet) -> Result<bool> {
        let prompt = match op.prompt_policy() {
            PromptPolicy::Always => true,
            PromptPolicy::Never => false,
            PromptPolicy::WhenThreatened => op.threatens(tree, set),
        };
        if !prompt {
            return Ok(true);
        }
        match self.conflict_prompt.ask(tree, set) {
            ConflictDecision::ProceedAll => Ok(true),
            ConflictDecision::ProceedNonConflicting => {
                op.drop_threatened(tree, set);
                debug!(operation = %op, remaining = set.len(), "proceeding without threatened nodes");
                Ok(!set.is_empty())
            }
            ConflictDecision::Abort => Err(EngineError::UserCancelled),
        }
    }

    /// Step 4: bucket every member and record prerequisite containers.
    fn classify(&self, tree: &SyncTree, op: OperationKind, set: &SyncSet) -> Result<PendingBatch> {
        let mut batch = PendingBatch::default();
        for &id in set.changed_nodes() {
            let node = tree.live_node(id)?;
            let steps = op.classify(node.state());
            if steps.is_empty() {
                continue;
            }
            batch.push(id, steps);

            if let Some(parent) = node.parent() {
                let parent_state = tree.live_node(parent)?.state();
                if parent_state.is_incoming() && parent_state.is_addition() {
                    batch.record_creation_prereq(parent);
                } else if parent_state.is_conflict() {
                    batch.record_conflict_prereq(parent);
                }
            } else {
                return Err(EngineError::Inconsistency {
                    message: format!(
                        "changed leaf {} has no parent container",
                        node.resource()
                    ),
                });
            }
        }
        Ok(batch)
    }

    /// Step 5: expand each recorded prerequisite into the contiguous
    /// chain of unregistered ancestors and order the whole lot
    /// top-down, deduplicated.
    fn prerequisite_order(&self, tree: &SyncTree, batch: &PendingBatch) -> Result<Vec<NodeId>> {
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        for container in batch.prerequisites() {
            let mut chain = vec![container];
            for ancestor in tree.ancestors(container) {
                let state = tree.live_node(ancestor)?.state();
                if (state.is_incoming() && state.is_addition()) || state.is_conflict() {
                    chain.push(ancestor);
                } else {
                    // First ancestor that is neither is assumed
                    // already registered.
                    break;
                }
            }
            for id in chain.into_iter().rev() {
                if seen.insert(id) {
                    order.push(id);
                }
            }
        }
        Ok(order)
    }

    /// Step 6: drive the store, conversions strictly before the
    /// destructive and publishing primitives.
    fn apply_batches(
        &mut self,
        tree: &mut SyncTree,
        batch: &PendingBatch,
        registration_order: &[NodeId],
        message: &str,
        progress: &dyn ProgressToken,
        tally: &mut Tally,
    ) -> Result<()> {
        let total = batch.classified.len();

        for &id in registration_order {
            check_cancelled(progress, tally, total)?;
            let resource = tree.live_node(id)?.resource().clone();
            debug!(resource = %resource, "registering prerequisite container");
            self.store
                .register(&resource)
                .map_err(|source| store_failure(StorePrimitive::Register, &resource, source))?;
            progress.report(1);
            tree.demote_to_unchanged(id)?;
        }

        self.convert_each(tree, &batch.convert_outgoing, Direction::Outgoing, progress, tally, total)?;
        self.convert_each(tree, &batch.convert_incoming, Direction::Incoming, progress, tally, total)?;

        for &id in &batch.reregister {
            check_cancelled(progress, tally, total)?;
            let resource = tree.live_node(id)?.resource().clone();
            self.store
                .unregister(&resource)
                .map_err(|source| store_failure(StorePrimitive::Unregister, &resource, source))?;
            self.store
                .register(&resource)
                .map_err(|source| store_failure(StorePrimitive::Register, &resource, source))?;
            progress.report(2);
            tally.complete_step(id);
        }

        for &id in &batch.register {
            check_cancelled(progress, tally, total)?;
            let resource = tree.live_node(id)?.resource().clone();
            self.store
                .register(&resource)
                .map_err(|source| store_failure(StorePrimitive::Register, &resource, source))?;
            progress.report(1);
            tally.complete_step(id);
        }

        {
            let ids = &batch.delete_remote;
            if !ids.is_empty() {
                check_cancelled(progress, tally, total)?;
                let resources = self.resources_of(tree, ids)?;
                let store = &mut *self.store;
                slice_call(ids, &resources, StorePrimitive::DeleteRemote, 2, progress, tally, |rs| {
                    store.delete_remote(rs)
                })?;
            }
        }

        for &id in &batch.delete_local {
            check_cancelled(progress, tally, total)?;
            let resource = tree.live_node(id)?.resource().clone();
            self.store
                .delete_local(&resource)
                .map_err(|source| store_failure(StorePrimitive::DeleteLocal, &resource, source))?;
            progress.report(2);
            tally.complete_step(id);
        }

        {
            let ids = &batch.mark_merged;
            if !ids.is_empty() {
                check_cancelled(progress, tally, total)?;
                let resources = self.resources_of(tree, ids)?;
                let store = &mut *self.store;
                slice_call(ids, &resources, StorePrimitive::MarkMerged, 1, progress, tally, |rs| {
                    store.mark_merged(rs)
                })?;
            }
        }

        {
            let ids = &batch.publish;
            if !ids.is_empty() {
                check_cancelled(progress, tally, total)?;
                let resources = self.resources_of(tree, ids)?;
                let store = &mut *self.store;
                slice_call(ids, &resources, StorePrimitive::Publish, 1, progress, tally, |rs| {
                    store.publish(rs, message)
                })?;
            }
        }

        for (ids, options) in [
            (&batch.fetch_shallow, FetchOptions::shallow()),
            (&batch.fetch_deep, FetchOptions::deep()),
            (&batch.fetch_ignore_local, FetchOptions::shallow_ignore_local()),
        ] {
            if ids.is_empty() {
                continue;
            }
            check_cancelled(progress, tally, total)?;
            let resources = self.resources_of(tree, ids)?;
            let store = &mut *self.store;
            slice_call(ids, &resources, StorePrimitive::Fetch, 1, progress, tally, |rs| {
                store.fetch(rs, options)
            })?;
        }

        Ok(())
    }

    fn convert_each(
        &mut self,
        tree: &SyncTree,
        ids: &[NodeId],
        to: Direction,
        progress: &dyn ProgressToken,
        tally: &mut Tally,
        total: usize,
    ) -> Result<()> {
        for &id in ids {
            check_cancelled(progress, tally, total)?;
            let resource = tree.live_node(id)?.resource().clone();
            self.store
                .convert_direction(&resource, to)
                .map_err(|source| store_failure(StorePrimitive::ConvertDirection, &resource, source))?;
            progress.report(1);
            tally.complete_step(id);
        }
        Ok(())
    }

    fn resources_of(&self, tree: &SyncTree, ids: &[NodeId]) -> Result<Vec<Resource>> {
        ids.iter()
            .map(|id| Ok(tree.live_node(*id)?.resource().clone()))
            .collect()
    }

    /// Step 7: remove applied nodes with upward propagation.
    ///
    /// Two phases so a locally-deleted container is reclassified only
    /// after every sibling removal in the batch has landed: first all
    /// successful leaves are detached, then the affected ancestors are
    /// repaired deepest-first.
    fn fold(&self, tree: &mut SyncTree, completed: &[NodeId]) -> Result<()> {
        let mut affected: BTreeSet<(usize, NodeId)> = BTreeSet::new();
        for &id in completed {
            let parent = tree.live_node(id)?.parent();
            tree.detach(id)?;
            if let Some(parent) = parent {
                affected.insert((tree.depth(parent), parent));
            }
        }

        while let Some(&(depth, id)) = affected.iter().next_back() {
            affected.remove(&(depth, id));
            self.repair_container(tree, id, &mut affected)?;
        }
        Ok(())
    }

    /// Prune or reclassify one container after child removals.
    fn repair_container(
        &self,
        tree: &mut SyncTree,
        id: NodeId,
        affected: &mut BTreeSet<(usize, NodeId)>,
    ) -> Result<()> {
        if tree.is_removed(id) || id == tree.root() {
            return Ok(());
        }
        let node = tree.live_node(id)?;
        let kind = node.kind();
        let own_state = node.state();
        let parent = node.parent();

        let mut any_conflict = false;
        let mut any_incoming = false;
        let mut any_outgoing = false;
        for descendant in tree.descendants(id) {
            let state = tree.node(descendant)?.state();
            if state.is_conflict() {
                any_conflict = true;
            } else if state.is_incoming() {
                any_incoming = true;
            } else if state.is_outgoing() {
                any_outgoing = true;
            }
        }
        let has_changes = any_conflict || any_incoming || any_outgoing;

        let prune = if kind.is_locally_deleted() {
            if any_conflict || (any_incoming && any_outgoing) {
                tree.reclassify_container(id, SyncState::conflict(ChangeType::Modification, false))?;
                false
            } else if any_outgoing {
                tree.reclassify_container(
                    id,
                    SyncState::change(Direction::Outgoing, ChangeType::Deletion),
                )?;
                false
            } else if any_incoming {
                tree.reclassify_container(
                    id,
                    SyncState::change(Direction::Incoming, ChangeType::Addition),
                )?;
                false
            } else {
                true
            }
        } else {
            !has_changes && !own_state.has_change()
        };

        if prune {
            let resource = tree.node(id)?.resource().clone();
            debug!(resource = %resource, "pruning container with no remaining changes");
            tree.detach(id)?;
            if let Some(parent) = parent {
                affected.insert((tree.depth(parent), parent));
            }
        }
        Ok(())
    }
}

/// Per-node step accounting; a node counts as applied only when every
/// step it was classified into has succeeded.
struct Tally {
    total: HashMap<NodeId, usize>,
    done: HashMap<NodeId, usize>,
}

impl Tally {
    fn new(batch: &PendingBatch) -> Self {
        let total = batch
            .classified
            .iter()
            .map(|(id, steps)| (*id, steps.len()))
            .collect();
        Self {
            total,
            done: HashMap::new(),
        }
    }

    fn complete_step(&mut self, id: NodeId) {
        *self.done.entry(id).or_insert(0) += 1;
    }

    fn is_complete(&self, id: NodeId) -> bool {
        match self.total.get(&id) {
            Some(total) => self.done.get(&id).copied().unwrap_or(0) >= *total,
            None => false,
        }
    }

    fn completed_count(&self) -> usize {
        self.total
            .keys()
            .filter(|id| self.is_complete(**id))
            .count()
    }

    fn completed(&self, order: &[NodeId]) -> Vec<NodeId> {
        order
            .iter()
            .copied()
            .filter(|id| self.is_complete(*id))
            .collect()
    }
}

fn check_cancelled(progress: &dyn ProgressToken, tally: &Tally, total: usize) -> Result<()> {
    if progress.is_cancelled() {
        return Err(EngineError::OperationCancelled {
            applied: tally.completed_count(),
            total,
        });
    }
    Ok(())
}

fn store_failure(primitive: StorePrimitive, resource: &Resource, source: StoreError) -> EngineError {
    EngineError::StoreFailure {
        primitive,
        resource: resource.path.to_string(),
        source,
    }
}

/// Invoke one slice-taking primitive and attribute success or failure
/// per item. A partial failure completes the applied prefix; the
/// failing resource is named in the error.
fn slice_call(
    ids: &[NodeId],
    resources: &[Resource],
    primitive: StorePrimitive,
    unit_weight: u32,
    progress: &dyn ProgressToken,
    tally: &mut Tally,
    call: impl FnOnce(&[Resource]) -> std::result::Result<(), StoreError>,
) -> Result<()> {
    match call(resources) {
        Ok(()) => {
            for &id in ids {
                tally.complete_step(id);
            }
            progress.report(unit_weight * ids.len() as u32);
            Ok(())
        }
        Err(err) => {
            let applied = err.applied_prefix().min(ids.len());
            for &id in &ids[..applied] {
                tally.complete_step(id);
            }
            if applied > 0 {
                progress.report(unit_weight * applied as u32);
            }
            let failing = applied.min(resources.len().saturating_sub(1));
            Err(EngineError::StoreFailure {
                primitive,
                resource: resources[failing].path.to_string(),
                source: err,
            })
        }
    }
}
