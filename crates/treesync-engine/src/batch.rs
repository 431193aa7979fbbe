//! Pending batch built per invocation
//!
//! Classification walks the working set once and buckets every node by
//! the store steps it requires, recording prerequisite containers on
//! the side. The batch is transient: built, applied, and discarded
//! inside a single engine run.

use std::collections::BTreeSet;

use treesync_model::NodeId;

use crate::operation::Step;

/// Nodes bucketed by the store primitive they require, plus the
/// containers that must be registered before anything else runs.
#[derive(Debug, Default)]
pub(crate) struct PendingBatch {
    pub register: Vec<NodeId>,
    pub reregister: Vec<NodeId>,
    pub convert_outgoing: Vec<NodeId>,
    pub convert_incoming: Vec<NodeId>,
    pub delete_remote: Vec<NodeId>,
    pub delete_local: Vec<NodeId>,
    pub mark_merged: Vec<NodeId>,
    pub publish: Vec<NodeId>,
    pub fetch_shallow: Vec<NodeId>,
    pub fetch_deep: Vec<NodeId>,
    pub fetch_ignore_local: Vec<NodeId>,

    /// Incoming-addition ancestors that must be created first
    pub prereq_creations: Vec<NodeId>,
    /// Conflicting ancestors that must be resolved structurally first
    pub prereq_conflicts: Vec<NodeId>,

    /// Per-node step lists in classification order
    pub classified: Vec<(NodeId, &'static [Step])>,

    seen_prereqs: BTreeSet<NodeId>,
}

impl PendingBatch {
    /// Bucket one classified node.
    pub fn push(&mut self, id: NodeId, steps: &'static [Step]) {
        for step in steps {
            self.bucket_mut(*step).push(id);
        }
        self.classified.push((id, steps));
    }

    /// Record a prerequisite container, deduplicated across both sets.
    pub fn record_creation_prereq(&mut self, id: NodeId) {
        if self.seen_prereqs.insert(id) {
            self.prereq_creations.push(id);
        }
    }

    /// Record a conflicting prerequisite container.
    pub fn record_conflict_prereq(&mut self, id: NodeId) {
        if self.seen_prereqs.insert(id) {
            self.prereq_conflicts.push(id);
        }
    }

    /// All recorded prerequisite containers, creations first.
    pub fn prerequisites(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.prereq_creations
            .iter()
            .chain(self.prereq_conflicts.iter())
            .copied()
    }

    /// True when nothing was classified.
    pub fn is_empty(&self) -> bool {
        self.classified.is_empty()
    }

    /// Weighted work units over all classified steps.
    pub fn step_units(&self) -> u32 {
        self.classified
            .iter()
            .flat_map(|(_, steps)| steps.iter())
            .map(|step| step.units())
            .sum()
    }

    fn bucket_mut(&mut self, step: Step) -> &mut Vec<NodeId> {
        match step {
            Step::Register => &mut self.register,
            Step::Reregister => &mut self.reregister,
            Step::ConvertOutgoing => &mut self.convert_outgoing,
            Step::ConvertIncoming => &mut self.convert_incoming,
            Step::DeleteRemote => &mut self.delete_remote,
            Step::DeleteLocal => &mut self.delete_local,
            Step::MarkMerged => &mut self.mark_merged,
            Step::Publish => &mut self.publish,
            Step::FetchShallow => &mut self.fetch_shallow,
            Step::FetchDeep => &mut self.fetch_deep,
            Step::FetchIgnoreLocal => &mut self.fetch_ignore_local,
        }
    }
}
