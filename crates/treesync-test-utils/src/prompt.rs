//! Scripted prompt fakes.

use std::cell::Cell;

use treesync_engine::{CommentPrompt, ConflictDecision, ConflictPrompt};
use treesync_model::{SyncSet, SyncTree};

/// A conflict prompt that always gives the scripted answer.
pub struct ScriptedConflictPrompt {
    decision: ConflictDecision,
    asked: Cell<u32>,
}

impl ScriptedConflictPrompt {
    /// A prompt answering `decision` every time.
    pub fn answering(decision: ConflictDecision) -> Self {
        Self {
            decision,
            asked: Cell::new(0),
        }
    }

    /// How many times the engine consulted this prompt.
    pub fn times_asked(&self) -> u32 {
        self.asked.get()
    }
}

impl ConflictPrompt for ScriptedConflictPrompt {
    fn ask(&self, _tree: &SyncTree, _set: &SyncSet) -> ConflictDecision {
        self.asked.set(self.asked.get() + 1);
        self.decision
    }
}

/// A comment prompt that returns a fixed message, or cancels.
pub struct ScriptedCommentPrompt {
    message: Option<String>,
    asked: Cell<u32>,
}

impl ScriptedCommentPrompt {
    /// A prompt supplying the given publish message.
    pub fn answering(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            asked: Cell::new(0),
        }
    }

    /// A prompt that cancels the operation.
    pub fn cancelling() -> Self {
        Self {
            message: None,
            asked: Cell::new(0),
        }
    }

    /// How many times the engine consulted this prompt.
    pub fn times_asked(&self) -> u32 {
        self.asked.get()
    }
}

impl CommentPrompt for ScriptedCommentPrompt {
    fn ask(&self) -> Option<String> {
        self.asked.set(self.asked.get() + 1);
        self.message.clone()
    }
}
