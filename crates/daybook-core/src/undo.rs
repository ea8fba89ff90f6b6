use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::history::History;

pub const UNDO_LIMIT: usize = 50;

/// Full copy of the durable state, taken before a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub history: History,
    pub selected_date: String,
}

/// Linear undo/redo over full snapshots. `undo` is capped at
/// [`UNDO_LIMIT`] with the oldest entry evicted first; `redo` is unbounded
/// and emptied by every new mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoHistory {
    #[serde(default)]
    undo: VecDeque<Snapshot>,
    #[serde(default)]
    redo: Vec<Snapshot>,
}

impl UndoHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called before a mutation with the pre-mutation state.
    pub fn record(&mut self, before: Snapshot) {
        self.undo.push_back(before);
        while self.undo.len() > UNDO_LIMIT {
            self.undo.pop_front();
            debug!(limit = UNDO_LIMIT, "evicted oldest undo snapshot");
        }
        if !self.redo.is_empty() {
            debug!(dropped = self.redo.len(), "new mutation cleared redo stack");
        }
        self.redo.clear();
    }

    /// Pops the state to restore; `current` becomes redoable.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Pops the state to restore; `current` becomes undoable again.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        while self.undo.len() > UNDO_LIMIT {
            self.undo.pop_front();
        }
        Some(next)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}
