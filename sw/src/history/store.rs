//! SequenceHistoryStore - the editable sequence and its undo/redo log
//!
//! Every mutation funnels through [`SequenceHistoryStore::commit`], which
//! truncates any redo future past the cursor, appends the new snapshot and
//! moves the cursor to it. Undo and redo only move the cursor.

use tracing::{debug, info};

use crate::domain::{Sequence, Step, StepId, StepPatch};

/// Default number of snapshots kept before the oldest are dropped
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Identifies one editing session; bumped by every reset
///
/// Work started under one token must not touch the store once the token
/// has changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionToken(u64);

impl SessionToken {
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw counter value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Result of a mutating operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new snapshot was appended
    Committed,
    /// The operation would not change the sequence; history untouched
    Unchanged,
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed)
    }
}

/// Versioned sequence of steps with linear undo/redo
#[derive(Debug, Clone)]
pub struct SequenceHistoryStore {
    /// Snapshots, oldest first
    history: Vec<Sequence>,

    /// Cursor into `history`; `history[current]` is the visible sequence
    current: usize,

    /// Maximum snapshots retained
    limit: usize,

    /// Current editing session
    session: SessionToken,
}

impl Default for SequenceHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceHistoryStore {
    /// Create an empty store with the default history limit
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Create an empty store keeping at most `limit` snapshots (minimum 1)
    pub fn with_limit(limit: usize) -> Self {
        debug!(limit, "SequenceHistoryStore::with_limit: called");
        Self {
            history: Vec::new(),
            current: 0,
            limit: limit.max(1),
            session: SessionToken::default(),
        }
    }

    // === Queries ===

    /// The visible sequence, if any history exists
    pub fn current(&self) -> Option<&Sequence> {
        self.history.get(self.current)
    }

    /// The visible steps (empty when there is no history)
    pub fn steps(&self) -> &[Step] {
        self.current().map(|s| s.steps()).unwrap_or(&[])
    }

    /// All snapshots, oldest first
    pub fn history(&self) -> &[Sequence] {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn session(&self) -> SessionToken {
        self.session
    }

    /// True if there is an earlier snapshot to go back to
    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    /// True if an undone snapshot can be restored
    pub fn can_redo(&self) -> bool {
        !self.history.is_empty() && self.current < self.history.len() - 1
    }

    // === Mutations ===

    /// Load a freshly generated sequence
    ///
    /// On an empty store it becomes the sole entry; otherwise it is
    /// committed like any other edit and can be undone.
    pub fn replace_all(&mut self, steps: Sequence) -> CommitOutcome {
        debug!(step_count = steps.len(), history_len = self.history.len(), "replace_all: called");
        self.commit(steps)
    }

    /// Move the step at `source` to `destination` in the remaining list
    ///
    /// Equal or out-of-bounds indices are a no-op.
    pub fn reorder(&mut self, source: usize, destination: usize) -> CommitOutcome {
        debug!(source, destination, "reorder: called");
        match self.current().and_then(|seq| seq.moved(source, destination)) {
            Some(next) => self.commit(next),
            None => {
                debug!(source, destination, "reorder: nothing to move");
                CommitOutcome::Unchanged
            }
        }
    }

    /// Remove the step with the given id; unknown ids are a no-op
    pub fn delete_step(&mut self, id: &StepId) -> CommitOutcome {
        debug!(%id, "delete_step: called");
        match self.current().and_then(|seq| seq.without(id)) {
            Some(next) => self.commit(next),
            None => {
                debug!(%id, "delete_step: no such step");
                CommitOutcome::Unchanged
            }
        }
    }

    /// Merge `patch` into the step with the given id
    ///
    /// Unknown ids and patches that change nothing are a no-op.
    pub fn update_step(&mut self, id: &StepId, patch: &StepPatch) -> CommitOutcome {
        debug!(%id, ?patch, "update_step: called");
        match self.current().and_then(|seq| seq.with_patch(id, patch)) {
            Some(next) => self.commit(next),
            None => {
                debug!(%id, "update_step: nothing to update");
                CommitOutcome::Unchanged
            }
        }
    }

    /// Step the cursor back; returns false at the oldest snapshot
    pub fn undo(&mut self) -> bool {
        debug!(current = self.current, "undo: called");
        if !self.can_undo() {
            return false;
        }
        self.current -= 1;
        self.check_invariants();
        true
    }

    /// Step the cursor forward; returns false at the newest snapshot
    pub fn redo(&mut self) -> bool {
        debug!(current = self.current, "redo: called");
        if !self.can_redo() {
            return false;
        }
        self.current += 1;
        self.check_invariants();
        true
    }

    /// Drop all history and start a new session
    pub fn reset(&mut self) {
        self.history.clear();
        self.current = 0;
        self.session = self.session.next();
        info!(session = %self.session, "History store reset");
    }

    /// Append a snapshot after discarding any redo future
    fn commit(&mut self, next: Sequence) -> CommitOutcome {
        if let Some(current) = self.current()
            && *current == next
        {
            debug!("commit: sequence unchanged, skipping");
            return CommitOutcome::Unchanged;
        }

        if !self.history.is_empty() {
            let discarded = self.history.len() - (self.current + 1);
            if discarded > 0 {
                debug!(discarded, "commit: truncating redo future");
            }
            self.history.truncate(self.current + 1);
        }
        self.history.push(next);

        if self.history.len() > self.limit {
            let drain_len = self.history.len() - self.limit;
            debug!(drain_len, "commit: dropping oldest snapshots");
            self.history.drain(0..drain_len);
        }

        self.current = self.history.len() - 1;
        self.check_invariants();
        CommitOutcome::Committed
    }

    fn check_invariants(&self) {
        debug_assert!(
            (self.history.is_empty() && self.current == 0) || self.current < self.history.len(),
            "history cursor {} out of bounds for {} snapshots",
            self.current,
            self.history.len()
        );
        debug_assert!(self.history.len() <= self.limit);
    }
}
