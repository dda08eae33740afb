//! Workflow editor messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{Sequence, Step, StepId, StepPatch};
use crate::history::{CommitOutcome, SessionToken};
use crate::revision::{RevisionDecision, RevisionTicket};
use crate::service::ServiceFailure;

use super::Snapshot;

/// Errors from editor operations
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Editor channel closed")]
    ChannelClosed,
}

/// Response from editor operations
pub type EditorResponse<T> = Result<T, EditorError>;

/// Result of loading a generated sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(CommitOutcome),
    /// The session changed since generation started; nothing was loaded
    Stale,
}

/// Commands sent to the WorkflowEditor actor
#[derive(Debug)]
pub enum EditorCommand {
    // Sequence edits
    Load {
        sequence: Sequence,
        expected_session: Option<SessionToken>,
        reply: oneshot::Sender<LoadOutcome>,
    },
    Reorder {
        source: usize,
        destination: usize,
        reply: oneshot::Sender<CommitOutcome>,
    },
    Delete {
        id: StepId,
        reply: oneshot::Sender<CommitOutcome>,
    },
    Update {
        id: StepId,
        patch: StepPatch,
        reply: oneshot::Sender<CommitOutcome>,
    },

    // History navigation
    Undo {
        reply: oneshot::Sender<bool>,
    },
    Redo {
        reply: oneshot::Sender<bool>,
    },

    // Revisions
    RequestRevision {
        id: StepId,
        prompt: String,
        reply: oneshot::Sender<RevisionDecision>,
    },
    RetryRevision {
        id: StepId,
        reply: oneshot::Sender<RevisionDecision>,
    },
    /// Sent by the task that ran a revision call
    RevisionResolved {
        ticket: RevisionTicket,
        result: Result<Step, ServiceFailure>,
    },

    // Queries and lifecycle
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Reset {
        reply: oneshot::Sender<SessionToken>,
    },
    Shutdown,
}
