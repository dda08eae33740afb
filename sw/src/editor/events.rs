//! Editor events broadcast to front-ends

use crate::domain::StepId;
use crate::history::SessionToken;

/// Something about the editor changed
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// The visible sequence or the history cursor moved
    SequenceChanged { history_len: usize, current_index: usize },
    RevisionStarted { step_id: StepId },
    RevisionApplied { step_id: StepId },
    /// The revision succeeded but left the sequence as it was
    RevisionUnchanged { step_id: StepId },
    RevisionFailed { step_id: StepId, message: String },
    /// A result arrived for a session that no longer exists
    RevisionDiscarded { step_id: StepId },
    SessionReset { session: SessionToken },
}
