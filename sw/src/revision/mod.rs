//! Per-step AI revision

mod coordinator;

pub use coordinator::{
    DEFAULT_RETRY_PROMPT, IgnoreReason, LOW_CONFIDENCE_THRESHOLD, Resolution, RevisionCoordinator, RevisionDecision,
    RevisionState, RevisionTicket,
};
