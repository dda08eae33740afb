//! Events that drive the conversation

use crate::domain::Sequence;
use crate::service::{ClarificationReply, ServiceFailure};

#[derive(Debug, Clone)]
pub enum Event {
    /// The user sent a message
    Submit(String),

    /// A clarification round resolved
    ClarificationReplied(ClarificationReply),

    /// A clarification round was rejected
    ClarificationFailed(ServiceFailure),

    /// Generation produced a sequence
    GenerationSucceeded(Sequence),

    /// Generation was rejected
    GenerationFailed(ServiceFailure),

    /// Re-issue the request that failed
    Retry,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Submit(_) => "submit",
            Event::ClarificationReplied(_) => "clarification_replied",
            Event::ClarificationFailed(_) => "clarification_failed",
            Event::GenerationSucceeded(_) => "generation_succeeded",
            Event::GenerationFailed(_) => "generation_failed",
            Event::Retry => "retry",
        }
    }
}
