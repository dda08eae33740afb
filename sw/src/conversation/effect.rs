//! Side effects requested by a transition

use crate::domain::Sequence;
use crate::service::{ClarificationRequest, GenerateRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Run one clarification round
    RequestClarification(ClarificationRequest),

    /// Generate the initial sequence
    RequestGeneration(GenerateRequest),

    /// Hand the generated sequence to the editor
    Deliver(Sequence),
}
