//! Domain types for stepwise
//!
//! Core domain types: Step, StepPatch, Sequence, ChatMessage.
//! A Sequence is an immutable snapshot; the history store keeps a list of them.

mod id;
mod message;
mod sequence;
mod step;

pub use id::{StepId, generate_step_id};
pub use message::{ChatMessage, ChatRole};
pub use sequence::Sequence;
pub use step::{ConfidenceLevel, HIGH_CONFIDENCE, MEDIUM_CONFIDENCE, Step, StepPatch};
