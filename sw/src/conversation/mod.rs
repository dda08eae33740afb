//! Clarification conversation
//!
//! Pure state transitions (`transition`) over a [`Conversation`], plus an
//! async driver that runs the resulting effects.

mod driver;
mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

pub use driver::ClarificationConversation;
pub use effect::Effect;
pub use event::Event;
pub use state::{ConvContext, ConvState, Conversation, FailedRequest};
pub use transition::{ROUND_LIMIT_MESSAGE, transition};
