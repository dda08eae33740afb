//! Conversation state

use crate::domain::{ChatMessage, ChatRole};
use crate::service::GenerationContext;

/// Which request an `Errored` conversation will re-issue on retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedRequest {
    Clarification,
    Generation,
}

/// Where the conversation is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConvState {
    /// No messages yet
    #[default]
    Idle,

    /// At least one user message sent; the assistant keeps asking
    Clarifying {
        /// A clarification round is in flight
        awaiting_reply: bool,
    },

    /// Assistant signalled completion; generation in flight
    Completing,

    /// Generation succeeded; terminal
    Done,

    /// A request failed; `retry` re-issues it
    Errored { failed: FailedRequest, message: String },
}

impl ConvState {
    /// Short name for logs and prompts
    pub fn name(&self) -> &'static str {
        match self {
            ConvState::Idle => "idle",
            ConvState::Clarifying { awaiting_reply: false } => "clarifying",
            ConvState::Clarifying { awaiting_reply: true } => "waiting",
            ConvState::Completing => "generating",
            ConvState::Done => "done",
            ConvState::Errored { .. } => "error",
        }
    }
}

/// Fixed settings for one conversation
#[derive(Debug, Clone)]
pub struct ConvContext {
    /// Rounds after which the conversation completes on its own
    pub max_rounds: u32,

    /// Hints passed along with the generation request
    pub generation: GenerationContext,
}

impl Default for ConvContext {
    fn default() -> Self {
        Self {
            max_rounds: 20,
            generation: GenerationContext::default(),
        }
    }
}

/// Append-only transcript plus lifecycle state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    pub state: ConvState,
    pub(super) messages: Vec<ChatMessage>,
    pub(super) turn_count: u32,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// User messages sent so far
    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    /// The first user message has been sent
    pub fn is_clarifying(&self) -> bool {
        self.messages.iter().any(ChatMessage::is_user)
    }

    /// The assistant has signalled completion
    pub fn is_complete(&self) -> bool {
        matches!(
            self.state,
            ConvState::Completing
                | ConvState::Done
                | ConvState::Errored {
                    failed: FailedRequest::Generation,
                    ..
                }
        )
    }

    /// A request is outstanding
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            ConvState::Clarifying { awaiting_reply: true } | ConvState::Completing
        )
    }

    /// New user messages would be accepted
    pub fn accepts_input(&self) -> bool {
        matches!(
            self.state,
            ConvState::Idle | ConvState::Clarifying { awaiting_reply: false }
        )
    }

    /// Retry would re-issue a failed request
    pub fn can_retry(&self) -> bool {
        matches!(self.state, ConvState::Errored { .. })
    }

    /// Failure message while `Errored`
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ConvState::Errored { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }

    pub(super) fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_follow_state() {
        let mut conv = Conversation::new();
        assert!(!conv.is_clarifying());
        assert!(conv.accepts_input());

        conv.push(ChatMessage::user("hello"));
        conv.state = ConvState::Clarifying { awaiting_reply: true };
        assert!(conv.is_clarifying());
        assert!(conv.is_busy());
        assert!(!conv.accepts_input());
        assert!(!conv.is_complete());

        conv.state = ConvState::Errored {
            failed: FailedRequest::Generation,
            message: "boom".to_string(),
        };
        assert!(conv.is_complete());
        assert!(conv.can_retry());
        assert_eq!(conv.error(), Some("boom"));
    }

    #[test]
    fn test_last_user_message() {
        let mut conv = Conversation::new();
        conv.push(ChatMessage::user("first"));
        conv.push(ChatMessage::assistant("question?"));
        conv.push(ChatMessage::user("second"));
        conv.push(ChatMessage::assistant("thanks"));
        assert_eq!(conv.last_user_message(), Some("second"));
    }
}
