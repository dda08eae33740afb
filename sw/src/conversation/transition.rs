//! Pure state transitions
//!
//! `transition` never performs I/O. It returns the next conversation and
//! the effects the caller must run; results of those effects come back in
//! as new events.

use tracing::{debug, warn};

use super::{ConvContext, ConvState, Conversation, Effect, Event, FailedRequest};
use crate::domain::ChatMessage;
use crate::service::{ClarificationRequest, GenerateRequest};

/// Assistant message recorded when the round limit ends the conversation
pub const ROUND_LIMIT_MESSAGE: &str =
    "I have enough to put together a first draft. Generating your workflow now; you can refine it in the editor.";

/// Apply one event
///
/// Events that do not apply in the current state are ignored: the
/// conversation comes back unchanged with no effects.
pub fn transition(conv: Conversation, ctx: &ConvContext, event: Event) -> (Conversation, Vec<Effect>) {
    debug!(state = conv.state.name(), event = event.name(), "transition: called");
    let mut conv = conv;

    match (conv.state.clone(), event) {
        (ConvState::Idle | ConvState::Clarifying { awaiting_reply: false }, Event::Submit(text)) => {
            let text = text.trim();
            if text.is_empty() {
                debug!("transition: empty submission ignored");
                return (conv, vec![]);
            }
            conv.push(ChatMessage::user(text));
            conv.turn_count += 1;
            conv.state = ConvState::Clarifying { awaiting_reply: true };
            let request = clarification_request(&conv);
            (conv, vec![Effect::RequestClarification(request)])
        }

        (ConvState::Clarifying { awaiting_reply: true }, Event::ClarificationReplied(reply)) => {
            if reply.is_complete {
                conv.push(ChatMessage::assistant(reply.message));
                return start_generation(conv, ctx);
            }
            if conv.turn_count >= ctx.max_rounds {
                debug!(turn_count = conv.turn_count, max_rounds = ctx.max_rounds, "transition: round limit reached");
                conv.push(ChatMessage::assistant(ROUND_LIMIT_MESSAGE));
                return start_generation(conv, ctx);
            }
            conv.push(ChatMessage::assistant(reply.message));
            conv.state = ConvState::Clarifying { awaiting_reply: false };
            (conv, vec![])
        }

        (ConvState::Clarifying { awaiting_reply: true }, Event::ClarificationFailed(failure)) => {
            warn!(message = %failure.message, code = ?failure.code, "transition: clarification failed");
            conv.state = ConvState::Errored {
                failed: FailedRequest::Clarification,
                message: failure.message,
            };
            (conv, vec![])
        }

        (ConvState::Completing, Event::GenerationSucceeded(sequence)) => {
            conv.state = ConvState::Done;
            (conv, vec![Effect::Deliver(sequence)])
        }

        (ConvState::Completing, Event::GenerationFailed(failure)) => {
            warn!(message = %failure.message, code = ?failure.code, "transition: generation failed");
            conv.state = ConvState::Errored {
                failed: FailedRequest::Generation,
                message: failure.message,
            };
            (conv, vec![])
        }

        (
            ConvState::Errored {
                failed: FailedRequest::Clarification,
                ..
            },
            Event::Retry,
        ) => {
            conv.state = ConvState::Clarifying { awaiting_reply: true };
            let request = clarification_request(&conv);
            (conv, vec![Effect::RequestClarification(request)])
        }

        (
            ConvState::Errored {
                failed: FailedRequest::Generation,
                ..
            },
            Event::Retry,
        ) => start_generation(conv, ctx),

        (state, event) => {
            debug!(state = state.name(), event = event.name(), "transition: event ignored");
            (conv, vec![])
        }
    }
}

fn clarification_request(conv: &Conversation) -> ClarificationRequest {
    ClarificationRequest {
        last_user_message: conv.last_user_message().unwrap_or_default().to_string(),
        turn_count: conv.turn_count,
        transcript: conv.messages.clone(),
    }
}

fn start_generation(mut conv: Conversation, ctx: &ConvContext) -> (Conversation, Vec<Effect>) {
    conv.state = ConvState::Completing;
    let prompt = conv.last_user_message().unwrap_or_default().to_string();
    let request = GenerateRequest::from_prompt(prompt, ctx.generation.clone());
    (conv, vec![Effect::RequestGeneration(request)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatRole, Sequence};
    use crate::service::{ClarificationReply, ServiceFailure};

    fn ctx() -> ConvContext {
        ConvContext::default()
    }

    fn step(conv: Conversation, event: Event) -> (Conversation, Vec<Effect>) {
        transition(conv, &ctx(), event)
    }

    fn submitted(text: &str) -> Conversation {
        let (conv, effects) = step(Conversation::new(), Event::Submit(text.to_string()));
        assert_eq!(effects.len(), 1);
        conv
    }

    #[test]
    fn test_submit_from_idle_requests_clarification() {
        let (conv, effects) = step(Conversation::new(), Event::Submit("  automate onboarding ".to_string()));

        assert_eq!(conv.state, ConvState::Clarifying { awaiting_reply: true });
        assert_eq!(conv.messages(), &[ChatMessage::user("automate onboarding")]);
        match &effects[..] {
            [Effect::RequestClarification(req)] => {
                assert_eq!(req.last_user_message, "automate onboarding");
                assert_eq!(req.turn_count, 1);
                assert_eq!(req.transcript.len(), 1);
            }
            other => panic!("unexpected effects: {:?}", other),
        }
    }

    #[test]
    fn test_empty_submission_ignored() {
        let (conv, effects) = step(Conversation::new(), Event::Submit("   ".to_string()));
        assert_eq!(conv, Conversation::new());
        assert!(effects.is_empty());
    }

    #[test]
    fn test_submission_while_waiting_ignored() {
        let conv = submitted("first");
        let before = conv.clone();
        let (conv, effects) = step(conv, Event::Submit("second".to_string()));
        assert_eq!(conv, before);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_follow_up_question_keeps_clarifying() {
        let conv = submitted("first");
        let (conv, effects) = step(
            conv,
            Event::ClarificationReplied(ClarificationReply::question("Which CRM?")),
        );

        assert_eq!(conv.state, ConvState::Clarifying { awaiting_reply: false });
        assert!(effects.is_empty());
        assert_eq!(conv.messages().last().unwrap().content, "Which CRM?");
        assert!(conv.accepts_input());
    }

    #[test]
    fn test_completion_on_first_round_records_assistant_message() {
        let conv = submitted("Send new leads to Salesforce");
        let (conv, effects) = step(
            conv,
            Event::ClarificationReplied(ClarificationReply::complete("Got it, generating.")),
        );

        assert_eq!(conv.state, ConvState::Completing);
        let assistant: Vec<_> = conv.messages().iter().filter(|m| m.role == ChatRole::Assistant).collect();
        assert_eq!(assistant.len(), 1);
        assert_eq!(assistant[0].content, "Got it, generating.");
        match &effects[..] {
            [Effect::RequestGeneration(req)] => assert_eq!(req.prompt, "Send new leads to Salesforce"),
            other => panic!("unexpected effects: {:?}", other),
        }
    }

    #[test]
    fn test_generation_uses_most_recent_user_message() {
        let conv = submitted("first idea");
        let (conv, _) = step(conv, Event::ClarificationReplied(ClarificationReply::question("More?")));
        let (conv, _) = step(conv, Event::Submit("refined idea".to_string()));
        let (_, effects) = step(conv, Event::ClarificationReplied(ClarificationReply::complete("ok")));

        match &effects[..] {
            [Effect::RequestGeneration(req)] => assert_eq!(req.prompt, "refined idea"),
            other => panic!("unexpected effects: {:?}", other),
        }
    }

    #[test]
    fn test_generation_success_delivers_and_is_terminal() {
        let conv = submitted("x");
        let (conv, _) = step(conv, Event::ClarificationReplied(ClarificationReply::complete("ok")));
        let (conv, effects) = step(conv, Event::GenerationSucceeded(Sequence::sample()));

        assert_eq!(conv.state, ConvState::Done);
        assert_eq!(effects, vec![Effect::Deliver(Sequence::sample())]);

        let before = conv.clone();
        let (conv, effects) = step(conv, Event::Submit("again".to_string()));
        assert_eq!(conv, before);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_clarification_retry_does_not_duplicate_user_message() {
        let conv = submitted("hello");
        let (conv, _) = step(conv, Event::ClarificationFailed(ServiceFailure::new("network down")));
        assert_eq!(conv.error(), Some("network down"));

        let (conv, effects) = step(conv, Event::Retry);
        assert_eq!(conv.state, ConvState::Clarifying { awaiting_reply: true });
        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.turn_count(), 1);
        match &effects[..] {
            [Effect::RequestClarification(req)] => assert_eq!(req.last_user_message, "hello"),
            other => panic!("unexpected effects: {:?}", other),
        }
    }

    #[test]
    fn test_generation_retry_reissues_generation() {
        let conv = submitted("hello");
        let (conv, _) = step(conv, Event::ClarificationReplied(ClarificationReply::complete("ok")));
        let (conv, _) = step(conv, Event::GenerationFailed(ServiceFailure::new("boom")));
        let message_count = conv.messages().len();

        let (conv, effects) = step(conv, Event::Retry);
        assert_eq!(conv.state, ConvState::Completing);
        assert_eq!(conv.messages().len(), message_count);
        assert!(matches!(&effects[..], [Effect::RequestGeneration(_)]));
    }

    #[test]
    fn test_submission_while_errored_ignored() {
        let conv = submitted("hello");
        let (conv, _) = step(conv, Event::ClarificationFailed(ServiceFailure::new("x")));
        let before = conv.clone();
        let (conv, effects) = step(conv, Event::Submit("new".to_string()));
        assert_eq!(conv, before);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_stray_results_ignored() {
        let (conv, effects) = step(Conversation::new(), Event::GenerationSucceeded(Sequence::sample()));
        assert_eq!(conv.state, ConvState::Idle);
        assert!(effects.is_empty());

        let (conv, effects) = step(conv, Event::Retry);
        assert_eq!(conv.state, ConvState::Idle);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_round_limit_completes_conversation() {
        let ctx = ConvContext {
            max_rounds: 2,
            ..ConvContext::default()
        };
        let (conv, _) = transition(Conversation::new(), &ctx, Event::Submit("one".to_string()));
        let (conv, _) = transition(conv, &ctx, Event::ClarificationReplied(ClarificationReply::question("q1")));
        let (conv, _) = transition(conv, &ctx, Event::Submit("two".to_string()));
        let (conv, effects) = transition(conv, &ctx, Event::ClarificationReplied(ClarificationReply::question("q2")));

        assert_eq!(conv.state, ConvState::Completing);
        assert_eq!(conv.messages().last().unwrap().content, ROUND_LIMIT_MESSAGE);
        assert!(matches!(&effects[..], [Effect::RequestGeneration(_)]));
    }
}
