//! Async driver that runs conversation effects against a service

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info};

use super::{ConvContext, Conversation, Effect, Event, transition};
use crate::domain::Sequence;
use crate::service::WorkflowService;

/// One chat session: the pure state machine plus the service it talks to
///
/// Every call runs to completion, feeding service results back in as
/// events, before the next one can start.
pub struct ClarificationConversation {
    conversation: Conversation,
    ctx: ConvContext,
    service: Arc<dyn WorkflowService>,
}

impl ClarificationConversation {
    pub fn new(service: Arc<dyn WorkflowService>, ctx: ConvContext) -> Self {
        debug!(max_rounds = ctx.max_rounds, "ClarificationConversation::new: called");
        Self {
            conversation: Conversation::new(),
            ctx,
            service,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Send a user message
    ///
    /// Returns the generated sequence if this round finished the
    /// conversation and generation succeeded.
    pub async fn submit(&mut self, text: &str) -> Option<Sequence> {
        debug!(len = text.len(), "ClarificationConversation::submit: called");
        self.dispatch(Event::Submit(text.to_string())).await
    }

    /// Re-issue the failed request, if any
    pub async fn retry(&mut self) -> Option<Sequence> {
        debug!("ClarificationConversation::retry: called");
        self.dispatch(Event::Retry).await
    }

    async fn dispatch(&mut self, event: Event) -> Option<Sequence> {
        let mut events = VecDeque::from([event]);
        let mut delivered = None;

        while let Some(event) = events.pop_front() {
            let current = std::mem::take(&mut self.conversation);
            let (next, effects) = transition(current, &self.ctx, event);
            self.conversation = next;

            for effect in effects {
                match effect {
                    Effect::RequestClarification(request) => {
                        debug!(turn_count = request.turn_count, "dispatch: requesting clarification");
                        let event = match self.service.advance_clarification(request).await {
                            Ok(reply) => Event::ClarificationReplied(reply),
                            Err(failure) => Event::ClarificationFailed(failure),
                        };
                        events.push_back(event);
                    }
                    Effect::RequestGeneration(request) => {
                        info!(name = %request.name, "dispatch: generating workflow");
                        let event = match self.service.generate_sequence(request).await {
                            Ok(sequence) => Event::GenerationSucceeded(sequence),
                            Err(failure) => Event::GenerationFailed(failure),
                        };
                        events.push_back(event);
                    }
                    Effect::Deliver(sequence) => {
                        info!(step_count = sequence.len(), "dispatch: workflow generated");
                        delivered = Some(sequence);
                    }
                }
            }
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConvState;
    use crate::domain::ChatRole;
    use crate::service::scripted::ScriptedService;
    use crate::service::{ClarificationReply, ServiceFailure};

    fn driver(service: &Arc<ScriptedService>) -> ClarificationConversation {
        ClarificationConversation::new(service.clone(), ConvContext::default())
    }

    #[tokio::test]
    async fn test_first_round_completion_generates() {
        let service = Arc::new(ScriptedService::new());
        service
            .push_clarification(Ok(ClarificationReply::complete("Great, generating.")))
            .push_generation(Ok(Sequence::sample()));
        let mut conv = driver(&service);

        let sequence = conv.submit("Nurture new leads").await.unwrap();

        assert_eq!(sequence.len(), 7);
        assert_eq!(conv.conversation().state, ConvState::Done);
        let roles: Vec<ChatRole> = conv.conversation().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant]);
        assert_eq!(service.generation_prompts.lock().unwrap()[0], "Nurture new leads");
    }

    #[tokio::test]
    async fn test_multi_round_then_generation() {
        let service = Arc::new(ScriptedService::new());
        service
            .push_clarification(Ok(ClarificationReply::question("Which CRM?")))
            .push_clarification(Ok(ClarificationReply::complete("Thanks!")))
            .push_generation(Ok(Sequence::sample()));
        let mut conv = driver(&service);

        assert!(conv.submit("Automate leads").await.is_none());
        assert!(conv.conversation().accepts_input());

        assert!(conv.submit("Salesforce").await.is_some());
        assert_eq!(service.clarification_calls(), 2);
        assert_eq!(conv.conversation().messages().len(), 4);

        let second = &service.clarification_requests.lock().unwrap()[1];
        assert_eq!(second.turn_count, 2);
        assert_eq!(second.transcript.len(), 3);
    }

    #[tokio::test]
    async fn test_generation_failure_then_retry() {
        let service = Arc::new(ScriptedService::new());
        service
            .push_clarification(Ok(ClarificationReply::complete("ok")))
            .push_generation(Err(ServiceFailure::new("Failed to generate workflow")))
            .push_generation(Ok(Sequence::sample()));
        let mut conv = driver(&service);

        assert!(conv.submit("leads").await.is_none());
        assert_eq!(conv.conversation().error(), Some("Failed to generate workflow"));
        let message_count = conv.conversation().messages().len();

        assert!(conv.retry().await.is_some());
        assert_eq!(conv.conversation().messages().len(), message_count);
        assert_eq!(service.generation_calls(), 2);
        assert_eq!(service.clarification_calls(), 1);
    }

    #[tokio::test]
    async fn test_clarification_failure_then_retry() {
        let service = Arc::new(ScriptedService::new());
        service
            .push_clarification(Err(ServiceFailure::new("offline")))
            .push_clarification(Ok(ClarificationReply::question("Which tool?")));
        let mut conv = driver(&service);

        conv.submit("hello").await;
        assert!(conv.conversation().can_retry());

        conv.retry().await;
        assert_eq!(conv.conversation().state, ConvState::Clarifying { awaiting_reply: false });
        let users = conv.conversation().messages().iter().filter(|m| m.is_user()).count();
        assert_eq!(users, 1);
    }
}
