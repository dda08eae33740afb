//! Simulated workflow service
//!
//! Answers every call after a fixed delay and fails a configurable share
//! of them. Used by `sw demo`, offline runs and tests.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{ClarificationReply, ClarificationRequest, GenerateRequest, RevisionRequest, ServiceFailure, WorkflowService};
use crate::config::MockConfig;
use crate::domain::{Sequence, Step};

/// Confidence given to every revised step
const REVISED_CONFIDENCE: f64 = 0.95;

/// Follow-up questions asked in order, one per round
const QUESTIONS: &[&str] = &[
    "Which tools does your team already use for this process?",
    "What event should kick the workflow off?",
    "Who needs to be notified along the way, and how?",
    "Is there a follow-up or deadline the workflow should track?",
];

const COMPLETION_MESSAGE: &str = "Thanks, that's everything I need. I'll put the workflow together now.";

/// Canned-response service with latency and random failures
#[derive(Debug, Clone)]
pub struct MockWorkflowService {
    latency: Duration,
    failure_rate: f64,
}

impl MockWorkflowService {
    pub fn new(latency: Duration, failure_rate: f64) -> Self {
        Self {
            latency,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &MockConfig) -> Self {
        debug!(latency_ms = config.latency_ms, failure_rate = config.failure_rate, "MockWorkflowService::from_config: called");
        Self::new(Duration::from_millis(config.latency_ms), config.failure_rate)
    }

    /// No delay, never fails
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, 0.0)
    }

    /// Sleep for the configured latency, then roll for a failure
    async fn simulate(&self, operation: &str) -> bool {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let failed = self.failure_rate > 0.0 && rand::random_bool(self.failure_rate);
        if failed {
            warn!(operation, "MockWorkflowService: simulated failure");
        }
        failed
    }
}

/// Phrases that end clarification when they appear as whole words
const FINISH_PHRASES: &[&str] = &[
    "that's all",
    "thats all",
    "that's it",
    "go ahead",
    "generate it",
    "i'm done",
    "im done",
    "all done",
];

/// Replies that end clarification only when they are the whole message
const FINISH_REPLIES: &[&str] = &["done", "finished", "nothing else"];

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('’', "'")
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

fn wants_to_finish(message: &str) -> bool {
    let message = words(message);
    if FINISH_REPLIES.iter().any(|reply| words(reply) == message) {
        return true;
    }
    FINISH_PHRASES.iter().any(|phrase| {
        let phrase = words(phrase);
        message.windows(phrase.len()).any(|window| window == phrase.as_slice())
    })
}

#[async_trait]
impl WorkflowService for MockWorkflowService {
    async fn request_revision(&self, request: RevisionRequest) -> Result<Step, ServiceFailure> {
        debug!(step_id = %request.step_id, prompt = %request.revision_prompt, "request_revision: called");
        if self.simulate("request_revision").await {
            return Err(ServiceFailure::new("Failed to process revision request").with_code("REVISION_FAILED"));
        }

        let original = request.steps.find(&request.step_id).ok_or_else(|| {
            ServiceFailure::new(format!("Step {} not found", request.step_id)).with_code("REVISION_FAILED")
        })?;

        let revised = Step::new(request.step_id.clone(), format!("Revised: {}", original.title))
            .with_description(format!("{} Revised to address: {}", original.description, request.revision_prompt.trim()))
            .with_tool(original.tool_name.clone())
            .with_reasoning(format!("Revised at the user's request: \"{}\"", request.revision_prompt.trim()))
            .with_agent(original.agent_name.clone())
            .with_confidence(REVISED_CONFIDENCE);

        info!(step_id = %revised.id, "request_revision: revised step");
        Ok(revised)
    }

    async fn generate_sequence(&self, request: GenerateRequest) -> Result<Sequence, ServiceFailure> {
        debug!(name = %request.name, ?request.context, "generate_sequence: called");
        if self.simulate("generate_sequence").await {
            return Err(ServiceFailure::new("Failed to generate workflow").with_code("GENERATION_FAILED"));
        }

        let sample = Sequence::sample();
        let max_steps = request.context.max_steps.unwrap_or(sample.len());
        let steps: Vec<Step> = sample.iter().take(max_steps).cloned().collect();

        info!(step_count = steps.len(), "generate_sequence: generated sample workflow");
        Ok(Sequence::new(steps))
    }

    async fn advance_clarification(&self, request: ClarificationRequest) -> Result<ClarificationReply, ServiceFailure> {
        debug!(turn_count = request.turn_count, "advance_clarification: called");
        if self.simulate("advance_clarification").await {
            return Err(ServiceFailure::new("Failed to get a response from the assistant").with_code("CLARIFICATION_FAILED"));
        }

        let round = request.turn_count.max(1) as usize;
        if round > QUESTIONS.len() || wants_to_finish(&request.last_user_message) {
            debug!(round, "advance_clarification: enough information gathered");
            return Ok(ClarificationReply::complete(COMPLETION_MESSAGE));
        }

        Ok(ClarificationReply::question(QUESTIONS[round - 1]))
    }
}
