//! RevisionCoordinator - per-step revision bookkeeping
//!
//! Tracks which steps have a revision in flight and which last failed.
//! This state lives beside the history, never in it: only a successful
//! revision touches the store, as a single `update_step` commit.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::domain::{Step, StepId, StepPatch};
use crate::history::{CommitOutcome, SequenceHistoryStore, SessionToken};
use crate::service::ServiceFailure;

/// Confidence below which a step offers the retry affordance
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Prompt used for a retry when no earlier prompt was kept
pub const DEFAULT_RETRY_PROMPT: &str = "Improve this step: make it clearer and more reliable.";

/// Ephemeral revision state for one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevisionState {
    pub in_flight: bool,
    pub last_error: Option<String>,
    pub last_prompt: Option<String>,
}

/// Proof that a revision was started; hand it back to [`RevisionCoordinator::resolve`]
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionTicket {
    pub step_id: StepId,
    pub prompt: String,
    pub session: SessionToken,
}

/// Why a revision request was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyPrompt,
    InFlight,
    UnknownStep,
    NotRetryable,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::EmptyPrompt => write!(f, "revision prompt is empty"),
            IgnoreReason::InFlight => write!(f, "a revision is already in progress for this step"),
            IgnoreReason::UnknownStep => write!(f, "no such step"),
            IgnoreReason::NotRetryable => write!(f, "nothing to retry for this step"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RevisionDecision {
    /// Issue the service call described by the ticket
    Started(RevisionTicket),
    /// Nothing happened
    Ignored(IgnoreReason),
}

/// What happened when a revision result came back
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The result was merged into the step
    Applied(CommitOutcome),
    /// The service failed; `last_error` holds the message
    Failed(String),
    /// The session changed while the call was in flight
    Discarded,
}

#[derive(Debug, Clone)]
pub struct RevisionCoordinator {
    states: HashMap<StepId, RevisionState>,
    threshold: f64,
    default_prompt: String,
}

impl Default for RevisionCoordinator {
    fn default() -> Self {
        Self::new(LOW_CONFIDENCE_THRESHOLD, DEFAULT_RETRY_PROMPT)
    }
}

impl RevisionCoordinator {
    pub fn new(threshold: f64, default_prompt: impl Into<String>) -> Self {
        Self {
            states: HashMap::new(),
            threshold,
            default_prompt: default_prompt.into(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn state(&self, step_id: &StepId) -> Option<&RevisionState> {
        self.states.get(step_id)
    }

    pub fn is_in_flight(&self, step_id: &StepId) -> bool {
        self.state(step_id).is_some_and(|s| s.in_flight)
    }

    pub fn last_error(&self, step_id: &StepId) -> Option<&str> {
        self.state(step_id).and_then(|s| s.last_error.as_deref())
    }

    /// Steps with a revision outstanding
    pub fn in_flight(&self) -> Vec<StepId> {
        self.states
            .iter()
            .filter(|(_, s)| s.in_flight)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Start a revision of `step_id`
    ///
    /// Ignored for blank prompts and while one is already in flight.
    pub fn begin(&mut self, step_id: &StepId, prompt: &str, session: SessionToken) -> RevisionDecision {
        debug!(%step_id, %session, "begin: called");
        let prompt = prompt.trim();
        if prompt.is_empty() {
            debug!(%step_id, "begin: empty prompt ignored");
            return RevisionDecision::Ignored(IgnoreReason::EmptyPrompt);
        }
        if self.is_in_flight(step_id) {
            debug!(%step_id, "begin: already in flight");
            return RevisionDecision::Ignored(IgnoreReason::InFlight);
        }

        let state = self.states.entry(step_id.clone()).or_default();
        state.in_flight = true;
        state.last_error = None;
        state.last_prompt = Some(prompt.to_string());

        info!(%step_id, "Revision started");
        RevisionDecision::Started(RevisionTicket {
            step_id: step_id.clone(),
            prompt: prompt.to_string(),
            session,
        })
    }

    /// Retry is offered after a failure or for a low-confidence step
    pub fn can_retry(&self, step: &Step) -> bool {
        if self.is_in_flight(&step.id) {
            return false;
        }
        self.last_error(&step.id).is_some() || step.is_low_confidence(self.threshold)
    }

    /// Re-issue the previous request for `step`, or the default prompt
    pub fn retry(&mut self, step: &Step, session: SessionToken) -> RevisionDecision {
        debug!(step_id = %step.id, "retry: called");
        if self.is_in_flight(&step.id) {
            return RevisionDecision::Ignored(IgnoreReason::InFlight);
        }
        if !self.can_retry(step) {
            return RevisionDecision::Ignored(IgnoreReason::NotRetryable);
        }
        let prompt = self
            .state(&step.id)
            .and_then(|s| s.last_prompt.clone())
            .unwrap_or_else(|| self.default_prompt.clone());
        self.begin(&step.id, &prompt, session)
    }

    /// Apply the outcome of a revision call
    ///
    /// Results from an earlier session are dropped without touching
    /// anything. A failure never touches the store.
    pub fn resolve(
        &mut self,
        ticket: &RevisionTicket,
        result: Result<Step, ServiceFailure>,
        store: &mut SequenceHistoryStore,
    ) -> Resolution {
        debug!(step_id = %ticket.step_id, session = %ticket.session, "resolve: called");
        if ticket.session != store.session() {
            warn!(
                step_id = %ticket.step_id,
                ticket_session = %ticket.session,
                current_session = %store.session(),
                "Discarding revision result from a previous session"
            );
            return Resolution::Discarded;
        }

        let state = self.states.entry(ticket.step_id.clone()).or_default();
        state.in_flight = false;

        match result {
            Ok(step) => {
                let outcome = store.update_step(&ticket.step_id, &StepPatch::from(step));
                info!(step_id = %ticket.step_id, ?outcome, "Revision applied");
                Resolution::Applied(outcome)
            }
            Err(failure) => {
                warn!(step_id = %ticket.step_id, message = %failure.message, code = ?failure.code, "Revision failed");
                state.last_error = Some(failure.message.clone());
                Resolution::Failed(failure.message)
            }
        }
    }

    /// Forget all per-step state
    pub fn clear(&mut self) {
        debug!(tracked = self.states.len(), "clear: called");
        self.states.clear();
    }
}
