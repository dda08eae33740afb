//! Workflow service boundary
//!
//! Everything the editor and the conversation need from the outside world
//! goes through [`WorkflowService`]: clarification rounds, sequence
//! generation and single-step revision. Two implementations ship with the
//! crate: [`LlmWorkflowService`] talks to a model, [`MockWorkflowService`]
//! returns canned data after a simulated delay.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

mod error;
mod llm;
mod mock;
mod types;

pub use error::ServiceFailure;
pub use llm::LlmWorkflowService;
pub use mock::MockWorkflowService;
pub use types::{
    ClarificationReply, ClarificationRequest, GenerateRequest, GenerationContext, RevisionRequest,
};

use crate::config::{Backend, Config};
use crate::domain::{Sequence, Step};

/// Asynchronous, fallible operations the core depends on
#[async_trait]
pub trait WorkflowService: Send + Sync {
    /// Rewrite a single step; the returned step keeps the requested id
    async fn request_revision(&self, request: RevisionRequest) -> Result<Step, ServiceFailure>;

    /// Produce an initial sequence from a prompt
    async fn generate_sequence(&self, request: GenerateRequest) -> Result<Sequence, ServiceFailure>;

    /// Run one clarification round
    async fn advance_clarification(&self, request: ClarificationRequest) -> Result<ClarificationReply, ServiceFailure>;
}

/// Build the service selected by `config.backend`
pub fn create_service(config: &Config) -> eyre::Result<Arc<dyn WorkflowService>> {
    debug!(backend = %config.backend, "create_service: called");
    match config.backend {
        Backend::Mock => Ok(Arc::new(MockWorkflowService::from_config(&config.mock))),
        Backend::Llm => {
            let client = crate::llm::create_client(&config.llm)?;
            Ok(Arc::new(LlmWorkflowService::new(client, config.llm.max_tokens)))
        }
    }
}
