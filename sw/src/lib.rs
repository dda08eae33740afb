//! Stepwise - conversational workflow generation with an undoable editor
//!
//! A user describes an automation in chat. The assistant asks clarifying
//! questions until it has enough to go on, generates an ordered list of
//! steps, and hands it to an editor where steps can be reordered, edited,
//! deleted or sent back to the assistant for revision. Every edit is a
//! snapshot in a linear undo/redo history.
//!
//! # Modules
//!
//! - [`domain`] - Step, Sequence and chat message types
//! - [`history`] - Versioned sequence store with undo/redo
//! - [`revision`] - Per-step revision bookkeeping
//! - [`conversation`] - Clarification state machine
//! - [`editor`] - Actor that owns the store and runs revisions
//! - [`service`] - Workflow service trait with LLM and mock backends
//! - [`llm`] - LLM client trait and provider implementations
//! - [`repl`] - Terminal front-ends
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod conversation;
pub mod domain;
pub mod editor;
pub mod history;
pub mod llm;
pub mod repl;
pub mod revision;
pub mod service;

// Re-export commonly used types
pub use config::{Backend, Config, LlmConfig};
pub use conversation::{ClarificationConversation, ConvContext, ConvState, Conversation};
pub use domain::{ChatMessage, ChatRole, ConfidenceLevel, Sequence, Step, StepId, StepPatch};
pub use editor::{EditorEvent, EditorSettings, LoadOutcome, Snapshot, WorkflowEditor};
pub use history::{CommitOutcome, SequenceHistoryStore, SessionToken};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
pub use revision::{RevisionCoordinator, RevisionDecision, RevisionState};
pub use service::{
    ClarificationReply, ClarificationRequest, GenerateRequest, GenerationContext, MockWorkflowService,
    RevisionRequest, ServiceFailure, WorkflowService, create_service,
};
