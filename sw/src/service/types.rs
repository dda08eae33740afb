//! Request and response types for the workflow service

use serde::{Deserialize, Serialize};

use crate::domain::{ChatMessage, Sequence, StepId};

/// Ask the service to rewrite one step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRequest {
    pub step_id: StepId,
    /// The whole current sequence, for context
    pub steps: Sequence,
    pub revision_prompt: String,
}

/// Optional hints for generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationContext {
    pub tool_preferences: Vec<String>,
    pub max_steps: Option<usize>,
}

/// Ask the service to produce an initial sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub name: String,
    pub description: String,
    pub prompt: String,
    #[serde(default)]
    pub context: GenerationContext,
}

impl GenerateRequest {
    /// Request built from a user prompt alone
    pub fn from_prompt(prompt: impl Into<String>, context: GenerationContext) -> Self {
        let prompt = prompt.into();
        Self {
            name: workflow_name(&prompt),
            description: prompt.clone(),
            prompt,
            context,
        }
    }
}

/// Short display name derived from a prompt
fn workflow_name(prompt: &str) -> String {
    const MAX_WORDS: usize = 6;
    let words: Vec<&str> = prompt.split_whitespace().take(MAX_WORDS).collect();
    if words.is_empty() {
        return "Untitled workflow".to_string();
    }
    words.join(" ")
}

/// One clarification round
#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationRequest {
    pub last_user_message: String,
    /// User messages sent so far, including `last_user_message`
    pub turn_count: u32,
    /// Full conversation so far, read-only
    pub transcript: Vec<ChatMessage>,
}

/// Assistant answer to a clarification round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationReply {
    pub message: String,
    #[serde(default)]
    pub is_complete: bool,
}

impl ClarificationReply {
    pub fn question(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_complete: false,
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_complete: true,
        }
    }
}
