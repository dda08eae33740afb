//! Step - one action in a workflow, with provenance metadata

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use super::StepId;

/// Confidence at or above which a step renders as high confidence
pub const HIGH_CONFIDENCE: f64 = 0.9;

/// Confidence at or above which a step renders as medium confidence
pub const MEDIUM_CONFIDENCE: f64 = 0.7;

/// A single workflow step
///
/// Identity is `id`; every other field can change through a [`StepPatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Unique, immutable identity
    #[serde(default = "empty_id")]
    pub id: StepId,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Tool that performs the step (e.g. "Salesforce")
    #[serde(default)]
    pub tool_name: String,

    /// Why the assistant proposed this step
    #[serde(default)]
    pub ai_reasoning: String,

    /// Agent that produced the step
    #[serde(default)]
    pub agent_name: String,

    /// Confidence in [0, 1]
    #[serde(default, deserialize_with = "deserialize_confidence")]
    pub confidence_score: f64,
}

fn empty_id() -> StepId {
    StepId::from(String::new())
}

impl Step {
    /// Create a step with the given id and title; other fields empty
    pub fn new(id: impl Into<StepId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            tool_name: String::new(),
            ai_reasoning: String::new(),
            agent_name: String::new(),
            confidence_score: 0.0,
        }
    }

    /// Builder: set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: set the tool name
    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = tool_name.into();
        self
    }

    /// Builder: set the reasoning text
    pub fn with_reasoning(mut self, ai_reasoning: impl Into<String>) -> Self {
        self.ai_reasoning = ai_reasoning.into();
        self
    }

    /// Builder: set the agent name
    pub fn with_agent(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = agent_name.into();
        self
    }

    /// Builder: set the confidence score (clamped to [0, 1])
    pub fn with_confidence(mut self, confidence_score: f64) -> Self {
        self.confidence_score = clamp_confidence(confidence_score);
        self
    }

    /// Badge level used when rendering the step
    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence_score)
    }

    /// Confidence as a whole percentage
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence_score * 100.0).round() as u32
    }

    /// True if the confidence score is strictly below `threshold`
    pub fn is_low_confidence(&self, threshold: f64) -> bool {
        self.confidence_score < threshold
    }

    /// Return a copy with `patch` merged in; the id never changes
    pub fn patched(&self, patch: &StepPatch) -> Step {
        debug!(id = %self.id, "Step::patched: called");
        let mut step = self.clone();
        if let Some(title) = &patch.title {
            step.title = title.clone();
        }
        if let Some(description) = &patch.description {
            step.description = description.clone();
        }
        if let Some(tool_name) = &patch.tool_name {
            step.tool_name = tool_name.clone();
        }
        if let Some(ai_reasoning) = &patch.ai_reasoning {
            step.ai_reasoning = ai_reasoning.clone();
        }
        if let Some(agent_name) = &patch.agent_name {
            step.agent_name = agent_name.clone();
        }
        if let Some(score) = patch.confidence_score {
            step.confidence_score = clamp_confidence(score);
        }
        step
    }
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(clamp_confidence)
}

pub(super) fn clamp_confidence(score: f64) -> f64 {
    if score.is_nan() {
        warn!("clamp_confidence: NaN confidence, using 0.0");
        return 0.0;
    }
    if !(0.0..=1.0).contains(&score) {
        warn!(score, "clamp_confidence: confidence outside [0, 1], clamping");
    }
    score.clamp(0.0, 1.0)
}

/// Partial update of a step's mutable fields
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tool_name: Option<String>,
    pub ai_reasoning: Option<String>,
    pub agent_name: Option<String>,
    pub confidence_score: Option<f64>,
}

impl StepPatch {
    /// Patch that only changes the title
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// True if the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Set a single field by its name
    ///
    /// Accepts both snake_case and camelCase field names. Returns an error
    /// message for unknown fields or an unparsable confidence value.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<(), String> {
        match field {
            "title" => self.title = Some(value.to_string()),
            "description" => self.description = Some(value.to_string()),
            "tool" | "tool_name" | "toolName" => self.tool_name = Some(value.to_string()),
            "reasoning" | "ai_reasoning" | "aiReasoning" => self.ai_reasoning = Some(value.to_string()),
            "agent" | "agent_name" | "agentName" => self.agent_name = Some(value.to_string()),
            "confidence" | "confidence_score" | "confidenceScore" => {
                let score: f64 = value
                    .parse()
                    .map_err(|_| format!("confidence must be a number, got '{}'", value))?;
                self.confidence_score = Some(score);
            }
            other => return Err(format!("unknown step field '{}'", other)),
        }
        Ok(())
    }
}

impl From<Step> for StepPatch {
    /// Every mutable field of a full step; used to merge revision results
    fn from(step: Step) -> Self {
        Self {
            title: Some(step.title),
            description: Some(step.description),
            tool_name: Some(step.tool_name),
            ai_reasoning: Some(step.ai_reasoning),
            agent_name: Some(step.agent_name),
            confidence_score: Some(step.confidence_score),
        }
    }
}

/// Confidence badge bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    /// At or above 0.9
    High,
    /// At or above 0.7
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Bucket a raw confidence score
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_CONFIDENCE {
            Self::High
        } else if score >= MEDIUM_CONFIDENCE {
            Self::Medium
        } else {
            Self::Low
        }
    }
}
