//! Sequence - an ordered, immutable list of steps
//!
//! A Sequence is a cheap-to-clone snapshot. Every edit builds a new
//! Sequence, so snapshots held in the history are never mutated after
//! the fact.

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use super::step::clamp_confidence;
use super::{Step, StepId, StepPatch};

/// Ordered list of steps; order defines execution order, ids are unique
#[derive(Debug, Clone, Default)]
pub struct Sequence(Arc<Vec<Step>>);

impl Sequence {
    /// Build a sequence, normalizing ids and confidence
    ///
    /// Steps without an id get a generated one. Duplicate ids are dropped,
    /// keeping the first occurrence. Confidence is clamped to [0, 1].
    pub fn new(steps: Vec<Step>) -> Self {
        debug!(step_count = steps.len(), "Sequence::new: called");
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(steps.len());

        for mut step in steps {
            if step.id.is_empty() {
                step.id = StepId::generate(&step.title);
                debug!(id = %step.id, "Sequence::new: generated id for step");
            }
            step.confidence_score = clamp_confidence(step.confidence_score);
            if !seen.insert(step.id.clone()) {
                warn!(id = %step.id, "Sequence::new: dropping step with duplicate id");
                continue;
            }
            normalized.push(step);
        }

        Self(Arc::new(normalized))
    }

    /// The empty sequence
    pub fn empty() -> Self {
        Self::default()
    }

    /// Borrow the steps in order
    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    /// Step ids in order
    pub fn ids(&self) -> Vec<StepId> {
        self.0.iter().map(|s| s.id.clone()).collect()
    }

    /// Index of the step with the given id
    pub fn position(&self, id: &StepId) -> Option<usize> {
        self.0.iter().position(|s| &s.id == id)
    }

    /// Step with the given id
    pub fn find(&self, id: &StepId) -> Option<&Step> {
        self.0.iter().find(|s| &s.id == id)
    }

    /// True if both sequences share the same underlying allocation
    pub fn ptr_eq(&self, other: &Sequence) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Move the step at `from` to `to` within the remaining list
    ///
    /// Returns None when the move would not change anything or an index
    /// is out of bounds.
    pub fn moved(&self, from: usize, to: usize) -> Option<Sequence> {
        debug!(from, to, len = self.0.len(), "Sequence::moved: called");
        if from == to || from >= self.0.len() || to >= self.0.len() {
            debug!("Sequence::moved: no-op move");
            return None;
        }
        let mut steps = self.0.as_ref().clone();
        let step = steps.remove(from);
        steps.insert(to, step);
        Some(Self(Arc::new(steps)))
    }

    /// Sequence without the step `id`, or None if no step matches
    pub fn without(&self, id: &StepId) -> Option<Sequence> {
        debug!(%id, "Sequence::without: called");
        let index = self.position(id)?;
        let mut steps = self.0.as_ref().clone();
        steps.remove(index);
        Some(Self(Arc::new(steps)))
    }

    /// Sequence with `patch` merged into step `id`
    ///
    /// Returns None when no step matches or the patch changes nothing.
    pub fn with_patch(&self, id: &StepId, patch: &StepPatch) -> Option<Sequence> {
        debug!(%id, "Sequence::with_patch: called");
        let index = self.position(id)?;
        let patched = self.0[index].patched(patch);
        if patched == self.0[index] {
            debug!(%id, "Sequence::with_patch: patch changes nothing");
            return None;
        }
        let mut steps = self.0.as_ref().clone();
        steps[index] = patched;
        Some(Self(Arc::new(steps)))
    }

    /// Resolve a user-typed reference (full id, prefix, or slug fragment)
    ///
    /// Returns:
    /// - Ok(Some(id)) if exactly one step matches (exact matches win)
    /// - Ok(None) if nothing matches
    /// - Err with candidates if ambiguous
    pub fn resolve(&self, reference: &str) -> Result<Option<StepId>, Vec<StepId>> {
        if let Some(step) = self.0.iter().find(|s| s.id.as_str() == reference) {
            return Ok(Some(step.id.clone()));
        }
        let mut matches: Vec<StepId> = self
            .0
            .iter()
            .filter(|s| s.id.matches(reference))
            .map(|s| s.id.clone())
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(matches),
        }
    }

    /// The lead-nurturing workflow used by `sw demo`
    pub fn sample() -> Self {
        let step = |id: &str, title: &str, description: &str, tool: &str, reasoning: &str, confidence: f64| {
            Step::new(id, title)
                .with_description(description)
                .with_tool(tool)
                .with_reasoning(reasoning)
                .with_agent("Claude")
                .with_confidence(confidence)
        };

        Self::new(vec![
            step(
                "1",
                "Create Lead in Salesforce",
                "Automatically create a new lead when a form is submitted",
                "Salesforce",
                "This step ensures new leads are properly tracked in your CRM system",
                0.95,
            ),
            step(
                "2",
                "Send Welcome Email",
                "Send a personalized welcome email to new leads",
                "HubSpot",
                "First touchpoint with the lead to establish communication",
                0.88,
            ),
            step(
                "3",
                "Schedule Follow-up Call",
                "Automatically schedule a sales call with qualified leads",
                "Calendly",
                "Proactive engagement to move leads through the sales funnel",
                0.92,
            ),
            step(
                "4",
                "Share Product Demo",
                "Send personalized product demo video based on lead interests",
                "Vidyard",
                "Educational content to showcase product value proposition",
                0.85,
            ),
            step(
                "5",
                "Add to Nurture Campaign",
                "Enroll lead in automated nurture campaign sequence",
                "HubSpot",
                "Maintain engagement with regular, valuable content",
                0.90,
            ),
            step(
                "6",
                "Update Lead Score",
                "Adjust lead score based on engagement activities",
                "Salesforce",
                "Track lead progression and prioritize sales efforts",
                0.87,
            ),
            step(
                "7",
                "Create Task for Sales Team",
                "Generate task for sales rep to follow up with hot leads",
                "Asana",
                "Ensure timely follow-up with qualified opportunities",
                0.93,
            ),
        ])
    }
}

impl Deref for Sequence {
    type Target = [Step];

    fn deref(&self) -> &[Step] {
        &self.0
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl From<Vec<Step>> for Sequence {
    fn from(steps: Vec<Step>) -> Self {
        Self::new(steps)
    }
}

impl Serialize for Sequence {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.steps().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Sequence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let steps = Vec::<Step>::deserialize(deserializer)?;
        Ok(Self::new(steps))
    }
}
