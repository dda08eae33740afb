//! LLM-backed workflow service
//!
//! Each operation is one stateless completion. The model is asked to answer
//! with JSON; the first JSON value found in the reply is parsed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{ClarificationReply, ClarificationRequest, GenerateRequest, RevisionRequest, ServiceFailure, WorkflowService};
use crate::domain::{ChatRole, Sequence, Step};
use crate::llm::{CompletionRequest, LlmClient, Message};

const CLARIFICATION_PROMPT: &str = r#"You are a workflow automation assistant. The user describes a business process they want to automate. Ask one short clarifying question at a time about the tools, triggers, people and timing involved.

When you have enough information to design the workflow, stop asking and say so.

Respond with JSON only, no prose around it:
{"message": "<your question or closing remark>", "isComplete": <true when you have enough information>}"#;

const GENERATION_PROMPT: &str = r#"You are a workflow automation designer. Turn the user's request into an ordered list of concrete automation steps.

Each step has:
- "title": short imperative title
- "description": one sentence on what the step does
- "toolName": the product that performs it (e.g. Salesforce, HubSpot, Slack)
- "aiReasoning": why this step belongs in the workflow
- "agentName": "Claude"
- "confidenceScore": your confidence in the step, between 0 and 1

Respond with JSON only: {"steps": [ ... ]}"#;

const REVISION_PROMPT: &str = r#"You are a workflow automation designer revising one step of an existing workflow. You receive the full workflow as JSON, the id of the step to revise and the user's instruction.

Return only the revised step as a JSON object with the fields "title", "description", "toolName", "aiReasoning", "agentName" and "confidenceScore". Keep the other steps in mind so the revised step still fits between its neighbours."#;

/// Workflow service that delegates to an [`LlmClient`]
pub struct LlmWorkflowService {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl LlmWorkflowService {
    pub fn new(client: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }

    async fn complete(&self, system_prompt: &str, messages: Vec<Message>) -> Result<String, ServiceFailure> {
        debug!(message_count = messages.len(), "LlmWorkflowService::complete: called");
        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            messages,
            max_tokens: self.max_tokens,
        };
        let response = self.client.complete(request).await?;
        debug!(tokens = response.usage.total(), "LlmWorkflowService::complete: response received");
        Ok(response.text().to_string())
    }
}

/// Candidate JSON spans in `text`: the outermost object, then the outermost array
fn extract_json(text: &str) -> Vec<&str> {
    [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = text.find(open)?;
            let end = text.rfind(close)?;
            (end > start).then(|| &text[start..=end])
        })
        .collect()
}

/// Parse the first candidate span that deserializes as `T`
fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ServiceFailure> {
    let candidates = extract_json(text);
    let mut last_error = None;
    for json in candidates {
        match serde_json::from_str(json) {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!(error = %e, "parse_json: candidate rejected");
                last_error = Some(e);
            }
        }
    }
    Err(match last_error {
        Some(e) => ServiceFailure::invalid_response(format!("Could not parse model reply: {}", e)),
        None => ServiceFailure::invalid_response("Model reply contained no JSON"),
    })
}

/// Generation replies may be `{"steps": [...]}` or a bare array
#[derive(Deserialize)]
#[serde(untagged)]
enum GeneratedSteps {
    Wrapped { steps: Vec<Step> },
    Bare(Vec<Step>),
}

impl GeneratedSteps {
    fn into_steps(self) -> Vec<Step> {
        match self {
            GeneratedSteps::Wrapped { steps } | GeneratedSteps::Bare(steps) => steps,
        }
    }
}

#[async_trait]
impl WorkflowService for LlmWorkflowService {
    async fn request_revision(&self, request: RevisionRequest) -> Result<Step, ServiceFailure> {
        debug!(step_id = %request.step_id, "request_revision: called");
        let workflow = serde_json::to_string_pretty(&request.steps)
            .map_err(|e| ServiceFailure::new(format!("Could not encode workflow: {}", e)))?;
        let content = format!(
            "Workflow:\n{}\n\nStep to revise: {}\n\nInstruction: {}",
            workflow, request.step_id, request.revision_prompt
        );

        let text = self.complete(REVISION_PROMPT, vec![Message::user(content)]).await?;
        let mut step: Step = parse_json(&text)?;

        // The model does not get to pick the identity
        step.id = request.step_id;
        info!(step_id = %step.id, "request_revision: step revised");
        Ok(step)
    }

    async fn generate_sequence(&self, request: GenerateRequest) -> Result<Sequence, ServiceFailure> {
        debug!(name = %request.name, ?request.context, "generate_sequence: called");
        let mut content = format!("Workflow name: {}\n\nRequest: {}", request.name, request.prompt);
        if request.description != request.prompt && !request.description.is_empty() {
            content.push_str(&format!("\n\nDescription: {}", request.description));
        }
        if !request.context.tool_preferences.is_empty() {
            content.push_str(&format!("\n\nPreferred tools: {}", request.context.tool_preferences.join(", ")));
        }
        if let Some(max_steps) = request.context.max_steps {
            content.push_str(&format!("\n\nUse at most {} steps.", max_steps));
        }

        let text = self.complete(GENERATION_PROMPT, vec![Message::user(content)]).await?;
        let mut steps = parse_json::<GeneratedSteps>(&text)?.into_steps();

        if let Some(max_steps) = request.context.max_steps
            && steps.len() > max_steps
        {
            warn!(returned = steps.len(), max_steps, "generate_sequence: truncating over-long result");
            steps.truncate(max_steps);
        }

        let sequence = Sequence::new(steps);
        if sequence.is_empty() {
            return Err(ServiceFailure::invalid_response("The model returned no steps"));
        }
        info!(step_count = sequence.len(), "generate_sequence: sequence generated");
        Ok(sequence)
    }

    async fn advance_clarification(&self, request: ClarificationRequest) -> Result<ClarificationReply, ServiceFailure> {
        debug!(turn_count = request.turn_count, "advance_clarification: called");
        let mut messages: Vec<Message> = request
            .transcript
            .iter()
            .map(|m| match m.role {
                ChatRole::User => Message::user(m.content.clone()),
                ChatRole::Assistant => Message::assistant(m.content.clone()),
            })
            .collect();

        let last_is_current = request
            .transcript
            .last()
            .is_some_and(|m| m.is_user() && m.content == request.last_user_message);
        if !last_is_current {
            messages.push(Message::user(request.last_user_message.clone()));
        }

        let system_prompt = format!("{}\n\nThis is clarification round {}.", CLARIFICATION_PROMPT, request.turn_count);
        let text = self.complete(&system_prompt, messages).await?;

        match parse_json::<ClarificationReply>(&text) {
            Ok(reply) => Ok(reply),
            Err(e) if !text.trim().is_empty() => {
                warn!(error = %e, "advance_clarification: reply was not JSON, treating it as a question");
                Ok(ClarificationReply::question(text.trim()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatMessage, StepId};
    use crate::llm::Role;
    use crate::llm::client::mock::MockLlmClient;
    use crate::service::GenerationContext;

    fn service(responses: Vec<&str>) -> (Arc<MockLlmClient>, LlmWorkflowService) {
        let client = Arc::new(MockLlmClient::new(responses));
        let service = LlmWorkflowService::new(client.clone(), 1024);
        (client, service)
    }

    #[test]
    fn test_extract_json() {
        assert_eq!(extract_json(r#"Sure! {"a": 1} hope that helps"#), vec![r#"{"a": 1}"#]);
        assert_eq!(extract_json("```json\n[1, 2]\n```"), vec!["[1, 2]"]);
        assert!(extract_json("no json here").is_empty());
    }

    #[test]
    fn test_parse_json_skips_bracketed_prose() {
        let reply: ClarificationReply =
            parse_json(r#"[note] Here you go: {"message": "Which CRM?", "isComplete": false}"#).unwrap();
        assert_eq!(reply.message, "Which CRM?");
        assert!(!reply.is_complete);
    }

    #[test]
    fn test_parse_json_falls_back_to_array() {
        let steps = parse_json::<GeneratedSteps>(r#"[{"title": "One"}, {"title": "Two"}]"#)
            .unwrap()
            .into_steps();
        assert_eq!(steps.len(), 2);

        let steps = parse_json::<GeneratedSteps>(r#"Result: [{"title": "Only"}]"#).unwrap().into_steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].title, "Only");
    }

    #[test]
    fn test_parse_json_reports_bad_json() {
        let err = parse_json::<ClarificationReply>("{not json}").unwrap_err();
        assert!(err.message.contains("Could not parse"));
        let err = parse_json::<ClarificationReply>("plain words").unwrap_err();
        assert!(err.message.contains("no JSON"));
    }

    #[tokio::test]
    async fn test_clarification_parses_json_reply() {
        let (client, service) = service(vec![r#"{"message": "Which CRM do you use?", "isComplete": false}"#]);
        let request = ClarificationRequest {
            last_user_message: "Automate lead intake".to_string(),
            turn_count: 1,
            transcript: vec![ChatMessage::user("Automate lead intake")],
        };

        let reply = service.advance_clarification(request).await.unwrap();
        assert_eq!(reply, ClarificationReply::question("Which CRM do you use?"));

        let sent = client.requests();
        assert_eq!(sent[0].messages.len(), 1);
        assert_eq!(sent[0].messages[0].role, Role::User);
        assert!(sent[0].system_prompt.contains("round 1"));
    }

    #[tokio::test]
    async fn test_clarification_plain_text_is_a_question() {
        let (_, service) = service(vec!["What triggers the workflow?"]);
        let request = ClarificationRequest {
            last_user_message: "hi".to_string(),
            turn_count: 1,
            transcript: vec![],
        };

        let reply = service.advance_clarification(request).await.unwrap();
        assert!(!reply.is_complete);
        assert_eq!(reply.message, "What triggers the workflow?");
    }

    #[tokio::test]
    async fn test_generation_fills_ids_and_truncates() {
        let (client, service) = service(vec![
            r#"{"steps": [
                {"title": "A", "toolName": "Slack", "confidenceScore": 0.9},
                {"title": "B", "toolName": "Gmail", "confidenceScore": 0.8},
                {"title": "C", "toolName": "Asana", "confidenceScore": 0.7}
            ]}"#,
        ]);
        let request = GenerateRequest::from_prompt(
            "notify the team",
            GenerationContext {
                tool_preferences: vec!["Slack".to_string()],
                max_steps: Some(2),
            },
        );

        let sequence = service.generate_sequence(request).await.unwrap();
        assert_eq!(sequence.len(), 2);
        assert!(sequence.iter().all(|s| !s.id.is_empty()));
        assert_eq!(sequence[1].title, "B");

        let content = &client.requests()[0].messages[0].content;
        assert!(content.contains("Preferred tools: Slack"));
        assert!(content.contains("at most 2 steps"));
    }

    #[tokio::test]
    async fn test_generation_empty_is_failure() {
        let (_, service) = service(vec![r#"{"steps": []}"#]);
        let err = service
            .generate_sequence(GenerateRequest::from_prompt("x", GenerationContext::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("INVALID_RESPONSE"));
    }

    #[tokio::test]
    async fn test_revision_forces_requested_id() {
        let (_, service) = service(vec![r#"{"id": "bogus", "title": "Send SMS", "toolName": "Twilio", "confidenceScore": 0.8}"#]);
        let request = RevisionRequest {
            step_id: StepId::from("2"),
            steps: Sequence::sample(),
            revision_prompt: "text instead of email".to_string(),
        };

        let step = service.request_revision(request).await.unwrap();
        assert_eq!(step.id.as_str(), "2");
        assert_eq!(step.tool_name, "Twilio");
    }

    #[tokio::test]
    async fn test_llm_error_becomes_failure() {
        let (_, service) = service(vec![]);
        let err = service
            .generate_sequence(GenerateRequest::from_prompt("x", GenerationContext::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("INVALID_RESPONSE"));
    }
}
