//! Terminal rendering for steps and history

use colored::{ColoredString, Colorize};

use crate::domain::{ChatMessage, ChatRole, ConfidenceLevel, Step};
use crate::editor::Snapshot;

/// Confidence percentage coloured by level
pub fn confidence_badge(step: &Step) -> ColoredString {
    let label = format!("{:>3}%", step.confidence_percent());
    match step.confidence_level() {
        ConfidenceLevel::High => label.green(),
        ConfidenceLevel::Medium => label.yellow(),
        ConfidenceLevel::Low => label.red(),
    }
}

/// One-line summary of a step at 1-based `position`
pub fn step_line(position: usize, step: &Step, snapshot: &Snapshot) -> String {
    let mut line = format!(
        "{:>2}. {} {}  {}",
        position,
        confidence_badge(step),
        step.title.bold(),
        format!("[{}]", step.tool_name).cyan()
    );
    if snapshot.revisions.is_in_flight(&step.id) {
        line.push_str(&format!("  {}", "revising...".dimmed()));
    } else if let Some(error) = snapshot.revisions.last_error(&step.id) {
        line.push_str(&format!("  {} {}", "revision failed:".red(), error));
    }
    if !snapshot.revisions.is_in_flight(&step.id) && snapshot.can_retry(step) {
        line.push_str(&format!("  {}", format!("(retry {})", position).yellow()));
    }
    line
}

/// Full details of a step
pub fn step_details(position: usize, step: &Step) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", format!("Step {}:", position).bright_cyan(), step.title.bold()));
    out.push_str(&format!("  {:12} {}\n", "id".dimmed(), step.id));
    out.push_str(&format!("  {:12} {}\n", "description".dimmed(), step.description));
    out.push_str(&format!("  {:12} {}\n", "tool".dimmed(), step.tool_name));
    out.push_str(&format!("  {:12} {}\n", "agent".dimmed(), step.agent_name));
    out.push_str(&format!("  {:12} {}\n", "confidence".dimmed(), confidence_badge(step)));
    out.push_str(&format!("  {:12} {}", "reasoning".dimmed(), step.ai_reasoning));
    out
}

/// Status line for the history cursor
pub fn history_status(snapshot: &Snapshot) -> String {
    if snapshot.history_len == 0 {
        return "no history".dimmed().to_string();
    }
    let undo = if snapshot.can_undo { "undo: z".normal() } else { "undo: z".dimmed() };
    let redo = if snapshot.can_redo { "redo: y".normal() } else { "redo: y".dimmed() };
    format!(
        "version {}/{}  {}  {}",
        snapshot.current_index + 1,
        snapshot.history_len,
        undo,
        redo
    )
}

/// A chat message with its speaker
pub fn chat_message(message: &ChatMessage) -> String {
    match message.role {
        ChatRole::User => format!("{} {}", "you:".bright_green(), message.content),
        ChatRole::Assistant => format!("{} {}", "assistant:".bright_blue(), message.content),
    }
}
