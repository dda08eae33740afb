//! Interactive workflow editor session

use std::path::PathBuf;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info};

use super::commands::{self, EditorInput, StepRef};
use super::render;
use crate::domain::Sequence;
use crate::editor::{EditorEvent, Snapshot, WorkflowEditor};
use crate::history::CommitOutcome;
use crate::revision::RevisionDecision;

/// How an editor session ended
#[derive(Debug, Clone, PartialEq)]
pub enum EditorExit {
    Approved(Sequence),
    Quit,
}

/// Line-oriented front-end for a [`WorkflowEditor`]
pub struct EditorSession {
    editor: WorkflowEditor,
    events: broadcast::Receiver<EditorEvent>,
    output: Option<PathBuf>,
}

impl EditorSession {
    pub fn new(editor: WorkflowEditor, output: Option<PathBuf>) -> Self {
        let events = editor.subscribe_events();
        Self { editor, events, output }
    }

    /// Run until the user approves or quits
    pub async fn run(&mut self) -> Result<EditorExit> {
        self.print_welcome();
        self.print_list().await?;

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            self.drain_events().await?;
            let readline = rl.readline(&format!("{} ", "edit>".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match commands::parse(input) {
                        Ok(command) => {
                            if let Some(exit) = self.handle(command).await? {
                                return Ok(exit);
                            }
                        }
                        Err(message) => {
                            println!("{} {}", "?".yellow(), message);
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    return Ok(EditorExit::Quit);
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Workflow editor".bright_cyan().bold());
        println!("Type {} for help, {} to finish", "help".yellow(), "approve".yellow());
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:28} List steps", "list".yellow());
        println!("  {:28} Show one step in full", "show <step>".yellow());
        println!("  {:28} Move a step to a new position", "move <from> <to>".yellow());
        println!("  {:28} Delete a step", "delete <step>".yellow());
        println!("  {:28} Edit a field (title, description,", "set <step> <field> <value>".yellow());
        println!("  {:28} tool, reasoning, agent, confidence)", "");
        println!("  {:28} Ask the assistant to rewrite a step", "revise <step> <instruction>".yellow());
        println!("  {:28} Retry a failed or low-confidence step", "retry <step>".yellow());
        println!("  {:28} Undo / redo", "z / y".yellow());
        println!("  {:28} Show the version history", "history".yellow());
        println!("  {:28} Discard everything and start over", "reset".yellow());
        println!("  {:28} Review and save the workflow", "approve [file]".yellow());
        println!("  {:28} Leave without approving", "quit".yellow());
        println!();
        println!("{}", "<step> is a position (1, 2, ...) or an id prefix.".dimmed());
        println!();
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.editor.snapshot().await?)
    }

    async fn print_list(&self) -> Result<()> {
        let snapshot = self.snapshot().await?;
        if snapshot.steps.is_empty() {
            println!("{}", "No steps.".dimmed());
        }
        for (i, step) in snapshot.steps.iter().enumerate() {
            println!("{}", render::step_line(i + 1, step, &snapshot));
        }
        println!("{}", render::history_status(&snapshot));
        Ok(())
    }

    /// Print revision outcomes that arrived since the last prompt
    async fn drain_events(&mut self) -> Result<()> {
        let mut changed = false;
        loop {
            match self.events.try_recv() {
                Ok(EditorEvent::RevisionApplied { step_id }) => {
                    println!("{} step {} revised", "✓".green(), step_id);
                    changed = true;
                }
                Ok(EditorEvent::RevisionUnchanged { step_id }) => {
                    println!("{} revision of {} changed nothing", "·".dimmed(), step_id);
                    changed = true;
                }
                Ok(EditorEvent::RevisionFailed { step_id, message }) => {
                    println!("{} revision of {} failed: {}", "✗".red(), step_id, message);
                    changed = true;
                }
                Ok(EditorEvent::RevisionDiscarded { step_id }) => {
                    debug!(%step_id, "drain_events: stale revision discarded");
                }
                Ok(event) => debug!(?event, "drain_events: event"),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "drain_events: lagged");
                    changed = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if changed {
            self.print_list().await?;
        }
        Ok(())
    }

    fn report(outcome: CommitOutcome, done: &str) {
        match outcome {
            CommitOutcome::Committed => println!("{}", done.dimmed()),
            CommitOutcome::Unchanged => println!("{}", "Nothing changed.".dimmed()),
        }
    }

    async fn resolve(&self, step: &StepRef) -> Result<Option<(usize, Snapshot)>> {
        let snapshot = self.snapshot().await?;
        match step.resolve(&snapshot.steps) {
            Ok(id) => {
                let position = snapshot.steps.position(&id).unwrap_or_default();
                Ok(Some((position, snapshot)))
            }
            Err(message) => {
                println!("{} {}", "?".yellow(), message);
                Ok(None)
            }
        }
    }

    async fn handle(&mut self, command: EditorInput) -> Result<Option<EditorExit>> {
        debug!(?command, "handle: called");
        match command {
            EditorInput::List => self.print_list().await?,

            EditorInput::Show(step) => {
                if let Some((index, snapshot)) = self.resolve(&step).await? {
                    println!("{}", render::step_details(index + 1, &snapshot.steps[index]));
                }
            }

            EditorInput::Move { from, to } => {
                let outcome = self.editor.reorder(from - 1, to - 1).await?;
                Self::report(outcome, "Moved.");
                if outcome.is_committed() {
                    self.print_list().await?;
                }
            }

            EditorInput::Delete(step) => {
                if let Some((index, snapshot)) = self.resolve(&step).await? {
                    let outcome = self.editor.delete_step(snapshot.steps[index].id.clone()).await?;
                    Self::report(outcome, "Deleted.");
                }
            }

            EditorInput::Set { step, patch } => {
                if let Some((index, snapshot)) = self.resolve(&step).await? {
                    let outcome = self.editor.update_step(snapshot.steps[index].id.clone(), patch).await?;
                    Self::report(outcome, "Updated.");
                }
            }

            EditorInput::Revise { step, prompt } => {
                if let Some((index, snapshot)) = self.resolve(&step).await? {
                    let decision = self
                        .editor
                        .request_revision(snapshot.steps[index].id.clone(), prompt)
                        .await?;
                    Self::report_decision(&decision);
                }
            }

            EditorInput::Retry(step) => {
                if let Some((index, snapshot)) = self.resolve(&step).await? {
                    let decision = self.editor.retry_revision(snapshot.steps[index].id.clone()).await?;
                    Self::report_decision(&decision);
                }
            }

            EditorInput::Undo => {
                if !self.editor.undo().await? {
                    println!("{}", "Nothing to undo.".dimmed());
                } else {
                    self.print_list().await?;
                }
            }

            EditorInput::Redo => {
                if !self.editor.redo().await? {
                    println!("{}", "Nothing to redo.".dimmed());
                } else {
                    self.print_list().await?;
                }
            }

            EditorInput::History => {
                let snapshot = self.snapshot().await?;
                println!("{}", render::history_status(&snapshot));
            }

            EditorInput::Reset => {
                let session = self.editor.reset().await?;
                info!(%session, "Editor reset by user");
                println!("{}", "Workflow cleared.".dimmed());
            }

            EditorInput::Approve(path) => {
                let snapshot = self.snapshot().await?;
                if snapshot.steps.is_empty() {
                    println!("{} {}", "?".yellow(), "there is nothing to approve");
                    return Ok(None);
                }
                self.print_review(&snapshot);
                if let Some(path) = path.or_else(|| self.output.clone()) {
                    super::write_workflow(&path, &snapshot.steps)?;
                    println!("Saved to {}", path.display().to_string().bright_white());
                }
                return Ok(Some(EditorExit::Approved(snapshot.steps)));
            }

            EditorInput::Help => self.print_help(),

            EditorInput::Quit => return Ok(Some(EditorExit::Quit)),
        }
        Ok(None)
    }

    fn report_decision(decision: &RevisionDecision) {
        match decision {
            RevisionDecision::Started(ticket) => {
                println!("{}", format!("Revising {}...", ticket.step_id).dimmed());
            }
            RevisionDecision::Ignored(reason) => {
                println!("{} {}", "?".yellow(), reason);
            }
        }
    }

    fn print_review(&self, snapshot: &Snapshot) {
        println!();
        println!("{}", "Workflow review".bright_cyan().bold());
        for (i, step) in snapshot.steps.iter().enumerate() {
            println!(
                "{:>2}. {} {} via {}",
                i + 1,
                render::confidence_badge(step),
                step.title.bold(),
                step.tool_name.cyan()
            );
            if !step.description.is_empty() {
                println!("      {}", step.description.dimmed());
            }
        }
        println!();
    }
}
