//! Clarification chat session

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info, warn};

use super::render;
use crate::conversation::ClarificationConversation;
use crate::domain::Sequence;
use crate::editor::{LoadOutcome, WorkflowEditor};
use crate::history::SessionToken;

/// How a chat session ended
#[derive(Debug, Clone, PartialEq)]
pub enum ChatExit {
    /// The generated workflow is in the editor
    Loaded(Sequence),
    /// Generation finished after the editor was reset; nothing loaded
    Stale,
    Quit,
}

/// Line-oriented front-end for a [`ClarificationConversation`]
pub struct ChatSession {
    conversation: ClarificationConversation,
    editor: WorkflowEditor,
    /// Messages already printed
    shown: usize,
}

impl ChatSession {
    pub fn new(conversation: ClarificationConversation, editor: WorkflowEditor) -> Self {
        Self {
            conversation,
            editor,
            shown: 0,
        }
    }

    /// Chat until a workflow is generated or the user quits
    pub async fn run(&mut self, opening: Option<String>) -> Result<ChatExit> {
        let session = self.editor.snapshot().await?.session;
        debug!(%session, "ChatSession::run: called");
        self.print_welcome();

        if let Some(prompt) = opening {
            println!("{} {}", "you>".bright_green(), prompt);
            if let Some(exit) = self.send(&prompt, session).await? {
                return Ok(exit);
            }
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", "you>".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match input {
                            "/quit" | "/exit" | "/q" => return Ok(ChatExit::Quit),
                            "/help" | "/?" => self.print_help(),
                            "/history" => self.print_history(),
                            "/retry" => {
                                if !self.conversation.conversation().can_retry() {
                                    println!("{}", "Nothing to retry.".dimmed());
                                    continue;
                                }
                                println!("{}", "Retrying...".dimmed());
                                let delivered = self.conversation.retry().await;
                                if let Some(exit) = self.after_round(delivered, session).await? {
                                    return Ok(exit);
                                }
                            }
                            other => println!("{} unknown command '{}'", "?".yellow(), other),
                        }
                        continue;
                    }

                    if let Some(exit) = self.send(input, session).await? {
                        return Ok(exit);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    return Ok(ChatExit::Quit);
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }
    }

    async fn send(&mut self, text: &str, session: SessionToken) -> Result<Option<ChatExit>> {
        if !self.conversation.conversation().accepts_input() {
            if let Some(error) = self.conversation.conversation().error() {
                println!("{} {} (type {})", "✗".red(), error, "/retry".yellow());
            } else {
                println!("{}", "Please wait for the current request to finish.".dimmed());
            }
            return Ok(None);
        }
        println!("{}", "thinking...".dimmed());
        let delivered = self.conversation.submit(text).await;
        self.after_round(delivered, session).await
    }

    /// Print new messages and hand a generated workflow to the editor
    async fn after_round(&mut self, delivered: Option<Sequence>, session: SessionToken) -> Result<Option<ChatExit>> {
        let conv = self.conversation.conversation();
        for message in conv.messages().iter().skip(self.shown) {
            if message.is_user() {
                continue;
            }
            println!("{}", render::chat_message(message));
        }
        self.shown = conv.messages().len();

        if let Some(error) = conv.error() {
            println!("{} {} (type {})", "✗".red(), error, "/retry".yellow());
            return Ok(None);
        }

        let Some(sequence) = delivered else {
            return Ok(None);
        };

        match self.editor.load(sequence.clone(), Some(session)).await? {
            LoadOutcome::Loaded(_) => {
                info!(step_count = sequence.len(), "Generated workflow loaded into editor");
                println!("{} generated {} steps", "✓".green(), sequence.len());
                Ok(Some(ChatExit::Loaded(sequence)))
            }
            LoadOutcome::Stale => {
                warn!("Generated workflow arrived for an old session");
                Ok(Some(ChatExit::Stale))
            }
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Stepwise".bright_cyan().bold());
        println!("Describe the workflow you want to automate. Type {} for help.", "/help".yellow());
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Re-send the request that failed", "/retry".yellow());
        println!("  {:14} Show the conversation so far", "/history".yellow());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Leave without generating", "/quit".yellow());
        println!();
        println!("{}", "Say \"that's all\" or \"go ahead\" to generate right away.".dimmed());
        println!();
    }

    fn print_history(&self) {
        let conv = self.conversation.conversation();
        if conv.messages().is_empty() {
            println!("{}", "No messages yet.".dimmed());
            return;
        }
        for message in conv.messages() {
            println!("{}", render::chat_message(message));
        }
        println!("{}", format!("{} rounds, {}", conv.turn_count(), conv.state.name()).dimmed());
    }
}
