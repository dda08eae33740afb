//! Interactive front-ends: the clarification chat and the step editor
//!
//! Both read lines with rustyline and talk to the core through
//! [`ClarificationConversation`] and [`WorkflowEditor`]. Nothing here holds
//! workflow state of its own.

use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

mod chat;
pub mod commands;
mod editor;
mod render;

pub use chat::{ChatExit, ChatSession};
pub use editor::{EditorExit, EditorSession};

use crate::conversation::ClarificationConversation;
use crate::domain::{Sequence, Step};
use crate::editor::{LoadOutcome, WorkflowEditor};

/// On-disk workflow: a bare list of steps or an object with `steps`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorkflowFile {
    Bare(Vec<Step>),
    Wrapped { steps: Vec<Step> },
}

#[derive(Debug, Serialize)]
struct WorkflowOut<'a> {
    steps: &'a [Step],
}

/// Read a workflow JSON file
pub fn read_workflow(path: &Path) -> Result<Sequence> {
    debug!(?path, "read_workflow: called");
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    let file: WorkflowFile =
        serde_json::from_str(&content).context(format!("Failed to parse workflow in {}", path.display()))?;
    let steps = match file {
        WorkflowFile::Bare(steps) | WorkflowFile::Wrapped { steps } => steps,
    };
    Ok(Sequence::new(steps))
}

/// Write a workflow as `{"steps": [...]}`
pub fn write_workflow(path: &Path, sequence: &Sequence) -> Result<()> {
    debug!(?path, step_count = sequence.len(), "write_workflow: called");
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    let json = serde_json::to_string_pretty(&WorkflowOut { steps: sequence.steps() })?;
    fs::write(path, json).context(format!("Failed to write {}", path.display()))?;
    info!(?path, "Workflow written");
    Ok(())
}

/// Chat until a workflow is generated, then edit it
pub async fn run_chat(
    conversation: ClarificationConversation,
    editor: WorkflowEditor,
    opening: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut chat = ChatSession::new(conversation, editor.clone());
    match chat.run(opening).await? {
        ChatExit::Loaded(_) => run_editor(editor, output).await,
        ChatExit::Stale => {
            println!("{}", "The editor was reset while generating; nothing was loaded.".yellow());
            Ok(())
        }
        ChatExit::Quit => Ok(()),
    }
}

/// Load `sequence` and edit it
pub async fn edit_sequence(editor: WorkflowEditor, sequence: Sequence, output: Option<PathBuf>) -> Result<()> {
    if let LoadOutcome::Stale = editor.load(sequence, None).await? {
        return Err(eyre::eyre!("Editor refused the workflow"));
    }
    run_editor(editor, output).await
}

/// Run the editor on whatever is loaded
pub async fn run_editor(editor: WorkflowEditor, output: Option<PathBuf>) -> Result<()> {
    let mut session = EditorSession::new(editor, output);
    match session.run().await? {
        EditorExit::Approved(sequence) => {
            println!("{} workflow approved ({} steps)", "✓".green(), sequence.len());
        }
        EditorExit::Quit => println!("{}", "Left without approving.".dimmed()),
    }
    Ok(())
}
