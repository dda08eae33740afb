//! Stepwise - chat your way to an editable automation workflow
//!
//! CLI entry point.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use stepwise::cli::{Cli, Command, get_log_path, parse_log_level};
use stepwise::config::Config;
use stepwise::conversation::{ClarificationConversation, ConvContext};
use stepwise::domain::Sequence;
use stepwise::editor::{EditorSettings, WorkflowEditor};
use stepwise::repl;
use stepwise::service::{GenerationContext, create_service};

fn setup_logging(log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Write to a log file, not stdout/stderr; the terminal belongs to the REPL
    let level = parse_log_level(log_level);
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }

    info!(
        "Stepwise loaded config: backend={}, provider={}, model={}",
        config.backend, config.llm.provider, config.llm.model
    );

    match cli.command {
        Some(Command::Config) => cmd_config(&config),
        Some(Command::Edit { file, output }) => cmd_edit(&config, file, output).await,
        Some(Command::Demo { output }) => cmd_demo(&config, output).await,
        Some(Command::Chat { prompt, output }) => cmd_chat(&config, prompt, output).await,
        None => cmd_chat(&config, None, None).await,
    }
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

fn spawn_editor(config: &Config) -> Result<WorkflowEditor> {
    config.validate()?;
    let service = create_service(config)?;
    Ok(WorkflowEditor::spawn(service, EditorSettings::from_config(config)))
}

/// Chat, generate, then edit
async fn cmd_chat(config: &Config, prompt: Option<String>, output: Option<PathBuf>) -> Result<()> {
    config.validate()?;
    let service = create_service(config)?;
    let editor = WorkflowEditor::spawn(service.clone(), EditorSettings::from_config(config));

    let ctx = ConvContext {
        max_rounds: config.conversation.max_rounds,
        generation: GenerationContext {
            tool_preferences: config.generation.tool_preferences.clone(),
            max_steps: Some(config.generation.max_steps),
        },
    };
    let conversation = ClarificationConversation::new(service, ctx);

    let result = repl::run_chat(conversation, editor.clone(), prompt, output).await;
    let _ = editor.shutdown().await;
    result
}

/// Edit a workflow file
async fn cmd_edit(config: &Config, file: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let sequence = repl::read_workflow(&file)?;
    let editor = spawn_editor(config)?;

    let result = repl::edit_sequence(editor.clone(), sequence, Some(output.unwrap_or(file))).await;
    let _ = editor.shutdown().await;
    result
}

/// Edit the sample workflow
async fn cmd_demo(config: &Config, output: Option<PathBuf>) -> Result<()> {
    let editor = spawn_editor(config)?;

    let result = repl::edit_sequence(editor.clone(), Sequence::sample(), output).await;
    let _ = editor.shutdown().await;
    result
}
