//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use crate::config::Backend;

/// Stepwise - chat your way to an editable automation workflow
#[derive(Debug, Parser)]
#[command(
    name = "sw",
    about = "Clarify a workflow in chat, generate it, then edit it with undo/redo",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Override the configured workflow service
    #[arg(short, long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// Subcommand to execute (defaults to chat)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Describe a workflow in chat, then edit the generated result
    Chat {
        /// Opening message
        prompt: Option<String>,

        /// Write the approved workflow as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Edit a workflow stored as JSON
    Edit {
        /// Workflow file (a list of steps or {"steps": [...]})
        file: PathBuf,

        /// Write the approved workflow as JSON (defaults to FILE)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Edit the built-in sample workflow
    Demo {
        /// Write the approved workflow as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Backend choice on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Llm,
    Mock,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Llm => Backend::Llm,
            BackendArg::Mock => Backend::Mock,
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stepwise")
        .join("logs")
        .join("stepwise.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Parse a log level name; unknown names fall back to INFO
pub fn parse_log_level(level: Option<&str>) -> tracing::Level {
    match level.map(|s| s.to_uppercase()).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_edit_with_globals() {
        let cli = Cli::try_parse_from(["sw", "--backend", "mock", "-l", "debug", "edit", "flow.json", "-o", "out.json"])
            .unwrap();
        assert_eq!(cli.backend, Some(BackendArg::Mock));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Some(Command::Edit { file, output }) => {
                assert_eq!(file, PathBuf::from("flow.json"));
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["sw"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level(Some("debug")), tracing::Level::DEBUG);
        assert_eq!(parse_log_level(Some("Warning")), tracing::Level::WARN);
        assert_eq!(parse_log_level(Some("bogus")), tracing::Level::INFO);
        assert_eq!(parse_log_level(None), tracing::Level::INFO);
    }
}
