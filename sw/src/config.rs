//! Stepwise configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::revision::{DEFAULT_RETRY_PROMPT, LOW_CONFIDENCE_THRESHOLD};

/// Main Stepwise configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Which workflow service implementation to use
    pub backend: Backend,

    /// Undo/redo history settings
    pub history: HistoryConfig,

    /// Clarification conversation settings
    pub conversation: ConversationConfig,

    /// Sequence generation settings
    pub generation: GenerationConfig,

    /// Per-step revision settings
    pub revision: RevisionConfig,

    /// Simulated backend settings
    pub mock: MockConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Only the LLM backend needs an API key.
    pub fn validate(&self) -> Result<()> {
        if self.backend == Backend::Llm {
            self.llm.get_api_key()?;
        }
        if !(0.0..=1.0).contains(&self.mock.failure_rate) {
            return Err(eyre::eyre!(
                "mock.failure-rate must be between 0 and 1, got {}",
                self.mock.failure_rate
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .stepwise.yml
        let local_config = PathBuf::from(".stepwise.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/stepwise/stepwise.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("stepwise").join("stepwise.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Workflow service implementation selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Real LLM-backed service
    Llm,
    /// Canned responses with simulated latency and failures
    #[default]
    Mock,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Llm => write!(f, "llm"),
            Backend::Mock => write!(f, "mock"),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            )),
        }
    }
}

/// Undo/redo history settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of retained snapshots
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Clarification conversation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Rounds after which the conversation completes on its own
    #[serde(rename = "max-rounds")]
    pub max_rounds: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self { max_rounds: 20 }
    }
}

/// Sequence generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Upper bound on generated steps
    #[serde(rename = "max-steps")]
    pub max_steps: usize,

    /// Tools the generator should favour
    #[serde(rename = "tool-preferences")]
    pub tool_preferences: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            tool_preferences: Vec::new(),
        }
    }
}

/// Per-step revision settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevisionConfig {
    /// Steps below this confidence may be retried
    #[serde(rename = "low-confidence-threshold")]
    pub low_confidence_threshold: f64,

    /// Prompt used for a retry when the step was never revised
    #[serde(rename = "default-retry-prompt")]
    pub default_retry_prompt: String,
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: LOW_CONFIDENCE_THRESHOLD,
            default_retry_prompt: DEFAULT_RETRY_PROMPT.to_string(),
        }
    }
}

/// Simulated backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Artificial delay per call in milliseconds
    #[serde(rename = "latency-ms")]
    pub latency_ms: u64,

    /// Probability in [0, 1] that a call fails
    #[serde(rename = "failure-rate")]
    pub failure_rate: f64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            latency_ms: 2000,
            failure_rate: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.backend, Backend::Mock);
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.history.limit, 100);
        assert_eq!(config.conversation.max_rounds, 20);
        assert_eq!(config.generation.max_steps, 10);
        assert_eq!(config.revision.low_confidence_threshold, 0.5);
        assert_eq!(config.mock.latency_ms, 2000);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
backend: llm

llm:
  provider: openai
  model: gpt-4o
  api-key-env: MY_API_KEY
  base-url: https://api.example.com
  max-tokens: 8192
  timeout-ms: 60000

history:
  limit: 25

conversation:
  max-rounds: 4

generation:
  max-steps: 6
  tool-preferences: [web_scraper, email_sender]

revision:
  low-confidence-threshold: 0.6
  default-retry-prompt: "Try again"

mock:
  latency-ms: 0
  failure-rate: 0.0
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.backend, Backend::Llm);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.llm.max_tokens, 8192);
        assert_eq!(config.history.limit, 25);
        assert_eq!(config.conversation.max_rounds, 4);
        assert_eq!(config.generation.max_steps, 6);
        assert_eq!(config.generation.tool_preferences, vec!["web_scraper", "email_sender"]);
        assert_eq!(config.revision.low_confidence_threshold, 0.6);
        assert_eq!(config.revision.default_retry_prompt, "Try again");
        assert_eq!(config.mock.latency_ms, 0);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: claude-haiku
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "claude-haiku");
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.backend, Backend::Mock);
        assert_eq!(config.history.limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mock:\n  latency-ms: 5\n  failure-rate: 0.5").unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.mock.latency_ms, 5);
        assert_eq!(config.mock.failure_rate, 0.5);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_failure_rate() {
        let mut config = Config::default();
        config.mock.failure_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_get_api_key_missing_env() {
        let config = LlmConfig {
            api_key_env: "STEPWISE_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..Default::default()
        };
        let err = config.get_api_key().unwrap_err();
        assert!(err.to_string().contains("STEPWISE_TEST_KEY_THAT_IS_NOT_SET"));
    }
}
