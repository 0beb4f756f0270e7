//! Assistant configuration with documented defaults
//!
//! Every limit that shapes prompts, memory and remote execution lives here.
//! Values load from an optional TOML file; anything missing falls back to
//! the defaults below.

use crate::core::error::{OpsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub memory: MemoryConfig,
    pub llm: LlmConfig,
    pub remote: RemoteConfig,
    /// Provider to select at startup once configured
    pub default_provider: Option<String>,
    /// Per-provider credentials and model overrides
    pub providers: Vec<ProviderSettings>,
}

/// Limits for the per-host memory and the conversation window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Directory holding one JSON record per host
    pub dir: PathBuf,

    /// Retention ceiling for operation records per host
    ///
    /// Oldest records are evicted first once this is exceeded.
    pub max_records: usize,

    /// Character ceiling for stored command output
    ///
    /// The true length is kept alongside so truncation stays visible.
    pub output_char_limit: usize,

    /// How many recent records are rendered into resolution prompts
    pub context_records: usize,

    /// Output lines quoted per record in the resolution context
    pub excerpt_lines: usize,

    /// Conversation turns kept for the session (user and assistant each count)
    pub conversation_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("memory"),
            max_records: 100,
            output_char_limit: 500,
            context_records: 10,
            excerpt_lines: 3,
            conversation_turns: 10,
        }
    }
}

/// Sampling and prompt-size limits for LLM calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Low temperature keeps command generation close to deterministic
    pub temperature: f32,

    /// Output-token ceiling for command resolution
    pub max_tokens: u32,

    /// Most recent conversation turns replayed into a resolution prompt
    ///
    /// Must not exceed `memory.conversation_turns`.
    pub prompt_turns: usize,

    /// Raw output characters included when asking for an interpretation
    pub summary_input_chars: usize,

    /// Output-token ceiling for output interpretation
    pub summary_max_tokens: u32,

    /// HTTP timeout for one completion request
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 500,
            prompt_turns: 6,
            summary_input_chars: 2000,
            summary_max_tokens: 300,
            request_timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Timeouts for the remote shell
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub command_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl RemoteConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Credential and model override for one provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    /// Inline credential; takes priority over `api_key_env`
    pub api_key: Option<String>,
    /// Environment variable holding the credential
    pub api_key_env: Option<String>,
    pub model: Option<String>,
}

impl ProviderSettings {
    /// Resolve the credential from the inline value or the named variable
    pub fn credential(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl AssistantConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OpsError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Settings entry for a provider, matched case-insensitively
    pub fn provider_settings(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let memory = &self.memory;
        if memory.max_records == 0 || memory.output_char_limit == 0 {
            return Err(OpsError::Config(
                "memory.max_records and memory.output_char_limit must be positive".into(),
            ));
        }

        if memory.context_records > memory.max_records {
            return Err(OpsError::Config(format!(
                "memory.context_records ({}) should be <= memory.max_records ({})",
                memory.context_records, memory.max_records
            )));
        }

        if self.llm.prompt_turns > memory.conversation_turns {
            return Err(OpsError::Config(format!(
                "llm.prompt_turns ({}) should be <= memory.conversation_turns ({})",
                self.llm.prompt_turns, memory.conversation_turns
            )));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(OpsError::Config(format!(
                "llm.temperature ({}) must be within 0.0..=2.0",
                self.llm.temperature
            )));
        }

        if self.llm.max_tokens == 0 || self.remote.command_timeout_secs == 0 {
            return Err(OpsError::Config(
                "llm.max_tokens and remote.command_timeout_secs must be positive".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AssistantConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.max_records, 100);
        assert_eq!(config.memory.output_char_limit, 500);
        assert!((config.llm.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AssistantConfig::from_toml_str(
            r#"
            default_provider = "deepseek"

            [memory]
            dir = "/var/lib/opsmate"
            max_records = 20

            [[providers]]
            name = "DeepSeek"
            api_key = "sk-test"
            model = "deepseek-reasoner"
            "#,
        )
        .unwrap();

        assert_eq!(config.memory.dir, PathBuf::from("/var/lib/opsmate"));
        assert_eq!(config.memory.max_records, 20);
        assert_eq!(config.memory.context_records, 10);
        assert_eq!(config.remote.command_timeout_secs, 30);
        assert_eq!(config.default_provider.as_deref(), Some("deepseek"));

        let settings = config.provider_settings("deepseek").unwrap();
        assert_eq!(settings.credential().as_deref(), Some("sk-test"));
        assert_eq!(settings.model.as_deref(), Some("deepseek-reasoner"));
    }

    #[test]
    fn test_prompt_window_must_fit_conversation() {
        let mut config = AssistantConfig::default();
        config.llm.prompt_turns = 12;
        assert!(matches!(config.validate(), Err(OpsError::Config(_))));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(AssistantConfig::from_toml_str("memory = 3").is_err());
    }

    #[test]
    fn test_blank_inline_key_is_ignored() {
        let settings = ProviderSettings {
            name: "openai".into(),
            api_key: Some("   ".into()),
            api_key_env: None,
            model: None,
        };
        assert!(settings.credential().is_none());
    }
}
