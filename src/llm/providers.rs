//! Provider registry and dispatcher
//!
//! Every supported backend is a named entry with a fixed endpoint and
//! default model; backends differ only in data, not in code. The registry
//! owns all entries and keeps a single "current" selection. Failures never
//! escape as errors: configuration reports `false`, resolution downgrades to
//! an empty-command result, interpretation returns an empty string.

use crate::core::config::{AssistantConfig, LlmConfig};
use crate::core::error::OpsError;
use crate::core::types::ResolutionResult;
use crate::llm::client::{ChatBackend, ChatRequest, LlmClient};
use crate::llm::context::{resolution_messages, resolution_system_prompt, summary_messages, HostContext};
use crate::llm::parser::parse_resolution;
use crate::memory::record::ConversationTurn;
use std::fmt;
use std::sync::Arc;

/// Fixed data describing one backend kind
#[derive(Debug, Clone, Copy)]
pub struct ProviderKind {
    pub name: &'static str,
    pub endpoint: &'static str,
    pub default_model: &'static str,
    /// Environment variable consulted by `configure_from`
    pub env_var: Option<&'static str>,
    /// Local backends accept any credential
    pub requires_credential: bool,
}

/// Supported backends, in display order
pub const PROVIDER_CATALOG: &[ProviderKind] = &[
    ProviderKind {
        name: "DeepSeek",
        endpoint: "https://api.deepseek.com/chat/completions",
        default_model: "deepseek-chat",
        env_var: Some("DEEPSEEK_API_KEY"),
        requires_credential: true,
    },
    ProviderKind {
        name: "OpenAI",
        endpoint: "https://api.openai.com/v1/chat/completions",
        default_model: "gpt-4o-mini",
        env_var: Some("OPENAI_API_KEY"),
        requires_credential: true,
    },
    ProviderKind {
        name: "Qwen",
        endpoint: "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions",
        default_model: "qwen-turbo",
        env_var: Some("DASHSCOPE_API_KEY"),
        requires_credential: true,
    },
    ProviderKind {
        name: "Ollama",
        endpoint: "http://localhost:11434/v1/chat/completions",
        default_model: "qwen2.5:7b",
        env_var: None,
        requires_credential: false,
    },
    ProviderKind {
        name: "Anthropic",
        endpoint: "https://api.anthropic.com/v1/messages",
        default_model: "claude-3-haiku-20240307",
        env_var: Some("ANTHROPIC_API_KEY"),
        requires_credential: true,
    },
];

const LOCAL_PLACEHOLDER_KEY: &str = "ollama";

/// Runtime configuration of one backend
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: String,
    pub endpoint: String,
    pub model: String,
    pub credential: String,
    pub configured: bool,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("credential", &"<redacted>")
            .field("configured", &self.configured)
            .finish()
    }
}

/// One backend entry: its configuration plus the client built from it
pub struct Provider {
    config: ProviderConfig,
    kind: ProviderKind,
    backend: Option<Arc<dyn ChatBackend>>,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("config", &self.config)
            .field("has_backend", &self.backend.is_some())
            .finish()
    }
}

impl Provider {
    fn from_kind(kind: ProviderKind) -> Self {
        Self {
            config: ProviderConfig {
                name: kind.name.to_string(),
                endpoint: kind.endpoint.to_string(),
                model: kind.default_model.to_string(),
                credential: String::new(),
                configured: false,
            },
            kind,
            backend: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.configured && self.backend.is_some()
    }

    /// Build a client for this backend; on failure the previous state is kept
    pub fn configure(&mut self, credential: &str, model: Option<&str>, settings: &LlmConfig) -> bool {
        let credential = if self.kind.requires_credential {
            credential.trim().to_string()
        } else {
            LOCAL_PLACEHOLDER_KEY.to_string()
        };
        if credential.is_empty() {
            tracing::warn!(provider = %self.config.name, "configuration rejected: empty credential");
            return false;
        }

        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.config.model)
            .to_string();

        match LlmClient::new(
            credential.clone(),
            self.config.endpoint.clone(),
            model.clone(),
            settings.request_timeout(),
        ) {
            Ok(client) => {
                self.backend = Some(Arc::new(client));
                self.config.credential = credential;
                self.config.model = model;
                self.config.configured = true;
                tracing::info!(provider = %self.config.name, model = %self.config.model, "provider configured");
                true
            }
            Err(e) => {
                tracing::warn!(provider = %self.config.name, error = %e, "provider configuration failed");
                false
            }
        }
    }

    /// Install an already-built backend (alternate transports, tests)
    pub fn attach_backend(&mut self, backend: Arc<dyn ChatBackend>) {
        self.backend = Some(backend);
        self.config.configured = true;
    }

    /// Resolve an utterance through this backend
    pub async fn resolve(
        &self,
        utterance: &str,
        host: &HostContext,
        memory_context: &str,
        turns: &[ConversationTurn],
        settings: &LlmConfig,
    ) -> ResolutionResult {
        let Some(backend) = self.backend.as_ref().filter(|_| self.config.configured) else {
            return ResolutionResult::unresolved(
                "AI backend not configured",
                format!("Set an API key for {} before using AI mode.", self.config.name),
            );
        };

        let system = resolution_system_prompt(host, memory_context);
        let request = ChatRequest {
            messages: resolution_messages(system, turns, settings.prompt_turns, utterance),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        };
        tracing::debug!(provider = %self.config.name, messages = request.messages.len(), "resolving with backend");

        let response = match backend.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(provider = %self.config.name, error = %e, "backend call failed");
                return ResolutionResult::unresolved(
                    "AI backend call failed",
                    format!("The {} backend could not be reached or refused the request: {}", self.config.name, e),
                );
            }
        };

        match parse_resolution(&response) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(provider = %self.config.name, error = %e, "unparseable backend response");
                ResolutionResult::unresolved(
                    "AI response could not be parsed",
                    format!(
                        "The {} backend answered, but not with the expected JSON object. Try rephrasing the request.",
                        self.config.name
                    ),
                )
            }
        }
    }

    /// Short interpretation of command output; empty on any failure
    pub async fn summarize_output(
        &self,
        utterance: &str,
        command: &str,
        output: &str,
        host: &HostContext,
        settings: &LlmConfig,
    ) -> String {
        let Some(backend) = self.backend.as_ref().filter(|_| self.config.configured) else {
            return String::new();
        };

        let request = ChatRequest {
            messages: summary_messages(utterance, command, output, host, settings.summary_input_chars),
            temperature: settings.temperature,
            max_tokens: settings.summary_max_tokens,
        };

        match backend.complete(&request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(provider = %self.config.name, error = %e, "output interpretation failed");
                String::new()
            }
        }
    }
}

/// Owns every provider entry and the single current selection
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
    current: Option<usize>,
    settings: LlmConfig,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(LlmConfig::default())
    }
}

impl ProviderRegistry {
    pub fn new(settings: LlmConfig) -> Self {
        Self {
            providers: PROVIDER_CATALOG.iter().copied().map(Provider::from_kind).collect(),
            current: None,
            settings,
        }
    }

    pub fn settings(&self) -> &LlmConfig {
        &self.settings
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(Provider::name).collect()
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.providers
            .iter()
            .position(|p| p.name().eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.index_of(name).map(|i| &self.providers[i])
    }

    /// Configure a backend's credential and optional model override
    pub fn configure(&mut self, name: &str, credential: &str, model: Option<&str>) -> bool {
        let Some(index) = self.index_of(name) else {
            tracing::warn!(provider = name, "unknown provider");
            return false;
        };
        let settings = self.settings.clone();
        self.providers[index].configure(credential, model, &settings)
    }

    /// Install a prebuilt backend under an existing provider name
    pub fn attach_backend(&mut self, name: &str, backend: Arc<dyn ChatBackend>) -> bool {
        match self.index_of(name) {
            Some(index) => {
                self.providers[index].attach_backend(backend);
                true
            }
            None => false,
        }
    }

    /// Make a configured backend current
    pub fn select(&mut self, name: &str) -> bool {
        match self.index_of(name) {
            Some(index) if self.providers[index].is_configured() => {
                self.current = Some(index);
                tracing::info!(provider = %self.providers[index].name(), "provider selected");
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&Provider> {
        self.current.map(|i| &self.providers[i])
    }

    /// Configure providers from settings and environment, then select the default
    ///
    /// Returns the names that were configured. An unknown provider name in the
    /// settings is a configuration error.
    pub fn configure_from(&mut self, config: &AssistantConfig) -> Result<Vec<String>, OpsError> {
        for settings in &config.providers {
            if self.index_of(&settings.name).is_none() {
                return Err(OpsError::UnknownProvider(settings.name.clone()));
            }
        }

        let mut configured = Vec::new();
        for kind in PROVIDER_CATALOG {
            let settings = config.provider_settings(kind.name);
            let credential = credential_for(config, kind.name);
            let model = settings.and_then(|s| s.model.as_deref());

            let ok = match credential {
                Some(credential) => self.configure(kind.name, &credential, model),
                // local backends only come up when explicitly listed
                None if !kind.requires_credential && settings.is_some() => self.configure(kind.name, "", model),
                None => false,
            };
            if ok {
                configured.push(kind.name.to_string());
            }
        }

        if let Some(default) = &config.default_provider {
            if !self.select(default) {
                tracing::warn!(provider = %default, "default provider is not configured");
            }
        }

        Ok(configured)
    }

    /// Resolve through the current backend
    pub async fn resolve(
        &self,
        utterance: &str,
        host: &HostContext,
        memory_context: &str,
        turns: &[ConversationTurn],
    ) -> ResolutionResult {
        match self.current() {
            Some(provider) => {
                provider
                    .resolve(utterance, host, memory_context, turns, &self.settings)
                    .await
            }
            None => no_backend_result(),
        }
    }

    /// Interpret command output through the current backend
    pub async fn summarize_output(
        &self,
        utterance: &str,
        command: &str,
        output: &str,
        host: &HostContext,
    ) -> String {
        match self.current() {
            Some(provider) => {
                provider
                    .summarize_output(utterance, command, output, host, &self.settings)
                    .await
            }
            None => String::new(),
        }
    }
}

/// Credential for `name` from its settings entry, else its environment variable
pub fn credential_for(config: &AssistantConfig, name: &str) -> Option<String> {
    config
        .provider_settings(name)
        .and_then(|s| s.credential())
        .or_else(|| {
            PROVIDER_CATALOG
                .iter()
                .find(|kind| kind.name.eq_ignore_ascii_case(name.trim()))
                .and_then(|kind| kind.env_var)
                .and_then(|var| std::env::var(var).ok())
        })
        .filter(|key| !key.trim().is_empty())
}

/// Result returned when AI mode is used without a selected backend
pub fn no_backend_result() -> ResolutionResult {
    ResolutionResult::unresolved(
        "No AI backend selected",
        "No AI backend is selected. Configure one with ':provider <name> <api-key>' or switch to rule mode.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Canned {
        response: std::result::Result<String, String>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl Canned {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(text.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(message.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for Canned {
        async fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            self.response.clone().map_err(OpsError::Llm)
        }
    }

    #[test]
    fn test_all_backends_registered() {
        let registry = ProviderRegistry::default();
        assert_eq!(
            registry.provider_names(),
            vec!["DeepSeek", "OpenAI", "Qwen", "Ollama", "Anthropic"]
        );
        assert!(registry.current().is_none());
    }

    #[test]
    fn test_blank_credential_rejected() {
        let mut registry = ProviderRegistry::default();
        assert!(!registry.configure("deepseek", "   ", None));
        assert!(!registry.get("DeepSeek").unwrap().is_configured());
    }

    #[test]
    fn test_configure_then_select() {
        let mut registry = ProviderRegistry::default();
        assert!(!registry.select("OpenAI"));
        assert!(registry.configure("openai", "sk-test", Some("gpt-4o")));
        assert!(registry.select("OPENAI"));

        let current = registry.current().unwrap();
        assert_eq!(current.config().model, "gpt-4o");
        assert_eq!(current.config().endpoint, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_ollama_needs_no_credential() {
        let mut registry = ProviderRegistry::default();
        assert!(registry.configure("ollama", "", None));
        assert_eq!(registry.get("ollama").unwrap().config().credential, "ollama");
        assert_eq!(registry.get("ollama").unwrap().config().model, "qwen2.5:7b");
    }

    #[test]
    fn test_unknown_provider() {
        let mut registry = ProviderRegistry::default();
        assert!(!registry.configure("skynet", "key", None));
        assert!(!registry.select("skynet"));
    }

    #[test]
    fn test_debug_redacts_credential() {
        let mut registry = ProviderRegistry::default();
        registry.configure("deepseek", "sk-very-secret", None);
        let debug = format!("{:?}", registry);
        assert!(!debug.contains("sk-very-secret"));
    }

    #[tokio::test]
    async fn test_resolve_without_selection() {
        let registry = ProviderRegistry::default();
        let result = registry
            .resolve("free memory", &HostContext::default(), "", &[])
            .await;
        assert!(result.command.is_empty());
        assert_eq!(result.description, "No AI backend selected");
    }

    #[tokio::test]
    async fn test_resolve_sends_low_temperature_request() {
        let backend = Canned::ok(r#"{"command": "free -h", "description": "Memory"}"#);
        let mut registry = ProviderRegistry::default();
        registry.attach_backend("deepseek", backend.clone());
        assert!(registry.select("deepseek"));

        let result = registry
            .resolve("how much ram is free", &HostContext::default(), "", &[])
            .await;
        assert_eq!(result.command, "free -h");

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!((seen[0].temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(seen[0].max_tokens, 500);
        assert_eq!(seen[0].messages.last().unwrap().content, "how much ram is free");
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_result() {
        let mut registry = ProviderRegistry::default();
        registry.attach_backend("qwen", Canned::failing("connection refused"));
        registry.select("qwen");

        let result = registry.resolve("disk", &HostContext::default(), "", &[]).await;
        assert!(result.command.is_empty());
        assert_eq!(result.description, "AI backend call failed");
        assert!(result.explanation.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_unparseable_response_becomes_result() {
        let mut registry = ProviderRegistry::default();
        registry.attach_backend("qwen", Canned::ok("I would run df -h"));
        registry.select("qwen");

        let result = registry.resolve("disk", &HostContext::default(), "", &[]).await;
        assert!(result.command.is_empty());
        assert_eq!(result.description, "AI response could not be parsed");
    }

    #[tokio::test]
    async fn test_summarize_is_single_turn_and_fails_quietly() {
        let backend = Canned::ok("  Disk usage is normal.  ");
        let mut registry = ProviderRegistry::default();
        registry.attach_backend("openai", backend.clone());
        registry.select("openai");

        let text = registry
            .summarize_output("disk", "df -h", "/dev/sda1 40%", &HostContext::default())
            .await;
        assert_eq!(text, "Disk usage is normal.");
        assert_eq!(backend.seen.lock().unwrap()[0].messages.len(), 2);

        let mut failing = ProviderRegistry::default();
        failing.attach_backend("openai", Canned::failing("timeout"));
        failing.select("openai");
        let text = failing
            .summarize_output("disk", "df -h", "out", &HostContext::default())
            .await;
        assert!(text.is_empty());
    }
}
