//! Resolution orchestrator and per-utterance turn state machine
//!
//! Turn lifecycle:
//!
//! ```text
//! Idle -> Resolving -> NeedsClarification                       (ends)
//!                   -> NeedsConfirmation -> Declined            (ends)
//!                                        -> Confirmed -> Executing -> Recorded
//!                   -> Ready ---------------------------> Executing -> Recorded
//! ```
//!
//! Only an execution appends to session memory, and it always does, whether
//! the command succeeded or not.

use crate::core::config::{AssistantConfig, RemoteConfig};
use crate::core::error::{OpsError, Result};
use crate::core::types::{HostId, ResolutionResult};
use crate::llm::context::HostContext;
use crate::llm::providers::{no_backend_result, ProviderRegistry};
use crate::memory::store::SessionMemory;
use crate::remote::{ExecOutcome, HostProfile, RemoteShell};
use crate::rules::resolver::{is_dangerous, RuleResolver};
use std::fmt;
use std::str::FromStr;

/// Which resolver handles utterances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    #[default]
    RuleBased,
    AiBacked,
}

impl FromStr for ResolveMode {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rule" | "rules" | "rule_based" | "rule-based" => Ok(Self::RuleBased),
            "ai" | "ai_backed" | "ai-backed" => Ok(Self::AiBacked),
            other => Err(OpsError::Config(format!("Unknown mode: {}", other))),
        }
    }
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RuleBased => f.write_str("rule"),
            Self::AiBacked => f.write_str("ai"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Resolving,
    NeedsClarification,
    NeedsConfirmation,
    /// Resolved and safe; runs without confirmation
    Ready,
    Confirmed,
    Declined,
    Executing,
    Recorded,
}

/// One utterance moving through the state machine
#[derive(Debug, Clone)]
pub struct Turn {
    utterance: String,
    resolution: ResolutionResult,
    state: TurnState,
}

impl Turn {
    fn resolved(utterance: &str, resolution: ResolutionResult) -> Self {
        let state = if !resolution.is_resolved() {
            TurnState::NeedsClarification
        } else if resolution.dangerous {
            TurnState::NeedsConfirmation
        } else {
            TurnState::Ready
        };
        Self {
            utterance: utterance.to_string(),
            resolution,
            state,
        }
    }

    pub fn utterance(&self) -> &str {
        &self.utterance
    }

    pub fn resolution(&self) -> &ResolutionResult {
        &self.resolution
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn needs_confirmation(&self) -> bool {
        self.state == TurnState::NeedsConfirmation
    }

    /// True once nothing further can happen to this turn
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            TurnState::NeedsClarification | TurnState::Declined | TurnState::Recorded
        )
    }

    /// Operator approved a dangerous command
    pub fn confirm(&mut self) -> Result<()> {
        self.transition(TurnState::NeedsConfirmation, TurnState::Confirmed)
    }

    /// Operator refused a dangerous command; ends the turn without touching memory
    pub fn decline(&mut self) -> Result<()> {
        self.transition(TurnState::NeedsConfirmation, TurnState::Declined)
    }

    fn transition(&mut self, from: TurnState, to: TurnState) -> Result<()> {
        if self.state != from {
            return Err(OpsError::InvalidTransition(format!(
                "{:?} -> {:?} (turn is {:?})",
                from, to, self.state
            )));
        }
        self.state = to;
        Ok(())
    }
}

/// Connected host: the shell plus what it told us about itself
struct Session {
    shell: Box<dyn RemoteShell>,
    host: HostId,
    context: HostContext,
}

/// Coordinates resolvers, session memory and the remote shell
pub struct Orchestrator {
    rules: RuleResolver,
    providers: ProviderRegistry,
    memory: SessionMemory,
    remote: RemoteConfig,
    mode: ResolveMode,
    session: Option<Session>,
}

impl Orchestrator {
    pub fn new(
        rules: RuleResolver,
        providers: ProviderRegistry,
        memory: SessionMemory,
        remote: RemoteConfig,
    ) -> Self {
        Self {
            rules,
            providers,
            memory,
            remote,
            mode: ResolveMode::default(),
            session: None,
        }
    }

    /// Build from configuration, configuring providers from settings and env
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        config.validate()?;
        let mut providers = ProviderRegistry::new(config.llm.clone());
        let configured = providers.configure_from(config)?;
        tracing::info!(providers = ?configured, "providers configured at startup");

        Ok(Self::new(
            RuleResolver::new(),
            providers,
            SessionMemory::with_json_files(config.memory.clone()),
            config.remote.clone(),
        ))
    }

    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ResolveMode) {
        tracing::info!(%mode, "resolution mode changed");
        self.mode = mode;
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn providers_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.providers
    }

    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut SessionMemory {
        &mut self.memory
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn connected_host(&self) -> Option<&HostId> {
        self.session.as_ref().map(|s| &s.host)
    }

    /// Context handed to AI-backed resolution
    pub fn host_context(&self) -> HostContext {
        self.session
            .as_ref()
            .map(|s| s.context.clone())
            .unwrap_or_default()
    }

    /// Attach a connected shell, probe the host and load its memory
    ///
    /// Returns the memory summary for display.
    pub async fn connect_host(&mut self, shell: Box<dyn RemoteShell>, host: HostId) -> String {
        if self.session.is_some() {
            self.disconnect();
        }

        let profile = HostProfile::probe(shell.as_ref(), self.remote.command_timeout()).await;
        let context = profile.host_context(&shell.describe());
        self.memory.load(&host);
        tracing::info!(host = %host, os = %context.os_hint, "host connected");

        self.session = Some(Session {
            shell,
            host,
            context,
        });
        self.memory.summary()
    }

    /// Drop the shell and unload working memory; returns the host that was connected
    pub fn disconnect(&mut self) -> Option<HostId> {
        let session = self.session.take()?;
        self.memory.unload();
        tracing::info!(host = %session.host, "host disconnected");
        Some(session.host)
    }

    /// Resolve an utterance with an explicit mode
    ///
    /// AI mode without a selected backend answers "no backend" and never
    /// falls back to the rules.
    pub async fn resolve(&self, utterance: &str, mode: ResolveMode) -> ResolutionResult {
        match mode {
            ResolveMode::RuleBased => self.rules.resolve(utterance),
            ResolveMode::AiBacked => {
                if self.providers.current().is_none() {
                    return no_backend_result();
                }
                let context = self.memory.context_for_resolution();
                let mut result = self
                    .providers
                    .resolve(
                        utterance.trim(),
                        &self.host_context(),
                        &context,
                        self.memory.conversation_turns(),
                    )
                    .await;
                if result.is_resolved() && !result.dangerous && is_dangerous(&result.command) {
                    tracing::debug!(command = %result.command, "static classifier flagged backend command");
                    result.dangerous = true;
                }
                result
            }
        }
    }

    /// Resolve in the current mode and open a turn
    pub async fn begin_turn(&self, utterance: &str) -> Turn {
        tracing::debug!(mode = %self.mode, state = ?TurnState::Resolving, "resolving utterance");
        let resolution = self.resolve(utterance, self.mode).await;
        let turn = Turn::resolved(utterance.trim(), resolution);
        tracing::debug!(state = ?turn.state(), command = %turn.resolution().command, "turn resolved");
        turn
    }

    /// Run a ready or confirmed turn and record the outcome
    ///
    /// The full output goes to memory whether or not the command succeeded.
    pub async fn execute(&mut self, turn: &mut Turn) -> Result<ExecOutcome> {
        if !matches!(turn.state, TurnState::Ready | TurnState::Confirmed) {
            return Err(OpsError::InvalidTransition(format!(
                "cannot execute a turn in state {:?}",
                turn.state
            )));
        }
        let Some(session) = &self.session else {
            return Err(OpsError::Transport("Not connected to a host".into()));
        };

        turn.state = TurnState::Executing;
        let command = turn.resolution.command.clone();
        let outcome = session
            .shell
            .execute(&command, self.remote.command_timeout())
            .await;

        self.memory
            .append(&turn.utterance, &command, &outcome.output, outcome.success);
        turn.state = TurnState::Recorded;
        tracing::info!(command = %command, success = outcome.success, "command recorded");
        Ok(outcome)
    }

    /// Short reading of an outcome from the current backend (AI mode only)
    pub async fn interpret(&self, turn: &Turn, outcome: &ExecOutcome) -> Option<String> {
        if self.mode != ResolveMode::AiBacked || turn.state != TurnState::Recorded {
            return None;
        }
        let text = self
            .providers
            .summarize_output(
                &turn.utterance,
                &turn.resolution.command,
                &outcome.output,
                &self.host_context(),
            )
            .await;
        Some(text).filter(|t| !t.is_empty())
    }
}
