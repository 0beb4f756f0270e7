//! Session memory store
//!
//! Holds the loaded host's durable history next to the session-scoped
//! conversation window. The two have different lifetimes: the window resets
//! whenever a host is loaded, the history survives restarts. Persistence
//! failures are logged and the in-memory copy stays authoritative.

use crate::core::config::MemoryConfig;
use crate::core::types::HostId;
use crate::memory::persistence::{HostRecordStore, JsonFileStore};
use crate::memory::record::{
    timestamp_now, ConversationTurn, ConversationWindow, HostMemory, OperationRecord,
};

/// Rendered in place of an empty history
pub const NO_HISTORY_NOTE: &str = "No operations have been recorded on this host yet.";

pub struct SessionMemory {
    store: Box<dyn HostRecordStore>,
    limits: MemoryConfig,
    current: Option<HostMemory>,
    conversation: ConversationWindow,
}

impl std::fmt::Debug for SessionMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMemory")
            .field("limits", &self.limits)
            .field("current", &self.current.as_ref().map(|m| &m.host))
            .field("conversation", &self.conversation.len())
            .finish()
    }
}

impl SessionMemory {
    pub fn new(store: Box<dyn HostRecordStore>, limits: MemoryConfig) -> Self {
        let conversation = ConversationWindow::new(limits.conversation_turns);
        Self {
            store,
            limits,
            current: None,
            conversation,
        }
    }

    /// JSON files under `limits.dir`
    pub fn with_json_files(limits: MemoryConfig) -> Self {
        let store = JsonFileStore::new(limits.dir.clone());
        Self::new(Box::new(store), limits)
    }

    pub fn limits(&self) -> &MemoryConfig {
        &self.limits
    }

    /// Load `host` as the working memory and reset the conversation window
    ///
    /// A missing or unreadable record yields an empty history. An unreadable
    /// record is set aside first so later saves do not overwrite it.
    pub fn load(&mut self, host: &HostId) -> &HostMemory {
        let mut memory = match self.store.load(host) {
            Ok(Some(memory)) => memory,
            Ok(None) => {
                tracing::info!(host = %host, "no stored history, starting fresh");
                HostMemory::new(host.clone())
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "stored history unreadable, starting fresh");
                if let Err(e) = self.store.set_aside(host) {
                    tracing::warn!(host = %host, error = %e, "could not set aside unreadable history");
                }
                HostMemory::new(host.clone())
            }
        };

        memory.host = host.clone();
        for record in &mut memory.history {
            if record.output_length == 0 {
                record.output_length = record.output.chars().count();
            }
        }
        if memory.history.len() > self.limits.max_records {
            let excess = memory.history.len() - self.limits.max_records;
            memory.history.drain(..excess);
        }

        tracing::info!(host = %host, records = memory.len(), "host memory loaded");
        self.conversation.clear();
        self.current.insert(memory)
    }

    /// Drop the working memory; the durable copy remains
    pub fn unload(&mut self) {
        if let Some(memory) = self.current.take() {
            tracing::debug!(host = %memory.host, "host memory unloaded");
        }
        self.conversation.clear();
    }

    pub fn current_host(&self) -> Option<&HostId> {
        self.current.as_ref().map(|m| &m.host)
    }

    pub fn host_memory(&self) -> Option<&HostMemory> {
        self.current.as_ref()
    }

    /// Record a completed execution and persist the host's history
    ///
    /// Returns `None` when no host is loaded.
    pub fn append(
        &mut self,
        user_input: &str,
        command: &str,
        output: &str,
        success: bool,
    ) -> Option<&OperationRecord> {
        let Some(memory) = self.current.as_mut() else {
            tracing::warn!(command, "append without a loaded host ignored");
            return None;
        };

        let record = OperationRecord::new(
            user_input,
            command,
            output,
            success,
            self.limits.output_char_limit,
        );

        self.conversation.push(ConversationTurn::user(user_input));
        self.conversation.push(ConversationTurn::assistant(assistant_turn(&record)));

        memory.push(record, self.limits.max_records);
        memory.last_updated = timestamp_now();

        if let Err(e) = self.store.save(memory) {
            tracing::warn!(host = %memory.host, error = %e, "failed to persist host memory");
        }

        memory.last()
    }

    /// Numbered block of recent records for resolution prompts
    pub fn context_for_resolution(&self) -> String {
        let records = match &self.current {
            Some(memory) if !memory.is_empty() => memory.recent(self.limits.context_records),
            _ => return NO_HISTORY_NOTE.to_string(),
        };

        let mut text = String::from("Recent operations on this host, oldest first:");
        for (i, record) in records.iter().enumerate() {
            let status = if record.success { "ok" } else { "failed" };
            text.push_str(&format!(
                "\n{}. [{}] {}\n   request: {}\n   command: {}",
                i + 1,
                status,
                record.timestamp,
                record.user_input,
                record.command
            ));

            let lines: Vec<&str> = record.output.lines().filter(|l| !l.trim().is_empty()).collect();
            if lines.is_empty() {
                continue;
            }
            text.push_str("\n   output:");
            for line in lines.iter().take(self.limits.excerpt_lines) {
                text.push_str("\n     ");
                text.push_str(line);
            }
            if lines.len() > self.limits.excerpt_lines {
                text.push_str(&format!(
                    "\n     ... ({} more lines)",
                    lines.len() - self.limits.excerpt_lines
                ));
            }
        }
        text
    }

    /// Recent conversation turns, oldest first
    pub fn conversation_turns(&self) -> &[ConversationTurn] {
        self.conversation.turns()
    }

    /// One-line status for presentation
    pub fn summary(&self) -> String {
        let Some(memory) = &self.current else {
            return "No host loaded".to_string();
        };
        match memory.last() {
            None => "First connection to this host".to_string(),
            Some(last) => format!(
                "{} operations recorded ({} succeeded), last operation at {}",
                memory.len(),
                memory.success_count(),
                last.timestamp
            ),
        }
    }

    /// Records whose request or command contains `keyword`, case-insensitively
    pub fn search(&self, keyword: &str) -> Vec<&OperationRecord> {
        let keyword = keyword.trim().to_lowercase();
        self.current
            .iter()
            .flat_map(|m| m.history.iter())
            .filter(|r| {
                r.user_input.to_lowercase().contains(&keyword)
                    || r.command.to_lowercase().contains(&keyword)
            })
            .collect()
    }

    /// Non-empty commands among the last `n` records, oldest first
    pub fn recent_commands(&self, n: usize) -> Vec<&str> {
        self.current
            .iter()
            .flat_map(|m| m.recent(n))
            .map(|r| r.command.as_str())
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Remove the durable record of `host`, or of the loaded host when `None`
    ///
    /// Clearing the loaded host also empties its working history and the
    /// conversation window; the host stays loaded.
    pub fn clear(&mut self, host: Option<&HostId>) {
        let Some(target) = host.or_else(|| self.current_host()).cloned() else {
            return;
        };

        if let Err(e) = self.store.remove(&target) {
            tracing::warn!(host = %target, error = %e, "failed to remove stored history");
        }

        if let Some(memory) = self.current.as_mut().filter(|m| m.host == target) {
            memory.history.clear();
            memory.last_updated.clear();
            self.conversation.clear();
        }
        tracing::info!(host = %target, "host memory cleared");
    }
}

fn assistant_turn(record: &OperationRecord) -> String {
    let outcome = if record.success { "succeeded" } else { "failed" };
    if record.output.trim().is_empty() {
        format!("Ran `{}` ({}), no output.", record.command, outcome)
    } else {
        format!("Ran `{}` ({}). Output:\n{}", record.command, outcome, record.output)
    }
}
