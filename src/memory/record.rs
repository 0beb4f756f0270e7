//! Operation records, per-host memory and the conversation window

use crate::core::types::HostId;
use serde::{Deserialize, Serialize};

/// Timestamp layout used for records and the durable file
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in `TIME_FORMAT`
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}

/// One completed execution
///
/// Immutable once appended. `output` is the stored (possibly truncated) copy;
/// `output_length` is the character count of the full output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    #[serde(rename = "time")]
    pub timestamp: String,
    #[serde(rename = "input")]
    pub user_input: String,
    pub command: String,
    pub output: String,
    #[serde(default)]
    pub output_length: usize,
    pub success: bool,
}

impl OperationRecord {
    /// Build a record, truncating `output` to `char_limit` characters
    pub fn new(user_input: &str, command: &str, output: &str, success: bool, char_limit: usize) -> Self {
        Self {
            timestamp: timestamp_now(),
            user_input: user_input.to_string(),
            command: command.to_string(),
            output: truncate_output(output, char_limit),
            output_length: output.chars().count(),
            success,
        }
    }
}

/// Cap `output` at `char_limit` characters, noting the original length when cut
pub fn truncate_output(output: &str, char_limit: usize) -> String {
    let total = output.chars().count();
    if total <= char_limit {
        return output.to_string();
    }
    let mut kept: String = output.chars().take(char_limit).collect();
    kept.push_str(&format!("\n... [truncated, {total} characters in full]"));
    kept
}

/// Durable operation history of one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMemory {
    #[serde(alias = "ip")]
    pub host: HostId,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub history: Vec<OperationRecord>,
}

impl HostMemory {
    pub fn new(host: HostId) -> Self {
        Self {
            host,
            last_updated: String::new(),
            history: Vec::new(),
        }
    }

    /// Append a record, evicting the oldest beyond `max_records`
    pub fn push(&mut self, record: OperationRecord, max_records: usize) {
        self.history.push(record);
        if self.history.len() > max_records {
            let excess = self.history.len() - max_records;
            self.history.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.history.iter().filter(|r| r.success).count()
    }

    pub fn last(&self) -> Option<&OperationRecord> {
        self.history.last()
    }

    /// The most recent `n` records, oldest first
    pub fn recent(&self, n: usize) -> &[OperationRecord] {
        let skip = self.history.len().saturating_sub(n);
        &self.history[skip..]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn of the session conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sliding window of the most recent conversation turns
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    turns: Vec<ConversationTurn>,
    capacity: usize,
}

impl ConversationWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        if self.capacity == 0 {
            return;
        }
        if self.turns.len() >= self.capacity {
            self.turns.remove(0); // Remove oldest
        }
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl Default for ConversationWindow {
    fn default() -> Self {
        Self::new(10)
    }
}
