//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized host address used to namespace all per-host state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    /// Trims and lower-cases the address so "10.0.0.1 " and "10.0.0.1" share memory
    pub fn new(address: &str) -> Self {
        Self(address.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe stem for the durable record ("10.0.0.1" -> "10_0_0_1")
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of resolving one utterance, shared by the rule-based and AI-backed paths
///
/// An empty `command` means "cannot resolve / needs clarification"; the
/// `description` and `explanation` then say why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub command: String,
    pub description: String,
    pub dangerous: bool,
    pub explanation: String,
    /// Friendly advice from an AI backend
    pub advisory_note: Option<String>,
    /// Suggested next step from an AI backend
    pub follow_up: Option<String>,
}

impl ResolutionResult {
    /// A resolved command with its danger flag
    pub fn command(command: impl Into<String>, description: impl Into<String>, dangerous: bool) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
            dangerous,
            ..Self::default()
        }
    }

    /// An unresolved result carrying a human-readable reason
    pub fn unresolved(description: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            explanation: explanation.into(),
            ..Self::default()
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn is_resolved(&self) -> bool {
        !self.command.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_id_normalizes() {
        assert_eq!(HostId::new("  Web-01.Example.COM "), HostId::new("web-01.example.com"));
    }

    #[test]
    fn test_file_stem_replaces_separators() {
        assert_eq!(HostId::new("192.168.1.10").file_stem(), "192_168_1_10");
        assert_eq!(HostId::new("fe80::1").file_stem(), "fe80__1");
        assert_eq!(HostId::new("../etc/passwd").file_stem(), "___etc_passwd");
    }

    #[test]
    fn test_unresolved_has_empty_command() {
        let result = ResolutionResult::unresolved("need a PID", "Tell me which process.");
        assert!(!result.is_resolved());
        assert!(!result.dangerous);
        assert_eq!(result.explanation, "Tell me which process.");
    }
}
