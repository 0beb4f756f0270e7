//! Rule-based resolution - keyword rules, literal commands and the danger catalog
//!
//! Works without any network access: the result is a pure function of the
//! utterance and the catalogs the resolver was built with.

use crate::core::types::ResolutionResult;
use crate::rules::catalog::{
    default_rules, Rule, DANGEROUS_PATTERNS, HELP_KEYWORDS, HELP_TEXT, KNOWN_COMMANDS,
};

/// True iff any danger pattern is a substring of the lower-cased command
pub fn is_dangerous(command: &str) -> bool {
    let lower = command.to_lowercase();
    DANGEROUS_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Resolves utterances against an ordered rule table
#[derive(Debug, Clone)]
pub struct RuleResolver {
    rules: Vec<Rule>,
}

impl Default for RuleResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleResolver {
    /// Resolver over the built-in rule table
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Resolver over a custom rule table (order is priority)
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Resolve one utterance
    pub fn resolve(&self, utterance: &str) -> ResolutionResult {
        let trimmed = utterance.trim();
        let normalized = trimmed.to_lowercase();

        if is_help_request(&normalized) {
            return ResolutionResult::unresolved("Supported instructions", HELP_TEXT);
        }

        if normalized.is_empty() {
            return unrecognized(trimmed);
        }

        for rule in &self.rules {
            let Some(keyword) = rule.matched_keyword(&normalized) else {
                continue;
            };
            tracing::debug!(keyword, rule = %rule.description, "rule matched");

            return match &rule.command {
                Some(command) => {
                    let dangerous = is_dangerous(command);
                    ResolutionResult::command(command.clone(), rule.description.clone(), dangerous)
                        .with_explanation(format!("Matched the built-in instruction \"{keyword}\"."))
                }
                None => ResolutionResult::unresolved(
                    rule.description.clone(),
                    format!(
                        "[{}]\nPlease give a more specific instruction or type the full command.",
                        rule.description
                    ),
                ),
            };
        }

        if looks_like_command(&normalized) {
            // Keep the user's casing: paths and arguments are case-sensitive
            let dangerous = is_dangerous(trimmed);
            return ResolutionResult::command(trimmed, "Run the command as typed", dangerous)
                .with_explanation("Recognized as a literal shell command.");
        }

        unrecognized(trimmed)
    }
}

fn is_help_request(normalized: &str) -> bool {
    HELP_KEYWORDS.iter().any(|keyword| {
        if keyword.is_ascii() {
            normalized == *keyword
        } else {
            normalized.contains(keyword)
        }
    })
}

fn looks_like_command(normalized: &str) -> bool {
    let first_word = normalized.split_whitespace().next().unwrap_or("");
    KNOWN_COMMANDS.contains(&first_word) || normalized.starts_with("./") || normalized.starts_with('/')
}

fn unrecognized(utterance: &str) -> ResolutionResult {
    ResolutionResult::unresolved(
        "Unrecognized instruction",
        format!(
            "Could not understand '{utterance}'.\nType 'help' for the supported instructions, or enter a shell command directly."
        ),
    )
}
