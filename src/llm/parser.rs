//! Parse backend responses into resolution results
//!
//! Backends are asked for a bare JSON object but often wrap it in a
//! markdown fence or add a sentence around it. Missing or `null` fields fall
//! back to their empty values instead of failing the parse.

use crate::core::error::{OpsError, Result};
use crate::core::types::ResolutionResult;
use serde::{Deserialize, Deserializer};

/// Structured answer expected from a backend
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct BackendAnswer {
    #[serde(deserialize_with = "null_as_empty")]
    command: String,
    #[serde(deserialize_with = "null_as_empty")]
    description: String,
    #[serde(deserialize_with = "loose_flag")]
    dangerous: bool,
    #[serde(deserialize_with = "null_as_empty")]
    explanation: String,
    #[serde(alias = "friendly_note", deserialize_with = "null_as_empty")]
    advisory_note: String,
    #[serde(deserialize_with = "null_as_empty")]
    follow_up: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Flag as models actually send it: a bool, a number or a quoted word
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseFlag {
    Bool(bool),
    Number(i64),
    Text(String),
}

fn loose_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<LooseFlag>::deserialize(deserializer)? {
        None => false,
        Some(LooseFlag::Bool(flag)) => flag,
        Some(LooseFlag::Number(n)) => n != 0,
        Some(LooseFlag::Text(text)) => {
            matches!(text.trim().to_lowercase().as_str(), "true" | "yes" | "1")
        }
    })
}

impl From<BackendAnswer> for ResolutionResult {
    fn from(answer: BackendAnswer) -> Self {
        Self {
            command: answer.command.trim().to_string(),
            description: answer.description,
            dangerous: answer.dangerous,
            explanation: answer.explanation,
            advisory_note: non_empty(answer.advisory_note),
            follow_up: non_empty(answer.follow_up),
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Drop a wrapping code fence: if the text starts with ``` the first and
/// last lines are removed
pub fn strip_code_fence(response: &str) -> String {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() < 2 {
        return String::new();
    }
    lines[1..lines.len() - 1].join("\n")
}

/// Extract JSON object from LLM response (handles surrounding text)
fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find('{')
        .ok_or_else(|| OpsError::Parse("No JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .ok_or_else(|| OpsError::Parse("No closing brace found in response".into()))?;
    if end < start {
        return Err(OpsError::Parse("Braces out of order in response".into()));
    }
    Ok(&response[start..=end])
}

/// Parse a raw backend response into a resolution result
pub fn parse_resolution(response: &str) -> Result<ResolutionResult> {
    let body = strip_code_fence(response);

    let answer: BackendAnswer = match serde_json::from_str(&body) {
        Ok(answer) => answer,
        Err(first_error) => {
            let json_str = extract_json(&body)?;
            serde_json::from_str(json_str).map_err(|_| {
                OpsError::Parse(format!("Failed to parse backend answer: {}", first_error))
            })?
        }
    };

    Ok(answer.into())
}
