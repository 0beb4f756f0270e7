//! Build prompts from host context and session memory
//!
//! The system instruction carries the OS hint, a host summary and the
//! rendered operation history. Recent conversation turns follow in
//! chronological order, and the new utterance is always the last user turn.

use crate::llm::client::ChatMessage;
use crate::memory::record::{ConversationTurn, TurnRole};

/// What the backend is told about the host it is generating commands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    /// Operating system hint, e.g. "Ubuntu 22.04.4 LTS"
    pub os_hint: String,
    /// One-line description of the host, e.g. "deploy@10.0.0.5:22"
    pub host_summary: String,
}

impl Default for HostContext {
    fn default() -> Self {
        Self {
            os_hint: "Linux".into(),
            host_summary: "unknown host".into(),
        }
    }
}

/// Sentence used when no operation history is available
pub const FIRST_CONTACT_NOTE: &str = "This is the first operation on this host.";

/// System instruction for command resolution
pub fn resolution_system_prompt(host: &HostContext, memory_context: &str) -> String {
    let history = if memory_context.trim().is_empty() {
        FIRST_CONTACT_NOTE
    } else {
        memory_context
    };

    format!(
        r#"You are an experienced and friendly Linux operations engineer who knows this server and how its operator works.

CURRENT HOST:
{summary}

OPERATING SYSTEM:
{os}

OPERATION HISTORY:
{history}

YOUR JOB:
1. Turn the operator's request into one precise shell command for this host.
2. Pick the package manager and tooling that match the operating system:
   - Ubuntu/Debian: apt
   - CentOS/RHEL/Fedora: yum or dnf
   - Alpine: apk
3. Use the history and the conversation to resolve references such as "it", "that service" or "do that again".
4. Mark anything that deletes data, changes power state or writes to raw devices as dangerous.

OUTPUT FORMAT (JSON only, no explanation):
{{
  "command": "the command to run",
  "description": "short description",
  "dangerous": false,
  "explanation": "what the command does",
  "advisory_note": "optional friendly advice",
  "follow_up": "optional suggested next step"
}}

If the request is ambiguous, return an empty "command" and use "explanation" to say exactly what information is missing."#,
        summary = host.host_summary,
        os = host.os_hint,
        history = history,
    )
}

/// Assemble the message list for a resolution call
///
/// At most `max_turns` of the most recent turns are replayed, oldest first.
/// The replay always opens on a user turn; a leading assistant turn is dropped.
pub fn resolution_messages(
    system_prompt: String,
    turns: &[ConversationTurn],
    max_turns: usize,
    utterance: &str,
) -> Vec<ChatMessage> {
    let mut skip = turns.len().saturating_sub(max_turns);
    while turns.get(skip).is_some_and(|t| t.role == TurnRole::Assistant) {
        skip += 1;
    }
    let mut messages = Vec::with_capacity(turns.len() - skip + 2);
    messages.push(ChatMessage::system(system_prompt));

    for turn in &turns[skip..] {
        messages.push(match turn.role {
            TurnRole::User => ChatMessage::user(turn.content.clone()),
            TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
        });
    }

    messages.push(ChatMessage::user(utterance));
    messages
}

/// Single-turn request asking for a short reading of a command's output
pub fn summary_messages(
    utterance: &str,
    command: &str,
    output: &str,
    host: &HostContext,
    max_output_chars: usize,
) -> Vec<ChatMessage> {
    let total = output.chars().count();
    let mut excerpt: String = output.chars().take(max_output_chars).collect();
    if total > max_output_chars {
        excerpt.push_str(&format!("\n... [output cut at {max_output_chars} of {total} characters]"));
    }

    let system = format!(
        "You explain command output to a server operator in two or three plain sentences. \
         Point out anything abnormal. Host: {}. OS: {}.",
        host.host_summary, host.os_hint
    );
    let user = format!(
        "REQUEST:\n{utterance}\n\nCOMMAND:\n{command}\n\nOUTPUT:\n{excerpt}\n\nWhat does this output tell me?"
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::Role;

    fn turn(role: TurnRole, content: &str) -> ConversationTurn {
        ConversationTurn {
            role,
            content: content.into(),
        }
    }

    #[test]
    fn test_empty_history_uses_first_contact_note() {
        let prompt = resolution_system_prompt(&HostContext::default(), "");
        assert!(prompt.contains(FIRST_CONTACT_NOTE));
        assert!(prompt.contains("OPERATING SYSTEM:\nLinux"));
    }

    #[test]
    fn test_history_embedded_verbatim() {
        let host = HostContext {
            os_hint: "Alpine Linux v3.19".into(),
            host_summary: "root@10.0.0.7:22".into(),
        };
        let prompt = resolution_system_prompt(&host, "1. [ok] df -h");
        assert!(prompt.contains("1. [ok] df -h"));
        assert!(prompt.contains("Alpine Linux v3.19"));
        assert!(prompt.contains("root@10.0.0.7:22"));
        assert!(!prompt.contains(FIRST_CONTACT_NOTE));
    }

    #[test]
    fn test_only_recent_turns_are_replayed() {
        let turns: Vec<_> = (0..8)
            .map(|i| {
                let role = if i % 2 == 0 { TurnRole::User } else { TurnRole::Assistant };
                turn(role, &format!("turn {i}"))
            })
            .collect();

        let messages = resolution_messages("sys".into(), &turns, 4, "kill it");

        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "turn 4");
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[4].content, "turn 7");
        assert_eq!(messages[4].role, Role::Assistant);
        assert_eq!(messages[5], ChatMessage::user("kill it"));
    }

    #[test]
    fn test_odd_window_opens_on_user_turn() {
        let turns: Vec<_> = (0..6)
            .map(|i| {
                let role = if i % 2 == 0 { TurnRole::User } else { TurnRole::Assistant };
                turn(role, &format!("turn {i}"))
            })
            .collect();

        let messages = resolution_messages("sys".into(), &turns, 3, "and now?");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "turn 4");
        assert_eq!(messages[2].content, "turn 5");
        assert_eq!(messages[3], ChatMessage::user("and now?"));
    }

    #[test]
    fn test_fewer_turns_than_window() {
        let turns = vec![turn(TurnRole::User, "check nginx")];
        let messages = resolution_messages("sys".into(), &turns, 6, "restart it");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "check nginx");
    }

    #[test]
    fn test_summary_truncates_output() {
        let output = "x".repeat(50);
        let messages = summary_messages("disk", "df -h", &output, &HostContext::default(), 10);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains(&"x".repeat(10)));
        assert!(!messages[1].content.contains(&"x".repeat(11)));
        assert!(messages[1].content.contains("output cut at 10 of 50 characters"));
    }
}
