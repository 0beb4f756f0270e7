//! Tagged output lines for the presentation surface
//!
//! The pipeline says what to show and with which tag; colours and layout
//! belong to the front end.

use crate::core::types::ResolutionResult;
use crate::remote::ExecOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTag {
    Info,
    Command,
    Danger,
    Explanation,
    Advisory,
    Output,
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub tag: OutputTag,
    pub text: String,
}

impl OutputLine {
    pub fn new(tag: OutputTag, text: impl Into<String>) -> Self {
        Self {
            tag,
            text: text.into(),
        }
    }
}

/// Lines describing a resolution, before any execution
pub fn resolution_lines(result: &ResolutionResult) -> Vec<OutputLine> {
    let mut lines = Vec::new();

    if result.is_resolved() {
        if !result.description.is_empty() {
            lines.push(OutputLine::new(OutputTag::Info, &result.description));
        }
        lines.push(OutputLine::new(OutputTag::Command, &result.command));
        if result.dangerous {
            lines.push(OutputLine::new(
                OutputTag::Danger,
                "This command is dangerous and will only run after confirmation.",
            ));
        }
    } else {
        let description = if result.description.is_empty() {
            "Could not resolve the instruction"
        } else {
            result.description.as_str()
        };
        lines.push(OutputLine::new(OutputTag::Info, description));
    }

    if !result.explanation.trim().is_empty() {
        lines.push(OutputLine::new(OutputTag::Explanation, &result.explanation));
    }
    if let Some(note) = &result.advisory_note {
        lines.push(OutputLine::new(OutputTag::Advisory, note));
    }
    if let Some(next) = &result.follow_up {
        lines.push(OutputLine::new(OutputTag::Advisory, format!("Next: {}", next)));
    }
    lines
}

/// Lines reporting an execution outcome
pub fn execution_lines(outcome: &ExecOutcome) -> Vec<OutputLine> {
    let status = if outcome.success {
        OutputLine::new(OutputTag::Success, "Command succeeded")
    } else {
        OutputLine::new(OutputTag::Error, "Command failed")
    };
    let body_tag = if outcome.success {
        OutputTag::Output
    } else {
        OutputTag::Error
    };
    vec![status, OutputLine::new(body_tag, &outcome.output)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangerous_command_gets_danger_line() {
        let result = ResolutionResult::command("sudo reboot", "Reboot the server", true);
        let tags: Vec<_> = resolution_lines(&result).iter().map(|l| l.tag).collect();
        assert_eq!(tags, vec![OutputTag::Info, OutputTag::Command, OutputTag::Danger]);
    }

    #[test]
    fn test_unresolved_shows_explanation() {
        let result = ResolutionResult::unresolved("Need a process", "Which PID should be killed?");
        let lines = resolution_lines(&result);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], OutputLine::new(OutputTag::Explanation, "Which PID should be killed?"));
        assert!(lines.iter().all(|l| l.tag != OutputTag::Command));
    }

    #[test]
    fn test_ai_notes_are_advisory() {
        let mut result = ResolutionResult::command("systemctl restart nginx", "Restart nginx", false);
        result.advisory_note = Some("Run nginx -t first".into());
        result.follow_up = Some("check the error log".into());
        let lines = resolution_lines(&result);
        assert_eq!(lines.iter().filter(|l| l.tag == OutputTag::Advisory).count(), 2);
        assert_eq!(lines.last().unwrap().text, "Next: check the error log");
    }

    #[test]
    fn test_execution_lines() {
        let lines = execution_lines(&ExecOutcome::failure("permission denied"));
        assert_eq!(lines[0].tag, OutputTag::Error);
        assert_eq!(lines[1], OutputLine::new(OutputTag::Error, "permission denied"));

        let lines = execution_lines(&ExecOutcome::success("up 3 days"));
        assert_eq!(lines[0].tag, OutputTag::Success);
        assert_eq!(lines[1].tag, OutputTag::Output);
    }
}
