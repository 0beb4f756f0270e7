//! Remote command execution
//!
//! `RemoteShell` is the seam between the pipeline and the transport. The
//! OpenSSH-backed implementation lives in `ssh`; tests substitute scripted
//! shells.

pub mod ssh;

pub use ssh::{OpenSshTransport, SshTarget};

use crate::llm::context::HostContext;
use async_trait::async_trait;
use std::time::Duration;

/// Result of running one command remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    pub success: bool,
    pub output: String,
}

impl ExecOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Text reported for a successful command that printed nothing
pub const NO_OUTPUT: &str = "Command completed (no output)";

/// Runs commands on one connected host
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Transport failures are reported as unsuccessful outcomes, never raised
    async fn execute(&self, command: &str, timeout: Duration) -> ExecOutcome;

    /// Connection summary such as "deploy@10.0.0.5:22"
    fn describe(&self) -> String;
}

/// Fold captured streams and the exit status into one outcome
///
/// stderr alone means failure; stdout plus stderr is a success with the
/// stderr text appended as a warning; a non-zero exit is always a failure.
pub fn combine_streams(stdout: &str, stderr: &str, exit_code: Option<i32>) -> ExecOutcome {
    let stdout = stdout.trim_end();
    let stderr = stderr.trim_end();
    let exited_cleanly = exit_code == Some(0);

    let output = match (stdout.is_empty(), stderr.is_empty()) {
        (true, false) => format!("Command failed:\n{stderr}"),
        (false, false) => format!("{stdout}\n[warning] {stderr}"),
        (false, true) => stdout.to_string(),
        (true, true) if exited_cleanly => NO_OUTPUT.to_string(),
        (true, true) => match exit_code {
            Some(code) => format!("Command exited with status {code}"),
            None => "Command was terminated by a signal".to_string(),
        },
    };

    let success = exited_cleanly && !(stdout.is_empty() && !stderr.is_empty());
    ExecOutcome { success, output }
}

/// What the host says about itself, used to steer AI-backed resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProfile {
    pub os_hint: String,
    pub kernel: Option<String>,
}

impl Default for HostProfile {
    fn default() -> Self {
        Self {
            os_hint: "Linux".into(),
            kernel: None,
        }
    }
}

impl HostProfile {
    /// Ask the host for its kernel and distribution; falls back to "Linux"
    pub async fn probe(shell: &dyn RemoteShell, timeout: Duration) -> Self {
        let kernel = shell.execute("uname -sr", timeout).await;
        let release = shell
            .execute("grep -m1 '^PRETTY_NAME=' /etc/os-release", timeout)
            .await;

        let kernel = Some(kernel)
            .filter(|o| o.success && o.output != NO_OUTPUT)
            .and_then(|o| o.output.lines().next().map(|l| l.trim().to_string()))
            .filter(|l| !l.is_empty());
        let pretty = if release.success {
            parse_pretty_name(&release.output)
        } else {
            None
        };

        let profile = Self {
            os_hint: pretty.unwrap_or_else(|| "Linux".into()),
            kernel,
        };
        tracing::debug!(os = %profile.os_hint, kernel = ?profile.kernel, "host probed");
        profile
    }

    pub fn host_context(&self, host_summary: &str) -> HostContext {
        let os_hint = match &self.kernel {
            Some(kernel) => format!("{} ({})", self.os_hint, kernel),
            None => self.os_hint.clone(),
        };
        HostContext {
            os_hint,
            host_summary: host_summary.to_string(),
        }
    }
}

/// Value of `PRETTY_NAME=` from os-release text
pub fn parse_pretty_name(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|value| !value.is_empty())
}
