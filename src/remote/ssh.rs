//! OpenSSH-backed remote shell
//!
//! Each command runs through a fresh `ssh` client process in batch mode, so
//! authentication comes from keys or the agent and never blocks on a prompt.

use super::{combine_streams, ExecOutcome, RemoteShell};
use crate::core::error::{OpsError, Result};
use crate::core::types::HostId;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Where and as whom to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub identity: Option<PathBuf>,
}

impl SshTarget {
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: Option<PathBuf>) -> Self {
        self.identity = identity;
        self
    }

    pub fn host_id(&self) -> HostId {
        HostId::new(&self.host)
    }

    pub fn summary(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct OpenSshTransport {
    target: SshTarget,
    connect_timeout: Duration,
    program: String,
}

impl OpenSshTransport {
    pub fn new(target: SshTarget, connect_timeout: Duration) -> Self {
        Self {
            target,
            connect_timeout,
            program: "ssh".into(),
        }
    }

    /// Use a different client binary (e.g. a wrapper script)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    /// Verify the host accepts a batch-mode session
    pub async fn connect(target: SshTarget, connect_timeout: Duration) -> Result<Self> {
        let transport = Self::new(target, connect_timeout);
        let outcome = transport
            .execute("true", connect_timeout + Duration::from_secs(5))
            .await;
        if !outcome.success {
            return Err(OpsError::Transport(format!(
                "Could not connect to {}: {}",
                transport.target.summary(),
                outcome.output
            )));
        }
        tracing::info!(remote = %transport.target.summary(), "ssh session verified");
        Ok(transport)
    }

    /// Client arguments for running `command` on the target
    pub fn args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.target.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if let Some(identity) = &self.target.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(format!("{}@{}", self.target.user, self.target.host));
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl RemoteShell for OpenSshTransport {
    async fn execute(&self, command: &str, limit: Duration) -> ExecOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(remote = %self.target.summary(), command, "executing remote command");

        let output = match timeout(limit, cmd.output()).await {
            Ok(result) => result,
            Err(_) => {
                return ExecOutcome::failure(format!(
                    "Command timed out after {} seconds",
                    limit.as_secs()
                ))
            }
        };

        let output = match output {
            Ok(o) => o,
            Err(e) => return ExecOutcome::failure(format!("Could not start {}: {}", self.program, e)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        combine_streams(&stdout, &stderr, output.status.code())
    }

    fn describe(&self) -> String {
        self.target.summary()
    }
}
