//! Execution backend: the external agent CLI
//!
//! Tasks are executed by handing the prompt to a command-line agent as its
//! final argument and capturing exit code, stdout and stderr under a hard
//! wall-clock timeout. The backend is a trait so the processor can be tested
//! against a stub.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Captured outcome of one backend invocation.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Process exit code; -1 when the process died without one
    pub exit_code: i32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

/// The subprocess seam between the queue processor and the agent.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Backend name, for logging
    fn name(&self) -> &str;

    /// Run the agent with the given prompt. A non-zero exit is a normal
    /// `ExecOutput`; only timeouts and invocation failures are errors.
    async fn execute(&self, prompt: &str) -> Result<ExecOutput>;

    /// Check whether the backend command can be invoked.
    async fn is_available(&self) -> bool;
}

/// Agent CLI configuration.
#[derive(Debug, Clone)]
pub struct AgentCliConfig {
    /// Command to execute
    pub command: String,
    /// Arguments placed before the prompt
    pub default_args: Vec<String>,
    /// Environment variables; `${VAR}` values are expanded from the
    /// parent environment
    pub env: HashMap<String, String>,
    /// Hard wall-clock timeout in seconds
    pub timeout_seconds: u64,
    /// Working directory for the agent process
    pub workspace: Option<PathBuf>,
}

impl Default for AgentCliConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            default_args: vec!["--print".to_string()],
            env: HashMap::new(),
            timeout_seconds: 300,
            workspace: None,
        }
    }
}

impl AgentCliConfig {
    /// Create a config for the given command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            default_args: Vec::new(),
            ..Self::default()
        }
    }

    /// Set the arguments placed before the prompt.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.default_args = args;
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the working directory.
    pub fn with_workspace(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace = Some(dir.into());
        self
    }
}

/// Shell-based agent backend.
pub struct AgentCli {
    config: AgentCliConfig,
}

impl AgentCli {
    /// Create a new backend.
    pub fn new(config: AgentCliConfig) -> Self {
        Self { config }
    }

    /// Configured timeout in seconds.
    pub fn timeout_seconds(&self) -> u64 {
        self.config.timeout_seconds
    }
}

#[async_trait]
impl ExecutionBackend for AgentCli {
    fn name(&self) -> &str {
        &self.config.command
    }

    async fn execute(&self, prompt: &str) -> Result<ExecOutput> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.default_args);
        cmd.arg(prompt);
        cmd.kill_on_drop(true);

        for (key, value) in &self.config.env {
            // Expand ${VAR} references
            let expanded = if value.starts_with("${") && value.ends_with('}') {
                let var_name = &value[2..value.len() - 1];
                std::env::var(var_name).unwrap_or_default()
            } else {
                value.clone()
            };
            cmd.env(key, expanded);
        }

        if let Some(workspace) = &self.config.workspace {
            cmd.current_dir(workspace);
        }

        debug!(command = %self.config.command, "invoking agent");

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| Error::ExecutionTimeout(self.config.timeout_seconds))?
            .map_err(|e| Error::ExecutionFailed(e.to_string()))?;

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn is_available(&self) -> bool {
        Command::new("which")
            .arg(&self.config.command)
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}
