//! Shell command runner.

use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{CommandError, Result};

/// Runs shell commands and captures their output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` through the shell and return stdout followed by stderr.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Failed` if the command exits unsuccessfully and
    /// `allow_failure` is false, or `CommandError::Spawn` if the shell cannot
    /// be started.
    async fn run(&self, command: &str, allow_failure: bool) -> Result<String>;
}

/// [`CommandRunner`] that runs commands with `sh -c`.
///
/// Commands inherit the current process environment plus any variables set
/// with [`ShellCommandRunner::with_env`].
#[derive(Debug, Clone, Default)]
pub struct ShellCommandRunner {
    env: BTreeMap<String, String>,
}

impl ShellCommandRunner {
    /// Create a runner with no extra environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable for every command.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Extra environment variables passed to every command.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str, allow_failure: bool) -> Result<String> {
        tracing::debug!(command, "Running command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .envs(&self.env)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !allow_failure && !output.status.success() {
            tracing::debug!(command, status = %output.status, "Command failed");
            return Err(CommandError::Failed {
                command: command.to_string(),
                output: combined,
                exit_code: output.status.code(),
            });
        }

        Ok(combined)
    }
}
