//! Error types for command execution.

use thiserror::Error;

/// A result type using `CommandError`.
pub type Result<T> = std::result::Result<T, CommandError>;

/// Errors that can occur while running a shell command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command ran and exited unsuccessfully.
    #[error("Command failed! - {command}\n\n{output}\n\nexit status: {}", exit_status(.exit_code))]
    Failed {
        /// The command line.
        command: String,
        /// Combined stdout and stderr.
        output: String,
        /// Exit code, `None` if the process was killed by a signal.
        exit_code: Option<i32>,
    },

    /// The shell could not be started.
    #[error("failed to run command {command:?}: {source}")]
    Spawn {
        /// The command line.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

impl CommandError {
    /// Returns the exit code of a failed command.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { exit_code, .. } => *exit_code,
            Self::Spawn { .. } => None,
        }
    }

    /// Returns the captured output of a failed command.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Failed { output, .. } => Some(output),
            Self::Spawn { .. } => None,
        }
    }
}
