//! Shell command execution for hula test harnesses.
//!
//! Smoke tests drive deployment tooling through the shell. [`CommandRunner`]
//! is the seam; [`ShellCommandRunner`] runs commands with `sh -c` and returns
//! their combined output.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod runner;

pub use error::{CommandError, Result};
pub use runner::{CommandRunner, ShellCommandRunner};
