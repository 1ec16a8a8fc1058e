//! Launcher trait for executing commands in different contexts

use crate::command::Command;
use crate::error::Result;
use crate::process::ExitResult;
use async_trait::async_trait;

/// A launcher runs a command to completion and captures its output
///
/// Implementations decide where the command runs. A non-zero exit is not an
/// error at this level; callers inspect [`ExitResult::status`].
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Run `command` and wait for it to exit
    async fn execute(&self, command: Command) -> Result<ExitResult>;
}
