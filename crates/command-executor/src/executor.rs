//! Main executor type that wraps different launchers

use std::time::Duration;

use async_io::Timer;
use futures_lite::FutureExt;
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::launcher::Launcher;
use crate::process::ExitResult;

/// An executor that runs commands via a specific launcher
pub struct Executor<L: Launcher> {
    /// The name used for logging/identification
    service_name: String,
    /// The launcher implementation
    launcher: L,
    /// Upper bound for a single command, if any
    timeout: Option<Duration>,
}

impl<L: Launcher> Executor<L> {
    /// Create a new executor with the given launcher and no timeout
    pub fn new(service_name: impl Into<String>, launcher: L) -> Self {
        Self {
            service_name: service_name.into(),
            launcher,
            timeout: None,
        }
    }

    /// Bound every command run through this executor by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the service name
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Get the configured timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Get a reference to the launcher
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Execute a command and wait for it to complete, whatever its exit status
    pub async fn execute(&self, command: Command) -> Result<ExitResult> {
        let Some(limit) = self.timeout else {
            return self.launcher.execute(command).await;
        };

        let command_line = command.to_string();
        let expired = async {
            Timer::after(limit).await;
            Err(Error::Timeout {
                command: command_line,
                timeout: limit,
            })
        };

        let result = self.launcher.execute(command).or(expired).await;
        if let Err(Error::Timeout { command, .. }) = &result {
            warn!("[{}] `{}` timed out after {:?}", self.service_name, command, limit);
        }
        result
    }

    /// Execute a command and return its stdout with trailing whitespace removed
    ///
    /// A non-zero exit is turned into [`Error::CommandFailed`].
    pub async fn run(&self, command: Command) -> Result<String> {
        let command_line = command.to_string();
        let result = self.execute(command).await?;

        if !result.success() {
            debug!(
                "[{}] `{}` exited with {:?}",
                self.service_name, command_line, result.status
            );
            return Err(Error::CommandFailed {
                command: command_line,
                code: result.status.code,
                stderr: result.stderr.trim().to_string(),
            });
        }

        Ok(result.stdout.trim_end().to_string())
    }
}
