//! Thin wrapper around the docker CLI.

use crate::{Error, Result};
use command_executor::{Command, Executor, Launcher, LocalLauncher};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Runs docker CLI commands through a [`Launcher`]
pub struct DockerController<L: Launcher = LocalLauncher> {
    binary: String,
    env: BTreeMap<String, String>,
    executor: Executor<L>,
}

impl<L: Launcher> DockerController<L> {
    /// Drive `binary` through `launcher`, bounding every call by `timeout`
    pub fn new(binary: impl Into<String>, launcher: L, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            env: BTreeMap::new(),
            executor: Executor::new("docker", launcher).with_timeout(timeout),
        }
    }

    /// Set environment variables for every invocation, e.g. `DOCKER_HOST`
    /// to drive a remote engine
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// The docker binary being invoked
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Get a reference to the launcher
    pub fn launcher(&self) -> &L {
        self.executor.launcher()
    }

    /// `docker run <args>`; returns the new container id
    pub async fn run(&self, args: &[String]) -> Result<String> {
        self.run_expect_single_id(self.command("run", args)).await
    }

    /// `docker ps -q --no-trunc -f label=<filter>`; returns the matching ids
    pub async fn ps(&self, label_filter: &str) -> Result<Vec<String>> {
        let filter = format!("label={label_filter}");
        let command = self.command("ps", ["-q", "--no-trunc", "-f", filter.as_str()]);
        let output = self.executor.run(command).await?;

        Ok(output.split_whitespace().map(str::to_string).collect())
    }

    /// `docker inspect <ids...>`; returns the raw JSON array.
    ///
    /// An empty id list yields `[]` without invoking docker.
    pub async fn inspect(&self, ids: &[String]) -> Result<String> {
        if ids.is_empty() {
            return Ok("[]".to_string());
        }
        Ok(self.executor.run(self.command("inspect", ids)).await?)
    }

    /// `docker kill -s <signal> <id>`
    pub async fn kill(&self, id: &str, signal: &str) -> Result<String> {
        self.run_expect_single_id(self.command("kill", ["-s", signal, id]))
            .await
    }

    /// `docker rm -f <id>`, stopping the container first if it still runs
    pub async fn remove(&self, id: &str) -> Result<String> {
        self.run_expect_single_id(self.command("rm", ["-f", id])).await
    }

    fn command<I, S>(&self, subcommand: &str, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::new(&self.binary)
            .arg(subcommand)
            .args(args)
            .envs(&self.env)
    }

    async fn run_expect_single_id(&self, command: Command) -> Result<String> {
        let command_line = command.to_string();
        debug!("Running {}", command_line);

        let output = self.executor.run(command).await?;
        single_id(&output).ok_or(Error::MalformedOutput {
            command: command_line,
            output,
        })
    }
}

/// The id on the last non-blank line of `output`, if that line is one token
pub(crate) fn single_id(output: &str) -> Option<String> {
    let last = output.lines().rev().find(|line| !line.trim().is_empty())?;
    let mut tokens = last.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(id), None) => Some(id.to_string()),
        _ => None,
    }
}
