//! Command lines handed to a [`Launcher`](crate::Launcher)

use async_process::Command as AsyncCommand;
use std::collections::BTreeMap;
use std::fmt;

/// A program, its arguments and extra environment variables.
///
/// Built by value (`Command::new("docker").arg("ps").env("DOCKER_HOST", host)`)
/// and cheap to clone, so the same command can be logged, recorded by test
/// launchers and run. Arguments are UTF-8; everything the container backends
/// run is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl Command {
    /// A command running `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one environment variable on top of the inherited environment
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// The program
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments, without the program
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Variables set on top of the inherited environment
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Program followed by its arguments
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(&self.args)
            .cloned()
            .collect()
    }

    /// An `async_process::Command` ready to spawn
    pub(crate) fn prepare(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);
        cmd.args(&self.args).envs(&self.env);
        cmd
    }
}

/// The command line as typed in a shell, without quoting. Environment
/// variables are left out so secrets in them never reach logs.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
