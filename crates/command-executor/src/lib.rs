//! Runtime-agnostic command execution library
//!
//! This crate provides the small capability the container backends need from
//! the operating system: run a command line to completion, capture what it
//! printed, and fail cleanly when it exits non-zero or takes too long.

#![warn(missing_docs)]

pub mod backends;
pub mod command;
pub mod error;
pub mod executor;
pub mod launcher;
pub mod process;

pub use backends::LocalLauncher;
pub use command::Command;
pub use error::{Error, Result};
pub use executor::Executor;
pub use launcher::Launcher;
pub use process::{ExitResult, ExitStatus};
