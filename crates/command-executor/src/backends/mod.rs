//! Execution backends

pub mod local;

pub use local::LocalLauncher;
