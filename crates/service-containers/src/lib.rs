//! # Service containers
//!
//! Declare a named, replicated container workload once and reconcile it
//! against a container runtime: a local Docker engine driven through its CLI,
//! or a Marathon (DC/OS) scheduler driven through its REST API.
//!
//! Backend labels are the only durable state. [`ServiceManager::get_service`]
//! first looks for containers or apps already tagged with the service name and
//! only creates new ones when nothing is found, so asking for the same service
//! twice never launches it twice.
//!
//! ## Example
//!
//! ```rust,no_run
//! use service_containers::{ServiceConfig, ServiceManager};
//!
//! # async fn example() -> service_containers::Result<()> {
//! let manager = ServiceManager::docker().await?;
//!
//! let config = ServiceConfig::builder("web", "nginx")
//!     .port(80)
//!     .instances(2)
//!     .build();
//!
//! let service = manager.get_service(&config).await?;
//! for container in service.containers().iter() {
//!     println!("{} -> {:?}", container.id(), container.exposed_ports());
//! }
//!
//! service.set_instance_count(3).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod adapters;
mod config;
mod container;
mod health;
mod manager;
mod service;
mod settings;

pub use adapters::{InstanceInfo, InstanceTracking, RuntimeAdapter, SERVICE_NAME_LABEL};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use container::Container;
pub use health::{HealthCheck, HealthCheckBuilder, HealthCheckType};
pub use manager::ServiceManager;
pub use service::Service;
pub use settings::{BackendSettings, Credentials, DockerSettings, ManagerSettings, MarathonSettings};

/// Error types for container service operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Running an external command failed
    #[error("Command execution error: {0}")]
    CommandExecution(#[from] command_executor::Error),

    /// A command that should print a single id printed something else
    #[error("Unexpected output from `{command}`: {output}")]
    MalformedOutput {
        /// The command line
        command: String,
        /// What it printed
        output: String,
    },

    /// Backend state contradicts what the service configuration implies
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The backend cannot express this health check type
    #[error("{kind} health checks are not supported by the {backend} backend")]
    UnsupportedHealthCheck {
        /// Backend name
        backend: &'static str,
        /// Rejected health check type
        kind: HealthCheckType,
    },

    /// The backend does not implement this operation
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        /// Backend name
        backend: &'static str,
        /// Operation name
        operation: &'static str,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The scheduler answered with a non-success status
    #[error("Scheduler returned {status}: {body}")]
    Scheduler {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
