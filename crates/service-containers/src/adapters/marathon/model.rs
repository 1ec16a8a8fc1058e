//! Marathon v2 REST payloads.
//!
//! Only the fields this crate reads or writes are modelled; everything else
//! Marathon returns is ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Marathon application
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct App {
    /// App id; Marathon reports it with a leading `/`
    pub id: String,
    /// Shell command to run in the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    /// CPU shares per task
    #[serde(default)]
    pub cpus: f64,
    /// Memory per task in MiB
    #[serde(default)]
    pub mem: f64,
    /// Desired number of tasks
    #[serde(default)]
    pub instances: u32,
    /// Environment; values are strings or secret references
    #[serde(default)]
    pub env: BTreeMap<String, serde_json::Value>,
    /// App labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Container definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<AppContainer>,
    /// Health checks
    #[serde(default)]
    pub health_checks: Vec<MarathonHealthCheck>,
    /// Running tasks, present when requested with `embed`
    #[serde(default, skip_serializing)]
    pub tasks: Vec<Task>,
}

/// Container section of an app
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppContainer {
    /// Container type, `DOCKER` for everything this crate creates
    #[serde(rename = "type")]
    pub kind: String,
    /// Docker specific settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerContainer>,
}

/// Docker section of a container
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerContainer {
    /// Image reference
    pub image: String,
    /// Network mode, `BRIDGE` for created apps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// One mapping per declared container port
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
}

/// A container port published by Marathon
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    /// Port inside the container
    pub container_port: u16,
}

/// Marathon health check definition
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MarathonHealthCheck {
    /// `HTTP`, `TCP` or `COMMAND`
    pub protocol: String,
    /// Seconds before failures count
    pub grace_period_seconds: u32,
    /// Seconds between checks
    pub interval_seconds: u32,
    /// Seconds before a check fails
    pub timeout_seconds: u32,
    /// Failures before the task is killed
    pub max_consecutive_failures: u32,
    /// HTTP path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Absolute port to check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Index into the app's port mappings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_index: Option<u32>,
    /// Command for `COMMAND` checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandCheck>,
}

/// Command of a `COMMAND` health check
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommandCheck {
    /// Shell command line
    pub value: String,
}

/// A running task of an app
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Task id
    pub id: String,
    /// Agent host the task runs on
    #[serde(default)]
    pub host: String,
    /// Host ports, in port mapping order
    #[serde(default)]
    pub ports: Vec<u16>,
}

/// `GET /v2/apps` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppsResponse {
    /// Matching apps
    #[serde(default)]
    pub apps: Vec<App>,
}

/// `GET /v2/apps/<id>` response
#[derive(Debug, Clone, Deserialize)]
pub struct AppResponse {
    /// The app
    pub app: App,
}

/// Partial update body for scaling
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScaleRequest {
    /// New desired instance count
    pub instances: u32,
}
