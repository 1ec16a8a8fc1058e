//! Health check declarations.
//!
//! These only describe checks; running them is the backend's job.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported health check types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthCheckType {
    /// HTTP request; `parameters` holds the URL path. A 2xx/3xx response passes.
    Http,
    /// HTTPS request; `parameters` holds the URL path.
    Https,
    /// TCP connect to the check port.
    Tcp,
    /// Command run inside the container; `parameters` holds the command line.
    Command,
    /// Backend-specific check not covered by the other types.
    Other,
}

impl fmt::Display for HealthCheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthCheckType::Http => "HTTP",
            HealthCheckType::Https => "HTTPS",
            HealthCheckType::Tcp => "TCP",
            HealthCheckType::Command => "COMMAND",
            HealthCheckType::Other => "OTHER",
        };
        f.write_str(name)
    }
}

const DEFAULT_GRACE_PERIOD: u32 = 300;
const DEFAULT_INTERVAL: u32 = 60;
const DEFAULT_TIMEOUT: u32 = 20;
const DEFAULT_MAX_FAILURES: u32 = 3;

/// Immutable health check definition
///
/// At most one of [`port`](HealthCheck::port) and
/// [`port_index`](HealthCheck::port_index) is set, also when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HealthCheckFields")]
pub struct HealthCheck {
    kind: HealthCheckType,
    parameters: Option<String>,
    grace_period: u32,
    interval: u32,
    timeout: u32,
    max_failures: u32,
    port: Option<u16>,
    port_index: Option<u32>,
}

impl HealthCheck {
    /// Start building a health check of the given type
    pub fn builder(kind: HealthCheckType) -> HealthCheckBuilder {
        HealthCheckBuilder {
            kind,
            parameters: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            max_failures: DEFAULT_MAX_FAILURES,
            port: None,
            port_index: None,
        }
    }

    /// The health check type
    pub fn kind(&self) -> HealthCheckType {
        self.kind
    }

    /// URL path or command line, depending on the type
    pub fn parameters(&self) -> Option<&str> {
        self.parameters.as_deref()
    }

    /// Seconds during which failures are ignored after start
    pub fn grace_period(&self) -> u32 {
        self.grace_period
    }

    /// Seconds between checks
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Seconds after which a single check counts as failed
    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    /// Consecutive failures after which the container is considered unhealthy
    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// Absolute external port to check
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Zero-based index into the service's declared ports, resolved at runtime
    pub fn port_index(&self) -> Option<u32> {
        self.port_index
    }
}

/// Serialized form of [`HealthCheck`]; unset timings take the builder defaults
#[derive(Deserialize)]
struct HealthCheckFields {
    kind: HealthCheckType,
    #[serde(default)]
    parameters: Option<String>,
    #[serde(default = "default_grace_period")]
    grace_period: u32,
    #[serde(default = "default_interval")]
    interval: u32,
    #[serde(default = "default_timeout")]
    timeout: u32,
    #[serde(default = "default_max_failures")]
    max_failures: u32,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    port_index: Option<u32>,
}

fn default_grace_period() -> u32 {
    DEFAULT_GRACE_PERIOD
}

fn default_interval() -> u32 {
    DEFAULT_INTERVAL
}

fn default_timeout() -> u32 {
    DEFAULT_TIMEOUT
}

fn default_max_failures() -> u32 {
    DEFAULT_MAX_FAILURES
}

impl TryFrom<HealthCheckFields> for HealthCheck {
    type Error = String;

    fn try_from(fields: HealthCheckFields) -> Result<Self, Self::Error> {
        if let (Some(port), Some(index)) = (fields.port, fields.port_index) {
            return Err(format!(
                "{} health check sets both port {port} and port_index {index}",
                fields.kind
            ));
        }

        Ok(HealthCheck {
            kind: fields.kind,
            parameters: fields.parameters,
            grace_period: fields.grace_period,
            interval: fields.interval,
            timeout: fields.timeout,
            max_failures: fields.max_failures,
            port: fields.port,
            port_index: fields.port_index,
        })
    }
}

/// Builder for [`HealthCheck`]
#[derive(Debug, Clone)]
pub struct HealthCheckBuilder {
    kind: HealthCheckType,
    parameters: Option<String>,
    grace_period: u32,
    interval: u32,
    timeout: u32,
    max_failures: u32,
    port: Option<u16>,
    port_index: Option<u32>,
}

impl HealthCheckBuilder {
    /// URL path (HTTP/HTTPS) or command line (COMMAND)
    pub fn parameters(mut self, parameters: impl Into<String>) -> Self {
        self.parameters = Some(parameters.into());
        self
    }

    /// Grace period in seconds
    pub fn grace_period(mut self, seconds: u32) -> Self {
        self.grace_period = seconds;
        self
    }

    /// Interval in seconds
    pub fn interval(mut self, seconds: u32) -> Self {
        self.interval = seconds;
        self
    }

    /// Timeout in seconds
    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = seconds;
        self
    }

    /// Maximum consecutive failures
    pub fn max_failures(mut self, max: u32) -> Self {
        self.max_failures = max;
        self
    }

    /// Check a fixed port. Clears any port index.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self.port_index = None;
        self
    }

    /// Check the port at `index` in the declared port list. Clears any fixed port.
    pub fn port_index(mut self, index: u32) -> Self {
        self.port_index = Some(index);
        self.port = None;
        self
    }

    /// Build the health check
    pub fn build(&self) -> HealthCheck {
        HealthCheck {
            kind: self.kind,
            parameters: self.parameters.clone(),
            grace_period: self.grace_period,
            interval: self.interval,
            timeout: self.timeout,
            max_failures: self.max_failures,
            port: self.port,
            port_index: self.port_index,
        }
    }
}
