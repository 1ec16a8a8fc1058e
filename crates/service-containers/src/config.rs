//! Service configuration (the desired state of a service).
//!
//! A [`ServiceConfig`] is built once through [`ServiceConfigBuilder`] and never
//! changes afterwards. Its service name is the identity every backend uses to
//! find the containers or apps that belong to it.

use crate::health::HealthCheck;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable description of a replicated container workload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    service_name: String,
    container_image: String,
    entry_point: Option<String>,
    command_line: Vec<String>,
    env_vars: BTreeMap<String, String>,
    requested_cpu_units: f64,
    requested_memory: f64,
    requested_instances: u32,
    container_ports: Vec<u16>,
    health_checks: Vec<HealthCheck>,
}

impl ServiceConfig {
    /// Start building a configuration for `service_name` running `container_image`.
    ///
    /// The name should be unique in the deployment; backends use it as a label
    /// value, so keep it short and alphanumeric.
    pub fn builder(
        service_name: impl Into<String>,
        container_image: impl Into<String>,
    ) -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            candidate: ServiceConfig {
                service_name: service_name.into(),
                container_image: container_image.into(),
                entry_point: None,
                command_line: Vec::new(),
                env_vars: BTreeMap::new(),
                requested_cpu_units: 0.5,
                requested_memory: 64.0,
                requested_instances: 1,
                container_ports: Vec::new(),
                health_checks: Vec::new(),
            },
        }
    }

    /// The unique name of the service
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The container image, e.g. a docker image reference
    pub fn container_image(&self) -> &str {
        &self.container_image
    }

    /// Entry point override for the image, if any
    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    /// Arguments passed to the entry point
    pub fn command_line(&self) -> &[String] {
        &self.command_line
    }

    /// Environment variables, ordered by name
    pub fn env_vars(&self) -> &BTreeMap<String, String> {
        &self.env_vars
    }

    /// CPU units requested per container (fractional)
    pub fn requested_cpu_units(&self) -> f64 {
        self.requested_cpu_units
    }

    /// Memory requested per container, in MiB
    pub fn requested_memory(&self) -> f64 {
        self.requested_memory
    }

    /// Number of replica containers requested
    pub fn requested_instances(&self) -> u32 {
        self.requested_instances
    }

    /// Container-internal ports to expose, in declaration order
    pub fn container_ports(&self) -> &[u16] {
        &self.container_ports
    }

    /// Health checks to configure for every container
    pub fn health_checks(&self) -> &[HealthCheck] {
        &self.health_checks
    }
}

/// Builder for [`ServiceConfig`]
///
/// `build` snapshots the current state, so a builder can keep being modified
/// and reused without affecting configurations already built from it.
#[derive(Debug, Clone)]
pub struct ServiceConfigBuilder {
    candidate: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Replace the command line
    pub fn command_line<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidate.command_line = args.into_iter().map(Into::into).collect();
        self
    }

    /// Requested CPU in fractional units
    pub fn cpu(mut self, requested_cpu_units: f64) -> Self {
        self.candidate.requested_cpu_units = requested_cpu_units;
        self
    }

    /// Entry point override
    pub fn entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.candidate.entry_point = Some(entry_point.into());
        self
    }

    /// Add one environment variable
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.candidate.env_vars.insert(name.into(), value.into());
        self
    }

    /// Replace all environment variables
    pub fn env_map<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.candidate.env_vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Number of replica containers
    pub fn instances(mut self, requested_instances: u32) -> Self {
        self.candidate.requested_instances = requested_instances;
        self
    }

    /// Append a health check
    pub fn health_check(mut self, health_check: HealthCheck) -> Self {
        self.candidate.health_checks.push(health_check);
        self
    }

    /// Requested memory in MiB
    pub fn memory(mut self, requested_memory: f64) -> Self {
        self.candidate.requested_memory = requested_memory;
        self
    }

    /// Append a container port to expose
    pub fn port(mut self, port: u16) -> Self {
        self.candidate.container_ports.push(port);
        self
    }

    /// Build an immutable configuration from the current builder state
    pub fn build(&self) -> ServiceConfig {
        self.candidate.clone()
    }
}
