//! Local Docker backend, driven through the docker CLI.
//!
//! Containers are tagged with [`SERVICE_NAME_LABEL`] at `docker run` time and
//! found again with `docker ps` label filters, so a service created by an
//! earlier process is adopted instead of launched twice.

mod controller;
mod host;
mod inspect;
mod ports;

pub use controller::DockerController;

use super::{InstanceInfo, InstanceTracking, RuntimeAdapter, SERVICE_NAME_LABEL};
use crate::{DockerSettings, Error, HealthCheckType, Result, ServiceConfig};
use async_trait::async_trait;
use command_executor::{Launcher, LocalLauncher};
use inspect::{InspectedContainer, creation_key, parse_inspect};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

const BACKEND: &str = "docker";

/// Signal sent by [`DockerAdapter::kill`] when none is given
pub const DEFAULT_KILL_SIGNAL: &str = "KILL";

/// Runtime adapter for a local Docker engine
pub struct DockerAdapter<L: Launcher = LocalLauncher> {
    controller: DockerController<L>,
    container_host: String,
}

impl DockerAdapter<LocalLauncher> {
    /// Build an adapter running the local docker CLI.
    ///
    /// Resolves the container host once, possibly by asking `docker-machine`.
    pub async fn from_settings(settings: &DockerSettings) -> Result<Self> {
        let timeout = settings.command_timeout();
        let container_host =
            host::resolve_container_host(settings.container_host.as_deref(), timeout).await?;

        info!(
            "Docker backend using '{}', containers reachable at {}",
            settings.docker_binary, container_host
        );
        let controller = DockerController::new(&settings.docker_binary, LocalLauncher, timeout)
            .with_env(settings.env.clone());
        Ok(Self::new(controller, container_host))
    }
}

impl<L: Launcher> DockerAdapter<L> {
    /// Create an adapter from a controller and an already resolved host
    pub fn new(controller: DockerController<L>, container_host: impl Into<String>) -> Self {
        Self {
            controller,
            container_host: container_host.into(),
        }
    }

    /// The underlying CLI controller
    pub fn controller(&self) -> &DockerController<L> {
        &self.controller
    }

    /// Host under which containers are reachable
    pub fn container_host(&self) -> &str {
        &self.container_host
    }

    /// Send `signal` to a container without removing it (defaults to `KILL`)
    pub async fn kill(&self, id: &str, signal: Option<&str>) -> Result<()> {
        let signal = signal.unwrap_or(DEFAULT_KILL_SIGNAL);
        self.controller.kill(id, signal).await?;
        info!("Sent {} to container {}", signal, id);
        Ok(())
    }

    /// Arguments following `docker run` for one container of `config`.
    ///
    /// `host_ports[i]` is published as `config.container_ports()[i]`.
    pub fn run_args(config: &ServiceConfig, host_ports: &[u16]) -> Vec<String> {
        let mut args = vec![
            "-d".to_string(),
            "-l".to_string(),
            format!("{}={}", SERVICE_NAME_LABEL, config.service_name()),
        ];

        if let Some(entry_point) = config.entry_point() {
            args.push("--entrypoint".to_string());
            args.push(entry_point.to_string());
        }

        for (container_port, host_port) in config.container_ports().iter().zip(host_ports) {
            args.push("-p".to_string());
            args.push(format!("{host_port}:{container_port}"));
        }

        for (name, value) in config.env_vars() {
            args.push("-e".to_string());
            args.push(format!("{name}={value}"));
        }

        for check in config.health_checks() {
            if check.kind() != HealthCheckType::Command {
                continue;
            }
            args.extend([
                "--health-cmd".to_string(),
                check.parameters().unwrap_or_default().to_string(),
                "--health-interval".to_string(),
                format!("{}s", check.interval()),
                "--health-retries".to_string(),
                check.max_failures().to_string(),
                "--health-timeout".to_string(),
                format!("{}s", check.timeout()),
                "--health-start-period".to_string(),
                format!("{}s", check.grace_period()),
            ]);
        }

        args.push("--cpus".to_string());
        args.push(config.requested_cpu_units().to_string());
        args.push("-m".to_string());
        args.push(format!("{}m", config.requested_memory() as u64));

        args.push(config.container_image().to_string());
        args.extend(config.command_line().iter().cloned());
        args
    }

    async fn running_ids(&self, config: &ServiceConfig) -> Result<Vec<String>> {
        self.controller
            .ps(&format!("{}={}", SERVICE_NAME_LABEL, config.service_name()))
            .await
    }

    async fn inspect(&self, ids: &[String]) -> Result<Vec<InspectedContainer>> {
        let json = self.controller.inspect(ids).await?;
        parse_inspect(&json)
    }

    /// Inspect `ids`, oldest container first. `docker ps` lists newest first.
    async fn inspect_oldest_first(&self, ids: &[String]) -> Result<Vec<InspectedContainer>> {
        let mut inspected = self.inspect(ids).await?;
        inspected.sort_by_cached_key(|container| container.created.as_deref().map(creation_key));
        Ok(inspected)
    }

    fn instance(&self, inspected: InspectedContainer) -> InstanceInfo {
        InstanceInfo {
            id: inspected.id,
            host: self.container_host.clone(),
            ports: inspected.ports,
        }
    }
}

#[async_trait]
impl<L: Launcher> RuntimeAdapter for DockerAdapter<L> {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn instance_tracking(&self) -> InstanceTracking {
        InstanceTracking::Snapshot
    }

    fn validate(&self, config: &ServiceConfig) -> Result<()> {
        let mut commands = 0;
        for check in config.health_checks() {
            if check.kind() != HealthCheckType::Command {
                debug!(
                    "Service '{}': {} health check has no docker equivalent, skipping it",
                    config.service_name(),
                    check.kind()
                );
                continue;
            }
            if check.parameters().is_none_or(|cmd| cmd.trim().is_empty()) {
                return Err(Error::Config(format!(
                    "service '{}': COMMAND health check needs a command",
                    config.service_name()
                )));
            }
            commands += 1;
        }
        if commands > 1 {
            return Err(Error::Config(format!(
                "service '{}': docker runs a single health command, got {}",
                config.service_name(),
                commands
            )));
        }
        Ok(())
    }

    async fn discover(&self, config: &ServiceConfig) -> Result<Option<Vec<InstanceInfo>>> {
        let ids = self.running_ids(config).await?;
        if ids.is_empty() {
            debug!("No containers found for service '{}'", config.service_name());
            return Ok(None);
        }

        let instances: Vec<_> = self
            .inspect_oldest_first(&ids)
            .await?
            .into_iter()
            .map(|inspected| self.instance(inspected))
            .collect();

        if instances.is_empty() {
            return Ok(None);
        }
        info!(
            "Discovered {} existing container(s) for service '{}'",
            instances.len(),
            config.service_name()
        );
        Ok(Some(instances))
    }

    async fn create_instance(&self, config: &ServiceConfig) -> Result<InstanceInfo> {
        self.validate(config)?;

        let mut host_ports = Vec::with_capacity(config.container_ports().len());
        for _ in config.container_ports() {
            host_ports.push(ports::free_port().await?);
        }

        let args = Self::run_args(config, &host_ports);
        let id = self.controller.run(&args).await?;
        info!(
            "Started container {} for service '{}'",
            id,
            config.service_name()
        );

        let ports: BTreeMap<u16, u16> = config
            .container_ports()
            .iter()
            .copied()
            .zip(host_ports)
            .collect();
        Ok(InstanceInfo {
            id,
            host: self.container_host.clone(),
            ports,
        })
    }

    async fn list_instances(&self, config: &ServiceConfig) -> Result<Vec<InstanceInfo>> {
        let ids = self.running_ids(config).await?;
        Ok(self
            .inspect_oldest_first(&ids)
            .await?
            .into_iter()
            .map(|inspected| self.instance(inspected))
            .collect())
    }

    async fn destroy_instance(&self, config: &ServiceConfig, id: &str) -> Result<()> {
        self.controller.remove(id).await?;
        info!(
            "Removed container {} of service '{}'",
            id,
            config.service_name()
        );
        Ok(())
    }

    async fn instance_count(&self, config: &ServiceConfig) -> Result<u32> {
        Ok(self.running_ids(config).await?.len() as u32)
    }

    async fn list_service_names(
        &self,
        known_instances: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        let unknown: Vec<String> = self
            .controller
            .ps(SERVICE_NAME_LABEL)
            .await?
            .into_iter()
            .filter(|id| !known_instances.contains(id))
            .collect();

        let names: HashSet<String> = self
            .inspect(&unknown)
            .await?
            .into_iter()
            .filter_map(|mut inspected| inspected.labels.remove(SERVICE_NAME_LABEL))
            .filter(|name| !name.is_empty())
            .collect();

        if !names.is_empty() {
            debug!("Found services not managed by this process: {:?}", names);
        }
        Ok(names)
    }
}
