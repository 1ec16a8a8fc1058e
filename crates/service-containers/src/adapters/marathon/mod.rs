//! Marathon (DC/OS) backend, driven through the Marathon REST API.
//!
//! Each service maps to exactly one Marathon app labelled with the service
//! name. Marathon owns the task list, so services on this backend never cache
//! containers and scaling is a single desired-count update.

mod client;
pub mod model;

pub use client::{HttpMarathonClient, MarathonApi};

use super::{InstanceInfo, InstanceTracking, RuntimeAdapter, SERVICE_NAME_LABEL};
use crate::{Error, HealthCheckType, MarathonSettings, Result, ServiceConfig};
use async_trait::async_trait;
use dashmap::DashMap;
use model::{App, AppContainer, CommandCheck, DockerContainer, MarathonHealthCheck, PortMapping};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

const BACKEND: &str = "marathon";

/// Runtime adapter for a Marathon scheduler
pub struct MarathonAdapter<C: MarathonApi = HttpMarathonClient> {
    client: C,
    /// Service name to the app id Marathon reported for it
    app_ids: DashMap<String, String>,
}

impl MarathonAdapter<HttpMarathonClient> {
    /// Build an adapter talking HTTP to the configured Marathon
    pub fn from_settings(settings: &MarathonSettings) -> Result<Self> {
        info!("Marathon backend at {}", settings.url);
        Ok(Self::new(HttpMarathonClient::new(settings)?))
    }
}

impl<C: MarathonApi> MarathonAdapter<C> {
    /// Create an adapter over any [`MarathonApi`] implementation
    pub fn new(client: C) -> Self {
        Self {
            client,
            app_ids: DashMap::new(),
        }
    }

    /// The underlying API client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Translate a service configuration into a new Marathon app
    pub fn build_app(config: &ServiceConfig) -> Result<App> {
        let mut health_checks = Vec::with_capacity(config.health_checks().len());
        for check in config.health_checks() {
            let mut mapped = MarathonHealthCheck {
                protocol: check.kind().to_string(),
                grace_period_seconds: check.grace_period(),
                interval_seconds: check.interval(),
                timeout_seconds: check.timeout(),
                max_consecutive_failures: check.max_failures(),
                ..MarathonHealthCheck::default()
            };

            match check.kind() {
                HealthCheckType::Http | HealthCheckType::Tcp => {
                    if check.kind() == HealthCheckType::Http {
                        mapped.path = check.parameters().map(str::to_string);
                    }
                    mapped.port = check.port();
                    mapped.port_index = check.port_index();
                }
                HealthCheckType::Command => {
                    mapped.command = check.parameters().map(|value| CommandCheck {
                        value: value.to_string(),
                    });
                }
                kind => {
                    return Err(Error::UnsupportedHealthCheck {
                        backend: BACKEND,
                        kind,
                    });
                }
            }
            health_checks.push(mapped);
        }

        Ok(App {
            id: config.service_name().to_string(),
            cmd: assemble_command(config.entry_point(), config.command_line()),
            cpus: config.requested_cpu_units(),
            mem: config.requested_memory(),
            instances: config.requested_instances(),
            env: config
                .env_vars()
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
            labels: BTreeMap::from([(
                SERVICE_NAME_LABEL.to_string(),
                config.service_name().to_string(),
            )]),
            container: Some(AppContainer {
                kind: "DOCKER".to_string(),
                docker: Some(DockerContainer {
                    image: config.container_image().to_string(),
                    network: Some("BRIDGE".to_string()),
                    port_mappings: config
                        .container_ports()
                        .iter()
                        .map(|&container_port| PortMapping { container_port })
                        .collect(),
                }),
            }),
            health_checks,
            tasks: Vec::new(),
        })
    }

    /// App id for a service, as reported by Marathon when known
    fn app_id(&self, config: &ServiceConfig) -> String {
        self.app_ids
            .get(config.service_name())
            .map(|id| id.value().clone())
            .unwrap_or_else(|| config.service_name().to_string())
    }

    /// Check that `app` belongs to `config`, remember its id and list its tasks
    fn adopt(&self, app: &App, config: &ServiceConfig) -> Result<Vec<InstanceInfo>> {
        if app.labels.get(SERVICE_NAME_LABEL).map(String::as_str) != Some(config.service_name()) {
            return Err(Error::IllegalState(format!(
                "app {} does not carry label {}={}",
                app.id,
                SERVICE_NAME_LABEL,
                config.service_name()
            )));
        }

        self.app_ids
            .insert(config.service_name().to_string(), app.id.clone());
        Ok(instances(app, config))
    }
}

/// Entry point followed by the command line, single-quoting tokens that
/// contain whitespace
pub(crate) fn assemble_command(entry_point: Option<&str>, command_line: &[String]) -> Option<String> {
    let mut parts: Vec<String> = entry_point.map(str::to_string).into_iter().collect();
    parts.extend(command_line.iter().map(|token| {
        if token.chars().any(char::is_whitespace) {
            format!("'{token}'")
        } else {
            token.clone()
        }
    }));

    let cmd = parts.join(" ");
    (!cmd.is_empty()).then_some(cmd)
}

/// Pair declared container ports with reported host ports by position.
///
/// Marathon reports task ports in port mapping order without naming the
/// container port, so the i-th host port belongs to the i-th declared port.
/// Extra entries on either side are dropped.
pub(crate) fn correlate_ports(declared: &[u16], reported: &[u16]) -> BTreeMap<u16, u16> {
    declared.iter().copied().zip(reported.iter().copied()).collect()
}

fn instances(app: &App, config: &ServiceConfig) -> Vec<InstanceInfo> {
    app.tasks
        .iter()
        .map(|task| InstanceInfo {
            id: task.id.clone(),
            host: task.host.clone(),
            ports: correlate_ports(config.container_ports(), &task.ports),
        })
        .collect()
}

#[async_trait]
impl<C: MarathonApi> RuntimeAdapter for MarathonAdapter<C> {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn instance_tracking(&self) -> InstanceTracking {
        InstanceTracking::Backend
    }

    fn validate(&self, config: &ServiceConfig) -> Result<()> {
        Self::build_app(config).map(|_| ())
    }

    async fn discover(&self, config: &ServiceConfig) -> Result<Option<Vec<InstanceInfo>>> {
        let selector = format!("{}=={}", SERVICE_NAME_LABEL, config.service_name());
        let apps = self.client.list_apps(&selector).await?;

        match apps.as_slice() {
            [] => {
                debug!("No app found for service '{}'", config.service_name());
                Ok(None)
            }
            [app] => {
                info!(
                    "Found existing app {} for service '{}'",
                    app.id,
                    config.service_name()
                );
                self.adopt(app, config).map(Some)
            }
            _ => {
                let ids: Vec<&str> = apps.iter().map(|app| app.id.as_str()).collect();
                Err(Error::IllegalState(format!(
                    "more than one app found for service '{}': {:?}",
                    config.service_name(),
                    ids
                )))
            }
        }
    }

    async fn provision(&self, config: &ServiceConfig) -> Result<Vec<InstanceInfo>> {
        let app = Self::build_app(config)?;
        let created = self.client.create_app(&app).await?;
        info!(
            "Created app {} for service '{}' with {} instance(s)",
            created.id,
            config.service_name(),
            created.instances
        );
        self.adopt(&created, config)
    }

    async fn list_instances(&self, config: &ServiceConfig) -> Result<Vec<InstanceInfo>> {
        let app = self.client.get_app(&self.app_id(config)).await?;
        Ok(instances(&app, config))
    }

    async fn destroy_instance(&self, config: &ServiceConfig, id: &str) -> Result<()> {
        self.client.delete_task(&self.app_id(config), id, true).await?;
        info!(
            "Killed task {} of service '{}'",
            id,
            config.service_name()
        );
        Ok(())
    }

    async fn update_replica_count(&self, config: &ServiceConfig, count: u32) -> Result<()> {
        self.client.scale_app(&self.app_id(config), count).await?;
        info!(
            "Requested {} instance(s) of service '{}'",
            count,
            config.service_name()
        );
        Ok(())
    }

    async fn instance_count(&self, config: &ServiceConfig) -> Result<u32> {
        Ok(self.client.get_app(&self.app_id(config)).await?.instances)
    }

    async fn destroy_service(&self, config: &ServiceConfig) -> Result<()> {
        let app_id = self.app_id(config);
        self.client.delete_app(&app_id).await?;
        self.app_ids.remove(config.service_name());
        info!(
            "Deleted app {} of service '{}'",
            app_id,
            config.service_name()
        );
        Ok(())
    }

    async fn list_service_names(
        &self,
        _known_instances: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        let apps = self.client.list_apps(SERVICE_NAME_LABEL).await?;
        Ok(apps
            .into_iter()
            .filter_map(|mut app| app.labels.remove(SERVICE_NAME_LABEL))
            .filter(|name| !name.is_empty())
            .collect())
    }
}
