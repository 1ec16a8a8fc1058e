//! Process-wide service registry.
//!
//! The manager maps service names to live [`Service`] handles and owns the
//! get-or-create decision: cached handle, else discovered instances, else new
//! instances.

use crate::adapters::{DockerAdapter, MarathonAdapter, RuntimeAdapter};
use crate::{BackendSettings, ManagerSettings, Result, Service, ServiceConfig};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Registry of the services managed by this process
///
/// Entries are added on first [`get_service`](ServiceManager::get_service) and
/// never evicted; destroying a service leaves its handle cached.
///
/// Two tasks resolving the same, never seen name at the same moment may both
/// run discovery and both create instances. Only one handle ends up cached.
pub struct ServiceManager {
    adapter: Arc<dyn RuntimeAdapter>,
    services: DashMap<String, Service>,
}

impl ServiceManager {
    /// Create a manager over a runtime adapter
    pub fn new(adapter: impl RuntimeAdapter) -> Self {
        Self::with_adapter(Arc::new(adapter))
    }

    /// Create a manager over a shared runtime adapter
    pub fn with_adapter(adapter: Arc<dyn RuntimeAdapter>) -> Self {
        info!("Initializing ServiceManager for the {} backend", adapter.backend());
        Self {
            adapter,
            services: DashMap::new(),
        }
    }

    /// Create a manager for the backend selected in `settings`
    pub async fn from_settings(settings: &ManagerSettings) -> Result<Self> {
        settings.validate()?;
        match &settings.backend {
            BackendSettings::Docker(docker) => {
                Ok(Self::new(DockerAdapter::from_settings(docker).await?))
            }
            BackendSettings::Marathon(marathon) => {
                Ok(Self::new(MarathonAdapter::from_settings(marathon)?))
            }
        }
    }

    /// Create a manager for the local docker CLI with default settings
    pub async fn docker() -> Result<Self> {
        Self::from_settings(&ManagerSettings::default()).await
    }

    /// The runtime adapter services are reconciled against
    pub fn adapter(&self) -> &Arc<dyn RuntimeAdapter> {
        &self.adapter
    }

    /// Get the service for `config`, adopting or creating its instances.
    ///
    /// A cached handle is returned as is. Otherwise the backend is searched for
    /// instances labelled with the service name and, only if there are none,
    /// `requested_instances` new ones are created. Creation stops at the first
    /// failure; instances created before it are left running and nothing is
    /// cached.
    pub async fn get_service(&self, config: &ServiceConfig) -> Result<Service> {
        if let Some(service) = self.cached(config.service_name()) {
            return Ok(service);
        }

        let instances = match self.adapter.discover(config).await? {
            Some(instances) => {
                info!(
                    "Adopted service '{}' with {} existing instance(s)",
                    config.service_name(),
                    instances.len()
                );
                instances
            }
            None => {
                self.adapter.validate(config)?;
                let instances = self.adapter.provision(config).await?;
                info!(
                    "Created service '{}' with {} instance(s)",
                    config.service_name(),
                    instances.len()
                );
                instances
            }
        };

        let service = Service::new(config.clone(), self.adapter.clone(), instances);
        let cached = self
            .services
            .entry(config.service_name().to_string())
            .or_insert(service)
            .clone();
        Ok(cached)
    }

    /// A cached service, without touching the backend
    pub fn cached(&self, name: &str) -> Option<Service> {
        self.services.get(name).map(|entry| entry.value().clone())
    }

    /// Names of all managed services: cached ones plus any the backend knows
    /// about, e.g. created by an earlier process
    pub async fn list_services(&self) -> Result<HashSet<String>> {
        let mut names = HashSet::new();
        let mut known_instances = HashSet::new();

        let cached: Vec<Service> = self.services.iter().map(|e| e.value().clone()).collect();
        for service in cached {
            names.insert(service.name().to_string());
            known_instances.extend(service.containers().iter().map(|c| c.id().to_string()));
        }

        names.extend(self.adapter.list_service_names(&known_instances).await?);
        Ok(names)
    }
}
