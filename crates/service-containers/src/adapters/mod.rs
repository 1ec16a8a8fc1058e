//! Runtime adapters.
//!
//! A [`RuntimeAdapter`] is the only place that talks to a container runtime.
//! [`ServiceManager`](crate::ServiceManager) and [`Service`](crate::Service)
//! drive the reconciliation protocol purely through this trait, so both
//! backends share one implementation of get-or-create and scaling.

pub mod docker;
pub mod marathon;

pub use docker::DockerAdapter;
pub use marathon::MarathonAdapter;

use crate::{Error, Result, ServiceConfig};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

/// Label key tagging every managed container or app with its service name
pub const SERVICE_NAME_LABEL: &str = "containers.service.name";

/// A running instance as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    /// Runtime-assigned id (container id or task id)
    pub id: String,
    /// Host under which the instance's ports are reachable
    pub host: String,
    /// Container port to externally reachable port
    pub ports: BTreeMap<u16, u16>,
}

/// Where the authoritative list of a service's instances lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceTracking {
    /// The service keeps its own snapshot and reconciles instance by instance.
    /// `refresh` re-reads the backend.
    Snapshot,
    /// The backend tracks instances itself; every listing goes to the backend
    /// and scaling only updates the desired count.
    Backend,
}

/// A container runtime the reconciliation protocol can drive
#[async_trait]
pub trait RuntimeAdapter: Send + Sync + 'static {
    /// Short backend name used in logs and errors
    fn backend(&self) -> &'static str;

    /// How services on this backend track their instances
    fn instance_tracking(&self) -> InstanceTracking;

    /// Reject configurations this backend cannot express.
    ///
    /// Called before any instance is created.
    fn validate(&self, config: &ServiceConfig) -> Result<()>;

    /// Find instances already tagged with the service name.
    ///
    /// `None` means nothing exists for this service yet and it must be
    /// provisioned. `Some` may still be empty when the backend keeps a service
    /// object with zero instances.
    async fn discover(&self, config: &ServiceConfig) -> Result<Option<Vec<InstanceInfo>>>;

    /// Create the service's initial instances.
    ///
    /// Creates `requested_instances` instances one after the other and stops at
    /// the first failure; instances created before it stay running.
    async fn provision(&self, config: &ServiceConfig) -> Result<Vec<InstanceInfo>> {
        let mut instances = Vec::with_capacity(config.requested_instances() as usize);
        for _ in 0..config.requested_instances() {
            instances.push(self.create_instance(config).await?);
        }
        Ok(instances)
    }

    /// Launch one more instance of the service
    async fn create_instance(&self, _config: &ServiceConfig) -> Result<InstanceInfo> {
        Err(Error::Unsupported {
            backend: self.backend(),
            operation: "create_instance",
        })
    }

    /// Ask the backend for the instances currently running
    async fn list_instances(&self, config: &ServiceConfig) -> Result<Vec<InstanceInfo>>;

    /// Remove one instance
    async fn destroy_instance(&self, config: &ServiceConfig, id: &str) -> Result<()>;

    /// Set the desired instance count on the backend
    async fn update_replica_count(&self, _config: &ServiceConfig, _count: u32) -> Result<()> {
        Err(Error::Unsupported {
            backend: self.backend(),
            operation: "update_replica_count",
        })
    }

    /// Number of instances the backend reports for the service
    async fn instance_count(&self, config: &ServiceConfig) -> Result<u32>;

    /// Remove the whole service from the backend
    async fn destroy_service(&self, _config: &ServiceConfig) -> Result<()> {
        Err(Error::Unsupported {
            backend: self.backend(),
            operation: "destroy_service",
        })
    }

    /// Names of all managed services known to the backend.
    ///
    /// `known_instances` holds ids already accounted for by cached services;
    /// backends that inspect instance by instance may skip them.
    async fn list_service_names(&self, known_instances: &HashSet<String>)
    -> Result<HashSet<String>>;
}
