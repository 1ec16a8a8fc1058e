//! Runtime view of a managed service.

use crate::adapters::{InstanceInfo, InstanceTracking, RuntimeAdapter};
use crate::{Container, Result, ServiceConfig};
use futures::lock::Mutex;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// A service and the containers backing it
///
/// Cloning is cheap; clones share the same state. The container list is a
/// copy-on-write snapshot: readers get an `Arc` to an immutable vector that
/// later scaling never mutates in place.
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

pub(crate) struct ServiceInner {
    config: ServiceConfig,
    adapter: Arc<dyn RuntimeAdapter>,
    containers: RwLock<Arc<Vec<Container>>>,
    /// Serializes scale, refresh, destroy and container removal
    scaling: Mutex<()>,
}

impl Service {
    pub(crate) fn new(
        config: ServiceConfig,
        adapter: Arc<dyn RuntimeAdapter>,
        instances: Vec<InstanceInfo>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak| {
            let containers = instances
                .into_iter()
                .map(|info| Container::new(info, weak.clone()))
                .collect();
            ServiceInner {
                config,
                adapter,
                containers: RwLock::new(Arc::new(containers)),
                scaling: Mutex::new(()),
            }
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<ServiceInner>) -> Self {
        Self { inner }
    }

    /// Service name
    pub fn name(&self) -> &str {
        self.inner.config.service_name()
    }

    /// The configuration this service was created from
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Whether both handles refer to the same service
    pub fn ptr_eq(&self, other: &Service) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Last known containers, oldest first
    pub fn containers(&self) -> Arc<Vec<Container>> {
        self.inner
            .containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current containers.
    ///
    /// Backends that track instances themselves are asked every time; the
    /// answer also becomes the new snapshot.
    pub async fn list_containers(&self) -> Result<Arc<Vec<Container>>> {
        match self.inner.adapter.instance_tracking() {
            InstanceTracking::Snapshot => Ok(self.containers()),
            InstanceTracking::Backend => {
                let instances = self.inner.adapter.list_instances(self.config()).await?;
                let containers = Arc::new(self.wrap(instances));
                self.replace(containers.clone());
                Ok(containers)
            }
        }
    }

    /// Converge to `count` containers.
    ///
    /// With a local snapshot, excess containers are removed oldest first and
    /// missing ones are created one by one. An error stops the loop; work done
    /// before it is kept and reflected in the snapshot.
    pub async fn set_instance_count(&self, count: u32) -> Result<()> {
        let _guard = self.inner.scaling.lock().await;
        self.scale_locked(count).await
    }

    /// Discard the snapshot and rebuild it from the backend.
    ///
    /// A no-op for backends that track instances themselves. On failure the
    /// snapshot stays empty.
    pub async fn refresh(&self) -> Result<()> {
        if self.inner.adapter.instance_tracking() == InstanceTracking::Backend {
            return Ok(());
        }

        let _guard = self.inner.scaling.lock().await;
        self.replace(Arc::new(Vec::new()));

        let instances = self.inner.adapter.list_instances(self.config()).await?;
        debug!(
            "Refreshed service '{}': {} container(s)",
            self.name(),
            instances.len()
        );
        self.replace(Arc::new(self.wrap(instances)));
        Ok(())
    }

    /// Take the service down.
    ///
    /// Scales to zero locally; on scheduler backends the whole app is deleted.
    /// The handle stays usable and can be scaled up again.
    pub async fn destroy(&self) -> Result<()> {
        let _guard = self.inner.scaling.lock().await;
        match self.inner.adapter.instance_tracking() {
            InstanceTracking::Snapshot => self.scale_locked(0).await,
            InstanceTracking::Backend => {
                self.inner.adapter.destroy_service(self.config()).await?;
                self.replace(Arc::new(Vec::new()));
                Ok(())
            }
        }
    }

    /// Number of instances according to the backend
    pub async fn actual_instance_count(&self) -> Result<u32> {
        self.inner.adapter.instance_count(self.config()).await
    }

    /// Remove one container and drop it from the snapshot
    pub async fn remove_container(&self, id: &str) -> Result<()> {
        let _guard = self.inner.scaling.lock().await;
        self.inner.adapter.destroy_instance(self.config(), id).await?;
        self.update(|containers| containers.retain(|c| c.id() != id));
        Ok(())
    }

    async fn scale_locked(&self, count: u32) -> Result<()> {
        let adapter = &self.inner.adapter;
        if adapter.instance_tracking() == InstanceTracking::Backend {
            return adapter.update_replica_count(self.config(), count).await;
        }

        let current = self.containers();
        let target = count as usize;
        info!(
            "Scaling service '{}' from {} to {} container(s)",
            self.name(),
            current.len(),
            target
        );

        if target < current.len() {
            for container in &current[..current.len() - target] {
                adapter.destroy_instance(self.config(), container.id()).await?;
                self.update(|containers| containers.retain(|c| c.id() != container.id()));
            }
        } else if target > current.len() {
            adapter.validate(self.config())?;
            for _ in current.len()..target {
                let info = adapter.create_instance(self.config()).await?;
                let container = Container::new(info, Arc::downgrade(&self.inner));
                self.update(|containers| containers.push(container));
            }
        }
        Ok(())
    }

    fn wrap(&self, instances: Vec<InstanceInfo>) -> Vec<Container> {
        instances
            .into_iter()
            .map(|info| Container::new(info, Arc::downgrade(&self.inner)))
            .collect()
    }

    fn replace(&self, containers: Arc<Vec<Container>>) {
        *self
            .inner
            .containers
            .write()
            .unwrap_or_else(PoisonError::into_inner) = containers;
    }

    /// Copy-on-write mutation: readers holding the old snapshot keep it
    fn update(&self, mutate: impl FnOnce(&mut Vec<Container>)) {
        let mut guard = self
            .inner
            .containers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        mutate(Arc::make_mut(&mut *guard));
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name())
            .field("backend", &self.inner.adapter.backend())
            .field("containers", &self.containers().len())
            .finish()
    }
}
