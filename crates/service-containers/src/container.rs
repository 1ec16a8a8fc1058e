//! Handle to a single running container.

use crate::adapters::InstanceInfo;
use crate::service::{Service, ServiceInner};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Weak;
use tracing::warn;

/// One running container (or scheduler task) of a [`Service`]
///
/// The handle only looks its service up; holding a container never keeps the
/// service alive.
#[derive(Clone)]
pub struct Container {
    id: String,
    host: String,
    ports: BTreeMap<u16, u16>,
    service: Weak<ServiceInner>,
}

impl Container {
    pub(crate) fn new(info: InstanceInfo, service: Weak<ServiceInner>) -> Self {
        Self {
            id: info.id,
            host: info.host,
            ports: info.ports,
            service,
        }
    }

    /// Runtime-assigned id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Host under which the exposed ports are reachable
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Declared container port to externally reachable port.
    ///
    /// A declared port missing here was not bound and is unavailable.
    pub fn exposed_ports(&self) -> &BTreeMap<u16, u16> {
        &self.ports
    }

    /// External port for one container port
    pub fn exposed_port(&self, container_port: u16) -> Option<u16> {
        self.ports.get(&container_port).copied()
    }

    /// The owning service, if it is still alive
    pub fn service(&self) -> Option<Service> {
        self.service.upgrade().map(Service::from_inner)
    }

    /// Remove this container from its service.
    ///
    /// Failures are logged and otherwise ignored; use
    /// [`Service::remove_container`] to observe them.
    pub async fn destroy(&self) {
        let Some(service) = self.service() else {
            warn!("Cannot destroy container {}: its service is gone", self.id);
            return;
        };

        if let Err(e) = service.remove_container(&self.id).await {
            warn!(
                "Problem destroying container {} of service '{}': {}",
                self.id,
                service.name(),
                e
            );
        }
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.host == other.host && self.ports == other.ports
    }
}

impl Eq for Container {}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let service = self.service();
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("ports", &self.ports)
            .field("service", &service.as_ref().map(Service::name))
            .finish()
    }
}
