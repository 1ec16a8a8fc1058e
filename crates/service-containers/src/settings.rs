//! Manager settings: which backend to drive and how to reach it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Top-level settings for a [`ServiceManager`](crate::ServiceManager)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ManagerSettings {
    /// Backend selection and its parameters
    pub backend: BackendSettings,
}

/// Backend selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendSettings {
    /// Local Docker engine via the `docker` CLI
    Docker(DockerSettings),
    /// Marathon scheduler via REST
    Marathon(MarathonSettings),
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings::Docker(DockerSettings::default())
    }
}

/// Settings for the local Docker backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DockerSettings {
    /// Docker CLI binary
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,
    /// Host name under which containers are reachable. Resolved from the
    /// environment when unset.
    #[serde(default)]
    pub container_host: Option<String>,
    /// Upper bound for a single CLI invocation, in seconds
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Extra environment for every docker invocation, e.g. `DOCKER_HOST`
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            docker_binary: default_docker_binary(),
            container_host: None,
            command_timeout_secs: default_command_timeout_secs(),
            env: BTreeMap::new(),
        }
    }
}

impl DockerSettings {
    /// Command timeout as a [`Duration`]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Settings for the Marathon backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarathonSettings {
    /// Base URL of the Marathon API, e.g. `http://marathon.mesos:8080`
    pub url: String,
    /// Upper bound for a single request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// DC/OS credentials, if the cluster requires them
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl MarathonSettings {
    /// Settings for an unauthenticated Marathon at `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout_secs: default_request_timeout_secs(),
            credentials: None,
        }
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// DC/OS login credentials
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    /// User or service account id
    pub uid: String,
    /// Password for users, login token for service accounts
    pub secret: String,
    /// Whether `uid` names a service account
    #[serde(default)]
    pub service_account: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("uid", &self.uid)
            .field("secret", &"<redacted>")
            .field("service_account", &self.service_account)
            .finish()
    }
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_command_timeout_secs() -> u64 {
    120
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ManagerSettings {
    /// Load settings from a YAML (`.yaml`/`.yml`) or JSON file and validate them
    pub async fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use async_fs::File;
        use futures::io::AsyncReadExt;

        let mut file = File::open(path.as_ref()).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        let extension = path.as_ref().extension().and_then(|s| s.to_str());
        let settings: Self = if matches!(extension, Some("yaml") | Some("yml")) {
            serde_yaml::from_str(&contents)?
        } else {
            serde_json::from_str(&contents)?
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Settings for a Marathon backend at `url`
    pub fn marathon(url: impl Into<String>) -> Self {
        Self {
            backend: BackendSettings::Marathon(MarathonSettings::new(url)),
        }
    }

    /// Check values serde cannot check
    pub fn validate(&self) -> Result<()> {
        match &self.backend {
            BackendSettings::Docker(docker) => {
                if docker.docker_binary.trim().is_empty() {
                    return Err(Error::Config("docker_binary must not be empty".to_string()));
                }
                if docker.command_timeout_secs == 0 {
                    return Err(Error::Config(
                        "command_timeout_secs must be greater than zero".to_string(),
                    ));
                }
            }
            BackendSettings::Marathon(marathon) => {
                if marathon.url.trim().is_empty() {
                    return Err(Error::Config("marathon url must not be empty".to_string()));
                }
                if marathon.request_timeout_secs == 0 {
                    return Err(Error::Config(
                        "request_timeout_secs must be greater than zero".to_string(),
                    ));
                }
                if let Some(credentials) = &marathon.credentials
                    && credentials.uid.trim().is_empty()
                {
                    return Err(Error::Config("credentials uid must not be empty".to_string()));
                }
            }
        }
        Ok(())
    }
}
