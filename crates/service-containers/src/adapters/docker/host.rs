//! Resolution of the host under which local containers are reachable.

use crate::Result;
use command_executor::{Command, Executor, LocalLauncher};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const DEFAULT_HOST: &str = "localhost";

/// Resolve the container host.
///
/// An explicit override wins. Otherwise, when `DOCKER_MACHINE_NAME` is set and
/// `docker-machine` is on `PATH`, the VM's address is asked from
/// `docker-machine ip`. Everything else means `localhost`.
pub(crate) async fn resolve_container_host(
    host_override: Option<&str>,
    timeout: Duration,
) -> Result<String> {
    if let Some(host) = host_override {
        return Ok(host.to_string());
    }

    let machine_name = std::env::var("DOCKER_MACHINE_NAME").ok();
    let path = std::env::var_os("PATH");
    let Some(vm) = docker_machine_vm(machine_name.as_deref(), path.as_deref()) else {
        return Ok(DEFAULT_HOST.to_string());
    };

    let executor = Executor::new("docker-machine", LocalLauncher).with_timeout(timeout);
    let command = Command::new("docker-machine").args(["ip", vm.as_str()]);
    let host = executor.run(command).await?.trim().to_string();
    info!("Using docker-machine '{}' at {} as container host", vm, host);
    Ok(host)
}

/// The docker-machine VM to query, if one is named and the tool is installed
fn docker_machine_vm(machine_name: Option<&str>, path: Option<&OsStr>) -> Option<String> {
    let name = machine_name.map(str::trim).filter(|name| !name.is_empty())?;
    let installed = std::env::split_paths(path?).any(|dir| has_docker_machine(&dir));
    installed.then(|| name.to_string())
}

fn has_docker_machine(dir: &Path) -> bool {
    dir.join("docker-machine").is_file()
}
