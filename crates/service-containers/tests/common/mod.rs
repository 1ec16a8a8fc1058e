//! In-memory stand-ins for the docker CLI and the Marathon API

#![allow(dead_code)]

use async_trait::async_trait;
use command_executor::{Command, ExitResult, ExitStatus, Launcher};
use service_containers::adapters::docker::DockerController;
use service_containers::adapters::marathon::MarathonApi;
use service_containers::adapters::marathon::model::{App, Task};
use service_containers::adapters::{DockerAdapter, MarathonAdapter};
use service_containers::{Error, SERVICE_NAME_LABEL, ServiceManager};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A container known to [`FakeDocker`]
#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub labels: BTreeMap<String, String>,
    pub ports: BTreeMap<u16, u16>,
    pub created: String,
}

#[derive(Default)]
struct DockerState {
    next_id: u32,
    clock: u32,
    containers: Vec<FakeContainer>,
    commands: Vec<Vec<String>>,
    envs: Vec<BTreeMap<String, String>>,
    runs_allowed: Option<usize>,
    inspect_output: Option<String>,
}

/// A [`Launcher`] that behaves like the docker CLI against an in-memory engine
#[derive(Clone, Default)]
pub struct FakeDocker {
    state: Arc<Mutex<DockerState>>,
}

impl FakeDocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager driving this fake
    pub fn manager(&self) -> ServiceManager {
        ServiceManager::new(self.adapter())
    }

    /// An adapter driving this fake
    pub fn adapter(&self) -> DockerAdapter<FakeDocker> {
        self.adapter_with_env(BTreeMap::new())
    }

    /// An adapter passing `env` to every docker invocation
    pub fn adapter_with_env(&self, env: BTreeMap<String, String>) -> DockerAdapter<FakeDocker> {
        DockerAdapter::new(
            DockerController::new("docker", self.clone(), Duration::from_secs(5)).with_env(env),
            "localhost",
        )
    }

    /// Add a container as if an earlier process had started it
    pub fn seed(&self, id: &str, service_name: &str, ports: &[(u16, u16)]) {
        let mut state = self.state.lock().unwrap();
        let created = state.tick();
        state.containers.push(FakeContainer {
            id: id.to_string(),
            labels: BTreeMap::from([(SERVICE_NAME_LABEL.to_string(), service_name.to_string())]),
            ports: ports.iter().copied().collect(),
            created,
        });
    }

    pub fn containers(&self) -> Vec<FakeContainer> {
        self.state.lock().unwrap().containers.clone()
    }

    pub fn container_ids(&self) -> Vec<String> {
        self.containers().into_iter().map(|c| c.id).collect()
    }

    /// Every command received, without the program name
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Commands for one docker subcommand, without the subcommand itself
    pub fn commands_for(&self, subcommand: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|args| args.first().map(String::as_str) == Some(subcommand))
            .map(|args| args[1..].to_vec())
            .collect()
    }

    /// Environment each command was started with, in command order
    pub fn envs(&self) -> Vec<BTreeMap<String, String>> {
        self.state.lock().unwrap().envs.clone()
    }

    pub fn clear_commands(&self) {
        let mut state = self.state.lock().unwrap();
        state.commands.clear();
        state.envs.clear();
    }

    /// Let `n` more `docker run` calls succeed, fail every one after
    pub fn fail_runs_after(&self, n: usize) {
        self.state.lock().unwrap().runs_allowed = Some(n);
    }

    /// Print `json` for every `docker inspect`
    pub fn set_inspect_output(&self, json: &str) {
        self.state.lock().unwrap().inspect_output = Some(json.to_string());
    }
}

impl DockerState {
    /// Creation time of the next container. Fractions are trimmed like
    /// docker does, so string order differs from time order.
    fn tick(&mut self) -> String {
        self.clock += 1;
        let second = self.clock / 2;
        let fraction = if self.clock % 2 == 0 { "1" } else { "12" };
        format!(
            "2024-05-01T10:{:02}:{:02}.{fraction}Z",
            second / 60 % 60,
            second % 60
        )
    }

    fn handle(&mut self, args: &[String]) -> (i32, String, String) {
        match args.first().map(String::as_str) {
            Some("run") => self.run(&args[1..]),
            Some("ps") => self.ps(&args[1..]),
            Some("inspect") => self.inspect(&args[1..]),
            Some("rm") => self.remove(args.last()),
            Some("kill") => match args.last() {
                Some(id) if self.find(id).is_some() => (0, format!("{id}\n"), String::new()),
                _ => (1, String::new(), "Error: No such container".to_string()),
            },
            _ => (125, String::new(), format!("unknown command {args:?}")),
        }
    }

    fn run(&mut self, args: &[String]) -> (i32, String, String) {
        if let Some(allowed) = self.runs_allowed.as_mut() {
            if *allowed == 0 {
                return (125, String::new(), "docker: no space left on device".to_string());
            }
            *allowed -= 1;
        }

        let mut labels = BTreeMap::new();
        let mut ports = BTreeMap::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-d" => {}
                "-l" => {
                    if let Some((k, v)) = iter.next().and_then(|l| l.split_once('=')) {
                        labels.insert(k.to_string(), v.to_string());
                    }
                }
                "-p" => {
                    if let Some((host, container)) = iter.next().and_then(|p| p.split_once(':')) {
                        ports.insert(container.parse().unwrap(), host.parse().unwrap());
                    }
                }
                flag if flag.starts_with('-') => {
                    iter.next();
                }
                _ => break,
            }
        }

        self.next_id += 1;
        let id = format!("{:012x}", 0xc0ffee000 + self.next_id as u64);
        let created = self.tick();
        self.containers.push(FakeContainer {
            id: id.clone(),
            labels,
            ports,
            created,
        });
        (0, format!("{id}\n"), String::new())
    }

    fn ps(&self, args: &[String]) -> (i32, String, String) {
        let filter = args
            .iter()
            .find_map(|a| a.strip_prefix("label="))
            .unwrap_or_default();
        let (key, value) = match filter.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (filter, None),
        };

        // Newest first, like docker
        let ids: Vec<&str> = self
            .containers
            .iter()
            .rev()
            .filter(|c| match (c.labels.get(key), value) {
                (Some(actual), Some(wanted)) => actual == wanted,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .map(|c| c.id.as_str())
            .collect();

        let mut stdout = ids.join("\n");
        if !stdout.is_empty() {
            stdout.push('\n');
        }
        (0, stdout, String::new())
    }

    fn inspect(&self, ids: &[String]) -> (i32, String, String) {
        if let Some(output) = &self.inspect_output {
            return (0, output.clone(), String::new());
        }

        let entries: Vec<serde_json::Value> = ids
            .iter()
            .filter_map(|id| self.find(id))
            .map(|c| {
                let ports: serde_json::Map<String, serde_json::Value> = c
                    .ports
                    .iter()
                    .map(|(container, host)| {
                        (
                            format!("{container}/tcp"),
                            serde_json::json!([{"HostIp": "0.0.0.0", "HostPort": host.to_string()}]),
                        )
                    })
                    .collect();
                serde_json::json!({
                    "Id": c.id,
                    "Created": c.created,
                    "Config": {"Labels": c.labels},
                    "NetworkSettings": {"Ports": ports},
                })
            })
            .collect();

        (0, serde_json::to_string_pretty(&entries).unwrap(), String::new())
    }

    fn remove(&mut self, id: Option<&String>) -> (i32, String, String) {
        match id.and_then(|id| self.containers.iter().position(|c| &c.id == id)) {
            Some(index) => {
                let removed = self.containers.remove(index);
                (0, format!("{}\n", removed.id), String::new())
            }
            None => (1, String::new(), "Error: No such container".to_string()),
        }
    }

    fn find(&self, id: &str) -> Option<&FakeContainer> {
        self.containers.iter().find(|c| c.id == id)
    }
}

#[async_trait]
impl Launcher for FakeDocker {
    async fn execute(&self, command: Command) -> command_executor::Result<ExitResult> {
        let args = command.argv()[1..].to_vec();
        let mut state = self.state.lock().unwrap();
        state.commands.push(args.clone());
        state.envs.push(command.environment().clone());

        let (code, stdout, stderr) = state.handle(&args);
        Ok(ExitResult {
            status: ExitStatus::exited(code),
            stdout,
            stderr,
        })
    }
}

#[derive(Default)]
struct MarathonState {
    apps: Vec<App>,
    requests: Vec<String>,
    next_task: u32,
    drop_labels: bool,
}

/// A [`MarathonApi`] keeping apps in memory and recording every request
#[derive(Clone, Default)]
pub struct FakeMarathon {
    state: Arc<Mutex<MarathonState>>,
}

impl FakeMarathon {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager driving this fake
    pub fn manager(&self) -> ServiceManager {
        ServiceManager::new(MarathonAdapter::new(self.clone()))
    }

    /// Add an app as if it had been deployed before
    pub fn seed_app(&self, app: App) {
        self.state.lock().unwrap().apps.push(app);
    }

    pub fn apps(&self) -> Vec<App> {
        self.state.lock().unwrap().apps.clone()
    }

    pub fn app(&self, id: &str) -> Option<App> {
        let id = normalize(id);
        self.apps().into_iter().find(|app| app.id == id)
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Create apps without the labels they were submitted with
    pub fn drop_labels_on_create(&self) {
        self.state.lock().unwrap().drop_labels = true;
    }
}

fn normalize(id: &str) -> String {
    format!("/{}", id.trim_start_matches('/'))
}

fn not_found(id: &str) -> Error {
    Error::Scheduler {
        status: 404,
        body: format!(r#"{{"message":"App '{id}' does not exist"}}"#),
    }
}

impl MarathonState {
    fn launch_task(&mut self, app_id: &str, port_count: usize) -> Task {
        self.next_task += 1;
        let base = 31000 + (self.next_task as u16) * 10;
        Task {
            id: format!("{}.task{}", app_id.trim_start_matches('/'), self.next_task),
            host: "agent-1".to_string(),
            ports: (0..port_count as u16).map(|i| base + i).collect(),
        }
    }

    fn app_mut(&mut self, id: &str) -> Option<&mut App> {
        let id = normalize(id);
        self.apps.iter_mut().find(|app| app.id == id)
    }
}

fn port_count(app: &App) -> usize {
    app.container
        .as_ref()
        .and_then(|c| c.docker.as_ref())
        .map(|d| d.port_mappings.len())
        .unwrap_or_default()
}

#[async_trait]
impl MarathonApi for FakeMarathon {
    async fn list_apps(&self, label_selector: &str) -> service_containers::Result<Vec<App>> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!("GET /v2/apps?label={label_selector}"));

        let (key, value) = match label_selector.split_once("==") {
            Some((k, v)) => (k, Some(v)),
            None => (label_selector, None),
        };
        Ok(state
            .apps
            .iter()
            .filter(|app| match (app.labels.get(key), value) {
                (Some(actual), Some(wanted)) => actual == wanted,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .cloned()
            .collect())
    }

    async fn create_app(&self, app: &App) -> service_containers::Result<App> {
        let mut state = self.state.lock().unwrap();
        state.requests.push("POST /v2/apps".to_string());

        let mut created = app.clone();
        created.id = normalize(&app.id);
        if state.drop_labels {
            created.labels.clear();
        }
        let ports = port_count(&created);
        created.tasks = (0..created.instances)
            .map(|_| state.launch_task(&created.id, ports))
            .collect();
        state.apps.push(created.clone());
        Ok(created)
    }

    async fn get_app(&self, app_id: &str) -> service_containers::Result<App> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!("GET /v2/apps/{}", app_id.trim_start_matches('/')));
        state.app_mut(app_id).map(|app| app.clone()).ok_or_else(|| not_found(app_id))
    }

    async fn scale_app(&self, app_id: &str, instances: u32) -> service_containers::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!(
            "PUT /v2/apps/{}?force=true {{\"instances\":{instances}}}",
            app_id.trim_start_matches('/')
        ));

        let (id, ports, running) = {
            let app = state.app_mut(app_id).ok_or_else(|| not_found(app_id))?;
            app.instances = instances;
            app.tasks.truncate(instances as usize);
            (app.id.clone(), port_count(app), app.tasks.len())
        };
        let launched: Vec<Task> = (running..instances as usize)
            .map(|_| state.launch_task(&id, ports))
            .collect();
        if let Some(app) = state.app_mut(app_id) {
            app.tasks.extend(launched);
        }
        Ok(())
    }

    async fn delete_app(&self, app_id: &str) -> service_containers::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!("DELETE /v2/apps/{}", app_id.trim_start_matches('/')));

        let id = normalize(app_id);
        let before = state.apps.len();
        state.apps.retain(|app| app.id != id);
        if state.apps.len() == before {
            return Err(not_found(app_id));
        }
        Ok(())
    }

    async fn delete_task(
        &self,
        app_id: &str,
        task_id: &str,
        scale: bool,
    ) -> service_containers::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!(
            "DELETE /v2/apps/{}/tasks/{task_id}?scale={scale}",
            app_id.trim_start_matches('/')
        ));

        let app = state.app_mut(app_id).ok_or_else(|| not_found(app_id))?;
        app.tasks.retain(|task| task.id != task_id);
        if scale {
            app.instances = app.instances.saturating_sub(1);
        }
        Ok(())
    }
}

/// An app as Marathon would report it for `service_name`
pub fn existing_app(service_name: &str, container_ports: &[u16], tasks: Vec<Task>) -> App {
    use service_containers::adapters::marathon::model::{AppContainer, DockerContainer, PortMapping};

    App {
        id: normalize(service_name),
        instances: tasks.len() as u32,
        labels: BTreeMap::from([(SERVICE_NAME_LABEL.to_string(), service_name.to_string())]),
        container: Some(AppContainer {
            kind: "DOCKER".to_string(),
            docker: Some(DockerContainer {
                image: "img".to_string(),
                network: Some("BRIDGE".to_string()),
                port_mappings: container_ports
                    .iter()
                    .map(|&container_port| PortMapping { container_port })
                    .collect(),
            }),
        }),
        tasks,
        ..App::default()
    }
}

pub fn task(id: &str, host: &str, ports: &[u16]) -> Task {
    Task {
        id: id.to_string(),
        host: host.to_string(),
        ports: ports.to_vec(),
    }
}
