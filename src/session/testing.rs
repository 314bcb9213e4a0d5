//! In-memory collaborators for driving the session manager in tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::catalog::{AppDefinition, StaticCatalog};
use crate::runtime::{ContainerInfo, ContainerRuntime, ContainerSpec, RuntimeError};

use super::{ListenerHub, ManagerSettings, MappingListener, ProbePolicy, ReadinessProbe, SessionManager};

/// Runtime that records every call in a journal
#[derive(Default)]
pub struct FakeRuntime {
    next_id: AtomicU32,
    containers: Mutex<HashMap<String, ContainerInfo>>,
    journal: Mutex<Vec<String>>,
    pub fail_create: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_stop: AtomicBool,
    /// Makes every stop take this long
    pub stop_delay: Mutex<Duration>,
}

impl FakeRuntime {
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.journal
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    /// Containers created and not yet removed
    pub fn live(&self) -> usize {
        self.containers.lock().unwrap().len()
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn version(&self) -> Result<String, RuntimeError> {
        Ok("fake-1.0".to_string())
    }

    async fn list_by_image(&self, image: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let mut containers: Vec<_> = self
            .containers
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.image.as_deref() == Some(image))
            .cloned()
            .collect();
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(containers)
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        self.record(format!("create {}@{}", spec.image, spec.host_port));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(RuntimeError::daemon("create", "no such image"));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("c{}", n);
        self.containers.lock().unwrap().insert(
            id.clone(),
            ContainerInfo {
                id: id.clone(),
                name: format!("route_{}", n),
                image: Some(spec.image.clone()),
                state: Some("created".to_string()),
            },
        );
        Ok(id)
    }

    async fn start(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.record(format!("start {}", container_id));
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(RuntimeError::daemon("start", "port is already allocated"));
        }
        if let Some(c) = self.containers.lock().unwrap().get_mut(container_id) {
            c.state = Some("running".to_string());
        }
        Ok(())
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo, RuntimeError> {
        self.containers
            .lock()
            .unwrap()
            .get(container_id)
            .cloned()
            .ok_or_else(|| RuntimeError::daemon("inspect", "no such container"))
    }

    async fn stop(&self, container_id: &str) -> Result<(), RuntimeError> {
        let delay = *self.stop_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.record(format!("stop {}", container_id));
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(RuntimeError::daemon("stop", "daemon unavailable"));
        }
        Ok(())
    }

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.record(format!("remove {}", container_id));
        self.containers.lock().unwrap().remove(container_id);
        Ok(())
    }
}

/// Prober whose answer is set by the test
pub struct ScriptedProber {
    pub ready: AtomicBool,
    pub delay: Duration,
    pub calls: AtomicU32,
}

impl ScriptedProber {
    pub fn ready() -> Self {
        Self {
            ready: AtomicBool::new(true),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub fn never_ready() -> Self {
        let prober = Self::ready();
        prober.ready.store(false, Ordering::SeqCst);
        prober
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::ready()
        }
    }
}

#[async_trait]
impl ReadinessProbe for ScriptedProber {
    async fn probe(&self, _target: &Url, _policy: &ProbePolicy, cancel: &CancellationToken) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        self.ready.load(Ordering::SeqCst)
    }
}

/// Listener journaling "+route target" / "-route"
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl MappingListener for RecordingListener {
    async fn on_mapping_added(&self, route_name: &str, target: &Url) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("+{} {}", route_name, target));
        Ok(())
    }

    async fn on_mapping_removed(&self, route_name: &str) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(format!("-{}", route_name));
        Ok(())
    }
}

/// Listener that errors, or panics, on every call
pub struct BrokenListener {
    pub panics: bool,
}

#[async_trait]
impl MappingListener for BrokenListener {
    async fn on_mapping_added(&self, route_name: &str, _target: &Url) -> anyhow::Result<()> {
        if self.panics {
            panic!("listener crashed adding {}", route_name);
        }
        anyhow::bail!("listener rejected {}", route_name)
    }

    async fn on_mapping_removed(&self, route_name: &str) -> anyhow::Result<()> {
        if self.panics {
            panic!("listener crashed removing {}", route_name);
        }
        anyhow::bail!("listener rejected removal of {}", route_name)
    }
}

pub fn app(name: &str) -> AppDefinition {
    AppDefinition {
        name: name.to_string(),
        display_name: None,
        description: None,
        image: format!("{}:latest", name),
        command: vec!["R".to_string(), "-e".to_string(), format!("shiny::runApp('/apps/{}')", name)],
    }
}

pub fn settings() -> ManagerSettings {
    ManagerSettings {
        container_host: "localhost".to_string(),
        container_port: 3838,
        port_range_start: 20000,
        image_name: "demo:latest".to_string(),
        probe: ProbePolicy {
            max_attempts: 3,
            interval: Duration::from_millis(1),
            request_timeout: Duration::from_millis(10),
        },
    }
}

pub fn manager_with(
    settings: ManagerSettings,
    runtime: Arc<dyn ContainerRuntime>,
    prober: Arc<dyn ReadinessProbe>,
) -> Arc<SessionManager> {
    let catalog = Arc::new(StaticCatalog::new(vec![app("demo"), app("other")]));
    Arc::new(SessionManager::new(
        settings,
        catalog,
        runtime,
        prober,
        Arc::new(ListenerHub::new()),
    ))
}

pub fn manager(runtime: &Arc<FakeRuntime>, prober: &Arc<ScriptedProber>) -> Arc<SessionManager> {
    manager_with(settings(), runtime.clone(), prober.clone())
}
