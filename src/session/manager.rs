//! Session lifecycle: start, verify, publish, release

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use futures::FutureExt;
use reqwest::Url;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::{AppCatalog, AppDefinition};
use crate::config::AppConfig;
use crate::metrics;
use crate::runtime::{ContainerInfo, ContainerRuntime, ContainerSpec, RuntimeError};

use super::listeners::{ListenerHub, MappingListener};
use super::ports::PortAllocator;
use super::probe::{ProbePolicy, ReadinessProbe};
use super::registry::SessionRegistry;
use super::teardown::{ExecutorStopped, TeardownExecutor, TeardownTask};
use super::{Session, SessionError, SessionState};

/// Placement and probing parameters
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Address at which published container ports are reachable
    pub container_host: String,
    /// Port the application listens on inside its container
    pub container_port: u16,
    pub port_range_start: u16,
    /// Image reported by [`SessionManager::list_runtime_containers`]
    pub image_name: String,
    pub probe: ProbePolicy,
}

impl ManagerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            container_host: config.docker.host.clone(),
            container_port: config.docker.container_port,
            port_range_start: config.docker.port_range_start,
            image_name: config.docker.image_name.clone(),
            probe: config.probe.policy(),
        }
    }
}

/// Owns every session and the resources bound to it
pub struct SessionManager {
    settings: ManagerSettings,
    catalog: Arc<dyn AppCatalog>,
    runtime: Arc<dyn ContainerRuntime>,
    prober: Arc<dyn ReadinessProbe>,
    registry: Arc<SessionRegistry>,
    ports: Arc<PortAllocator>,
    listeners: Arc<ListenerHub>,
    teardown: TeardownExecutor,
    /// Serializes runtime-mutating calls
    runtime_lock: Arc<Mutex<()>>,
    accepting: AtomicBool,
    /// Fired on shutdown to abort in-flight readiness probes
    stopping: CancellationToken,
}

impl SessionManager {
    /// Build a manager; must be called inside a tokio runtime
    pub fn new(
        settings: ManagerSettings,
        catalog: Arc<dyn AppCatalog>,
        runtime: Arc<dyn ContainerRuntime>,
        prober: Arc<dyn ReadinessProbe>,
        listeners: Arc<ListenerHub>,
    ) -> Self {
        let ports = Arc::new(PortAllocator::new(settings.port_range_start));

        Self {
            settings,
            catalog,
            runtime,
            prober,
            registry: Arc::new(SessionRegistry::new()),
            ports,
            listeners,
            teardown: TeardownExecutor::new(),
            runtime_lock: Arc::new(Mutex::new(())),
            accepting: AtomicBool::new(true),
            stopping: CancellationToken::new(),
        }
    }

    /// Route name of the user's session for `app_name`, starting one if needed
    ///
    /// The start runs on its own task: a caller that stops waiting leaves a session
    /// that finishes starting (or fails and cleans up) rather than a stuck slot.
    pub async fn get_mapping(
        self: &Arc<Self>,
        user_name: &str,
        app_name: &str,
    ) -> Result<String, SessionError> {
        let manager = Arc::clone(self);
        let user_name = user_name.to_string();
        let app_name = app_name.to_string();

        run_detached(async move { manager.resolve_mapping(&user_name, &app_name).await })
            .await
            .unwrap_or(Err(SessionError::ShuttingDown))
    }

    async fn resolve_mapping(&self, user_name: &str, app_name: &str) -> Result<String, SessionError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(SessionError::ShuttingDown);
        }

        let app = self
            .catalog
            .lookup(app_name)
            .ok_or_else(|| SessionError::UnknownApplication(app_name.to_string()))?;

        if let Some(existing) = self.registry.find(user_name).await {
            if existing.app_name == app.name {
                return Ok(existing.route_name);
            }

            // Keep the user's slot claimed from release until the new start
            if self.registry.hand_over(&existing).await {
                info!(
                    user = %user_name,
                    from = %existing.app_name,
                    to = %app.name,
                    "Switching application"
                );
                self.retire(existing, false).await;
                self.registry.mark(user_name, SessionState::Starting).await;
                return self.start_reserved(user_name, &app).await;
            }
        }

        self.registry.reserve(user_name).await?;
        self.start_reserved(user_name, &app).await
    }

    /// Release the user's session; returns false if there was none
    ///
    /// An inline release completes even if the caller stops waiting.
    pub async fn release_session(self: &Arc<Self>, user_name: &str, asynchronous: bool) -> bool {
        let session = match self.registry.find(user_name).await {
            Some(session) => session,
            None => return false,
        };

        let manager = Arc::clone(self);
        run_detached(async move { manager.release(session, asynchronous).await })
            .await
            .unwrap_or(false)
    }

    /// Release every session and stop the teardown worker
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.stopping.cancel();

        let sessions = self.registry.snapshot().await;
        info!(count = sessions.len(), "Releasing all sessions");

        for session in sessions {
            self.release(session, false).await;
        }

        self.teardown.drain_and_stop().await;
    }

    /// Copies of all active sessions
    pub async fn list_sessions(&self) -> Vec<Session> {
        self.registry.snapshot().await
    }

    /// Users whose session is still starting
    pub async fn pending_starts(&self) -> Vec<(String, SessionState)> {
        self.registry.pending().await
    }

    pub async fn active_session_count(&self) -> u64 {
        self.registry.len().await as u64
    }

    /// Running containers of the configured image, managed or not
    pub async fn list_runtime_containers(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
        self.runtime.list_by_image(&self.settings.image_name).await
    }

    pub async fn runtime_version(&self) -> Option<String> {
        self.runtime.version().await.ok()
    }

    pub async fn subscribe(&self, listener: Arc<dyn MappingListener>) {
        self.listeners.subscribe(listener).await;
    }

    pub async fn unsubscribe(&self, listener: &Arc<dyn MappingListener>) -> bool {
        self.listeners.unsubscribe(listener).await
    }

    pub fn catalog(&self) -> &Arc<dyn AppCatalog> {
        &self.catalog
    }

    pub fn ports(&self) -> &Arc<PortAllocator> {
        &self.ports
    }

    /// Address published for a container bound to `port`
    pub fn target_address(&self, port: u16) -> anyhow::Result<Url> {
        let raw = format!("http://{}:{}", self.settings.container_host, port);
        Url::parse(&raw).with_context(|| format!("Invalid container address {}", raw))
    }

    /// Run a start for a user whose slot is already reserved
    async fn start_reserved(&self, user_name: &str, app: &AppDefinition) -> Result<String, SessionError> {
        let started = Instant::now();

        match self.launch(user_name, app).await {
            Ok(session) => {
                metrics::record_session_started(&app.name, started.elapsed().as_secs_f64());

                // Shutdown may have snapshotted the registry before this session landed
                if !self.accepting.load(Ordering::SeqCst) {
                    self.release(session, false).await;
                    return Err(SessionError::ShuttingDown);
                }

                Ok(session.route_name)
            }
            Err(e) => {
                self.registry.cancel(user_name).await;
                metrics::record_start_failure(&app.name, e.kind());
                warn!(user = %user_name, app = %app.name, error = %e, "Session start failed");
                Err(e)
            }
        }
    }

    async fn launch(&self, user_name: &str, app: &AppDefinition) -> Result<Session, SessionError> {
        let port = self.ports.allocate().await?;

        let container = match self.create_container(user_name, app, port).await {
            Ok(container) => container,
            Err(e) => {
                self.ports.release(port).await;
                return Err(SessionError::ContainerStart(e));
            }
        };

        let session = Session::new(user_name, app.name.as_str(), container.name, container.id, port);
        debug!(
            user = %user_name,
            route = %session.route_name,
            port,
            "Container started, probing"
        );

        self.registry.mark(user_name, SessionState::Probing).await;

        if !self.wait_until_ready(&session).await {
            metrics::record_probe_failure(&app.name);
            let route_name = session.route_name.clone();
            self.teardown.run_inline(self.teardown_task(session)).await;
            return Err(SessionError::ReadinessTimeout {
                route_name,
                attempts: self.settings.probe.max_attempts,
            });
        }

        // The container works; an unusable address only costs the announcement
        match self.target_address(port) {
            Ok(target) => self.listeners.publish(&session.route_name, &target).await,
            Err(e) => error!(route = %session.route_name, error = %e, "Route not published"),
        }

        self.registry.activate(session.clone()).await;

        info!(
            user = %session.user_name,
            app = %session.app_name,
            port = session.port,
            route = %session.route_name,
            "Session activated"
        );

        Ok(session)
    }

    /// Create, start and inspect as one unit under the runtime lock
    async fn create_container(
        &self,
        user_name: &str,
        app: &AppDefinition,
        port: u16,
    ) -> Result<ContainerInfo, RuntimeError> {
        let spec = ContainerSpec {
            image: app.image.clone(),
            command: app.command.clone(),
            container_port: self.settings.container_port,
            host_port: port,
            labels: HashMap::from([
                ("sessiond.user".to_string(), user_name.to_string()),
                ("sessiond.app".to_string(), app.name.clone()),
            ]),
        };

        let _guard = self.runtime_lock.lock().await;

        let container_id = self.runtime.create(&spec).await?;

        let started = match self.runtime.start(&container_id).await {
            Ok(()) => self.runtime.inspect(&container_id).await,
            Err(e) => Err(e),
        };

        match started {
            Ok(info) => Ok(ContainerInfo {
                id: container_id,
                ..info
            }),
            Err(e) => {
                // Never leave a half-started container behind
                if let Err(cleanup) = self.runtime.stop(&container_id).await {
                    debug!(container_id = %container_id, error = %cleanup, "Failed to stop container after start failure");
                }
                if let Err(cleanup) = self.runtime.remove(&container_id).await {
                    warn!(container_id = %container_id, error = %cleanup, "Failed to remove container after start failure");
                }
                Err(e)
            }
        }
    }

    async fn wait_until_ready(&self, session: &Session) -> bool {
        match self.target_address(session.port) {
            Ok(target) => {
                self.prober
                    .probe(&target, &self.settings.probe, &self.stopping)
                    .await
            }
            Err(e) => {
                error!(route = %session.route_name, error = %e, "Cannot probe container");
                false
            }
        }
    }

    /// Remove from the registry, then withdraw and tear down
    async fn release(&self, session: Session, asynchronous: bool) -> bool {
        if !self.registry.remove(&session).await {
            debug!(user = %session.user_name, "Session already released");
            return false;
        }
        self.retire(session, asynchronous).await;
        true
    }

    /// Withdraw the route and tear the container down
    async fn retire(&self, session: Session, asynchronous: bool) {
        self.listeners.withdraw(&session.route_name).await;
        metrics::record_session_released(&session.app_name);

        let task = self.teardown_task(session);
        if asynchronous {
            if let Err(ExecutorStopped(task)) = self.teardown.submit(task).await {
                debug!("Teardown executor stopped, releasing inline");
                self.teardown.run_inline(task).await;
            }
        } else {
            self.teardown.run_inline(task).await;
        }
    }

    fn teardown_task(&self, session: Session) -> TeardownTask {
        let runtime = self.runtime.clone();
        let runtime_lock = self.runtime_lock.clone();
        let ports = self.ports.clone();

        async move {
            match teardown_container(runtime.as_ref(), &runtime_lock, &ports, &session).await {
                Ok(()) => info!(
                    user = %session.user_name,
                    app = %session.app_name,
                    port = session.port,
                    "Session released"
                ),
                Err(e) => {
                    metrics::record_teardown_failure();
                    error!(
                        user = %session.user_name,
                        route = %session.route_name,
                        error = %e,
                        "Container teardown failed"
                    );
                }
            }
        }
        .boxed()
    }
}

/// Drive `task` on its own tokio task so it completes even if the caller goes away
///
/// Panics resume on the caller; `None` means the runtime cancelled the task.
async fn run_detached<F>(task: F) -> Option<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match tokio::spawn(task).await {
        Ok(output) => Some(output),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            warn!(error = %e, "Session task cancelled");
            None
        }
    }
}

/// Stop and remove the container, then free its port whatever the outcome
async fn teardown_container(
    runtime: &dyn ContainerRuntime,
    runtime_lock: &Mutex<()>,
    ports: &PortAllocator,
    session: &Session,
) -> Result<(), SessionError> {
    let _guard = runtime_lock.lock().await;

    let stopped = runtime.stop(&session.container_id).await;
    let removed = runtime.remove(&session.container_id).await;
    ports.release(session.port).await;

    stopped.and(removed).map_err(|source| SessionError::Teardown {
        container_id: session.container_id.clone(),
        source,
    })
}
