//! Container runtime client
//!
//! The session manager drives containers only through [`ContainerRuntime`]:
//! - Creating, starting and inspecting session containers
//! - Stopping and removing them on release
//! - Enumerating containers of an image for the admin API

mod docker;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use docker::DockerRuntime;

/// Errors reported by a container runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to connect to container runtime: {0}")]
    Connect(String),

    #[error("Container runtime {operation} failed: {message}")]
    Daemon {
        operation: &'static str,
        message: String,
    },
}

impl RuntimeError {
    pub fn daemon(operation: &'static str, err: impl std::fmt::Display) -> Self {
        RuntimeError::Daemon {
            operation,
            message: err.to_string(),
        }
    }
}

/// What to run for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub command: Vec<String>,
    /// Port the application listens on inside the container
    pub container_port: u16,
    /// Host port the container port is published on
    pub host_port: u16,
    pub labels: HashMap<String, String>,
}

/// Container as reported by the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    /// Name without the leading slash the daemon reports
    pub name: String,
    pub image: Option<String>,
    pub state: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Daemon version string
    async fn version(&self) -> Result<String, RuntimeError>;

    /// Running containers created from `image`
    async fn list_by_image(&self, image: &str) -> Result<Vec<ContainerInfo>, RuntimeError>;

    /// Create a container and return its id
    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    async fn start(&self, container_id: &str) -> Result<(), RuntimeError>;

    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo, RuntimeError>;

    async fn stop(&self, container_id: &str) -> Result<(), RuntimeError>;

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError>;
}

/// Strip the leading `/` docker puts in front of container names
pub(crate) fn route_name(raw: &str) -> &str {
    raw.strip_prefix('/').unwrap_or(raw)
}
