//! Docker/Podman API backed runtime

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::models::{HostConfig, PortBinding};
use bollard::{Docker, API_DEFAULT_VERSION};
use tracing::{debug, info};

use crate::config::DockerConfig;

use super::{route_name, ContainerInfo, ContainerRuntime, ContainerSpec, RuntimeError};

/// Runtime talking to a Docker-compatible daemon
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect according to the configured URL and certificate directory
    pub fn connect(config: &DockerConfig) -> Result<Self, RuntimeError> {
        let timeout = config.timeout_secs;
        let url = config.url.trim();

        let docker = match (&config.cert_path, url) {
            (None, "") => Docker::connect_with_local_defaults(),
            (Some(_), "") => {
                return Err(RuntimeError::Connect(
                    "a TLS certificate path requires docker.url".to_string(),
                ))
            }
            (Some(certs), url) => Docker::connect_with_ssl(
                url,
                &certs.join("key.pem"),
                &certs.join("cert.pem"),
                &certs.join("ca.pem"),
                timeout,
                API_DEFAULT_VERSION,
            ),
            #[cfg(unix)]
            (None, url) if url.starts_with("unix://") => {
                Docker::connect_with_unix(url, timeout, API_DEFAULT_VERSION)
            }
            (None, url) => Docker::connect_with_http(url, timeout, API_DEFAULT_VERSION),
        }
        .map_err(|e| RuntimeError::Connect(e.to_string()))?;

        info!(
            url = if url.is_empty() { "local defaults" } else { url },
            tls = config.cert_path.is_some(),
            "Container runtime client configured"
        );

        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn version(&self) -> Result<String, RuntimeError> {
        let version = self
            .docker
            .version()
            .await
            .map_err(|e| RuntimeError::daemon("version", e))?;

        Ok(version.version.unwrap_or_else(|| "unknown".to_string()))
    }

    async fn list_by_image(&self, image: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(|e| RuntimeError::daemon("list", e))?;

        let containers = summaries
            .into_iter()
            .filter(|summary| summary.image.as_deref() == Some(image))
            .map(|summary| {
                let id = summary.id.unwrap_or_default();
                let name = summary
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|name| route_name(&name).to_string())
                    .unwrap_or_else(|| id.clone());
                ContainerInfo {
                    id,
                    name,
                    image: summary.image,
                    state: summary.state,
                }
            })
            .collect();

        Ok(containers)
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let exposed = format!("{}/tcp", spec.container_port);

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            exposed.clone(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.host_port.to_string()),
            }]),
        );

        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(exposed, HashMap::new());

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: if spec.command.is_empty() {
                None
            } else {
                Some(spec.command.clone())
            },
            labels: Some(spec.labels.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        debug!(image = %spec.image, host_port = spec.host_port, "Creating container");

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| RuntimeError::daemon("create", e))?;

        Ok(response.id)
    }

    async fn start(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::daemon("start", e))
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo, RuntimeError> {
        let response = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| RuntimeError::daemon("inspect", e))?;

        let id = response.id.unwrap_or_else(|| container_id.to_string());
        let name = response
            .name
            .map(|name| route_name(&name).to_string())
            .unwrap_or_else(|| id.clone());

        Ok(ContainerInfo {
            id,
            name,
            image: response.config.and_then(|config| config.image),
            state: response
                .state
                .and_then(|state| state.running)
                .map(|running| if running { "running" } else { "exited" }.to_string()),
        })
    }

    async fn stop(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(container_id, None::<StopContainerOptions>)
            .await
            .map_err(|e| RuntimeError::daemon("stop", e))
    }

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(container_id, None::<RemoveContainerOptions>)
            .await
            .map_err(|e| RuntimeError::daemon("remove", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_requires_url() {
        let config = DockerConfig {
            cert_path: Some("/etc/docker/certs".into()),
            ..DockerConfig::default()
        };
        assert!(matches!(
            DockerRuntime::connect(&config),
            Err(RuntimeError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_http_client_is_lazy() {
        // Connecting only builds the client; no request is made
        let config = DockerConfig {
            url: "http://127.0.0.1:2375".to_string(),
            ..DockerConfig::default()
        };
        assert!(DockerRuntime::connect(&config).is_ok());
    }
}
