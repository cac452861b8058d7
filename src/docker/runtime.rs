use super::DockerClient;
use crate::definition::{ServiceDefinition, PROJECT_LABEL};
use crate::runtime::{ContainerRuntime, ContainerStatus, RuntimeError, ServiceHandle};
use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::time::Duration;

/// [`ContainerRuntime`] over the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    client: DockerClient,
    timeout: Duration,
    stop_grace: Duration,
}

impl DockerRuntime {
    pub fn new(timeout: Duration, stop_grace: Duration) -> Self {
        Self {
            client: DockerClient::new(),
            timeout,
            stop_grace,
        }
    }

    pub fn client(&self) -> &DockerClient {
        &self.client
    }

    /// Remove a container this runtime created, by id.
    async fn discard(&self, id: &str) {
        if let Err(e) = self.client.rm_force(id, self.timeout).await {
            tracing::warn!("Failed to remove container {} after failed start: {}", id, e);
        }
    }

    /// Remove a never-started container left by a timed-out `docker create`.
    ///
    /// Only a `created` container carrying this project's label qualifies.
    async fn discard_unstarted(&self, name: &str, project: &str) {
        match self
            .client
            .container_summary(name, PROJECT_LABEL, self.timeout)
            .await
        {
            Ok(Some(found)) if found.status == "created" && found.label == project => {
                self.discard(&found.id).await
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not check for a leftover {}: {}", name, e),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn start(&self, definition: &ServiceDefinition) -> Result<ServiceHandle, RuntimeError> {
        let project = definition
            .labels()
            .get(PROJECT_LABEL)
            .map(String::as_str)
            .unwrap_or_default();
        let label = format!("{}={}", PROJECT_LABEL, project);
        self.client
            .ensure_network(definition.network(), &label, self.timeout)
            .await?;

        let name = definition.container_name();
        let port = definition.port().host;
        let args = definition.render_create_args();
        let secrets: Vec<(&str, &str)> = definition.secret_env().collect();

        let output = match self.client.create(&args, &secrets, self.timeout).await {
            Ok(output) => output,
            Err(e @ RuntimeError::Timeout { .. }) => {
                // The daemon may still have created it after the CLI was killed
                self.discard_unstarted(name, project).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        if !output.status.success() {
            // Nothing was created, so nothing is cleaned up. On a name
            // conflict the existing container belongs to someone else.
            return Err(RuntimeError::classify_run_failure(
                format!("docker {}", args.join(" ")),
                &output,
                name,
                port,
            ));
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        match self.client.start(&id, self.timeout).await {
            Ok(output) if output.status.success() => Ok(ServiceHandle::new(id, name)),
            Ok(output) => {
                self.discard(&id).await;
                Err(RuntimeError::classify_run_failure(
                    format!("docker start {}", name),
                    &output,
                    name,
                    port,
                ))
            }
            Err(e) => {
                self.discard(&id).await;
                Err(e)
            }
        }
    }

    async fn stop(&self, handle: &ServiceHandle) -> Result<(), RuntimeError> {
        self.client
            .stop_and_remove(handle.id(), self.stop_grace, self.timeout)
            .await
    }

    async fn inspect(&self, handle: &ServiceHandle) -> Result<ContainerStatus, RuntimeError> {
        self.client
            .inspect_state(handle.id(), self.timeout)
            .await?
            .ok_or_else(|| RuntimeError::ContainerNotFound {
                container: handle.name().to_string(),
            })
    }

    async fn remove_volume(&self, volume: &Path) -> Result<(), RuntimeError> {
        match tokio::fs::remove_dir_all(volume).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RuntimeError::VolumeRemoval {
                volume: volume.display().to_string(),
                source: e,
            }),
        }
    }

    async fn locate(&self, name: &str) -> Result<Option<ServiceHandle>, RuntimeError> {
        match self
            .client
            .container_summary(name, PROJECT_LABEL, self.timeout)
            .await?
        {
            Some(found) if !found.label.is_empty() => Ok(Some(ServiceHandle::new(found.id, name))),
            Some(_) => {
                tracing::warn!("Ignoring container {}: it was not created by dbkeeper", name);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn logs(
        &self,
        handle: &ServiceHandle,
        tail: Option<usize>,
        follow: bool,
    ) -> Result<(), RuntimeError> {
        self.client.stream_logs(handle.id(), tail, follow).await
    }
}
