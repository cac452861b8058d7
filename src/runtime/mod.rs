//! Process-execution interface to the container runtime.
//!
//! The lifecycle controller only talks to the runtime through
//! [`ContainerRuntime`]; [`crate::docker::DockerRuntime`] is the production
//! implementation.

mod error;

pub use error::RuntimeError;

use crate::definition::ServiceDefinition;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;

/// Opaque reference to a container created from a [`ServiceDefinition`].
///
/// Only the runtime mints handles. The controller owns the one live handle and
/// drops it after a confirmed teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    id: String,
    name: String,
}

impl ServiceHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Runtime-assigned container id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Container name (the conventional name from the definition).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shortened id for display, like `docker ps` shows it.
    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(12);
        self.id.get(..end).unwrap_or(&self.id)
    }
}

/// Result of inspecting a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContainerStatus {
    pub running: bool,
    pub exit_code: Option<i32>,
}

impl ContainerStatus {
    pub fn running() -> Self {
        Self {
            running: true,
            exit_code: None,
        }
    }

    pub fn exited(code: i32) -> Self {
        Self {
            running: false,
            exit_code: Some(code),
        }
    }
}

/// Container runtime operations used by the lifecycle controller.
///
/// Implementations must not retry or remediate on their own: a port conflict
/// or a failing command is reported as-is.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container for `definition`.
    async fn start(&self, definition: &ServiceDefinition) -> Result<ServiceHandle, RuntimeError>;

    /// Stop the container and remove it. Succeeds if it is already gone.
    async fn stop(&self, handle: &ServiceHandle) -> Result<(), RuntimeError>;

    /// Report whether the container is running and its exit code if not.
    async fn inspect(&self, handle: &ServiceHandle) -> Result<ContainerStatus, RuntimeError>;

    /// Delete the persistent volume. Only called once the container is gone.
    async fn remove_volume(&self, volume: &Path) -> Result<(), RuntimeError>;

    /// Find a container this tool created under `name`, running or not.
    /// Containers without the project label are not reported.
    async fn locate(&self, name: &str) -> Result<Option<ServiceHandle>, RuntimeError>;

    /// Print the container's output to the caller's stdout/stderr.
    async fn logs(
        &self,
        handle: &ServiceHandle,
        tail: Option<usize>,
        follow: bool,
    ) -> Result<(), RuntimeError>;
}
