//! Test doubles for the container runtime and readiness probe.
#![allow(dead_code)]

use async_trait::async_trait;
use dbkeeper::config::{keys, MapSource};
use dbkeeper::healthcheck::HealthChecker;
use dbkeeper::lifecycle::AuditTrail;
use dbkeeper::runtime::ContainerStatus;
use dbkeeper::{
    ConfigResolver, Configuration, ContainerRuntime, LifecycleController, RuntimeError,
    ServiceDefinition, ServiceHandle,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// What a [`FakeRuntime::start`] call was asked to launch.
#[derive(Debug, Clone)]
pub struct Launch {
    pub definition: ServiceDefinition,
    pub init_mounted: bool,
}

/// In-memory container runtime.
///
/// A started container "initializes" an empty volume the way the engine image
/// does: it creates the marker directory inside it.
#[derive(Default)]
pub struct FakeRuntime {
    pub launches: Mutex<Vec<Launch>>,
    pub stops: AtomicU32,
    pub removed_volumes: Mutex<Vec<PathBuf>>,
    /// Set if a volume was removed while a container was still up
    pub removed_while_running: AtomicBool,
    running: Mutex<Option<ServiceHandle>>,
    next_id: AtomicU32,
    /// Report this port as already bound on the next start
    pub port_conflict: Mutex<Option<u16>>,
    /// Fail every stop call
    pub fail_stop: AtomicBool,
    /// Exit code the container reports once it dies on its own
    pub crash_exit_code: Mutex<Option<i32>>,
    /// Container left behind by an earlier process
    pub existing: Mutex<Option<(ServiceHandle, bool)>>,
    /// Report the container name as taken by someone else on every start
    pub name_taken: AtomicBool,
    /// Keep `start` busy this long after the container is already up
    pub slow_start: Mutex<Option<Duration>>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().len()
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Bring up a container under `name` that no controller knows about.
    pub fn spawn_untracked(&self, name: &str) -> ServiceHandle {
        let handle = ServiceHandle::new("deadbeef0001", name);
        *self.running.lock() = Some(handle.clone());
        handle
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn start(&self, definition: &ServiceDefinition) -> Result<ServiceHandle, RuntimeError> {
        if let Some(port) = self.port_conflict.lock().take() {
            return Err(RuntimeError::PortConflict {
                port,
                stderr: format!(
                    "Bind for 0.0.0.0:{} failed: port is already allocated",
                    port
                ),
            });
        }

        if self.name_taken.load(Ordering::SeqCst) {
            return Err(RuntimeError::NameConflict {
                container: definition.container_name().to_string(),
                stderr: format!(
                    "Conflict. The container name \"/{}\" is already in use by container \"deadbeef0001\".",
                    definition.container_name()
                ),
            });
        }

        self.launches.lock().push(Launch {
            definition: definition.clone(),
            init_mounted: definition.init_mount().is_some(),
        });
        std::fs::create_dir_all(definition.volume().join("mysql"))
            .map_err(|e| RuntimeError::exec_failed("docker run", e))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = ServiceHandle::new(format!("c0ffee{:06}", id), definition.container_name());
        *self.running.lock() = Some(handle.clone());

        let delay = *self.slow_start.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(handle)
    }

    async fn stop(&self, handle: &ServiceHandle) -> Result<(), RuntimeError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(RuntimeError::cmd_failed(
                format!("docker stop {}", handle.name()),
                "Error response from daemon: cannot stop container",
                Some(1),
            ));
        }
        self.running.lock().take();
        self.existing.lock().take();
        Ok(())
    }

    async fn inspect(&self, handle: &ServiceHandle) -> Result<ContainerStatus, RuntimeError> {
        if let Some((existing, running)) = self.existing.lock().clone() {
            if existing.id() == handle.id() {
                return Ok(if running {
                    ContainerStatus::running()
                } else {
                    ContainerStatus::exited(0)
                });
            }
        }
        match self.running.lock().as_ref() {
            Some(current) if current.id() == handle.id() => {
                Ok(match *self.crash_exit_code.lock() {
                    Some(code) => ContainerStatus::exited(code),
                    None => ContainerStatus::running(),
                })
            }
            _ => Err(RuntimeError::ContainerNotFound {
                container: handle.name().to_string(),
            }),
        }
    }

    async fn remove_volume(&self, volume: &Path) -> Result<(), RuntimeError> {
        if self.running.lock().is_some() {
            self.removed_while_running.store(true, Ordering::SeqCst);
        }
        match std::fs::remove_dir_all(volume) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RuntimeError::VolumeRemoval {
                    volume: volume.display().to_string(),
                    source: e,
                })
            }
        }
        self.removed_volumes.lock().push(volume.to_path_buf());
        Ok(())
    }

    async fn locate(&self, name: &str) -> Result<Option<ServiceHandle>, RuntimeError> {
        let existing = self
            .existing
            .lock()
            .as_ref()
            .filter(|(handle, _)| handle.name() == name)
            .map(|(handle, _)| handle.clone());
        if existing.is_some() {
            return Ok(existing);
        }
        Ok(self
            .running
            .lock()
            .as_ref()
            .filter(|handle| handle.name() == name)
            .cloned())
    }

    async fn logs(
        &self,
        _handle: &ServiceHandle,
        _tail: Option<usize>,
        _follow: bool,
    ) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Probe that becomes ready on a given attempt, or never.
pub struct ScriptedProbe {
    ready_on: Option<u32>,
    pub calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn ready_on(attempt: u32) -> Arc<Self> {
        Arc::new(Self {
            ready_on: Some(attempt),
            calls: AtomicU32::new(0),
        })
    }

    pub fn never() -> Arc<Self> {
        Arc::new(Self {
            ready_on: None,
            calls: AtomicU32::new(0),
        })
    }

    pub fn attempts(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthChecker for ScriptedProbe {
    async fn check(&self) -> dbkeeper::Result<bool> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(self.ready_on.is_some_and(|n| call >= n))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn describe(&self) -> String {
        "scripted probe".to_string()
    }
}

/// Configuration rooted in `dir`, with fast readiness polling.
pub fn config_in(dir: &TempDir, extra: &[(&str, &str)]) -> Configuration {
    let mut pairs = vec![
        (keys::ROOT_PASSWORD, "r00t-pw"),
        (keys::DATABASE, "shop"),
        (keys::USER, "shop_app"),
        (keys::PASSWORD, "app-pw"),
        (keys::PROJECT, "shop"),
        (keys::HEALTH_RETRIES, "3"),
        (keys::HEALTH_INTERVAL, "5ms"),
    ];
    pairs.extend_from_slice(extra);
    ConfigResolver::new(dir.path())
        .resolve(&MapSource::from_pairs(pairs))
        .expect("test configuration resolves")
}

pub fn controller(
    config: &Configuration,
    runtime: &Arc<FakeRuntime>,
    probe: &Arc<ScriptedProbe>,
) -> Arc<LifecycleController> {
    Arc::new(LifecycleController::with_audit(
        config,
        Arc::clone(runtime) as Arc<dyn ContainerRuntime>,
        Arc::clone(probe) as Arc<dyn HealthChecker>,
        AuditTrail::in_memory(config.container_name()),
    ))
}

/// Create the engine marker so the volume classifies as initialized.
pub fn seed_initialized_volume(config: &Configuration) {
    std::fs::create_dir_all(config.data_dir().join("mysql")).expect("seed volume");
}
