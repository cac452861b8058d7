use super::audit::{AuditTrail, TransitionRecord};
use super::{LifecycleState, Operation};
use crate::config::{Configuration, HealthSettings};
use crate::definition::{self, ServiceDefinition};
use crate::error::{Error, Result, VolumeError};
use crate::healthcheck::{check_with_retry, HealthChecker, RetryOutcome};
use crate::runtime::{ContainerRuntime, RuntimeError, ServiceHandle};
use crate::volume::{VolumeInitGate, VolumeState};
use parking_lot::{Mutex as SyncMutex, RwLock};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use LifecycleState::{Failed, Running, Starting, Stopped, Stopping};

/// Explicit consent to delete a volume, naming the volume it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeConfirmation {
    volume: PathBuf,
}

impl PurgeConfirmation {
    pub fn for_volume(volume: impl Into<PathBuf>) -> Self {
        Self {
            volume: volume.into(),
        }
    }

    pub fn volume(&self) -> &Path {
        &self.volume
    }
}

/// Point-in-time view of the managed service.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub service: String,
    pub state: LifecycleState,
    pub container_id: Option<String>,
    /// Exit code of a container that exists but is not running
    pub exit_code: Option<i32>,
    pub image: String,
    pub port: u16,
    pub volume: PathBuf,
    pub volume_state: Option<VolumeState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_error: Option<String>,
    pub last_transition: Option<TransitionRecord>,
}

/// Published state, readable without waiting for a transition to finish.
#[derive(Debug, Clone)]
struct Snapshot {
    state: LifecycleState,
    handle: Option<ServiceHandle>,
}

/// Data only touched while holding the transition lock.
#[derive(Debug, Default)]
struct Guarded {
    /// Volume classification observed at the last successful start or attach
    last_volume: Option<VolumeState>,
}

/// Drives the database container through its lifecycle.
///
/// At most one transition runs at a time: `start`, `stop`, `restart` and
/// `destroy` serialize on an async mutex. `stop`, `restart` and `destroy`
/// cancel a pending startup before queueing on that mutex, so a stop issued
/// while readiness polling is in progress does not wait for the whole retry
/// budget.
pub struct LifecycleController {
    definition: ServiceDefinition,
    runtime: Arc<dyn ContainerRuntime>,
    probe: Arc<dyn HealthChecker>,
    gate: VolumeInitGate,
    health: HealthSettings,
    runtime_timeout: Duration,
    audit: AuditTrail,
    transition_lock: Mutex<Guarded>,
    snapshot: RwLock<Snapshot>,
    startup: SyncMutex<CancellationToken>,
}

impl LifecycleController {
    /// Controller that appends its audit trail to the configured file.
    pub fn new(
        config: &Configuration,
        runtime: Arc<dyn ContainerRuntime>,
        probe: Arc<dyn HealthChecker>,
    ) -> Self {
        let audit = AuditTrail::with_file(config.container_name(), config.audit_log());
        Self::with_audit(config, runtime, probe, audit)
    }

    pub fn with_audit(
        config: &Configuration,
        runtime: Arc<dyn ContainerRuntime>,
        probe: Arc<dyn HealthChecker>,
        audit: AuditTrail,
    ) -> Self {
        Self {
            definition: definition::build(config),
            runtime,
            probe,
            gate: VolumeInitGate::for_engine(config.engine()),
            health: *config.health(),
            runtime_timeout: config.runtime_timeout(),
            audit,
            transition_lock: Mutex::new(Guarded::default()),
            snapshot: RwLock::new(Snapshot {
                state: Stopped,
                handle: None,
            }),
            startup: SyncMutex::new(CancellationToken::new()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.snapshot.read().state
    }

    pub fn handle(&self) -> Option<ServiceHandle> {
        self.snapshot.read().handle.clone()
    }

    /// Definition as built from the configuration, before volume tailoring.
    pub fn definition(&self) -> &ServiceDefinition {
        &self.definition
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn volume_state(&self) -> Result<VolumeState> {
        Ok(self.gate.classify(self.definition.volume())?)
    }

    /// Adopt a container left behind by an earlier process.
    ///
    /// Only acts on a fresh controller. A running container puts the
    /// controller in `RUNNING`; an exited one leaves it `STOPPED` holding the
    /// stale handle, which the next start or stop removes.
    pub async fn attach(&self) -> Result<LifecycleState> {
        let mut guard = self.transition_lock.lock().await;
        if self.state() != Stopped || self.handle().is_some() {
            return Ok(self.state());
        }

        let name = self.definition.container_name();
        let Some(handle) = self
            .bounded("docker inspect", self.runtime.locate(name))
            .await?
        else {
            return Ok(Stopped);
        };
        let status = self
            .bounded("docker inspect", self.runtime.inspect(&handle))
            .await?;
        let state = if status.running { Running } else { Stopped };

        tracing::debug!(
            container = %handle.short_id(),
            exit_code = ?status.exit_code,
            "Attached to existing {} as {}",
            name,
            state
        );
        *self.snapshot.write() = Snapshot {
            state,
            handle: Some(handle),
        };
        guard.last_volume = self.gate.classify(self.definition.volume()).ok();
        Ok(state)
    }

    /// `STOPPED|FAILED -> STARTING -> RUNNING`. A no-op when already running.
    pub async fn start(&self) -> Result<()> {
        let cancel = self.startup.lock().clone();
        let mut guard = self.transition_lock.lock().await;
        self.start_locked(&mut guard, Operation::Up, &cancel).await
    }

    /// `RUNNING|STARTING|FAILED -> STOPPING -> STOPPED`.
    pub async fn stop(&self) -> Result<()> {
        self.preempt_startup();
        let _guard = self.transition_lock.lock().await;
        self.stop_locked(Operation::Down).await
    }

    /// `RUNNING|STARTING -> STOPPING -> STARTING -> RUNNING`.
    ///
    /// Initialization never runs again: the volume is expected to still be
    /// initialized, and a volume that lost its marker is an error rather than
    /// a reason to re-run first-boot scripts. From `STOPPED` or `FAILED` this
    /// is a plain start.
    pub async fn restart(&self) -> Result<()> {
        let op = Operation::Restart;
        let cancel = self.preempt_startup();
        let mut guard = self.transition_lock.lock().await;

        if matches!(self.state(), Running | Starting) {
            self.transition(op, Stopping, None)?;
            if let Err(e) = self.halt().await {
                self.transition(op, Failed, Some(e.to_string()))?;
                return Err(e.during(op, Stopping, Starting));
            }
        }
        self.start_locked(&mut guard, op, &cancel).await
    }

    /// Stop the service, then delete its volume.
    ///
    /// The volume is removed only after the container, including one running
    /// under the conventional name without being tracked, is confirmed gone.
    /// If stopping fails nothing is deleted.
    ///
    /// # Errors
    ///
    /// [`Error::PurgeNotConfirmed`] if `confirmation` names another volume.
    pub async fn destroy(&self, confirmation: &PurgeConfirmation) -> Result<()> {
        let op = Operation::Purge;
        let volume = self.definition.volume();
        if confirmation.volume() != volume {
            return Err(Error::PurgeNotConfirmed(volume.to_path_buf()));
        }

        self.preempt_startup();
        let mut guard = self.transition_lock.lock().await;
        self.stop_locked(op).await?;
        // Nothing may still mount the volume, tracked or not
        self.halt().await?;

        let state = self.state();
        if state != Stopped || self.handle().is_some() {
            return Err(Error::InvalidTransition {
                operation: op,
                state,
            });
        }

        self.bounded("remove volume", self.runtime.remove_volume(volume))
            .await?;
        guard.last_volume = None;
        self.audit.record(
            op,
            Stopped,
            Stopped,
            Some(format!("volume {} removed", volume.display())),
        );
        tracing::warn!("Deleted volume {}", volume.display());
        Ok(())
    }

    pub async fn report(&self) -> Result<StatusReport> {
        let snapshot = self.snapshot.read().clone();

        let exit_code = match (&snapshot.handle, snapshot.state) {
            (Some(handle), state) if state != Running => self
                .bounded("docker inspect", self.runtime.inspect(handle))
                .await
                .ok()
                .and_then(|status| status.exit_code),
            _ => None,
        };

        let (volume_state, volume_error) = match self.volume_state() {
            Ok(state) => (Some(state), None),
            Err(e) => (None, Some(e.to_string())),
        };

        let last_transition = match self.audit.sink() {
            Some(path) => AuditTrail::read_file(path)?
                .into_iter()
                .rfind(|r| r.service == self.definition.container_name()),
            None => self.audit.records().pop(),
        };

        Ok(StatusReport {
            service: self.definition.container_name().to_string(),
            state: snapshot.state,
            container_id: snapshot.handle.map(|h| h.short_id().to_string()),
            exit_code,
            image: self.definition.image().to_string(),
            port: self.definition.port().host,
            volume: self.definition.volume().to_path_buf(),
            volume_state,
            volume_error,
            last_transition,
        })
    }

    /// Stream the current container's output.
    pub async fn logs(&self, tail: Option<usize>, follow: bool) -> Result<()> {
        let handle = self.handle().ok_or_else(|| RuntimeError::ContainerNotFound {
            container: self.definition.container_name().to_string(),
        })?;
        Ok(self.runtime.logs(&handle, tail, follow).await?)
    }

    // ========================================================================
    // Transitions (transition lock held)
    // ========================================================================

    async fn start_locked(
        &self,
        guard: &mut Guarded,
        op: Operation,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let from = self.state();
        match from {
            Running => {
                tracing::info!("{} is already running", self.definition.container_name());
                return Ok(());
            }
            Starting => {
                return Err(Error::InvalidTransition {
                    operation: op,
                    state: from,
                })
            }
            Stopped | Stopping | Failed => {}
        }

        if cancel.is_cancelled() {
            if from == Stopping {
                self.transition(op, Stopped, Some("startup superseded".into()))?;
            }
            return Err(Error::Cancelled(format!(
                "{} superseded by a later stop request",
                op
            )));
        }

        self.transition(op, Starting, None)?;
        match self.boot(guard, op, cancel).await {
            Ok(()) => self.transition(op, Running, None),
            Err(e @ Error::Cancelled(_)) => Err(e.during(op, Starting, Running)),
            Err(e) => Err(self.roll_back(op, e).await),
        }
    }

    /// Everything between `STARTING` and `RUNNING`.
    async fn boot(
        &self,
        guard: &mut Guarded,
        op: Operation,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let volume = self.definition.volume();
        let volume_state = self.gate.classify(volume)?;

        if op == Operation::Restart
            && guard.last_volume == Some(VolumeState::Initialized)
            && volume_state == VolumeState::Empty
        {
            return Err(VolumeError::new(
                volume,
                "was initialized before the restart but no longer contains the engine marker",
            )
            .into());
        }

        let definition = self.definition.for_volume(volume_state);
        match (volume_state, definition.init_mount()) {
            (VolumeState::Empty, Some(mount)) => tracing::info!(
                "Volume is empty; initialization scripts from {} will run once",
                mount.source.display()
            ),
            (VolumeState::Empty, None) => {
                tracing::info!("Volume is empty; the engine will initialize it")
            }
            (VolumeState::Initialized, _) => {
                tracing::debug!("Volume already initialized; skipping initialization scripts")
            }
        }

        if let Some(stale) = self.handle() {
            tracing::debug!("Removing leftover container {}", stale.short_id());
            self.bounded("docker stop", self.runtime.stop(&stale))
                .await?;
            self.set_handle(None);
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled("stop requested before launch".into()));
        }

        let handle = self
            .bounded("docker run", self.runtime.start(&definition))
            .await?;
        tracing::info!(container = %handle.short_id(), "Started {}", handle.name());
        self.set_handle(Some(handle.clone()));

        let outcome = check_with_retry(
            self.probe.as_ref(),
            self.health.retries,
            self.health.interval,
            cancel,
        )
        .await;
        match outcome {
            RetryOutcome::Healthy { attempts } => {
                tracing::info!(
                    "{} ready after {} probe attempt(s)",
                    handle.name(),
                    attempts
                );
            }
            RetryOutcome::Cancelled { .. } => {
                return Err(Error::Cancelled(
                    "stop requested while waiting for readiness".into(),
                ));
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                let detail = self.exit_detail(&handle).await.or(last_error);
                return Err(Error::HealthCheckTimeout { attempts, detail });
            }
        }

        guard.last_volume = match self.gate.classify(volume) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("Could not re-inspect volume after start: {}", e);
                Some(volume_state)
            }
        };
        Ok(())
    }

    /// Release the container a failed startup left behind, then enter `FAILED`.
    async fn roll_back(&self, op: Operation, original: Error) -> Error {
        let original = original.during(op, Starting, Running);
        let detail = original.root().to_string();

        // A name conflict means the container under our name is not ours
        let name_taken = matches!(
            original.root(),
            Error::Runtime(RuntimeError::NameConflict { .. })
        );
        let owned = if name_taken {
            Ok(self.handle())
        } else {
            self.current_container().await
        };
        let released = match owned {
            Ok(Some(handle)) => {
                tracing::warn!("Startup failed, removing {}", handle.name());
                self.bounded("docker stop", self.runtime.stop(&handle))
                    .await
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(rollback) = released {
            self.enter_failed(op, format!("rollback failed: {}", rollback));
            return Error::RollbackFailed {
                original: Box::new(original),
                rollback: Box::new(rollback.into()),
            };
        }
        self.set_handle(None);

        self.enter_failed(op, detail);
        original
    }

    async fn stop_locked(&self, op: Operation) -> Result<()> {
        let from = self.state();
        match from {
            Stopped => {
                if let Some(stale) = self.handle() {
                    self.bounded("docker rm", self.runtime.stop(&stale))
                        .await?;
                    self.set_handle(None);
                    tracing::info!("Removed exited container {}", stale.name());
                }
                return Ok(());
            }
            Stopping => {
                return Err(Error::InvalidTransition {
                    operation: op,
                    state: from,
                })
            }
            Starting | Running | Failed => {}
        }

        self.transition(op, Stopping, None)?;
        if let Err(e) = self.halt().await {
            self.transition(op, Failed, Some(e.to_string()))?;
            return Err(e.during(op, Stopping, Stopped));
        }
        self.transition(op, Stopped, None)
    }

    /// Stop and remove the current container and confirm it is gone.
    async fn halt(&self) -> Result<()> {
        let Some(handle) = self.current_container().await? else {
            return Ok(());
        };

        self.bounded("docker stop", self.runtime.stop(&handle))
            .await?;
        match self
            .bounded("docker inspect", self.runtime.inspect(&handle))
            .await
        {
            Ok(status) if status.running => {
                return Err(RuntimeError::cmd_failed(
                    format!("docker stop {}", handle.name()),
                    "container is still running after stop",
                    None,
                )
                .into())
            }
            Ok(_) | Err(RuntimeError::ContainerNotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        self.set_handle(None);
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn transition(&self, op: Operation, to: LifecycleState, detail: Option<String>) -> Result<()> {
        let from = {
            let mut snapshot = self.snapshot.write();
            let from = snapshot.state;
            if !from.is_valid_transition(to) {
                return Err(Error::InvalidTransition {
                    operation: op,
                    state: from,
                });
            }
            snapshot.state = to;
            from
        };
        self.audit.record(op, from, to, detail);
        Ok(())
    }

    fn enter_failed(&self, op: Operation, detail: String) {
        if let Err(e) = self.transition(op, Failed, Some(detail)) {
            tracing::error!("Could not record failure: {}", e);
        }
    }

    /// The tracked container, or one found under the conventional name.
    ///
    /// A runtime call abandoned at its timeout may have launched a container
    /// without reporting its handle. A found container becomes tracked.
    async fn current_container(&self) -> std::result::Result<Option<ServiceHandle>, RuntimeError> {
        if let Some(handle) = self.handle() {
            return Ok(Some(handle));
        }
        let name = self.definition.container_name();
        let found = self
            .bounded("docker inspect", self.runtime.locate(name))
            .await?;
        if let Some(handle) = &found {
            tracing::warn!(container = %handle.short_id(), "Found untracked container {}", name);
            self.set_handle(Some(handle.clone()));
        }
        Ok(found)
    }

    fn set_handle(&self, handle: Option<ServiceHandle>) {
        self.snapshot.write().handle = handle;
    }

    /// Cancel any pending startup and arm a fresh token for the next one.
    fn preempt_startup(&self) -> CancellationToken {
        let mut token = self.startup.lock();
        token.cancel();
        *token = CancellationToken::new();
        token.clone()
    }

    /// Why a container that never became ready is gone, if it is.
    async fn exit_detail(&self, handle: &ServiceHandle) -> Option<String> {
        match self
            .bounded("docker inspect", self.runtime.inspect(handle))
            .await
        {
            Ok(status) if !status.running => Some(match status.exit_code {
                Some(code) => format!("container exited with code {}", code),
                None => "container is no longer running".to_string(),
            }),
            _ => None,
        }
    }

    /// Apply the runtime call timeout.
    async fn bounded<T, F>(&self, what: &str, call: F) -> std::result::Result<T, RuntimeError>
    where
        F: Future<Output = std::result::Result<T, RuntimeError>>,
    {
        match tokio::time::timeout(self.runtime_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RuntimeError::timeout(what, self.runtime_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{keys, ConfigResolver, MapSource};
    use crate::runtime::ContainerStatus;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct IdleRuntime;

    #[async_trait]
    impl ContainerRuntime for IdleRuntime {
        async fn start(&self, def: &ServiceDefinition) -> std::result::Result<ServiceHandle, RuntimeError> {
            Ok(ServiceHandle::new("f00d", def.container_name()))
        }
        async fn stop(&self, _: &ServiceHandle) -> std::result::Result<(), RuntimeError> {
            Ok(())
        }
        async fn inspect(&self, h: &ServiceHandle) -> std::result::Result<ContainerStatus, RuntimeError> {
            Err(RuntimeError::ContainerNotFound {
                container: h.name().to_string(),
            })
        }
        async fn remove_volume(&self, _: &Path) -> std::result::Result<(), RuntimeError> {
            Ok(())
        }
        async fn locate(&self, _: &str) -> std::result::Result<Option<ServiceHandle>, RuntimeError> {
            Ok(None)
        }
        async fn logs(
            &self,
            _: &ServiceHandle,
            _: Option<usize>,
            _: bool,
        ) -> std::result::Result<(), RuntimeError> {
            Ok(())
        }
    }

    struct AlwaysReady;

    #[async_trait]
    impl HealthChecker for AlwaysReady {
        async fn check(&self) -> Result<bool> {
            Ok(true)
        }
        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
        fn describe(&self) -> String {
            "ready".into()
        }
    }

    fn controller(dir: &TempDir) -> LifecycleController {
        let config = ConfigResolver::new(dir.path())
            .resolve(&MapSource::from_pairs([
                (keys::ROOT_PASSWORD, "r"),
                (keys::DATABASE, "shop"),
                (keys::USER, "shop_app"),
                (keys::PASSWORD, "p"),
            ]))
            .unwrap();
        LifecycleController::with_audit(
            &config,
            Arc::new(IdleRuntime),
            Arc::new(AlwaysReady),
            AuditTrail::in_memory("shop-db"),
        )
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let dir = TempDir::new().unwrap();
        let ctl = controller(&dir);
        ctl.stop().await.unwrap();
        assert_eq!(ctl.state(), Stopped);
        assert!(ctl.audit().records().is_empty());
    }

    #[tokio::test]
    async fn test_purge_requires_matching_confirmation() {
        let dir = TempDir::new().unwrap();
        let ctl = controller(&dir);
        let err = ctl
            .destroy(&PurgeConfirmation::for_volume("/somewhere/else"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PurgeNotConfirmed(_)));
    }

    #[tokio::test]
    async fn test_start_then_start_again_is_noop() {
        let dir = TempDir::new().unwrap();
        let ctl = controller(&dir);
        ctl.start().await.unwrap();
        ctl.start().await.unwrap();
        assert_eq!(ctl.state(), Running);
        let transitions: Vec<_> = ctl
            .audit()
            .records()
            .into_iter()
            .map(|r| (r.from, r.to))
            .collect();
        assert_eq!(transitions, vec![(Stopped, Starting), (Starting, Running)]);
    }
}
