//! Immutable description of the database container.
//!
//! [`build`] is the only constructor. It derives every name by convention from
//! the [`Configuration`], so equal configurations render byte-equal runtime
//! arguments. A definition is never patched: a new configuration means a new
//! definition.

use crate::config::{Configuration, Engine, ResourceLimits, RestartPolicy};
use crate::volume::VolumeState;
use secrecy::{ExposeSecret as _, SecretString};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Label carrying the project name on the container.
pub const PROJECT_LABEL: &str = "dbkeeper.project";
/// Label carrying the engine flavor on the container.
pub const ENGINE_LABEL: &str = "dbkeeper.engine";

/// Host port published to a container port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/tcp", self.host, self.container)
    }
}

/// Host directory bind-mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub source: PathBuf,
    pub target: String,
    pub read_only: bool,
}

impl fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.display(), self.target)?;
        if self.read_only {
            f.write_str(":ro")?;
        }
        Ok(())
    }
}

/// Environment variable value. Secrets are only exposed to the runtime
/// process environment, never rendered into arguments.
#[derive(Debug, Clone)]
pub enum EnvValue {
    Plain(String),
    Secret(Arc<SecretString>),
}

impl PartialEq for EnvValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EnvValue::Plain(a), EnvValue::Plain(b)) => a == b,
            (EnvValue::Secret(a), EnvValue::Secret(b)) => a.expose_secret() == b.expose_secret(),
            _ => false,
        }
    }
}

impl Eq for EnvValue {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: EnvValue,
}

impl EnvVar {
    fn plain(name: String, value: &str) -> Self {
        Self {
            name,
            value: EnvValue::Plain(value.to_string()),
        }
    }

    fn secret(name: String, value: &Arc<SecretString>) -> Self {
        Self {
            name,
            value: EnvValue::Secret(Arc::clone(value)),
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self.value, EnvValue::Secret(_))
    }

    /// `NAME=value` for plain values, bare `NAME` for secrets.
    fn docker_arg(&self) -> String {
        match &self.value {
            EnvValue::Plain(value) => format!("{}={}", self.name, value),
            EnvValue::Secret(_) => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    engine: Engine,
    container_name: String,
    network: String,
    image: String,
    port: PortMapping,
    data_mount: VolumeMount,
    init_mount: Option<VolumeMount>,
    env: Vec<EnvVar>,
    labels: BTreeMap<String, String>,
    restart_policy: RestartPolicy,
    resources: ResourceLimits,
    stop_grace: Duration,
    server_args: Vec<String>,
}

/// Build the definition for `config`. Total and deterministic.
///
/// The init-script mount is included whenever the configuration names one;
/// the lifecycle controller strips it with [`ServiceDefinition::for_volume`]
/// once the volume is initialized.
pub fn build(config: &Configuration) -> ServiceDefinition {
    let engine = config.engine();

    let env = vec![
        EnvVar::secret(engine.root_password_var(), config.root_password()),
        EnvVar::plain(engine.database_var(), config.database()),
        EnvVar::plain(engine.user_var(), config.user()),
        EnvVar::secret(engine.password_var(), config.password()),
    ];

    let mut labels = BTreeMap::new();
    labels.insert(PROJECT_LABEL.to_string(), config.project().to_string());
    labels.insert(ENGINE_LABEL.to_string(), engine.name().to_string());

    ServiceDefinition {
        engine,
        container_name: config.container_name(),
        network: config.network_name(),
        image: config.image().to_string(),
        port: PortMapping {
            host: config.host_port(),
            container: engine.canonical_port(),
        },
        data_mount: VolumeMount {
            source: config.data_dir().to_path_buf(),
            target: engine.data_dir().to_string(),
            read_only: false,
        },
        init_mount: config.init_scripts().map(|path| VolumeMount {
            source: path.to_path_buf(),
            target: engine.init_dir().to_string(),
            read_only: true,
        }),
        env,
        labels,
        restart_policy: config.restart_policy(),
        resources: config.resources().clone(),
        stop_grace: config.stop_grace(),
        server_args: config.server_args().to_vec(),
    }
}

impl ServiceDefinition {
    /// Definition to launch against a volume in `state`.
    ///
    /// An initialized volume never gets the init-script mount, so first-boot
    /// scripts cannot run twice for the same volume.
    pub fn for_volume(&self, state: VolumeState) -> ServiceDefinition {
        let mut definition = self.clone();
        if state == VolumeState::Initialized {
            definition.init_mount = None;
        }
        definition
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn port(&self) -> PortMapping {
        self.port
    }

    /// The single mount targeting the engine's data directory.
    pub fn data_mount(&self) -> &VolumeMount {
        &self.data_mount
    }

    /// Host path of the persistent volume.
    pub fn volume(&self) -> &Path {
        &self.data_mount.source
    }

    pub fn init_mount(&self) -> Option<&VolumeMount> {
        self.init_mount.as_ref()
    }

    /// All mounts, data volume first.
    pub fn mounts(&self) -> impl Iterator<Item = &VolumeMount> {
        std::iter::once(&self.data_mount).chain(self.init_mount.iter())
    }

    pub fn env(&self) -> &[EnvVar] {
        &self.env
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    pub fn resources(&self) -> &ResourceLimits {
        &self.resources
    }

    pub fn stop_grace(&self) -> Duration {
        self.stop_grace
    }

    pub fn server_args(&self) -> &[String] {
        &self.server_args
    }

    /// Arguments for `docker run`, excluding the `docker` binary itself.
    ///
    /// Contains no secret values: secret variables appear as bare `-e NAME`
    /// and are resolved from the runtime's process environment.
    pub fn render_run_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["run".into(), "-d".into()];
        args.extend(self.container_args());
        args
    }

    /// Arguments for `docker create`: the same container as
    /// [`render_run_args`](Self::render_run_args), left unstarted so the
    /// caller learns its id before it runs.
    pub fn render_create_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["create".into()];
        args.extend(self.container_args());
        args
    }

    fn container_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--name".into(),
            self.container_name.clone(),
            "--network".into(),
            self.network.clone(),
            "--restart".into(),
            self.restart_policy.as_docker_arg(),
            "--stop-timeout".into(),
            self.stop_grace.as_secs().to_string(),
            "-p".into(),
            self.port.to_string(),
        ];

        for mount in self.mounts() {
            args.push("-v".into());
            args.push(mount.to_string());
        }

        for var in &self.env {
            args.push("-e".into());
            args.push(var.docker_arg());
        }

        for (key, value) in &self.labels {
            args.push("--label".into());
            args.push(format!("{}={}", key, value));
        }

        args.extend(self.resources.docker_args());
        args.push(self.image.clone());
        args.extend(self.server_args.iter().cloned());
        args
    }

    /// Secret variables as `(name, value)` pairs for the runtime process
    /// environment.
    pub(crate) fn secret_env(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().filter_map(|var| match &var.value {
            EnvValue::Secret(secret) => Some((var.name.as_str(), secret.expose_secret())),
            EnvValue::Plain(_) => None,
        })
    }
}
