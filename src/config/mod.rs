//! Configuration loading and validation.
//!
//! - `env_loader` - key-value sources (`.env` file, process environment, maps)
//! - `resolver` - [`ConfigResolver`], the only place options are interpreted
//! - `validation` - shape checks for individual values
//! - `engine`, `restart`, `resources`, `duration` - typed option values

pub mod env_loader;

mod duration;
mod engine;
mod resolver;
mod resources;
mod restart;
mod validation;

pub use duration::*;
pub use engine::Engine;
pub use env_loader::{ConfigSource, EnvSource, FileSource, LayeredSource, MapSource};
pub use resolver::ConfigResolver;
pub use resources::*;
pub use restart::RestartPolicy;
pub use validation::{MAX_DATABASE_NAME_LEN, MAX_PROJECT_LEN, MAX_USER_NAME_LEN};

use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Recognized option names.
pub mod keys {
    pub const ROOT_PASSWORD: &str = "DB_ROOT_PASSWORD";
    pub const DATABASE: &str = "DB_NAME";
    pub const USER: &str = "DB_USER";
    pub const PASSWORD: &str = "DB_PASSWORD";
    pub const PORT: &str = "DB_PORT";
    pub const ENGINE: &str = "DB_ENGINE";
    pub const IMAGE: &str = "DB_IMAGE";
    pub const PROJECT: &str = "DB_PROJECT";
    pub const DATA_DIR: &str = "DB_DATA_DIR";
    pub const INIT_SCRIPTS: &str = "DB_INIT_SCRIPTS";
    pub const RESTART_POLICY: &str = "DB_RESTART_POLICY";
    pub const MEMORY: &str = "DB_MEMORY";
    pub const CPUS: &str = "DB_CPUS";
    pub const SERVER_ARGS: &str = "DB_SERVER_ARGS";
    pub const HEALTH_PROBE: &str = "DB_HEALTH_PROBE";
    pub const HEALTH_RETRIES: &str = "DB_HEALTH_RETRIES";
    pub const HEALTH_INTERVAL: &str = "DB_HEALTH_INTERVAL";
    pub const HEALTH_TIMEOUT: &str = "DB_HEALTH_TIMEOUT";
    pub const RUNTIME_TIMEOUT: &str = "DB_RUNTIME_TIMEOUT";
    pub const STOP_GRACE: &str = "DB_STOP_GRACE";
    pub const AUDIT_LOG: &str = "DB_AUDIT_LOG";

    /// Keys that must be present; checked in this order.
    pub const REQUIRED: [&str; 4] = [ROOT_PASSWORD, DATABASE, USER, PASSWORD];

    /// Every key the resolver understands.
    pub const ALL: [&str; 21] = [
        ROOT_PASSWORD,
        DATABASE,
        USER,
        PASSWORD,
        PORT,
        ENGINE,
        IMAGE,
        PROJECT,
        DATA_DIR,
        INIT_SCRIPTS,
        RESTART_POLICY,
        MEMORY,
        CPUS,
        SERVER_ARGS,
        HEALTH_PROBE,
        HEALTH_RETRIES,
        HEALTH_INTERVAL,
        HEALTH_TIMEOUT,
        RUNTIME_TIMEOUT,
        STOP_GRACE,
        AUDIT_LOG,
    ];

    /// Prefix shared by all option names.
    pub const PREFIX: &str = "DB_";
}

/// Readiness probe flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Protocol handshake on the exposed port only
    Tcp,
    /// Handshake plus an authenticated query with the application account
    #[default]
    Auth,
}

impl FromStr for ProbeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tcp" => Ok(ProbeKind::Tcp),
            "auth" => Ok(ProbeKind::Auth),
            other => Err(format!("unknown probe '{}' (expected 'tcp' or 'auth')", other)),
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Tcp => f.write_str("tcp"),
            ProbeKind::Auth => f.write_str("auth"),
        }
    }
}

/// Readiness polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSettings {
    pub probe: ProbeKind,
    /// Maximum number of probe attempts
    pub retries: u32,
    /// First backoff delay; doubled after each failed attempt
    #[serde(with = "duration_millis")]
    pub interval: Duration,
    /// Timeout of a single probe attempt
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            probe: ProbeKind::Auth,
            retries: 30,
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        }
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Validated configuration. Built only by [`ConfigResolver`]; immutable.
///
/// `Debug` never prints credentials: they are held as [`SecretString`].
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) engine: Engine,
    pub(crate) image: String,
    pub(crate) project: String,
    pub(crate) root_password: Arc<SecretString>,
    pub(crate) database: String,
    pub(crate) user: String,
    pub(crate) password: Arc<SecretString>,
    pub(crate) host_port: u16,
    pub(crate) data_dir: PathBuf,
    pub(crate) init_scripts: Option<PathBuf>,
    pub(crate) restart_policy: RestartPolicy,
    pub(crate) resources: ResourceLimits,
    pub(crate) server_args: Vec<String>,
    pub(crate) health: HealthSettings,
    pub(crate) runtime_timeout: Duration,
    pub(crate) stop_grace: Duration,
    pub(crate) audit_log: PathBuf,
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.engine == other.engine
            && self.image == other.image
            && self.project == other.project
            && self.root_password.expose_secret() == other.root_password.expose_secret()
            && self.database == other.database
            && self.user == other.user
            && self.password.expose_secret() == other.password.expose_secret()
            && self.host_port == other.host_port
            && self.data_dir == other.data_dir
            && self.init_scripts == other.init_scripts
            && self.restart_policy == other.restart_policy
            && self.resources == other.resources
            && self.server_args == other.server_args
            && self.health == other.health
            && self.runtime_timeout == other.runtime_timeout
            && self.stop_grace == other.stop_grace
            && self.audit_log == other.audit_log
    }
}

impl Eq for Configuration {}

impl Configuration {
    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn root_password(&self) -> &Arc<SecretString> {
        &self.root_password
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &Arc<SecretString> {
        &self.password
    }

    pub fn host_port(&self) -> u16 {
        self.host_port
    }

    /// Host directory holding the engine's data files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn init_scripts(&self) -> Option<&Path> {
        self.init_scripts.as_deref()
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    pub fn resources(&self) -> &ResourceLimits {
        &self.resources
    }

    pub fn server_args(&self) -> &[String] {
        &self.server_args
    }

    pub fn health(&self) -> &HealthSettings {
        &self.health
    }

    /// Upper bound for every container runtime call.
    pub fn runtime_timeout(&self) -> Duration {
        self.runtime_timeout
    }

    pub fn stop_grace(&self) -> Duration {
        self.stop_grace
    }

    pub fn audit_log(&self) -> &Path {
        &self.audit_log
    }

    /// Conventional container name.
    pub fn container_name(&self) -> String {
        format!("{}-db", self.project)
    }

    /// Conventional network name.
    pub fn network_name(&self) -> String {
        format!("{}-net", self.project)
    }
}
