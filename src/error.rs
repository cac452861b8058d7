// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use crate::lifecycle::{LifecycleState, Operation};
use crate::runtime::RuntimeError;
use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for errors without a dedicated category.
pub const EXIT_OTHER: i32 = 1;
/// Exit code for missing or invalid configuration.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for container runtime failures.
pub const EXIT_RUNTIME: i32 = 3;
/// Exit code for a service that never became ready.
pub const EXIT_HEALTH_TIMEOUT: i32 = 4;
/// Exit code for volume inspection or removal failures.
pub const EXIT_VOLUME: i32 = 5;

/// Configuration could not be resolved. Always names the offending key.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration key '{0}'")]
    #[diagnostic(
        code(dbkeeper::config::missing_key),
        help("Set {0} in your .env file or the process environment")
    )]
    MissingKey(String),

    #[error("Invalid value for '{key}': {reason}")]
    #[diagnostic(code(dbkeeper::config::invalid_value))]
    InvalidValue { key: String, reason: String },

    #[error("Cannot read configuration source '{path}': {reason}")]
    #[diagnostic(code(dbkeeper::config::source))]
    Source { path: PathBuf, reason: String },
}

impl ConfigError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// The configuration key this error is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::MissingKey(key) | ConfigError::InvalidValue { key, .. } => Some(key),
            ConfigError::Source { .. } => None,
        }
    }
}

/// The persistent volume could not be inspected or removed.
#[derive(Error, Diagnostic, Debug)]
#[error("Volume '{}' {reason}", .path.display())]
#[diagnostic(
    code(dbkeeper::volume::error),
    help("Check that the data directory exists and is readable by the current user")
)]
pub struct VolumeError {
    pub path: PathBuf,
    pub reason: String,
    #[source]
    pub source: Option<io::Error>,
}

impl VolumeError {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn io(path: impl Into<PathBuf>, reason: impl Into<String>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(dbkeeper::config))]
    Config(#[from] ConfigError),

    #[error("Container runtime error: {0}")]
    #[diagnostic(
        code(dbkeeper::runtime::error),
        help("Check that Docker is running with `docker ps`")
    )]
    Runtime(#[from] RuntimeError),

    #[error("Service did not become ready after {attempts} health check attempt(s){}",
        .detail.as_ref().map(|d| format!(": {}", d)).unwrap_or_default()
    )]
    #[diagnostic(
        code(dbkeeper::health::timeout),
        help("Check the engine output with `dbkeeper logs` or raise DB_HEALTH_RETRIES")
    )]
    HealthCheckTimeout {
        attempts: u32,
        detail: Option<String>,
    },

    #[error("Volume error: {0}")]
    Volume(#[from] VolumeError),

    #[error("{operation} failed during {from} -> {to}: {source}")]
    Transition {
        operation: Operation,
        from: LifecycleState,
        to: LifecycleState,
        #[source]
        source: Box<Error>,
    },

    #[error("Rollback failed after startup error.\n  startup: {original}\n  rollback: {rollback}")]
    #[diagnostic(
        code(dbkeeper::lifecycle::rollback_failed),
        help("The container may still exist. Run `dbkeeper down` to retry the teardown")
    )]
    RollbackFailed {
        original: Box<Error>,
        rollback: Box<Error>,
    },

    #[error("Cannot {operation} while the service is {state}")]
    InvalidTransition {
        operation: Operation,
        state: LifecycleState,
    },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Refusing to delete volume '{}' without explicit confirmation", .0.display())]
    #[diagnostic(
        code(dbkeeper::purge::unconfirmed),
        help("Re-run with `dbkeeper down --purge --yes` to confirm data removal")
    )]
    PurgeNotConfirmed(PathBuf),

    #[error("Another dbkeeper process holds the lock '{}'", .0.display())]
    #[diagnostic(
        code(dbkeeper::lock::busy),
        help("Wait for the other command to finish, then retry")
    )]
    Locked(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an error with the lifecycle transition it interrupted.
    pub fn during(
        self,
        operation: Operation,
        from: LifecycleState,
        to: LifecycleState,
    ) -> Self {
        Error::Transition {
            operation,
            from,
            to,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping transition context.
    pub fn root(&self) -> &Error {
        match self {
            Error::Transition { source, .. } => source.root(),
            other => other,
        }
    }

    /// Process exit code for the CLI, derived from the root cause.
    ///
    /// A failed rollback reports the category of the original startup error.
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            Error::Config(_) => EXIT_CONFIG,
            Error::Runtime(_) => EXIT_RUNTIME,
            Error::HealthCheckTimeout { .. } => EXIT_HEALTH_TIMEOUT,
            Error::Volume(_) => EXIT_VOLUME,
            Error::RollbackFailed { original, .. } => original.exit_code(),
            _ => EXIT_OTHER,
        }
    }

    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self.root() {
            Error::Config(ConfigError::MissingKey(key)) => Some(format!(
                "Add '{}=<value>' to your .env file (run `dbkeeper init` for a template)",
                key
            )),
            Error::Config(_) => Some("Check your configuration with: dbkeeper validate".to_string()),
            Error::Runtime(RuntimeError::PortConflict { port, .. }) => Some(format!(
                "Port {} is already bound on this host. Stop whatever is using it or set DB_PORT to a free port.",
                port
            )),
            Error::Runtime(RuntimeError::NameConflict { container, .. }) => Some(format!(
                "A container named {} exists that this command did not create. Remove it yourself or set DB_PROJECT to another name.",
                container
            )),
            Error::Runtime(RuntimeError::ExecFailed { .. }) => {
                Some("Is the docker CLI installed and on your PATH?".to_string())
            }
            Error::Runtime(_) => Some("Check that Docker is running: docker ps".to_string()),
            Error::HealthCheckTimeout { .. } => Some(
                "Inspect the engine output with: dbkeeper logs -n 100".to_string(),
            ),
            Error::Volume(_) => Some(
                "The data directory must be readable by the user running dbkeeper".to_string(),
            ),
            Error::RollbackFailed { .. } => {
                Some("Run `dbkeeper down` to retry removing the container".to_string())
            }
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}
