use std::fmt;
use std::time::Duration;

/// Structured error type for container runtime invocations.
///
/// Runtime failures are fatal for the transition that triggered them and are
/// surfaced verbatim (stderr included). Command strings never contain secret
/// values: secrets reach the runtime through its process environment only.
#[derive(Debug)]
pub enum RuntimeError {
    /// Runtime command timed out.
    Timeout { command: String, timeout: Duration },

    /// Runtime command ran but returned non-zero exit.
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    /// Runtime binary couldn't be executed (not in PATH, permission denied).
    ExecFailed {
        command: String,
        source: std::io::Error,
    },

    /// The requested host port is already bound.
    PortConflict { port: u16, stderr: String },

    /// Another container already holds the conventional name.
    NameConflict { container: String, stderr: String },

    /// Container doesn't exist (parsed from "No such container" stderr).
    ContainerNotFound { container: String },

    /// Volume removal failed.
    VolumeRemoval {
        volume: String,
        source: std::io::Error,
    },
}

impl RuntimeError {
    /// Create a timeout error.
    pub fn timeout(cmd: impl Into<String>, dur: Duration) -> Self {
        RuntimeError::Timeout {
            command: cmd.into(),
            timeout: dur,
        }
    }

    /// Create a command-failed error from an `std::process::Output`.
    pub fn failed(cmd: impl Into<String>, output: &std::process::Output) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        RuntimeError::CommandFailed {
            command: cmd.into(),
            stderr,
            exit_code: output.status.code(),
        }
    }

    /// Create a command-failed error from a stderr string and optional exit code.
    pub fn cmd_failed(
        cmd: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        RuntimeError::CommandFailed {
            command: cmd.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Create an exec-failed error (binary not found / permission denied).
    pub fn exec_failed(cmd: impl Into<String>, err: std::io::Error) -> Self {
        RuntimeError::ExecFailed {
            command: cmd.into(),
            source: err,
        }
    }

    /// Classify a failed `docker create` / `docker start` by its stderr.
    ///
    /// Port and name conflicts get their own variants so the caller can report
    /// them without parsing strings again.
    pub fn classify_run_failure(
        cmd: impl Into<String>,
        output: &std::process::Output,
        container: &str,
        host_port: u16,
    ) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if is_name_conflict(&stderr) {
            return RuntimeError::NameConflict {
                container: container.to_string(),
                stderr,
            };
        }
        if is_port_conflict(&stderr) {
            return RuntimeError::PortConflict {
                port: host_port,
                stderr,
            };
        }
        RuntimeError::CommandFailed {
            command: cmd.into(),
            stderr,
            exit_code: output.status.code(),
        }
    }
}

/// Docker reports bind failures with one of these phrases depending on the
/// platform and proxy mode.
pub(crate) fn is_port_conflict(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("port is already allocated")
        || lower.contains("address already in use")
        || lower.contains("bind: only one usage of each socket address")
}

/// `Conflict. The container name "/x" is already in use by container "..."`
pub(crate) fn is_name_conflict(stderr: &str) -> bool {
    stderr.contains("is already in use by container")
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Timeout { command, timeout } => {
                write!(f, "Timed out running '{}' (exceeded {:?})", command, timeout)
            }
            RuntimeError::CommandFailed {
                command,
                stderr,
                exit_code,
            } => {
                if let Some(code) = exit_code {
                    write!(f, "'{}' failed (exit code {}): {}", command, code, stderr)
                } else {
                    write!(f, "'{}' failed: {}", command, stderr)
                }
            }
            RuntimeError::ExecFailed { command, source } => {
                write!(f, "Failed to execute '{}': {}", command, source)
            }
            RuntimeError::PortConflict { port, stderr } => {
                write!(f, "Host port {} is already in use: {}", port, stderr)
            }
            RuntimeError::NameConflict { container, stderr } => {
                write!(f, "Container name '{}' is already taken: {}", container, stderr)
            }
            RuntimeError::ContainerNotFound { container } => {
                write!(f, "No such container: {}", container)
            }
            RuntimeError::VolumeRemoval { volume, source } => {
                write!(f, "Failed to remove volume '{}': {}", volume, source)
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::ExecFailed { source, .. } | RuntimeError::VolumeRemoval { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}
