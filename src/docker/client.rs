//! Thin wrapper over the `docker` binary.
//!
//! Every invocation is bounded by a timeout and maps failures to
//! [`RuntimeError`]. Nothing else in the crate spawns `docker`.

use crate::runtime::{ContainerStatus, RuntimeError};
use std::process::{Output, Stdio};
use std::time::Duration;

/// Docker CLI invocations used by [`super::DockerRuntime`] and the probes.
///
/// Secret values are only ever handed to the spawned `docker` process through
/// its environment; argument lists name the variable without a value, so the
/// command strings carried by errors and logs are safe to print.
#[derive(Debug, Clone, Default)]
pub struct DockerClient;

/// Identity of an existing container as printed by `docker inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    /// `created`, `running`, `exited`, ...
    pub status: String,
    /// Value of the requested label, empty when absent
    pub label: String,
}

impl DockerClient {
    pub fn new() -> Self {
        DockerClient
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Run a docker command with a timeout, returning raw Output.
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output, RuntimeError> {
        self.run_with_env(args, &[], timeout).await
    }

    /// Run a docker command with extra process environment.
    async fn run_with_env(
        &self,
        args: &[&str],
        env: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Output, RuntimeError> {
        let cmd_str = format!("docker {}", args.join(" "));
        tracing::debug!("Running {}", cmd_str);

        let mut command = tokio::process::Command::new("docker");
        command
            .args(args)
            .envs(env.iter().copied())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(RuntimeError::exec_failed(cmd_str, e)),
            Err(_) => Err(RuntimeError::timeout(cmd_str, timeout)),
        }
    }

    /// Run a docker command with a timeout, returning Output only if exit 0.
    async fn run_success(&self, args: &[&str], timeout: Duration) -> Result<Output, RuntimeError> {
        let output = self.run(args, timeout).await?;
        if output.status.success() {
            Ok(output)
        } else {
            let cmd_str = format!("docker {}", args.join(" "));
            Err(RuntimeError::failed(cmd_str, &output))
        }
    }

    // ========================================================================
    // Container lifecycle
    // ========================================================================

    /// `docker create ...`. Returns the raw output; the caller classifies
    /// failures because only it knows the requested name and host port.
    pub async fn create(
        &self,
        args: &[String],
        secret_env: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Output, RuntimeError> {
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_with_env(&arg_refs, secret_env, timeout).await
    }

    /// `docker start <id>`, raw output.
    pub async fn start(&self, container: &str, timeout: Duration) -> Result<Output, RuntimeError> {
        self.run(&["start", container], timeout).await
    }

    /// Force-remove a container. Returns `Ok(())` if container doesn't exist.
    pub async fn rm_force(&self, container: &str, timeout: Duration) -> Result<(), RuntimeError> {
        let output = self.run(&["rm", "-f", container], timeout).await?;
        if output.status.success() || is_missing(&output) {
            return Ok(());
        }
        Err(RuntimeError::failed("docker rm -f", &output))
    }

    /// Stop a container with a grace period, then remove it.
    ///
    /// A container that is already gone counts as stopped.
    pub async fn stop_and_remove(
        &self,
        container: &str,
        grace: Duration,
        timeout: Duration,
    ) -> Result<(), RuntimeError> {
        let grace = grace.as_secs().to_string();
        let output = self.run(&["stop", "-t", &grace, container], timeout).await?;
        if !output.status.success() && !is_missing(&output) {
            return Err(RuntimeError::failed("docker stop", &output));
        }
        self.rm_force(container, timeout).await
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Running flag and exit code of a container, `None` if it does not exist.
    pub async fn inspect_state(
        &self,
        container: &str,
        timeout: Duration,
    ) -> Result<Option<ContainerStatus>, RuntimeError> {
        let output = self
            .run(
                &[
                    "inspect",
                    "--type=container",
                    "-f",
                    "{{.State.Running}} {{.State.ExitCode}}",
                    container,
                ],
                timeout,
            )
            .await?;
        if is_missing(&output) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(RuntimeError::failed("docker inspect", &output));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Some(parse_state(&stdout)))
    }

    /// Id, status and `label_key` value of the container named `name`,
    /// `None` if no such container exists.
    pub async fn container_summary(
        &self,
        name: &str,
        label_key: &str,
        timeout: Duration,
    ) -> Result<Option<ContainerSummary>, RuntimeError> {
        let format = format!(
            "{{{{.Id}}}} {{{{.State.Status}}}} {{{{index .Config.Labels \"{}\"}}}}",
            label_key
        );
        let output = self
            .run(&["inspect", "--type=container", "-f", &format, name], timeout)
            .await?;
        if is_missing(&output) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(RuntimeError::failed("docker inspect", &output));
        }
        Ok(parse_summary(&String::from_utf8_lossy(&output.stdout)))
    }

    // ========================================================================
    // Networks
    // ========================================================================

    /// Create `network` unless it already exists.
    pub async fn ensure_network(
        &self,
        network: &str,
        label: &str,
        timeout: Duration,
    ) -> Result<(), RuntimeError> {
        let exists = self
            .run(&["network", "inspect", network], timeout)
            .await?
            .status
            .success();
        if exists {
            return Ok(());
        }

        tracing::debug!("Creating network {}", network);
        let output = self
            .run(&["network", "create", "--label", label, network], timeout)
            .await?;
        if output.status.success() {
            return Ok(());
        }
        // Lost a creation race with another process
        if String::from_utf8_lossy(&output.stderr).contains("already exists") {
            return Ok(());
        }
        Err(RuntimeError::failed("docker network create", &output))
    }

    // ========================================================================
    // Exec / Logs
    // ========================================================================

    /// Run a command inside a running container, forwarding `env` by name.
    pub async fn exec_with_env(
        &self,
        container: &str,
        env: &[(&str, &str)],
        cmd: &[&str],
        timeout: Duration,
    ) -> Result<Output, RuntimeError> {
        let mut args = vec!["exec"];
        for (name, _) in env {
            args.push("-e");
            args.push(name);
        }
        args.push(container);
        args.extend_from_slice(cmd);
        self.run_with_env(&args, env, timeout).await
    }

    /// Stream container logs to our stdout/stderr.
    ///
    /// Not bounded by a timeout: with `follow` it runs until interrupted.
    pub async fn stream_logs(
        &self,
        container: &str,
        tail: Option<usize>,
        follow: bool,
    ) -> Result<(), RuntimeError> {
        let mut args = vec!["logs".to_string()];
        if let Some(n) = tail {
            args.push("--tail".to_string());
            args.push(n.to_string());
        }
        if follow {
            args.push("--follow".to_string());
        }
        args.push(container.to_string());

        let cmd_str = format!("docker {}", args.join(" "));
        let status = tokio::process::Command::new("docker")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| RuntimeError::exec_failed(&cmd_str, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(RuntimeError::cmd_failed(
                cmd_str,
                "logs failed",
                status.code(),
            ))
        }
    }

    // ========================================================================
    // Daemon health
    // ========================================================================

    /// Server version if the daemon answers, `None` otherwise.
    pub async fn server_version(&self, timeout: Duration) -> Option<String> {
        match self
            .run_success(&["info", "--format", "{{.ServerVersion}}"], timeout)
            .await
        {
            Ok(o) => Some(String::from_utf8_lossy(&o.stdout).trim().to_string()),
            Err(_) => None,
        }
    }
}

/// Docker reports unknown objects with one of these phrases.
fn is_missing(output: &Output) -> bool {
    if output.status.success() {
        return false;
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr.contains("No such container") || stderr.contains("No such object")
}

/// Parse `"<running> <exit code>"` as printed by [`DockerClient::inspect_state`].
fn parse_state(raw: &str) -> ContainerStatus {
    let mut parts = raw.split_whitespace();
    let running = parts.next() == Some("true");
    let exit_code = parts.next().and_then(|c| c.parse::<i32>().ok());
    if running {
        ContainerStatus::running()
    } else {
        ContainerStatus {
            running: false,
            exit_code,
        }
    }
}

/// Parse `"<id> <status> <label value>"`. Docker prints `<no value>` for a
/// missing label.
fn parse_summary(raw: &str) -> Option<ContainerSummary> {
    let mut parts = raw.split_whitespace();
    let id = parts.next()?.to_string();
    let status = parts.next()?.to_string();
    let label = parts.collect::<Vec<_>>().join(" ");
    let label = if label == "<no value>" { String::new() } else { label };
    Some(ContainerSummary { id, status, label })
}
