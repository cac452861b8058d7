mod down;
mod init;
mod logs;
mod restart;
mod status;
mod up;
mod validate;

pub use down::run_down;
pub use init::run_init;
pub use logs::run_logs;
pub use restart::run_restart;
pub use status::run_status;
pub use up::run_up;
pub use validate::run_validate;

use dbkeeper::config::{keys, ConfigResolver, Configuration, EnvSource, FileSource, LayeredSource};
use dbkeeper::docker::DockerRuntime;
use dbkeeper::healthcheck::probe_for;
use dbkeeper::lock::ContainerLock;
use dbkeeper::LifecycleController;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where configuration comes from and where runtime files go.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub work_dir: PathBuf,
    pub env_file: PathBuf,
    /// `--env-file` was given, so a missing file is an error
    pub env_file_explicit: bool,
}

impl Workspace {
    pub fn resolve(workdir: Option<PathBuf>, env_file: Option<PathBuf>) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let work_dir = match workdir {
            Some(dir) => absolutize(&cwd, &dir),
            None => cwd.clone(),
        };
        let (env_file, env_file_explicit) = match env_file {
            Some(file) => (absolutize(&cwd, &file), true),
            None => (work_dir.join(".env"), false),
        };
        Ok(Self {
            work_dir,
            env_file,
            env_file_explicit,
        })
    }

    /// Relative paths in the configuration resolve against the directory of
    /// an explicit env file, otherwise against the working directory.
    pub fn base_dir(&self) -> &Path {
        if self.env_file_explicit {
            self.env_file.parent().unwrap_or(&self.work_dir)
        } else {
            &self.work_dir
        }
    }

    /// Layer the env file (if any) under the process environment and resolve.
    pub fn load_configuration(&self) -> dbkeeper::Result<Configuration> {
        let mut source = LayeredSource::new();
        if self.env_file_explicit || self.env_file.exists() {
            source = source.layer(FileSource::load(&self.env_file)?);
        } else {
            tracing::debug!(
                "No {} found, using the process environment only",
                self.env_file.display()
            );
        }
        source = source.layer(EnvSource::capture(keys::PREFIX));

        Ok(ConfigResolver::new(self.base_dir()).resolve(&source)?)
    }

    /// Hold the cross-process lock for the configured container.
    pub fn lock_container(&self, config: &Configuration) -> dbkeeper::Result<ContainerLock> {
        ContainerLock::acquire(
            &ContainerLock::default_dir(&self.work_dir),
            &config.container_name(),
        )
    }

    /// Make `path` absolute against the working directory.
    pub fn path(&self, path: &Path) -> PathBuf {
        absolutize(&self.work_dir, path)
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Docker-backed controller re-attached to any existing container.
pub async fn attached_controller(config: &Configuration) -> dbkeeper::Result<Arc<LifecycleController>> {
    let runtime = Arc::new(DockerRuntime::new(
        config.runtime_timeout(),
        config.stop_grace(),
    ));
    let controller = Arc::new(LifecycleController::new(config, runtime, probe_for(config)));
    controller.attach().await?;
    Ok(controller)
}

/// `mysql://user@127.0.0.1:3306/db`, never including the password.
pub fn connection_hint(config: &Configuration) -> String {
    format!(
        "{}://{}@127.0.0.1:{}/{}",
        config.engine(),
        config.user(),
        config.host_port(),
        config.database()
    )
}
