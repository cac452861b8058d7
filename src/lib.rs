#![allow(unused_assignments)]

//! # dbkeeper
//!
//! Lifecycle and configuration manager for a containerized MySQL or MariaDB
//! server.
//!
//! ## Features
//!
//! - **Validated configuration**: `DB_*` options from a `.env` file and the
//!   process environment, checked before anything launches
//! - **Immutable service definitions**: one pure function from configuration
//!   to container description
//! - **Typed lifecycle**: `STOPPED -> STARTING -> RUNNING -> STOPPING` with
//!   rollback on failed startup and an audit trail of every transition
//! - **Run-once initialization**: first-boot scripts are only mounted while
//!   the data volume is empty
//! - **Guarded data removal**: volumes are deleted only with explicit
//!   confirmation and only after the container is confirmed gone
//!
//! ## Quick Start
//!
//! ```no_run
//! use dbkeeper::config::{ConfigResolver, EnvSource, FileSource, LayeredSource};
//! use dbkeeper::docker::DockerRuntime;
//! use dbkeeper::healthcheck::probe_for;
//! use dbkeeper::LifecycleController;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), dbkeeper::Error> {
//! let source = LayeredSource::new()
//!     .layer(FileSource::load(".env")?)
//!     .layer(EnvSource::capture("DB_"));
//! let config = ConfigResolver::new(".").resolve(&source)?;
//!
//! let runtime = Arc::new(DockerRuntime::new(config.runtime_timeout(), config.stop_grace()));
//! let controller = LifecycleController::new(&config, runtime, probe_for(&config));
//!
//! controller.attach().await?;
//! controller.start().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! - One transition in flight per controller; concurrent callers serialize
//! - `stop`, `restart` and `destroy` preempt a startup that is still polling
//!   for readiness
//! - Every container runtime call and every probe attempt is time-bounded

pub mod config;
pub mod definition;
pub mod docker;
pub mod error;
pub mod healthcheck;
pub mod lifecycle;
pub mod lock;
pub mod runtime;
pub mod volume;

// Re-export commonly used types
pub use config::{ConfigResolver, Configuration};
pub use definition::ServiceDefinition;
pub use error::{ConfigError, Error, Result, VolumeError};
pub use lifecycle::{LifecycleController, LifecycleState, PurgeConfirmation};
pub use runtime::{ContainerRuntime, RuntimeError, ServiceHandle};
pub use volume::{VolumeInitGate, VolumeState};
