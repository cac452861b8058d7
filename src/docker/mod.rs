//! Docker CLI backend for the container runtime interface.
//!
//! [`DockerClient`] wraps individual `docker` invocations with timeouts and
//! structured errors; [`DockerRuntime`] maps the lifecycle controller's
//! [`crate::runtime::ContainerRuntime`] calls onto them.

pub mod client;
mod runtime;

pub use client::DockerClient;
pub use runtime::DockerRuntime;
