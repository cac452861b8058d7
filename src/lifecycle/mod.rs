//! Lifecycle state machine for the database container.
//!
//! [`LifecycleController`] sequences start, stop, restart and destroy against
//! a [`crate::runtime::ContainerRuntime`], consulting the
//! [`crate::volume::VolumeInitGate`] before each start and recording every
//! transition in an [`AuditTrail`].

mod audit;
mod controller;
mod state;

pub use audit::{AuditTrail, TransitionRecord};
pub use controller::{LifecycleController, PurgeConfirmation, StatusReport};
pub use state::{LifecycleState, Operation};
