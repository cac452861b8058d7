use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the managed database container.
///
/// ```text
///            ┌──────────── restart ───────────┐
///            ▼                                │
/// Stopped ──► Starting ──► Running ──► Stopping ──► Stopped
///    ▲           │  ▲                    │  ▲
///    │           ▼  │                    ▼  │
///    └──────── Failed ◄──────────────────┘  │
///                └──────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// No container exists
    Stopped,
    /// Container created, readiness not yet confirmed
    Starting,
    /// Container passed its readiness probe
    Running,
    /// Teardown in progress
    Stopping,
    /// Startup or teardown failed; a leftover container may still exist
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "STOPPED"),
            LifecycleState::Starting => write!(f, "STARTING"),
            LifecycleState::Running => write!(f, "RUNNING"),
            LifecycleState::Stopping => write!(f, "STOPPING"),
            LifecycleState::Failed => write!(f, "FAILED"),
        }
    }
}

impl LifecycleState {
    /// Check a transition against the state machine.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbkeeper::lifecycle::LifecycleState;
    ///
    /// assert!(LifecycleState::Stopped.is_valid_transition(LifecycleState::Starting));
    /// assert!(LifecycleState::Stopping.is_valid_transition(LifecycleState::Starting)); // restart
    /// assert!(!LifecycleState::Stopped.is_valid_transition(LifecycleState::Running));
    /// ```
    pub fn is_valid_transition(&self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, to) {
            (Stopped, Starting) => true,

            // Health ok, startup failure, stop or restart preempting startup
            (Starting, Running) | (Starting, Failed) | (Starting, Stopping) => true,

            (Running, Stopping) => true,

            // Confirmed exit, restart re-entering startup, failed teardown
            (Stopping, Stopped) | (Stopping, Starting) | (Stopping, Failed) => true,

            // Retry startup, or clean up what a failed transition left behind
            (Failed, Starting) | (Failed, Stopping) => true,

            _ => false,
        }
    }

    /// Stable states are the ones a finished operation may leave behind.
    pub fn is_stable(&self) -> bool {
        matches!(
            self,
            LifecycleState::Stopped | LifecycleState::Running | LifecycleState::Failed
        )
    }
}

/// Operation that drove a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Up,
    Down,
    Restart,
    Purge,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Up => write!(f, "up"),
            Operation::Down => write!(f, "down"),
            Operation::Restart => write!(f, "restart"),
            Operation::Purge => write!(f, "purge"),
        }
    }
}
