use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Upper bound for the backoff between two probe attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Readiness probe for the database service
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Check if the service is ready
    async fn check(&self) -> Result<bool>;

    /// Timeout of a single attempt
    fn timeout(&self) -> Duration;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Result of a bounded polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Healthy {
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
        last_error: Option<String>,
    },
    Cancelled {
        attempts: u32,
    },
}

/// Poll `checker` until it reports ready, with exponential backoff.
///
/// Starts with `interval` (at most [`MAX_BACKOFF`]) and doubles after each failed attempt up to
/// [`MAX_BACKOFF`]. An attempt that exceeds the checker's timeout counts as a
/// failed attempt. Cancelling `cancel` stops polling at the next await point.
pub async fn check_with_retry<C: HealthChecker + ?Sized>(
    checker: &C,
    max_retries: u32,
    interval: Duration,
    cancel: &CancellationToken,
) -> RetryOutcome {
    let mut current_delay = std::cmp::min(interval, MAX_BACKOFF);
    let mut last_error = None;

    for attempt in 1..=max_retries {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RetryOutcome::Cancelled { attempts: attempt - 1 },
            r = tokio::time::timeout(checker.timeout(), checker.check()) => r,
        };

        match result {
            Ok(Ok(true)) => return RetryOutcome::Healthy { attempts: attempt },
            Ok(Ok(false)) => last_error = Some(format!("{} not ready", checker.describe())),
            Ok(Err(e)) => last_error = Some(e.to_string()),
            Err(_) => {
                last_error = Some(format!(
                    "{} timed out after {:?}",
                    checker.describe(),
                    checker.timeout()
                ))
            }
        }
        tracing::debug!(
            attempt,
            max_retries,
            "Readiness probe failed: {}",
            last_error.as_deref().unwrap_or_default()
        );

        // Don't sleep after the last attempt
        if attempt < max_retries {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return RetryOutcome::Cancelled { attempts: attempt },
                _ = sleep(current_delay) => {}
            }
            current_delay = std::cmp::min(current_delay * 2, MAX_BACKOFF);
        }
    }

    RetryOutcome::Exhausted {
        attempts: max_retries,
        last_error,
    }
}

/// Passes only when every inner checker passes, checked in order.
pub struct AllOf {
    checkers: Vec<Box<dyn HealthChecker>>,
}

impl AllOf {
    pub fn new(checkers: Vec<Box<dyn HealthChecker>>) -> Self {
        Self { checkers }
    }
}

#[async_trait]
impl HealthChecker for AllOf {
    async fn check(&self) -> Result<bool> {
        for checker in &self.checkers {
            if !checker.check().await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn timeout(&self) -> Duration {
        self.checkers.iter().map(|c| c.timeout()).sum()
    }

    fn describe(&self) -> String {
        self.checkers
            .iter()
            .map(|c| c.describe())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}
