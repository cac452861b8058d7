//! Container restart policy.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Restart policy handed to the container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never restart
    No,
    /// Always restart, including after a daemon restart
    #[default]
    Always,
    /// Restart unless an operator stopped the container
    UnlessStopped,
    /// Restart on non-zero exit with optional max retries
    OnFailure { max_retries: Option<u32> },
}

impl RestartPolicy {
    /// Value for `docker run --restart`.
    pub fn as_docker_arg(&self) -> String {
        match self {
            RestartPolicy::No => "no".to_string(),
            RestartPolicy::Always => "always".to_string(),
            RestartPolicy::UnlessStopped => "unless-stopped".to_string(),
            RestartPolicy::OnFailure { max_retries: None } => "on-failure".to_string(),
            RestartPolicy::OnFailure {
                max_retries: Some(n),
            } => format!("on-failure:{}", n),
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_docker_arg())
    }
}

impl FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "no" | "never" => Ok(RestartPolicy::No),
            "always" => Ok(RestartPolicy::Always),
            "unless-stopped" => Ok(RestartPolicy::UnlessStopped),
            "on-failure" => Ok(RestartPolicy::OnFailure { max_retries: None }),
            other => {
                if let Some(count) = other.strip_prefix("on-failure:") {
                    let n = count
                        .parse::<u32>()
                        .map_err(|_| format!("invalid retry count '{}'", count))?;
                    Ok(RestartPolicy::OnFailure {
                        max_retries: Some(n),
                    })
                } else {
                    Err(format!(
                        "unknown restart policy '{}' (expected no, always, unless-stopped or on-failure[:N])",
                        other
                    ))
                }
            }
        }
    }
}
