//! Resource limits for the database container.

use crate::error::ConfigError;
use serde::Serialize;

/// Container resource hints, mapped to `docker run` flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceLimits {
    /// Memory limit (e.g., "512m", "2g"). Maps to `--memory`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    /// CPU limit as decimal (e.g., "0.5", "2"). Maps to `--cpus`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<String>,
}

impl ResourceLimits {
    /// Validate raw option values into limits.
    pub fn parse(
        memory: Option<(&str, String)>,
        cpus: Option<(&str, String)>,
    ) -> Result<Self, ConfigError> {
        let memory = match memory {
            Some((key, raw)) => {
                let raw = raw.trim().to_string();
                match parse_memory_to_bytes(&raw) {
                    Some(bytes) if bytes >= MIN_MEMORY_BYTES => Some(raw),
                    Some(_) => {
                        return Err(ConfigError::invalid(
                            key,
                            "memory limit must be at least 6m (the Docker minimum)",
                        ))
                    }
                    None => {
                        return Err(ConfigError::invalid(
                            key,
                            format!("'{}' is not a memory size like '512m' or '2g'", raw),
                        ))
                    }
                }
            }
            None => None,
        };

        let cpus = match cpus {
            Some((key, raw)) => {
                let raw = raw.trim().to_string();
                match raw.parse::<f64>() {
                    Ok(v) if v.is_finite() && v > 0.0 => Some(raw),
                    _ => {
                        return Err(ConfigError::invalid(
                            key,
                            format!("'{}' is not a positive CPU count", raw),
                        ))
                    }
                }
            }
            None => None,
        };

        Ok(Self { memory, cpus })
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_none() && self.cpus.is_none()
    }

    /// Docker CLI flags for these limits.
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref memory) = self.memory {
            args.push("--memory".to_string());
            args.push(memory.clone());
        }
        if let Some(ref cpus) = self.cpus {
            args.push("--cpus".to_string());
            args.push(cpus.clone());
        }
        args
    }
}

const MIN_MEMORY_BYTES: u64 = 6 * 1024 * 1024;

/// Parse memory string (e.g., "512m", "2g") to bytes
///
/// Returns `None` for an invalid format, an unrecognized suffix, or a value
/// that would overflow u64.
pub fn parse_memory_to_bytes(memory: &str) -> Option<u64> {
    let suffix_start = memory
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(memory.len());

    let (num_part, suffix) = memory.split_at(suffix_start);
    let value: f64 = num_part.parse().ok()?;

    let bytes = match suffix.to_lowercase().as_str() {
        "" | "b" => value,
        "k" | "kb" => value * 1024.0,
        "m" | "mb" => value * 1024.0 * 1024.0,
        "g" | "gb" => value * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };

    if !bytes.is_finite() || bytes > u64::MAX as f64 {
        return None;
    }
    Some(bytes as u64)
}
