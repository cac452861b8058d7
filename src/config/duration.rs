//! Duration parsing for timeout and interval options.
//!
//! Accepts human-readable strings like "5s", "30s", "1m", "500ms", "1h".

use crate::error::ConfigError;
use std::time::Duration;

/// Parse a duration string like "10s", "1m", "500ms" or "2h".
///
/// A bare number is taken as seconds. Returns `None` if the string cannot be
/// parsed.
///
/// # Examples
///
/// ```
/// use dbkeeper::config::parse_duration_string;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration_string("5s"), Some(Duration::from_secs(5)));
/// assert_eq!(parse_duration_string("500ms"), Some(Duration::from_millis(500)));
/// assert_eq!(parse_duration_string("1m"), Some(Duration::from_secs(60)));
/// assert_eq!(parse_duration_string("30"), Some(Duration::from_secs(30)));
/// ```
pub fn parse_duration_string(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let digits_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(digits_end);
    let value: u64 = number.parse().ok()?;

    match unit.trim() {
        "ms" => Some(Duration::from_millis(value)),
        "" | "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}

/// Parse a non-zero duration option, naming `key` on failure.
pub fn parse_duration(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    match parse_duration_string(raw) {
        Some(d) if !d.is_zero() => Ok(d),
        Some(_) => Err(ConfigError::invalid(key, "duration must be greater than zero")),
        None => Err(ConfigError::invalid(
            key,
            format!("'{}' is not a duration. Use formats like '5s', '500ms', '1m'", raw),
        )),
    }
}
