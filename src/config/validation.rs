//! Shape checks for individual configuration values.
//!
//! Each check names the key it validated so the resolver can report the
//! offending option without extra bookkeeping.

use crate::error::ConfigError;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Longest database name the engine accepts.
pub const MAX_DATABASE_NAME_LEN: usize = 64;
/// Longest account name the engine accepts.
pub const MAX_USER_NAME_LEN: usize = 32;
/// Keeps `<project>-db` / `<project>-net` well under Docker's name limit.
pub const MAX_PROJECT_LEN: usize = 48;

static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();
static PROJECT_REGEX: OnceLock<Regex> = OnceLock::new();
static SERVER_ARG_REGEX: OnceLock<Regex> = OnceLock::new();

fn identifier_regex() -> &'static Regex {
    IDENTIFIER_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex pattern is valid"))
}

fn project_regex() -> &'static Regex {
    PROJECT_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9_.-]*$").expect("static regex pattern is valid")
    })
}

fn server_arg_regex() -> &'static Regex {
    SERVER_ARG_REGEX.get_or_init(|| {
        Regex::new(r"^--[a-z0-9][a-z0-9_-]*(=\S+)?$").expect("static regex pattern is valid")
    })
}

/// A credential must contain at least one non-whitespace character.
pub fn validate_secret(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(key, "must not be empty"));
    }
    if value.contains('\n') || value.contains('\0') {
        return Err(ConfigError::invalid(
            key,
            "must not contain newlines or NUL bytes",
        ));
    }
    Ok(())
}

/// Database and account names: `[A-Za-z0-9_]`, bounded length.
pub fn validate_identifier(key: &str, value: &str, max_len: usize) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::invalid(key, "must not be empty"));
    }
    if value.len() > max_len {
        return Err(ConfigError::invalid(
            key,
            format!("'{}' is longer than {} characters", value, max_len),
        ));
    }
    if !identifier_regex().is_match(value) {
        return Err(ConfigError::invalid(
            key,
            format!(
                "'{}' may only contain letters, digits and underscores",
                value
            ),
        ));
    }
    Ok(())
}

/// The application account is created by the image entrypoint, which refuses
/// to create a second `root`.
pub fn validate_user(key: &str, value: &str) -> Result<(), ConfigError> {
    validate_identifier(key, value, MAX_USER_NAME_LEN)?;
    if value.eq_ignore_ascii_case("root") {
        return Err(ConfigError::invalid(
            key,
            "'root' is reserved; use the root credential for superuser access",
        ));
    }
    Ok(())
}

/// TCP port in 1..=65535.
pub fn validate_port(key: &str, value: &str) -> Result<u16, ConfigError> {
    match value.trim().parse::<u16>() {
        Ok(0) => Err(ConfigError::invalid(key, "port 0 is not a valid TCP port")),
        Ok(port) => Ok(port),
        Err(_) => Err(ConfigError::invalid(
            key,
            format!("'{}' is not a TCP port number (1-65535)", value),
        )),
    }
}

/// Project name used as container and network name prefix.
pub fn validate_project(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.len() > MAX_PROJECT_LEN {
        return Err(ConfigError::invalid(
            key,
            format!("'{}' is longer than {} characters", value, MAX_PROJECT_LEN),
        ));
    }
    if !project_regex().is_match(value) {
        return Err(ConfigError::invalid(
            key,
            format!(
                "'{}' must start with a lowercase letter or digit and contain only [a-z0-9_.-]",
                value
            ),
        ));
    }
    Ok(())
}

/// Whitespace-separated server flags, each `--name` or `--name=value`.
pub fn parse_server_args(key: &str, value: &str) -> Result<Vec<String>, ConfigError> {
    value
        .split_whitespace()
        .map(|arg| {
            if server_arg_regex().is_match(arg) {
                Ok(arg.to_string())
            } else {
                Err(ConfigError::invalid(
                    key,
                    format!("'{}' is not a server flag of the form --name[=value]", arg),
                ))
            }
        })
        .collect()
}

/// Resolve `raw` against `base_dir` unless it is already absolute.
pub fn resolve_path(base_dir: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw.trim());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Bind-mount sources are rendered as `-v <source>:<target>`, which has no
/// escaping for `:`.
pub fn validate_mount_source(key: &str, path: &Path) -> Result<(), ConfigError> {
    if path.to_string_lossy().contains(':') {
        return Err(ConfigError::invalid(
            key,
            format!("'{}' contains ':', which cannot be bind-mounted", path.display()),
        ));
    }
    Ok(())
}

/// The init script location must be an existing directory.
pub fn validate_init_scripts(key: &str, path: &Path) -> Result<(), ConfigError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ConfigError::invalid(
            key,
            format!("'{}' is not a directory", path.display()),
        )),
        Err(e) => Err(ConfigError::invalid(
            key,
            format!("cannot access '{}': {}", path.display(), e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_secret() {
        assert!(validate_secret("DB_PASSWORD", "s3cret").is_ok());
        assert!(validate_secret("DB_PASSWORD", "").is_err());
        assert!(validate_secret("DB_PASSWORD", "   ").is_err());
        assert!(validate_secret("DB_PASSWORD", "a\nb").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("DB_NAME", "app_db", 64).is_ok());
        assert!(validate_identifier("DB_NAME", "App2", 64).is_ok());
        assert!(validate_identifier("DB_NAME", "app-db", 64).is_err());
        assert!(validate_identifier("DB_NAME", "app db", 64).is_err());
        assert!(validate_identifier("DB_NAME", &"a".repeat(65), 64).is_err());
        assert!(validate_identifier("DB_NAME", &"a".repeat(64), 64).is_ok());
    }

    #[test]
    fn test_validate_user_rejects_root() {
        let err = validate_user("DB_USER", "ROOT").unwrap_err();
        assert_eq!(err.key(), Some("DB_USER"));
    }

    #[test]
    fn test_validate_port() {
        assert_eq!(validate_port("DB_PORT", "3307").unwrap(), 3307);
        assert_eq!(validate_port("DB_PORT", "65535").unwrap(), 65535);
        assert!(validate_port("DB_PORT", "0").is_err());
        assert!(validate_port("DB_PORT", "65536").is_err());
        assert!(validate_port("DB_PORT", "-1").is_err());
        assert!(validate_port("DB_PORT", "http").is_err());
    }

    #[test]
    fn test_validate_project() {
        assert!(validate_project("DB_PROJECT", "shop").is_ok());
        assert!(validate_project("DB_PROJECT", "shop-2.staging").is_ok());
        assert!(validate_project("DB_PROJECT", "-shop").is_err());
        assert!(validate_project("DB_PROJECT", "Shop").is_err());
    }

    #[test]
    fn test_parse_server_args() {
        let args = parse_server_args(
            "DB_SERVER_ARGS",
            "--max-connections=300  --skip-name-resolve",
        )
        .unwrap();
        assert_eq!(args, vec!["--max-connections=300", "--skip-name-resolve"]);
        assert!(parse_server_args("DB_SERVER_ARGS", "max-connections=3").is_err());
        assert!(parse_server_args("DB_SERVER_ARGS", "").unwrap().is_empty());
    }

    #[test]
    fn test_mount_source_rejects_colon() {
        assert!(validate_mount_source("DB_DATA_DIR", Path::new("/srv/shop/data")).is_ok());
        let err = validate_mount_source("DB_DATA_DIR", Path::new("/srv/a:b/data")).unwrap_err();
        assert_eq!(err.key(), Some("DB_DATA_DIR"));
    }

    #[test]
    fn test_validate_init_scripts() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_init_scripts("DB_INIT_SCRIPTS", dir.path()).is_ok());

        let file = dir.path().join("seed.sql");
        std::fs::write(&file, "SELECT 1;").unwrap();
        assert!(validate_init_scripts("DB_INIT_SCRIPTS", &file).is_err());
        assert!(validate_init_scripts("DB_INIT_SCRIPTS", &dir.path().join("missing")).is_err());
    }
}
