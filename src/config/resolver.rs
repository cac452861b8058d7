use super::env_loader::ConfigSource;
use super::validation::{
    parse_server_args, resolve_path, validate_identifier, validate_init_scripts,
    validate_mount_source, validate_port, validate_project, validate_secret, validate_user,
    MAX_DATABASE_NAME_LEN,
};
use super::{
    keys, parse_duration, Configuration, Engine, HealthSettings, ProbeKind, ResourceLimits,
    RestartPolicy,
};
use crate::error::ConfigError;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PROJECT: &str = "dbkeeper";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_AUDIT_LOG: &str = ".dbkeeper/audit.jsonl";
const DEFAULT_RUNTIME_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// Turns a [`ConfigSource`] into a validated [`Configuration`].
///
/// Relative paths (data directory, init scripts, audit log) are resolved
/// against `base_dir`, normally the directory holding the `.env` file.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    base_dir: PathBuf,
}

impl ConfigResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve and validate every recognized option.
    ///
    /// Presence of all required keys is checked before any value is
    /// validated, so a configuration missing a key always fails with
    /// [`ConfigError::MissingKey`]. Credential keys never get defaults.
    ///
    /// # Errors
    ///
    /// The first missing key, or the first invalid value in a fixed key order.
    pub fn resolve(&self, source: &dyn ConfigSource) -> Result<Configuration, ConfigError> {
        warn_unknown_keys(source);

        for key in keys::REQUIRED {
            if source.get(key).is_none() {
                return Err(ConfigError::MissingKey(key.to_string()));
            }
        }
        let required = |key: &str| source.get(key).unwrap_or_default();

        let root_password = required(keys::ROOT_PASSWORD);
        validate_secret(keys::ROOT_PASSWORD, &root_password)?;

        let database = required(keys::DATABASE);
        validate_identifier(keys::DATABASE, &database, MAX_DATABASE_NAME_LEN)?;

        let user = required(keys::USER);
        validate_user(keys::USER, &user)?;

        let password = required(keys::PASSWORD);
        validate_secret(keys::PASSWORD, &password)?;

        let engine = match optional(source, keys::ENGINE) {
            Some(raw) => raw
                .parse::<Engine>()
                .map_err(|reason| ConfigError::invalid(keys::ENGINE, reason))?,
            None => Engine::default(),
        };

        let host_port = match optional(source, keys::PORT) {
            Some(raw) => validate_port(keys::PORT, &raw)?,
            None => engine.canonical_port(),
        };

        let image = optional(source, keys::IMAGE)
            .unwrap_or_else(|| engine.default_image().to_string());
        if image.chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid(
                keys::IMAGE,
                format!("'{}' is not an image reference", image),
            ));
        }

        let project = optional(source, keys::PROJECT).unwrap_or_else(|| DEFAULT_PROJECT.to_string());
        validate_project(keys::PROJECT, &project)?;

        let data_dir = resolve_path(
            &self.base_dir,
            &optional(source, keys::DATA_DIR).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );
        validate_mount_source(keys::DATA_DIR, &data_dir)?;

        let init_scripts = match optional(source, keys::INIT_SCRIPTS) {
            Some(raw) => {
                let path = resolve_path(&self.base_dir, &raw);
                validate_mount_source(keys::INIT_SCRIPTS, &path)?;
                validate_init_scripts(keys::INIT_SCRIPTS, &path)?;
                Some(path)
            }
            None => None,
        };

        let restart_policy = match optional(source, keys::RESTART_POLICY) {
            Some(raw) => raw
                .parse::<RestartPolicy>()
                .map_err(|reason| ConfigError::invalid(keys::RESTART_POLICY, reason))?,
            None => RestartPolicy::default(),
        };

        let resources = ResourceLimits::parse(
            optional(source, keys::MEMORY).map(|v| (keys::MEMORY, v)),
            optional(source, keys::CPUS).map(|v| (keys::CPUS, v)),
        )?;

        let server_args = match optional(source, keys::SERVER_ARGS) {
            Some(raw) => parse_server_args(keys::SERVER_ARGS, &raw)?,
            None => Vec::new(),
        };

        let health = self.resolve_health(source)?;

        let runtime_timeout = match optional(source, keys::RUNTIME_TIMEOUT) {
            Some(raw) => parse_duration(keys::RUNTIME_TIMEOUT, &raw)?,
            None => DEFAULT_RUNTIME_TIMEOUT,
        };

        let stop_grace = match optional(source, keys::STOP_GRACE) {
            Some(raw) => parse_duration(keys::STOP_GRACE, &raw)?,
            None => DEFAULT_STOP_GRACE,
        };

        let audit_log = resolve_path(
            &self.base_dir,
            &optional(source, keys::AUDIT_LOG).unwrap_or_else(|| DEFAULT_AUDIT_LOG.to_string()),
        );

        tracing::debug!(
            engine = %engine,
            project = %project,
            database = %database,
            user = %user,
            host_port,
            data_dir = %data_dir.display(),
            "Resolved configuration from {}",
            source.describe()
        );

        Ok(Configuration {
            engine,
            image,
            project,
            root_password: Arc::new(SecretString::from(root_password)),
            database,
            user,
            password: Arc::new(SecretString::from(password)),
            host_port,
            data_dir,
            init_scripts,
            restart_policy,
            resources,
            server_args,
            health,
            runtime_timeout,
            stop_grace,
            audit_log,
        })
    }

    fn resolve_health(&self, source: &dyn ConfigSource) -> Result<HealthSettings, ConfigError> {
        let defaults = HealthSettings::default();

        let probe = match optional(source, keys::HEALTH_PROBE) {
            Some(raw) => raw
                .parse::<ProbeKind>()
                .map_err(|reason| ConfigError::invalid(keys::HEALTH_PROBE, reason))?,
            None => defaults.probe,
        };

        let retries = match optional(source, keys::HEALTH_RETRIES) {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::invalid(
                        keys::HEALTH_RETRIES,
                        format!("'{}' is not a positive attempt count", raw),
                    ))
                }
            },
            None => defaults.retries,
        };

        let interval = match optional(source, keys::HEALTH_INTERVAL) {
            Some(raw) => parse_duration(keys::HEALTH_INTERVAL, &raw)?,
            None => defaults.interval,
        };

        let timeout = match optional(source, keys::HEALTH_TIMEOUT) {
            Some(raw) => parse_duration(keys::HEALTH_TIMEOUT, &raw)?,
            None => defaults.timeout,
        };

        Ok(HealthSettings {
            probe,
            retries,
            interval,
            timeout,
        })
    }
}

/// Optional keys treat an empty value like an absent one.
fn optional(source: &dyn ConfigSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn warn_unknown_keys(source: &dyn ConfigSource) {
    for key in source.keys() {
        if key.starts_with(keys::PREFIX) && !keys::ALL.contains(&key.as_str()) {
            tracing::warn!(
                "Ignoring unrecognized option '{}' from {}",
                key,
                source.describe()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapSource;
    use secrecy::ExposeSecret as _;

    fn valid_source() -> MapSource {
        MapSource::from_pairs([
            (keys::ROOT_PASSWORD, "root-secret"),
            (keys::DATABASE, "inventory"),
            (keys::USER, "inv_app"),
            (keys::PASSWORD, "app-secret"),
        ])
    }

    #[test]
    fn test_resolve_defaults() {
        let config = ConfigResolver::new("/srv/inv")
            .resolve(&valid_source())
            .unwrap();

        assert_eq!(config.engine(), Engine::MySql);
        assert_eq!(config.image(), "mysql:8.4");
        assert_eq!(config.host_port(), 3306);
        assert_eq!(config.data_dir(), Path::new("/srv/inv/data"));
        assert_eq!(config.audit_log(), Path::new("/srv/inv/.dbkeeper/audit.jsonl"));
        assert_eq!(config.restart_policy(), RestartPolicy::Always);
        assert_eq!(config.init_scripts(), None);
        assert_eq!(config.health().retries, 30);
        assert_eq!(config.password().expose_secret(), "app-secret");
    }

    #[test]
    fn test_missing_key_reported_before_invalid_values() {
        let source = valid_source()
            .without(keys::USER)
            .with(keys::PORT, "99999")
            .with(keys::PASSWORD, "");
        let err = ConfigResolver::new("/").resolve(&source).unwrap_err();
        assert_eq!(err, ConfigError::MissingKey(keys::USER.to_string()));
    }

    #[test]
    fn test_empty_password_is_invalid_value() {
        let source = valid_source().with(keys::PASSWORD, "");
        let err = ConfigResolver::new("/").resolve(&source).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == keys::PASSWORD));
    }

    #[test]
    fn test_overrides() {
        let source = valid_source()
            .with(keys::ENGINE, "mariadb")
            .with(keys::PORT, "13306")
            .with(keys::PROJECT, "inv")
            .with(keys::DATA_DIR, "/var/data/inv")
            .with(keys::RESTART_POLICY, "unless-stopped")
            .with(keys::HEALTH_PROBE, "tcp")
            .with(keys::HEALTH_RETRIES, "3")
            .with(keys::HEALTH_INTERVAL, "200ms")
            .with(keys::SERVER_ARGS, "--max-connections=50");
        let config = ConfigResolver::new("/srv").resolve(&source).unwrap();

        assert_eq!(config.engine(), Engine::MariaDb);
        assert_eq!(config.image(), "mariadb:11.4");
        assert_eq!(config.host_port(), 13306);
        assert_eq!(config.container_name(), "inv-db");
        assert_eq!(config.data_dir(), Path::new("/var/data/inv"));
        assert_eq!(config.restart_policy(), RestartPolicy::UnlessStopped);
        assert_eq!(config.health().probe, ProbeKind::Tcp);
        assert_eq!(config.health().retries, 3);
        assert_eq!(config.health().interval, Duration::from_millis(200));
        assert_eq!(config.server_args(), ["--max-connections=50".to_string()]);
    }

    #[test]
    fn test_zero_retries_rejected() {
        let source = valid_source().with(keys::HEALTH_RETRIES, "0");
        let err = ConfigResolver::new("/").resolve(&source).unwrap_err();
        assert_eq!(err.key(), Some(keys::HEALTH_RETRIES));
    }

    #[test]
    fn test_empty_optional_value_uses_default() {
        let source = valid_source().with(keys::PORT, "  ");
        let config = ConfigResolver::new("/").resolve(&source).unwrap();
        assert_eq!(config.host_port(), 3306);
    }
}
