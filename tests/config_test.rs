use dbkeeper::config::{keys, FileSource, LayeredSource, MapSource};
use dbkeeper::error::EXIT_CONFIG;
use dbkeeper::{ConfigError, ConfigResolver, Error};
use proptest::prelude::*;
use std::time::Duration;
use tempfile::TempDir;

fn complete() -> MapSource {
    MapSource::from_pairs([
        (keys::ROOT_PASSWORD, "r00t-pw"),
        (keys::DATABASE, "shop"),
        (keys::USER, "shop_app"),
        (keys::PASSWORD, "app-pw"),
    ])
}

fn resolve(source: &MapSource) -> Result<dbkeeper::Configuration, ConfigError> {
    ConfigResolver::new("/srv/app").resolve(source)
}

#[test]
fn test_complete_configuration_resolves_with_defaults() {
    let config = resolve(&complete()).unwrap();
    assert_eq!(config.host_port(), 3306);
    assert_eq!(config.image(), "mysql:8.4");
    assert_eq!(config.data_dir(), std::path::Path::new("/srv/app/data"));
    assert_eq!(config.runtime_timeout(), Duration::from_secs(120));
    assert_eq!(config.health().retries, 30);
    assert!(config.init_scripts().is_none());
}

#[test]
fn test_missing_key_is_named() {
    let err = resolve(&complete().without(keys::USER)).unwrap_err();
    assert_eq!(err, ConfigError::MissingKey("DB_USER".into()));

    let err: Error = err.into();
    assert_eq!(err.exit_code(), EXIT_CONFIG);
    assert!(err.suggestion().unwrap().contains("DB_USER"));
}

#[test]
fn test_missing_key_wins_over_invalid_value() {
    // DB_NAME is invalid, but the missing password is reported first.
    let source = complete()
        .with(keys::DATABASE, "not a name")
        .without(keys::PASSWORD);
    assert_eq!(
        resolve(&source).unwrap_err(),
        ConfigError::MissingKey("DB_PASSWORD".into())
    );
}

#[test]
fn test_empty_credential_is_invalid() {
    let err = resolve(&complete().with(keys::ROOT_PASSWORD, "")).unwrap_err();
    assert_eq!(err.key(), Some("DB_ROOT_PASSWORD"));
}

#[test]
fn test_invalid_values_name_their_key() {
    let cases = [
        (keys::PORT, "70000"),
        (keys::ENGINE, "postgres"),
        (keys::IMAGE, "mysql 8"),
        (keys::PROJECT, "Shop"),
        (keys::RESTART_POLICY, "sometimes"),
        (keys::HEALTH_RETRIES, "0"),
        (keys::HEALTH_INTERVAL, "soon"),
        (keys::SERVER_ARGS, "--ok rm -rf"),
        (keys::INIT_SCRIPTS, "/definitely/not/here"),
        (keys::DATA_DIR, "/srv/shop:old/data"),
    ];
    for (key, value) in cases {
        let err = resolve(&complete().with(key, value)).unwrap_err();
        assert_eq!(err.key(), Some(key), "{}={} gave {:?}", key, value, err);
    }
}

#[test]
fn test_mariadb_engine_defaults() {
    let config = resolve(&complete().with(keys::ENGINE, "mariadb")).unwrap();
    assert_eq!(config.image(), "mariadb:11.4");
    assert_eq!(config.host_port(), 3306);
}

#[test]
fn test_env_file_layered_under_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".env");
    std::fs::write(
        &path,
        "# local development\n\
         DB_ROOT_PASSWORD='r00t pw'\n\
         DB_NAME=shop\n\
         DB_USER=shop_app\n\
         DB_PASSWORD=\"from-file\"\n\
         DB_PORT=3307\n",
    )
    .unwrap();

    let source = LayeredSource::new()
        .layer(FileSource::load(&path).unwrap())
        .layer(MapSource::from_pairs([(keys::PORT, "3310")]));
    let config = ConfigResolver::new(dir.path()).resolve(&source).unwrap();

    assert_eq!(config.host_port(), 3310);
    assert_eq!(config.data_dir(), dir.path().join("data"));
}

#[test]
fn test_unknown_keys_are_ignored() {
    let source = complete().with("DB_PASSWROD", "typo").with("HOME", "/root");
    assert!(resolve(&source).is_ok());
}

#[test]
fn test_resolution_is_deterministic() {
    let source = complete()
        .with(keys::MEMORY, "2g")
        .with(keys::CPUS, "1.5")
        .with(keys::SERVER_ARGS, "--max-connections=200");
    assert_eq!(resolve(&source).unwrap(), resolve(&source).unwrap());
}

proptest! {
    /// Whatever subset of required keys is absent, the first one in the
    /// documented order is reported, regardless of other values.
    #[test]
    fn test_first_missing_required_key_reported(
        present in prop::collection::vec(any::<bool>(), 4),
        port in any::<u16>(),
    ) {
        prop_assume!(present.iter().any(|p| !p));

        let mut source = complete().with(keys::PORT, &port.to_string());
        for (key, keep) in keys::REQUIRED.iter().zip(&present) {
            if !keep {
                source = source.without(key);
            }
        }

        let expected = keys::REQUIRED
            .iter()
            .zip(&present)
            .find(|(_, keep)| !**keep)
            .map(|(key, _)| key.to_string())
            .unwrap();
        prop_assert_eq!(resolve(&source).unwrap_err(), ConfigError::MissingKey(expected));
    }

    #[test]
    fn test_any_nonzero_port_accepted(port in 1u16..=u16::MAX) {
        let config = resolve(&complete().with(keys::PORT, &port.to_string())).unwrap();
        prop_assert_eq!(config.host_port(), port);
    }
}
