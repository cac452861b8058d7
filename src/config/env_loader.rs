//! Key-value configuration sources.
//!
//! Configuration is read from one of these sources exactly once, at process
//! start. Nothing below the resolver reads the ambient environment.
//!
//! - [`FileSource`]: a `.env` file (KEY=VALUE, `#` comments, quoted values)
//! - [`EnvSource`]: a snapshot of the process environment
//! - [`MapSource`]: an in-memory map, mostly for tests and embedding
//! - [`LayeredSource`]: several sources where later layers win

use crate::error::ConfigError;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// A read-only key-value store holding configuration options.
pub trait ConfigSource: Send + Sync {
    /// Value for `key`, if the source defines it.
    fn get(&self, key: &str) -> Option<String>;

    /// All keys the source defines.
    fn keys(&self) -> Vec<String>;

    /// Human-readable origin, used in warnings.
    fn describe(&self) -> String;
}

/// In-memory source.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Return a copy with `key` set to `value`.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    /// Return a copy without `key`.
    pub fn without(mut self, key: &str) -> Self {
        self.values.remove(key);
        self
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn describe(&self) -> String {
        "in-memory map".to_string()
    }
}

/// Snapshot of the process environment taken at construction.
#[derive(Debug, Clone)]
pub struct EnvSource {
    inner: MapSource,
}

impl EnvSource {
    /// Capture every variable whose name starts with `prefix`.
    pub fn capture(prefix: &str) -> Self {
        let values = std::env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();
        Self {
            inner: MapSource::new(values),
        }
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    fn describe(&self) -> String {
        "process environment".to_string()
    }
}

/// A parsed `.env` file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    inner: MapSource,
}

impl FileSource {
    /// Parse `path` as a dotenv file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let values = load_env_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            inner: MapSource::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Ordered stack of sources. Later layers override earlier ones.
#[derive(Default)]
pub struct LayeredSource {
    layers: Vec<Box<dyn ConfigSource>>,
}

impl LayeredSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(mut self, source: impl ConfigSource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl ConfigSource for LayeredSource {
    fn get(&self, key: &str) -> Option<String> {
        self.layers.iter().rev().find_map(|layer| layer.get(key))
    }

    fn keys(&self) -> Vec<String> {
        let keys: BTreeSet<String> = self.layers.iter().flat_map(|l| l.keys()).collect();
        keys.into_iter().collect()
    }

    fn describe(&self) -> String {
        self.layers
            .iter()
            .map(|l| l.describe())
            .collect::<Vec<_>>()
            .join(" < ")
    }
}

/// Load variables from a single .env file.
///
/// Uses dotenvy for parsing which handles KEY=VALUE lines, `#` comments,
/// single and double quoted values, and empty lines. Every name is checked
/// against POSIX naming rules.
pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::Source {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }

    let iter = dotenvy::from_path_iter(path).map_err(|e| ConfigError::Source {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut env_vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| ConfigError::Source {
            path: path.to_path_buf(),
            reason: format!("parse error: {}", e),
        })?;
        validate_env_name(&key).map_err(|reason| ConfigError::Source {
            path: path.to_path_buf(),
            reason,
        })?;
        env_vars.insert(key, value);
    }

    Ok(env_vars)
}

/// Validate an environment variable name.
///
/// Names must start with a letter or underscore and contain only ASCII
/// alphanumerics and underscores.
pub fn validate_env_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err("variable name cannot be empty".to_string());
    };

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(format!(
            "invalid variable name '{}': must start with a letter or underscore",
            name
        ));
    }

    for (i, c) in name.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(format!(
                "invalid variable name '{}': character '{}' at position {} is not allowed",
                name, c, i
            ));
        }
    }

    Ok(())
}
