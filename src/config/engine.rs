//! Supported database engine images and their filesystem/network contracts.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Database engine flavor of the stock image.
///
/// Both flavors share the same volume contract: the entrypoint treats the
/// data directory as initialized once it contains the `mysql` system schema
/// directory, and only runs `/docker-entrypoint-initdb.d` scripts before that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    MySql,
    MariaDb,
}

impl Engine {
    pub fn name(self) -> &'static str {
        match self {
            Engine::MySql => "mysql",
            Engine::MariaDb => "mariadb",
        }
    }

    pub fn default_image(self) -> &'static str {
        match self {
            Engine::MySql => "mysql:8.4",
            Engine::MariaDb => "mariadb:11.4",
        }
    }

    /// Port the engine listens on inside the container.
    pub fn canonical_port(self) -> u16 {
        3306
    }

    /// Data directory inside the container.
    pub fn data_dir(self) -> &'static str {
        "/var/lib/mysql"
    }

    /// Directory the image entrypoint scans for first-boot scripts.
    pub fn init_dir(self) -> &'static str {
        "/docker-entrypoint-initdb.d"
    }

    /// Path, relative to the data directory, the engine creates on first boot.
    pub fn marker(self) -> &'static str {
        "mysql"
    }

    /// Prefix of the image's environment variables.
    pub fn env_prefix(self) -> &'static str {
        match self {
            Engine::MySql => "MYSQL",
            Engine::MariaDb => "MARIADB",
        }
    }

    /// Command-line client shipped in the image.
    pub fn client_binary(self) -> &'static str {
        match self {
            Engine::MySql => "mysql",
            Engine::MariaDb => "mariadb",
        }
    }

    pub fn root_password_var(self) -> String {
        format!("{}_ROOT_PASSWORD", self.env_prefix())
    }

    pub fn database_var(self) -> String {
        format!("{}_DATABASE", self.env_prefix())
    }

    pub fn user_var(self) -> String {
        format!("{}_USER", self.env_prefix())
    }

    pub fn password_var(self) -> String {
        format!("{}_PASSWORD", self.env_prefix())
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(Engine::MySql),
            "mariadb" => Ok(Engine::MariaDb),
            other => Err(format!(
                "unsupported engine '{}' (expected 'mysql' or 'mariadb')",
                other
            )),
        }
    }
}
