use super::HealthChecker;
use crate::config::Engine;
use crate::docker::DockerClient;
use crate::error::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret as _, SecretString};
use std::sync::Arc;
use std::time::Duration;

/// Both client binaries read the password from this variable, which keeps it
/// off the `docker exec` command line.
const CLIENT_PASSWORD_VAR: &str = "MYSQL_PWD";

/// Authenticates with the application account by running the engine's client
/// inside the container.
pub struct ExecAuthChecker {
    client: DockerClient,
    container: String,
    engine: Engine,
    user: String,
    database: String,
    password: Arc<SecretString>,
    timeout: Duration,
}

impl ExecAuthChecker {
    pub fn new(
        container: impl Into<String>,
        engine: Engine,
        user: impl Into<String>,
        database: impl Into<String>,
        password: Arc<SecretString>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: DockerClient::new(),
            container: container.into(),
            engine,
            user: user.into(),
            database: database.into(),
            password,
            timeout,
        }
    }

    fn client_args(&self) -> Vec<String> {
        vec![
            self.engine.client_binary().to_string(),
            "--protocol=TCP".to_string(),
            "-h127.0.0.1".to_string(),
            format!("-u{}", self.user),
            "-e".to_string(),
            "SELECT 1".to_string(),
            self.database.clone(),
        ]
    }
}

#[async_trait]
impl HealthChecker for ExecAuthChecker {
    async fn check(&self) -> Result<bool> {
        let args = self.client_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match self
            .client
            .exec_with_env(
                &self.container,
                &[(CLIENT_PASSWORD_VAR, self.password.expose_secret())],
                &args,
                self.timeout,
            )
            .await
        {
            Ok(output) => Ok(output.status.success()),
            Err(e) => {
                tracing::trace!("Authenticated probe failed: {}", e);
                Ok(false)
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn describe(&self) -> String {
        format!("login as '{}' in {}", self.user, self.container)
    }
}
