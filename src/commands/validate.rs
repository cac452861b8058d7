use super::{connection_hint, Workspace};
use crate::output::{mask_secret, UserOutput};
use dbkeeper::docker::DockerClient;
use dbkeeper::{Configuration, VolumeInitGate, VolumeState};
use secrecy::ExposeSecret as _;
use std::time::Duration;

const DAEMON_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run_validate(ws: &Workspace, out: &dyn UserOutput) -> anyhow::Result<()> {
    let config = ws.load_configuration()?;
    out.success("Configuration is valid");
    for line in summary(&config) {
        out.status(&line);
    }

    let definition = dbkeeper::definition::build(&config);
    out.status("");
    out.status("Container command (secret values are passed through the environment):");
    out.status(&format!("  docker {}", definition.render_run_args().join(" ")));

    match VolumeInitGate::for_engine(config.engine()).classify(config.data_dir()) {
        Ok(VolumeState::Initialized) => out.warning(
            "The volume is already initialized: changes to credentials or DB_NAME \
             have no effect until it is purged",
        ),
        Ok(VolumeState::Empty) => out.status("The volume is empty and will be initialized on first start"),
        Err(e) => out.warning(&e.to_string()),
    }

    match DockerClient::new().server_version(DAEMON_PROBE_TIMEOUT).await {
        Some(version) => out.status(&format!("Docker daemon: {}", version)),
        None => out.warning("Docker daemon is not reachable; `dbkeeper up` will fail until it is"),
    }
    Ok(())
}

fn summary(config: &Configuration) -> Vec<String> {
    let mut lines = vec![
        format!("  Engine:         {}", config.engine()),
        format!("  Image:          {}", config.image()),
        format!("  Container:      {}", config.container_name()),
        format!("  Network:        {}", config.network_name()),
        format!("  Port:           {}", config.host_port()),
        format!("  Database:       {}", config.database()),
        format!("  User:           {}", config.user()),
        format!("  Password:       {}", mask_secret(config.password().expose_secret())),
        format!("  Root password:  {}", mask_secret(config.root_password().expose_secret())),
        format!("  Data dir:       {}", config.data_dir().display()),
    ];
    if let Some(scripts) = config.init_scripts() {
        lines.push(format!("  Init scripts:   {}", scripts.display()));
    }
    lines.push(format!("  Restart policy: {}", config.restart_policy()));
    if !config.resources().is_empty() {
        lines.push(format!("  Resources:      {}", config.resources().docker_args().join(" ")));
    }
    let health = config.health();
    lines.push(format!(
        "  Health check:   {} probe, {} attempt(s), {:?} initial backoff",
        health.probe, health.retries, health.interval
    ));
    lines.push(format!("  Connect:        {}", connection_hint(config)));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbkeeper::config::{keys, MapSource};
    use dbkeeper::ConfigResolver;
    use tempfile::TempDir;

    #[test]
    fn test_summary_masks_credentials() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sql")).unwrap();
        let config = ConfigResolver::new(dir.path())
            .resolve(&MapSource::from_pairs([
                (keys::ROOT_PASSWORD, "r00t-secret"),
                (keys::DATABASE, "shop"),
                (keys::USER, "shop_app"),
                (keys::PASSWORD, "app-secret"),
                (keys::INIT_SCRIPTS, "sql"),
            ]))
            .unwrap();
        let text = summary(&config).join("\n");
        assert!(!text.contains("r00t-secret"));
        assert!(!text.contains("app-secret"));
        assert!(text.contains("Password:       ***"));
        assert!(text.contains(&dir.path().join("sql").display().to_string()));
    }
}
