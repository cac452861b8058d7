use super::{attached_controller, Workspace};
use crate::output::{is_interactive, UserOutput};
use dbkeeper::{Error, LifecycleState, PurgeConfirmation};
use std::path::Path;

pub async fn run_down(
    ws: &Workspace,
    purge: bool,
    yes: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let config = ws.load_configuration()?;
    let name = config.container_name();

    if purge {
        let volume = config.data_dir().to_path_buf();
        let confirmation = confirm_purge(config.project(), &volume, yes, is_interactive(), out)?;
        let _lock = ws.lock_container(&config)?;
        let controller = attached_controller(&config).await?;
        out.status(&format!("Stopping {} and deleting {}...", name, volume.display()));
        controller.destroy(&confirmation).await?;
        out.success(&format!("Removed {} and its data", name));
        return Ok(());
    }

    let _lock = ws.lock_container(&config)?;
    let controller = attached_controller(&config).await?;
    if controller.state() == LifecycleState::Stopped && controller.handle().is_none() {
        out.status(&format!("{} is not running", name));
        return Ok(());
    }

    out.status(&format!("Stopping {}...", name));
    controller.stop().await?;
    out.success(&format!("{} stopped; data kept in {}", name, config.data_dir().display()));
    Ok(())
}

/// Purge needs `--yes` or the project name typed at an interactive prompt.
fn confirm_purge(
    project: &str,
    volume: &Path,
    yes: bool,
    interactive: bool,
    out: &dyn UserOutput,
) -> Result<PurgeConfirmation, Error> {
    if yes {
        return Ok(PurgeConfirmation::for_volume(volume));
    }
    if !interactive {
        return Err(Error::PurgeNotConfirmed(volume.to_path_buf()));
    }

    out.warning(&format!(
        "This permanently deletes every database in {}",
        volume.display()
    ));
    match out.prompt(&format!("Type the project name '{}' to confirm:", project)) {
        Some(answer) if answer == project => Ok(PurgeConfirmation::for_volume(volume)),
        _ => Err(Error::PurgeNotConfirmed(volume.to_path_buf())),
    }
}
