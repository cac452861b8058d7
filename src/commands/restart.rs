use super::{attached_controller, connection_hint, Workspace};
use crate::output::UserOutput;
use dbkeeper::LifecycleState;

pub async fn run_restart(ws: &Workspace, out: &dyn UserOutput) -> anyhow::Result<()> {
    let config = ws.load_configuration()?;
    let _lock = ws.lock_container(&config)?;
    let controller = attached_controller(&config).await?;
    let name = config.container_name();

    if controller.state() != LifecycleState::Running {
        out.status(&format!("{} is not running, starting it", name));
    } else {
        out.status(&format!("Restarting {}...", name));
    }

    controller.restart().await?;
    out.success(&format!("{} is running", name));
    out.status(&format!("  Connect: {}", connection_hint(&config)));
    Ok(())
}
