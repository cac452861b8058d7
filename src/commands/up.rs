use super::{attached_controller, connection_hint, Workspace};
use crate::output::UserOutput;
use dbkeeper::{Error, LifecycleState, VolumeState};
use std::sync::Arc;

pub async fn run_up(ws: &Workspace, out: &dyn UserOutput) -> anyhow::Result<()> {
    let config = ws.load_configuration()?;
    let _lock = ws.lock_container(&config)?;
    let controller = attached_controller(&config).await?;
    let name = config.container_name();

    if controller.state() == LifecycleState::Running {
        out.status(&format!("{} is already running", name));
        out.status(&format!("  Connect: {}", connection_hint(&config)));
        return Ok(());
    }

    match controller.volume_state()? {
        VolumeState::Empty => out.status(&format!(
            "Initializing new volume at {}",
            config.data_dir().display()
        )),
        VolumeState::Initialized => out.status(&format!(
            "Using existing volume at {}",
            config.data_dir().display()
        )),
    }
    out.status(&format!("Starting {} ({})...", name, config.image()));

    // Ctrl-C preempts readiness polling through the controller's own stop path
    let interrupt = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            controller.stop().await
        })
    };

    let result = controller.start().await;
    match result {
        Ok(()) => {
            interrupt.abort();
            out.success(&format!("{} is running", name));
            out.status(&format!("  Connect: {}", connection_hint(&config)));
            Ok(())
        }
        Err(e) if matches!(e.root(), Error::Cancelled(_)) => {
            out.warning("Interrupted, stopping...");
            interrupt.await??;
            out.status(&format!("{} stopped", name));
            Err(e.into())
        }
        Err(e) => {
            interrupt.abort();
            Err(e.into())
        }
    }
}
