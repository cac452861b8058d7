use super::{attached_controller, Workspace};
use crate::output::UserOutput;

pub async fn run_logs(
    ws: &Workspace,
    tail: Option<usize>,
    follow: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let config = ws.load_configuration()?;
    let controller = attached_controller(&config).await?;

    if controller.handle().is_none() {
        out.status(&format!("{} has no container", config.container_name()));
        return Ok(());
    }

    if follow {
        tokio::select! {
            result = controller.logs(tail, true) => result?,
            _ = tokio::signal::ctrl_c() => {}
        }
    } else {
        controller.logs(tail, false).await?;
    }
    Ok(())
}
