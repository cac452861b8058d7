use super::{attached_controller, Workspace};
use crate::output::UserOutput;
use dbkeeper::lifecycle::StatusReport;
use dbkeeper::LifecycleState;

pub async fn run_status(ws: &Workspace, json: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    let config = ws.load_configuration()?;
    let controller = attached_controller(&config).await?;
    let report = controller.report().await?;

    if json {
        out.status(&serde_json::to_string_pretty(&report)?);
    } else {
        for line in render(&report) {
            out.status(&line);
        }
    }
    Ok(())
}

fn render(report: &StatusReport) -> Vec<String> {
    let icon = match report.state {
        LifecycleState::Running => "+",
        LifecycleState::Stopped => "o",
        LifecycleState::Starting | LifecycleState::Stopping => ".",
        LifecycleState::Failed => "x",
    };

    let mut lines = vec![
        format!("{} {} {}", icon, report.service, report.state),
        format!("{:-<50}", ""),
    ];
    let container = match (&report.container_id, report.exit_code) {
        (Some(id), Some(code)) => format!("{} (exited with code {})", id, code),
        (Some(id), None) => id.clone(),
        (None, _) => "none".to_string(),
    };
    lines.push(format!("  Container: {}", container));
    lines.push(format!("  Image:     {}", report.image));
    lines.push(format!("  Port:      {}", report.port));

    let volume_state = match (&report.volume_state, &report.volume_error) {
        (Some(state), _) => state.to_string(),
        (None, Some(error)) => format!("unreadable ({})", error),
        (None, None) => "unknown".to_string(),
    };
    lines.push(format!(
        "  Volume:    {} [{}]",
        report.volume.display(),
        volume_state
    ));

    if let Some(ref last) = report.last_transition {
        lines.push(format!(
            "  Last:      {} {} -> {} at {}",
            last.operation,
            last.from,
            last.to,
            last.at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    lines
}
