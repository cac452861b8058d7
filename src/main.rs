mod cli;
mod commands;
mod output;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use commands::Workspace;
use dbkeeper::error::EXIT_OTHER;
use dbkeeper::Error as DbError;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(db_error) = e.downcast_ref::<DbError>() {
            eprintln!("Error: {}", db_error);
            if let Some(suggestion) = db_error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
            std::process::exit(db_error.exit_code());
        }

        eprintln!("Error: {:#}", e);
        std::process::exit(EXIT_OTHER);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        let bin_name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
        return Ok(());
    }

    let ws = Workspace::resolve(cli.workdir, cli.env_file)?;
    let out = output::CliOutput;

    match cli.command {
        Commands::Up => commands::run_up(&ws, &out).await,
        Commands::Down { purge, yes } => commands::run_down(&ws, purge, yes, &out).await,
        Commands::Restart => commands::run_restart(&ws, &out).await,
        Commands::Status { json } => commands::run_status(&ws, json, &out).await,
        Commands::Logs { tail, follow } => commands::run_logs(&ws, tail, follow, &out).await,
        Commands::Validate => commands::run_validate(&ws, &out).await,
        Commands::Init { output, force } => commands::run_init(&ws.path(&output), force, &out),
        Commands::Completions { .. } => Ok(()),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
