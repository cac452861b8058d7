use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dbkeeper", version)]
#[command(about = "dbkeeper - Run a MySQL or MariaDB container with a safe lifecycle")]
pub struct Cli {
    /// Dotenv file with DB_* settings (defaults to .env in the working directory)
    #[arg(short, long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Working directory
    #[arg(short, long, global = true)]
    pub workdir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the database and wait until it accepts logins
    Up,
    /// Stop and remove the database container
    Down {
        /// Also delete the data volume (irreversible)
        #[arg(long)]
        purge: bool,

        /// Confirm --purge without prompting
        #[arg(short, long, requires = "purge")]
        yes: bool,
    },
    /// Stop the database, then start it again on the same volume
    Restart,
    /// Show lifecycle state, container and volume
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show database container logs
    Logs {
        /// Number of lines to show from the end of the logs
        #[arg(short = 'n', long)]
        tail: Option<usize>,

        /// Follow log output
        #[arg(short, long)]
        follow: bool,
    },
    /// Validate configuration and print the container definition
    Validate,
    /// Write a .env template listing every option
    Init {
        /// Output file path
        #[arg(short, long, default_value = ".env")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: clap_complete::Shell,
    },
}
