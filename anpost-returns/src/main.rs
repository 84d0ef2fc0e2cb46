mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anpost_tracking::MATCH_ALL;
use anyhow::Result;
use clap::Parser;
use logging::init_logging;

#[derive(clap::Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, env = "ANPOST_CONFIG", default_value = "/etc/anpost.yaml")]
    config: PathBuf,
}

#[derive(clap::Subcommand)]
pub(crate) enum Commands {
    /// Validate config file
    Check,
    /// List files in the remote tracking folder
    List {
        #[clap(long, default_value = MATCH_ALL)]
        pattern: String,
    },
    /// Download and print every tracking file newer than a starting point
    Track(commands::track::TrackArgs),
    /// Create a return label from a JSON request file
    Label {
        #[clap(long, short)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();

    match &cli.command {
        Commands::Check => crate::commands::check::command(&cli).await,
        Commands::List { pattern } => crate::commands::list::command(&cli, pattern).await,
        Commands::Track(args) => crate::commands::track::command(&cli, args).await,
        Commands::Label { input } => crate::commands::label::command(&cli, input).await,
    }
}
