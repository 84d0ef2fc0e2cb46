use anpost_tracking::{SftpSessionManager, Tracker, ValidationMode};
use anyhow::{Context, Result};
use futures::StreamExt;
use tracing::*;

use crate::config::{load_config, require_sftp};

#[derive(clap::Args)]
#[clap(group(clap::ArgGroup::new("start").required(true).args(["account", "from"])))]
pub(crate) struct TrackArgs {
    /// Carrier account number; the walk starts after its first listed file
    #[clap(long)]
    account: Option<String>,
    /// Start from the most recent files instead, skipping this many from the end
    #[clap(long, default_value_t = 0, requires = "account")]
    skip_from_end: usize,
    /// Last tracking file already processed, e.g. cdt0000000100004.txt
    #[clap(long)]
    from: Option<String>,
    /// Reject files whose header, footer or counts are inconsistent
    #[clap(long)]
    strict: bool,
}

pub(crate) async fn command(cli: &crate::Cli, args: &TrackArgs) -> Result<()> {
    let config = load_config(&cli.config, true)?;
    let mode = if args.strict {
        ValidationMode::Strict
    } else {
        ValidationMode::Tolerant
    };
    let mut tracker =
        Tracker::from_config(require_sftp(&config)?, config.proxy.clone()).with_validation(mode);

    let result = walk(&mut tracker, args).await;
    if let Err(error) = tracker.close().await {
        warn!(%error, "Failed to close session");
    }

    let (printed, skipped) = result?;
    info!(printed, skipped, "Tracking walk finished");
    Ok(())
}

/// Prints each batch as one JSON line. Unparseable files are reported and
/// skipped; any other failure stops the walk.
async fn walk(tracker: &mut Tracker<SftpSessionManager>, args: &TrackArgs) -> Result<(usize, usize)> {
    let mut files = match (&args.account, &args.from) {
        (_, Some(from)) => tracker.track_from(from)?,
        (Some(account), None) => {
            tracker
                .track_with_account_number(account, args.skip_from_end)
                .await?
        }
        (None, None) => anyhow::bail!("Either --account or --from is required"),
    };

    let (mut printed, mut skipped) = (0, 0);
    while let Some(item) = files.next().await {
        match item {
            Ok(file) => {
                println!("{}", serde_json::to_string(&file)?);
                printed += 1;
            }
            Err(error) if !error.is_fatal() => {
                error!(%error, "Skipping tracking file");
                skipped += 1;
            }
            Err(error) => return Err(error).context("Tracking walk failed"),
        }
    }
    Ok((printed, skipped))
}
