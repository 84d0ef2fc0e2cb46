use anpost_tracking::Tracker;
use anyhow::{Context, Result};
use tracing::*;

use crate::config::{load_config, require_sftp};

pub(crate) async fn command(cli: &crate::Cli, pattern: &str) -> Result<()> {
    let config = load_config(&cli.config, true)?;
    let mut tracker = Tracker::from_config(require_sftp(&config)?, config.proxy.clone());

    let listing = tracker
        .list_tracking_files(pattern)
        .await
        .context("Could not list remote files");
    if let Err(error) = tracker.close().await {
        warn!(%error, "Failed to close session");
    }

    let entries = listing?;
    for entry in &entries {
        let modified = entry
            .modified_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!("{}\t{modified}", entry.name);
    }
    info!(count = entries.len(), %pattern, "Listed remote files");
    Ok(())
}
