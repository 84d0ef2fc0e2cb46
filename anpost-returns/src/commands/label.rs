use std::path::Path;

use anpost_labels::{LabelClient, ReturnLabelRequest};
use anyhow::{Context, Result};
use tracing::*;

use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli, input: &Path) -> Result<()> {
    let config = load_config(&cli.config, true)?;

    let raw = tokio::fs::read(input)
        .await
        .with_context(|| format!("Could not read {input:?}"))?;
    let request: ReturnLabelRequest =
        serde_json::from_slice(&raw).with_context(|| format!("Could not parse {input:?}"))?;

    let client = LabelClient::new(&config.api, config.proxy.as_ref())?;
    let label = client
        .create_return_label(&request)
        .await
        .context("Label request failed")?;

    info!(
        tracking_number = ?label.tracking_number,
        transaction_reference = ?label.transaction_reference,
        "Label created"
    );
    println!("{}", serde_json::to_string_pretty(&label)?);
    Ok(())
}
