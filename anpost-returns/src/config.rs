use std::path::Path;

use anpost_common::helpers::fs::secure_file;
use anpost_common::{ReturnsConfig, SftpConfig};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use tracing::*;

pub fn load_config(path: &Path, secure: bool) -> Result<ReturnsConfig> {
    if secure {
        secure_file(path).context("Could not secure config")?;
    }

    let config: ReturnsConfig = Config::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix("ANPOST").separator("__"))
        .build()
        .context("Could not load config")?
        .try_deserialize()
        .context("Could not parse config")?;
    config.validate().context("Invalid config")?;

    info!(
        "Using config: {path:?} (sftp: {}, api: {}, proxy: {})",
        config.sftp.as_ref().map_or("none", |s| s.host.as_str()),
        config.api.api_base_url(),
        config.proxy.as_ref().map_or("none", |p| p.host.as_str()),
    );
    Ok(config)
}

pub fn require_sftp(config: &ReturnsConfig) -> Result<SftpConfig> {
    config
        .sftp
        .clone()
        .context("The config has no `sftp` section")
}
