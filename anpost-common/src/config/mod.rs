mod defaults;

use std::path::PathBuf;

pub use defaults::{PRODUCTION_API_BASE_URL, TEST_API_BASE_URL};
use defaults::*;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ReturnsError, Secret};

/// SFTP drop folder the carrier publishes tracking files to.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SftpConfig {
    pub host: String,
    #[serde(default = "_default_ssh_port")]
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    /// Directory the tracking files live in.
    #[serde(default = "_default_remote_path")]
    pub remote_path: String,
    /// OpenSSH-encoded server key to pin, e.g. `ssh-ed25519 AAAA...`.
    #[serde(default)]
    pub host_key: Option<String>,
    /// Where downloaded files are staged before parsing. System temp dir when unset.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl SftpConfig {
    pub fn new<H: Into<String>, U: Into<String>, P: Into<String>>(
        host: H,
        username: U,
        password: P,
    ) -> Self {
        Self {
            host: host.into(),
            port: _default_ssh_port(),
            username: username.into(),
            password: Secret::new(password.into()),
            remote_path: _default_remote_path(),
            host_key: None,
            staging_dir: None,
        }
    }
}

/// HTTP forward proxy used for both the SFTP tunnel and the label API.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Secret<String>>,
}

impl ProxyConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username, password.expose_secret())),
            _ => None,
        }
    }

    pub fn uri(&self) -> Result<Url, ReturnsError> {
        let mut url = Url::parse(&format!("http://{}:{}", self.host, self.port))?;
        if let Some((username, password)) = self.credentials() {
            url.set_username(username)
                .and_then(|_| url.set_password(Some(password)))
                .map_err(|_| {
                    ReturnsError::Configuration(format!(
                        "proxy URL for {} cannot carry credentials",
                        self.host
                    ))
                })?;
        }
        Ok(url)
    }
}

/// Settings for the HTTPS return-label API.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub subscription_key: Option<Secret<String>>,
    /// Targets the non-production endpoint.
    #[serde(default = "_default_false")]
    pub test: bool,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ApiConfig {
    pub fn api_base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.test => TEST_API_BASE_URL,
            None => PRODUCTION_API_BASE_URL,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ReturnsConfig {
    #[serde(default)]
    pub sftp: Option<SftpConfig>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

impl ReturnsConfig {
    pub fn validate(&self) -> Result<(), ReturnsError> {
        if let Some(sftp) = &self.sftp {
            if sftp.host.trim().is_empty() {
                return Err(ReturnsError::Configuration("sftp.host is empty".into()));
            }
            if sftp.username.trim().is_empty() {
                return Err(ReturnsError::Configuration("sftp.username is empty".into()));
            }
        }
        if let Some(proxy) = &self.proxy {
            proxy.uri()?;
        }
        if let Some(base_url) = &self.api.base_url {
            Url::parse(base_url)?;
        }
        Ok(())
    }
}
