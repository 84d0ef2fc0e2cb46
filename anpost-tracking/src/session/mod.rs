mod handler;
mod known_hosts;
mod proxy;

use std::path::Path;
use std::sync::Arc;

use anpost_common::{ProxyConfig, SftpConfig};
use async_trait::async_trait;
use chrono::DateTime;
use handler::ClientHandler;
pub use known_hosts::{KnownHostValidationResult, PinnedHostKey};
pub use proxy::{establish_tunnel, ProxyError};
use russh::client::Handle;
use russh_sftp::client::SftpSession;
use tokio::io::AsyncWriteExt;
use tracing::*;

use crate::{NameFilter, RemoteFileEntry, RemoteFiles, SftpError};

struct ConnectedSession {
    handle: Handle<ClientHandler>,
    sftp: SftpSession,
}

/// Owns the single SSH/SFTP session used to reach the carrier's drop folder.
///
/// Starts disconnected. [`RemoteFiles::connect`] opens the session (through the
/// HTTP proxy when one is configured) and every file operation requires it.
pub struct SftpSessionManager {
    config: SftpConfig,
    proxy: Option<ProxyConfig>,
    session: Option<ConnectedSession>,
}

impl SftpSessionManager {
    pub fn new(config: SftpConfig, proxy: Option<ProxyConfig>) -> Self {
        Self {
            config,
            proxy,
            session: None,
        }
    }

    fn sftp(&self) -> Result<&SftpSession, SftpError> {
        self.session
            .as_ref()
            .map(|s| &s.sftp)
            .ok_or(SftpError::NotConnected)
    }

    async fn open(
        config: &SftpConfig,
        proxy: Option<&ProxyConfig>,
    ) -> Result<ConnectedSession, SftpError> {
        let host = config.host.clone();
        let port = config.port;
        let connection_error = |e: &dyn std::fmt::Display| SftpError::connection(&host, e);

        let pinned_key = match &config.host_key {
            Some(line) => Some(PinnedHostKey::parse(line).ok_or_else(|| {
                SftpError::connection(&host, "configured host key is not an OpenSSH public key")
            })?),
            None => None,
        };
        let handler = ClientHandler {
            host: host.clone(),
            port,
            pinned_key,
        };
        let russh_config = Arc::new(russh::client::Config::default());

        info!(%host, port, username = %config.username, proxy = ?proxy.map(|p| &p.host), "Connecting");
        let mut handle = match proxy {
            Some(proxy) => {
                let stream = proxy::connect_through(proxy, &host, port)
                    .await
                    .map_err(|e| connection_error(&e))?;
                russh::client::connect_stream(russh_config, stream, handler).await
            }
            None => russh::client::connect(russh_config, (host.as_str(), port), handler).await,
        }
        .map_err(|e| connection_error(&e))?;

        let auth = handle
            .authenticate_password(
                config.username.clone(),
                config.password.expose_secret().clone(),
            )
            .await
            .map_err(|e| connection_error(&e))?;
        if !auth.success() {
            error!(%host, "Auth rejected");
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await;
            return Err(SftpError::connection(&host, "authentication rejected"));
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| connection_error(&e))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| connection_error(&e))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| connection_error(&e))?;

        info!(%host, "Connected");
        Ok(ConnectedSession { handle, sftp })
    }

    /// Drops the session if the transport died underneath a failed call.
    fn check_transport(&mut self, error: SftpError) -> SftpError {
        if error.is_not_found() {
            return error;
        }
        let closed = self
            .session
            .as_ref()
            .is_some_and(|session| session.handle.is_closed());
        if closed {
            warn!(host = %self.config.host, %error, "Session lost");
            self.session = None;
            return SftpError::connection(&self.config.host, format!("session closed: {error}"));
        }
        error
    }

    async fn copy_to_local(
        sftp: &SftpSession,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<u64, SftpError> {
        let mut remote = sftp
            .open(remote_path)
            .await
            .map_err(|e| SftpError::from_sftp(remote_path, e))?;
        let local_error = |e: std::io::Error| SftpError::file(local_path.display().to_string(), e);
        let mut local = tokio::fs::File::create(local_path)
            .await
            .map_err(local_error)?;
        let bytes = tokio::io::copy(&mut remote, &mut local)
            .await
            .map_err(|e| SftpError::file(remote_path, e))?;
        local.flush().await.map_err(local_error)?;
        if let Err(error) = remote.shutdown().await {
            debug!(%remote_path, %error, "Failed to close remote file");
        }
        Ok(bytes)
    }
}

#[async_trait]
impl RemoteFiles for SftpSessionManager {
    async fn connect(&mut self) -> Result<(), SftpError> {
        if self.is_connected() {
            return Ok(());
        }
        let session = Self::open(&self.config, self.proxy.as_ref()).await?;
        self.session = Some(session);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SftpError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        if let Err(error) = session.sftp.close().await {
            debug!(%error, "Failed to close SFTP channel");
        }
        if let Err(error) = session
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            warn!(host = %self.config.host, %error, "Failed to disconnect cleanly");
        }
        info!(host = %self.config.host, "Disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.handle.is_closed())
    }

    async fn list_files(
        &mut self,
        remote_path: &str,
        glob_pattern: &str,
    ) -> Result<Vec<RemoteFileEntry>, SftpError> {
        let result = {
            let sftp = self.sftp()?;
            sftp.read_dir(remote_path).await
        };
        let entries: Vec<RemoteFileEntry> = match result {
            Ok(read_dir) => read_dir
                .map(|entry| {
                    let modified_at = entry
                        .metadata()
                        .mtime
                        .and_then(|mtime| DateTime::from_timestamp(i64::from(mtime), 0));
                    RemoteFileEntry::new(entry.file_name(), modified_at)
                })
                .collect(),
            Err(error) => {
                // A missing directory is a listing failure, not an end-of-stream signal.
                let error = match SftpError::from_sftp(remote_path, error) {
                    SftpError::FileNotFound(path) => SftpError::file(path, "no such directory"),
                    other => other,
                };
                return Err(self.check_transport(error));
            }
        };
        let entries = NameFilter::new(glob_pattern)?.filter(entries);
        debug!(%remote_path, %glob_pattern, count = entries.len(), "Listed files");
        Ok(entries)
    }

    async fn download(&mut self, remote_path: &str, local_path: &Path) -> Result<u64, SftpError> {
        let result = {
            let sftp = self.sftp()?;
            Self::copy_to_local(sftp, remote_path, local_path).await
        };
        result.map_err(|error| self.check_transport(error))
    }
}
