use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use wax::{Glob, Pattern};

use crate::SftpError;

pub const MATCH_ALL: &str = "*";

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFileEntry {
    pub name: String,
    pub modified_at: Option<DateTime<Utc>>,
}

impl RemoteFileEntry {
    pub fn new<S: Into<String>>(name: S, modified_at: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            modified_at,
        }
    }
}

/// The remote operations the tracker needs from a file-transfer session.
#[async_trait]
pub trait RemoteFiles: Send {
    /// Opens the session. Calling it on a connected session does nothing.
    async fn connect(&mut self) -> Result<(), SftpError>;

    /// Closes the session. Calling it on a disconnected session does nothing.
    async fn disconnect(&mut self) -> Result<(), SftpError>;

    fn is_connected(&self) -> bool;

    /// Lists `remote_path`, keeping the server's order and only names matching `glob_pattern`.
    async fn list_files(
        &mut self,
        remote_path: &str,
        glob_pattern: &str,
    ) -> Result<Vec<RemoteFileEntry>, SftpError>;

    /// Copies `remote_path` into the local file at `local_path`, returning the byte count.
    ///
    /// Fails with [`SftpError::FileNotFound`] when the server reports that the
    /// file does not exist.
    async fn download(&mut self, remote_path: &str, local_path: &Path) -> Result<u64, SftpError>;
}

/// Name filter applied to directory listings.
pub struct NameFilter<'t> {
    glob: Glob<'t>,
}

impl<'t> NameFilter<'t> {
    pub fn new(pattern: &'t str) -> Result<Self, SftpError> {
        let glob = Glob::new(pattern).map_err(|e| SftpError::InvalidPattern {
            pattern: pattern.to_owned(),
            message: e.to_string(),
        })?;
        Ok(Self { glob })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.glob.is_match(name)
    }

    pub fn filter(&self, entries: Vec<RemoteFileEntry>) -> Vec<RemoteFileEntry> {
        entries
            .into_iter()
            .filter(|entry| entry.name != "." && entry.name != "..")
            .filter(|entry| self.matches(&entry.name))
            .collect()
    }
}
