//! Sequential walk over an account's tracking files.
//!
//! The carrier offers no catalog or cursor API. Given the last file seen, the
//! next one is always the same name with the sequence number increased by one,
//! so the walk probes candidates one at a time and stops at the first one the
//! server reports as missing.

use std::path::PathBuf;

use anpost_common::{ProxyConfig, SftpConfig};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::*;

use crate::cursor::{is_account_file, FILE_EXTENSION};
use crate::{
    FileCursor, RemoteFileEntry, MATCH_ALL, RemoteFiles, SftpSessionManager, TrackingBatch, TrackingError,
    TrackingParser, ValidationMode,
};

/// One file produced by a walk.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedFile {
    pub filename: String,
    pub cursor: FileCursor,
    pub batch: TrackingBatch,
}

pub type TrackingStream<'a> = BoxStream<'a, Result<TrackedFile, TrackingError>>;

pub struct Tracker<S: RemoteFiles> {
    remote: S,
    remote_path: String,
    parser: TrackingParser,
    staging_dir: Option<PathBuf>,
}

impl Tracker<SftpSessionManager> {
    pub fn from_config(config: SftpConfig, proxy: Option<ProxyConfig>) -> Self {
        let remote_path = config.remote_path.clone();
        let staging_dir = config.staging_dir.clone();
        let mut tracker = Self::new(SftpSessionManager::new(config, proxy), remote_path);
        tracker.staging_dir = staging_dir;
        tracker
    }
}

impl<S: RemoteFiles> Tracker<S> {
    pub fn new<P: Into<String>>(remote: S, remote_path: P) -> Self {
        Self {
            remote,
            remote_path: remote_path.into(),
            parser: TrackingParser::default(),
            staging_dir: None,
        }
    }

    pub fn with_validation(mut self, mode: ValidationMode) -> Self {
        self.parser = TrackingParser::new(mode);
        self
    }

    pub fn with_staging_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn remote(&self) -> &S {
        &self.remote
    }

    /// Opens the session up front. Walks connect on first use otherwise.
    pub async fn connect(&mut self) -> Result<(), TrackingError> {
        Ok(self.remote.connect().await?)
    }

    pub async fn close(&mut self) -> Result<(), TrackingError> {
        Ok(self.remote.disconnect().await?)
    }

    pub async fn list_tracking_files(
        &mut self,
        pattern: &str,
    ) -> Result<Vec<RemoteFileEntry>, TrackingError> {
        self.remote.connect().await?;
        Ok(self.remote.list_files(&self.remote_path, pattern).await?)
    }

    /// Picks the file a walk for `account_number` starts after.
    ///
    /// With `skip_from_end == 0` this is the first listed file, otherwise the
    /// entry `skip_from_end` places before the last one. The `cdt` prefix is
    /// matched regardless of case.
    pub async fn starting_file(
        &mut self,
        account_number: &str,
        skip_from_end: usize,
    ) -> Result<Option<String>, TrackingError> {
        let entries: Vec<RemoteFileEntry> = self
            .list_tracking_files(MATCH_ALL)
            .await?
            .into_iter()
            .filter(|entry| is_account_file(&entry.name, account_number))
            .collect();
        let index = if skip_from_end == 0 {
            Some(0)
        } else {
            entries
                .len()
                .checked_sub(skip_from_end.saturating_add(1))
        };
        Ok(index
            .and_then(|index| entries.into_iter().nth(index))
            .map(|entry| entry.name))
    }

    pub async fn track_with_account_number(
        &mut self,
        account_number: &str,
        skip_from_end: usize,
    ) -> Result<TrackingStream<'_>, TrackingError> {
        match self.starting_file(account_number, skip_from_end).await? {
            Some(filename) => {
                info!(%account_number, %filename, "Starting walk");
                self.track_from(&filename)
            }
            None => {
                info!(%account_number, "No tracking files found");
                Ok(stream::empty().boxed())
            }
        }
    }

    /// Walks forward from `last_filename`, which itself is not fetched again.
    ///
    /// Parse failures are yielded as errors and the walk moves past the file.
    /// Any other failure is yielded once and ends the stream. A candidate the
    /// server reports as missing ends the stream without an error.
    pub fn track_from(&mut self, last_filename: &str) -> Result<TrackingStream<'_>, TrackingError> {
        let cursor = FileCursor::parse(last_filename)?;
        let walk = Walk {
            tracker: self,
            cursor,
            finished: false,
        };

        Ok(stream::unfold(walk, |mut walk| async move {
            if walk.finished {
                return None;
            }
            let Some(candidate) = walk.cursor.next() else {
                warn!(last = %walk.cursor, "Sequence numbers exhausted, walk complete");
                return None;
            };
            let filename = candidate.filename();
            match walk.tracker.fetch_file(&filename).await {
                Ok(batch) => {
                    walk.cursor = candidate.clone();
                    let file = TrackedFile {
                        filename,
                        cursor: candidate,
                        batch,
                    };
                    Some((Ok(file), walk))
                }
                Err(TrackingError::Sftp(error)) if error.is_not_found() => {
                    info!(last = %walk.cursor, "No newer tracking file, walk complete");
                    None
                }
                Err(error) if !error.is_fatal() => {
                    warn!(%filename, %error, "Skipping unparseable tracking file");
                    walk.cursor = candidate;
                    Some((Err(error), walk))
                }
                Err(error) => {
                    error!(%filename, %error, "Walk aborted");
                    walk.finished = true;
                    Some((Err(error), walk))
                }
            }
        })
        .boxed())
    }

    /// Downloads one file into a staging file, parses it and removes the staging file.
    pub async fn fetch_file(&mut self, filename: &str) -> Result<TrackingBatch, TrackingError> {
        self.remote.connect().await?;
        let staged = self.staging_file()?;
        let remote_path = self.remote_file_path(filename);

        debug!(%remote_path, staging = ?staged.path(), "Fetching");
        let bytes = self.remote.download(&remote_path, staged.path()).await?;
        debug!(%remote_path, bytes, "Downloaded");

        self.parser
            .parse_file(staged.path())
            .map_err(|source| TrackingError::Parser {
                filename: filename.to_owned(),
                source,
            })
    }

    fn staging_file(&self) -> Result<NamedTempFile, TrackingError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sftp").suffix(FILE_EXTENSION);
        match &self.staging_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| TrackingError::Staging {
            path: self
                .staging_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| std::env::temp_dir().display().to_string()),
            message: e.to_string(),
        })
    }

    fn remote_file_path(&self, filename: &str) -> String {
        let base = self.remote_path.trim_end_matches('/');
        if base.is_empty() || base == "." {
            filename.to_owned()
        } else {
            format!("{base}/{filename}")
        }
    }
}

struct Walk<'a, S: RemoteFiles> {
    tracker: &'a mut Tracker<S>,
    cursor: FileCursor,
    finished: bool,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;
    use crate::SftpError;

    const BATCH: &str = "\
00,FILE001,20240320143000,1
01,STD,AB123456789IE,IE,COMB001,Delivered,20240320143000,Dublin
99,1
";

    #[derive(Default)]
    struct MemoryRemote {
        files: HashMap<String, String>,
        listing: Vec<String>,
        failures: HashMap<String, String>,
        refuse_connection: bool,
        connected: bool,
        connects: usize,
        requested: Vec<String>,
    }

    impl MemoryRemote {
        fn with_files(names: &[&str]) -> Self {
            let mut remote = Self::default();
            for name in names {
                remote.add(name, BATCH);
            }
            remote
        }

        fn add(&mut self, name: &str, content: &str) {
            self.files.insert(format!("/drop/{name}"), content.to_owned());
            self.listing.push(name.to_owned());
        }
    }

    #[async_trait]
    impl RemoteFiles for MemoryRemote {
        async fn connect(&mut self) -> Result<(), SftpError> {
            if self.refuse_connection {
                return Err(SftpError::connection("memory", "refused"));
            }
            if !self.connected {
                self.connected = true;
                self.connects += 1;
            }
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), SftpError> {
            self.connected = false;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn list_files(
            &mut self,
            _remote_path: &str,
            glob_pattern: &str,
        ) -> Result<Vec<RemoteFileEntry>, SftpError> {
            if !self.connected {
                return Err(SftpError::NotConnected);
            }
            let entries = self
                .listing
                .iter()
                .map(|name| RemoteFileEntry::new(name.clone(), None))
                .collect();
            Ok(crate::NameFilter::new(glob_pattern)?.filter(entries))
        }

        async fn download(
            &mut self,
            remote_path: &str,
            local_path: &Path,
        ) -> Result<u64, SftpError> {
            if !self.connected {
                return Err(SftpError::NotConnected);
            }
            self.requested.push(remote_path.to_owned());
            if let Some(message) = self.failures.get(remote_path) {
                return Err(SftpError::file(remote_path, message));
            }
            let content = self
                .files
                .get(remote_path)
                .ok_or_else(|| SftpError::FileNotFound(remote_path.to_owned()))?;
            std::fs::write(local_path, content).map_err(|e| SftpError::file(remote_path, e))?;
            Ok(content.len() as u64)
        }
    }

    fn staging_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_walk_until_not_found() {
        let staging = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::with_files(&[
            "cdt0000000100001.txt",
            "cdt0000000100002.txt",
            "cdt0000000100003.txt",
            "cdt0000000100004.txt",
            "cdt0000000100005.txt",
        ]);
        let mut tracker = Tracker::new(remote, "/drop").with_staging_dir(staging.path());

        let files: Vec<_> = tracker
            .track_from("cdt0000000100001.txt")
            .unwrap()
            .collect()
            .await;

        let names: Vec<_> = files
            .into_iter()
            .map(|f| {
                let f = f.unwrap();
                assert_eq!(f.batch.records[0].tracking_number, "AB123456789IE");
                f.filename
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "cdt0000000100002.txt",
                "cdt0000000100003.txt",
                "cdt0000000100004.txt",
                "cdt0000000100005.txt",
            ]
        );
        assert_eq!(
            tracker.remote().requested.last().map(String::as_str),
            Some("/drop/cdt0000000100006.txt")
        );
        assert_eq!(tracker.remote().connects, 1);
        assert!(staging_is_empty(staging.path()));
    }

    #[tokio::test]
    async fn test_walk_with_nothing_new() {
        let remote = MemoryRemote::with_files(&["cdt0000000100001.txt"]);
        let mut tracker = Tracker::new(remote, "/drop");
        let mut walk = tracker.track_from("cdt0000000100001.txt").unwrap();
        assert!(walk.next().await.is_none());
    }

    #[tokio::test]
    async fn test_file_error_ends_walk() {
        let mut remote = MemoryRemote::with_files(&[
            "cdt0000000100002.txt",
            "cdt0000000100003.txt",
            "cdt0000000100004.txt",
        ]);
        remote.failures.insert(
            "/drop/cdt0000000100003.txt".into(),
            "permission denied".into(),
        );
        let mut tracker = Tracker::new(remote, "/drop");

        let results: Vec<_> = tracker
            .track_from("cdt0000000100001.txt")
            .unwrap()
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().filename, "cdt0000000100002.txt");
        assert!(matches!(
            results[1],
            Err(TrackingError::Sftp(SftpError::File { .. }))
        ));
        assert!(!tracker
            .remote()
            .requested
            .contains(&"/drop/cdt0000000100004.txt".to_owned()));
    }

    #[tokio::test]
    async fn test_parse_error_is_skippable() {
        let staging = tempfile::tempdir().unwrap();
        let mut remote = MemoryRemote::default();
        remote.add("cdt0000000100002.txt", "01,\"unclosed\n");
        remote.add("cdt0000000100003.txt", BATCH);
        let mut tracker = Tracker::new(remote, "/drop").with_staging_dir(staging.path());

        let results: Vec<_> = tracker
            .track_from("cdt0000000100001.txt")
            .unwrap()
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        match &results[0] {
            Err(TrackingError::Parser { filename, .. }) => {
                assert_eq!(filename, "cdt0000000100002.txt")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let second = results[1].as_ref().unwrap();
        assert_eq!(second.cursor.sequence_number(), 3);
        assert!(staging_is_empty(staging.path()));
    }

    #[tokio::test]
    async fn test_empty_remote_file_is_a_parse_error() {
        let mut remote = MemoryRemote::default();
        remote.add("cdt0000000100002.txt", "");
        let mut tracker = Tracker::new(remote, "/drop");
        let results: Vec<_> = tracker
            .track_from("cdt0000000100001.txt")
            .unwrap()
            .collect()
            .await;
        assert_eq!(results.len(), 1);
        assert!(matches!(
            &results[0],
            Err(TrackingError::Parser {
                source: crate::ParserError::EmptyFile(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_connection_failure_ends_walk() {
        let remote = MemoryRemote {
            refuse_connection: true,
            ..Default::default()
        };
        let mut tracker = Tracker::new(remote, "/drop");
        let results: Vec<_> = tracker
            .track_from("cdt0000000100001.txt")
            .unwrap()
            .collect()
            .await;
        assert_eq!(results.len(), 1);
        assert!(matches!(
            &results[0],
            Err(TrackingError::Sftp(e)) if e.is_connection_error()
        ));
    }

    #[tokio::test]
    async fn test_invalid_start_filename() {
        let mut tracker = Tracker::new(MemoryRemote::default(), "/drop");
        assert!(matches!(
            tracker.track_from("report.csv").err(),
            Some(TrackingError::InvalidFilename(_))
        ));
    }

    #[tokio::test]
    async fn test_track_with_account_number_starts_after_first_file() {
        let mut remote = MemoryRemote::with_files(&[
            "cdt0000000100007.txt",
            "cdt0000000100008.txt",
            "cdt0000000100009.txt",
        ]);
        remote.add("cdt0000000200001.txt", BATCH);
        let mut tracker = Tracker::new(remote, "/drop");

        let names: Vec<_> = tracker
            .track_with_account_number("1", 0)
            .await
            .unwrap()
            .map(|f| f.unwrap().filename)
            .collect()
            .await;
        assert_eq!(names, vec!["cdt0000000100008.txt", "cdt0000000100009.txt"]);
    }

    #[tokio::test]
    async fn test_starting_file_skip_from_end() {
        let remote = MemoryRemote::with_files(&[
            "cdt0000000100007.txt",
            "cdt0000000100008.txt",
            "cdt0000000100009.txt",
        ]);
        let mut tracker = Tracker::new(remote, "/drop");

        assert_eq!(
            tracker.starting_file("00000001", 1).await.unwrap().as_deref(),
            Some("cdt0000000100008.txt")
        );
        assert_eq!(
            tracker.starting_file("00000001", 2).await.unwrap().as_deref(),
            Some("cdt0000000100007.txt")
        );
        assert_eq!(tracker.starting_file("00000001", 3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_track_with_uppercase_prefix() {
        let remote = MemoryRemote::with_files(&[
            "CDT0000000100007.txt",
            "CDT0000000100008.txt",
            "CDT0000000200001.txt",
        ]);
        let mut tracker = Tracker::new(remote, "/drop");

        let names: Vec<_> = tracker
            .track_with_account_number("1", 0)
            .await
            .unwrap()
            .map(|f| f.unwrap().filename)
            .collect()
            .await;
        assert_eq!(names, vec!["CDT0000000100008.txt"]);
        assert_eq!(
            tracker.remote().requested.last().map(String::as_str),
            Some("/drop/CDT0000000100009.txt")
        );
    }

    #[tokio::test]
    async fn test_walk_ends_at_last_sequence_number() {
        let remote = MemoryRemote::with_files(&["cdt0000000199999.txt"]);
        let mut tracker = Tracker::new(remote, "/drop");

        let results: Vec<_> = tracker
            .track_from("cdt0000000199998.txt")
            .unwrap()
            .collect()
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().filename, "cdt0000000199999.txt");
        assert_eq!(
            tracker.remote().requested,
            vec!["/drop/cdt0000000199999.txt".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_track_with_unknown_account_yields_nothing() {
        let remote = MemoryRemote::with_files(&["cdt0000000100001.txt"]);
        let mut tracker = Tracker::new(remote, "/drop");
        let mut walk = tracker.track_with_account_number("42", 0).await.unwrap();
        assert!(walk.next().await.is_none());
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let remote = MemoryRemote::with_files(&["cdt0000000100002.txt"]);
        let mut tracker = Tracker::new(remote, "/drop");
        tracker.fetch_file("cdt0000000100002.txt").await.unwrap();
        assert!(tracker.remote().is_connected());
        tracker.close().await.unwrap();
        assert!(!tracker.remote().is_connected());
    }

    #[test]
    fn test_remote_file_path() {
        let tracker = Tracker::new(MemoryRemote::default(), ".");
        assert_eq!(tracker.remote_file_path("a.txt"), "a.txt");
        let tracker = Tracker::new(MemoryRemote::default(), "/home/user/");
        assert_eq!(tracker.remote_file_path("a.txt"), "/home/user/a.txt");
    }
}
