use std::path::Path;

use russh_sftp::protocol::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum SftpError {
    #[error("failed to connect to {host}: {message}")]
    Connection { host: String, message: String },
    #[error("not connected to SFTP server")]
    NotConnected,
    #[error("file operation on {path} failed: {message}")]
    File { path: String, message: String },
    #[error("no such file: {0}")]
    FileNotFound(String),
    #[error("invalid glob pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl SftpError {
    pub fn connection<H: Into<String>, M: ToString>(host: H, message: M) -> Self {
        Self::Connection {
            host: host.into(),
            message: message.to_string(),
        }
    }

    pub fn file<P: Into<String>, M: ToString>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Maps an SFTP client failure on `path`, keeping "no such file" distinct.
    pub fn from_sftp(path: &str, error: russh_sftp::client::error::Error) -> Self {
        match error {
            russh_sftp::client::error::Error::Status(status)
                if matches!(status.status_code, StatusCode::NoSuchFile) =>
            {
                Self::FileNotFound(path.to_owned())
            }
            russh_sftp::client::error::Error::Status(status) => {
                Self::file(path, format!("{:?}: {}", status.status_code, status.error_message))
            }
            other => Self::file(path, other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::NotConnected)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ParserError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("empty file: {0}")]
    EmptyFile(String),
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("invalid file format on line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("invalid tracking data: {0}")]
    Validation(String),
}

impl ParserError {
    pub(crate) fn io(path: &Path, error: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TrackingError {
    #[error(transparent)]
    Sftp(#[from] SftpError),
    #[error("failed to parse {filename}: {source}")]
    Parser {
        filename: String,
        #[source]
        source: ParserError,
    },
    #[error("{0:?} is not a tracking file name (expected cdt<account><sequence:5>.txt)")]
    InvalidFilename(String),
    #[error("failed to stage {path}: {message}")]
    Staging { path: String, message: String },
}

impl TrackingError {
    /// Parse failures only affect one file; everything else ends the walk.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Parser { .. })
    }
}
