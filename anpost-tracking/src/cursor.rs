//! Tracking file names double as the only cursor the carrier offers.
//!
//! Files are named `CDT<account><sequence>.txt`:
//! * `CDT` prefix (Customer Data Tracking), matched case-insensitively
//! * the carrier account number, zero padded to 8 digits
//! * a 5 digit sequence number starting at 1 and incremented for every file sent
//! * the `.txt` extension

use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::TrackingError;

pub const FILE_PREFIX: &str = "cdt";
pub const FILE_EXTENSION: &str = ".txt";
pub const ACCOUNT_NUMBER_WIDTH: usize = 8;
pub const SEQUENCE_WIDTH: usize = 5;
pub const MAX_SEQUENCE_NUMBER: u32 = 99_999;

fn filename_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    REGEX.get_or_init(|| Regex::new(r"^((?i:cdt))(\d+)(\d{5})\.txt$").unwrap())
}

/// Zero-pads a carrier account number to the width used in file names.
pub fn pad_account_number(account_number: &str) -> String {
    format!(
        "{:0>width$}",
        account_number.trim(),
        width = ACCOUNT_NUMBER_WIDTH
    )
}

/// Whether `filename` starts with the account's `cdt<account>` prefix, ignoring prefix case.
pub fn is_account_file(filename: &str, account_number: &str) -> bool {
    let prefix = format!("{FILE_PREFIX}{}", pad_account_number(account_number));
    filename
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(&prefix))
}

/// Position in one account's stream of tracking files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCursor {
    prefix: String,
    account_number: String,
    sequence_number: u32,
}

impl FileCursor {
    pub fn new(account_number: &str, sequence_number: u32) -> Self {
        Self {
            prefix: FILE_PREFIX.to_owned(),
            account_number: pad_account_number(account_number),
            sequence_number,
        }
    }

    /// Splits a file name into account and sequence number.
    pub fn parse(filename: &str) -> Result<Self, TrackingError> {
        let invalid = || TrackingError::InvalidFilename(filename.to_owned());
        let captures = filename_regex().captures(filename).ok_or_else(invalid)?;
        let sequence_number = captures[3].parse().map_err(|_| invalid())?;
        Ok(Self {
            prefix: captures[1].to_owned(),
            account_number: captures[2].to_owned(),
            sequence_number,
        })
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// The candidate that follows this one, or `None` once the 5 digit
    /// sequence field is exhausted. Sequence numbers never go backwards.
    pub fn next(&self) -> Option<Self> {
        let sequence_number = self
            .sequence_number
            .checked_add(1)
            .filter(|n| *n <= MAX_SEQUENCE_NUMBER)?;
        Some(Self {
            prefix: self.prefix.clone(),
            account_number: self.account_number.clone(),
            sequence_number,
        })
    }

    pub fn filename(&self) -> String {
        format!(
            "{}{}{:0>width$}{}",
            self.prefix,
            self.account_number,
            self.sequence_number,
            FILE_EXTENSION,
            width = SEQUENCE_WIDTH
        )
    }
}

impl Display for FileCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filename())
    }
}
