//! Tracking file parser
//!
//! Turns one downloaded tracking file into a [`TrackingBatch`]. Files are
//! line oriented; the first field of each line selects the record layout
//! (`00` header, `01` data, `99` footer). Other record types are skipped.

mod timestamp;
mod tokenizer;
mod types;

use std::path::Path;

pub use timestamp::parse_timestamp;
pub use tokenizer::{delimiter_for, split_line};
use tracing::*;
pub use types::*;

use crate::ParserError;

/// How header/footer inconsistencies are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Return whatever was parsed; inconsistencies are only logged.
    #[default]
    Tolerant,
    /// Reject files with a missing header or footer, no data records,
    /// unknown record types, or declared counts that don't match.
    Strict,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrackingParser {
    mode: ValidationMode,
}

impl TrackingParser {
    pub fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub fn parse_file(&self, path: &Path) -> Result<TrackingBatch, ParserError> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ParserError::FileNotFound(path.display().to_string()))
            }
            Err(e) => return Err(ParserError::io(path, e)),
        };
        if metadata.len() == 0 {
            return Err(ParserError::EmptyFile(path.display().to_string()));
        }

        let content = std::fs::read(path).map_err(|e| ParserError::io(path, e))?;
        let content = match String::from_utf8(content) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    offset = e.utf8_error().valid_up_to(),
                    "Tracking file is not valid UTF-8, replacing invalid bytes"
                );
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        self.parse_str(&content)
    }

    pub fn parse_str(&self, content: &str) -> Result<TrackingBatch, ParserError> {
        let mut batch = TrackingBatch::default();
        let mut unknown_types = vec![];

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let fields = split_line(line).map_err(|e| ParserError::Malformed {
                line: index + 1,
                message: format!("{} at column {}", e.message, e.column + 1),
            })?;
            let record = Fields(&fields);

            match record.get(0) {
                Some(HEADER_RECORD) => batch.header = Some(record.header()),
                Some(DATA_RECORD) => batch.records.push(record.data()),
                Some(FOOTER_RECORD) => batch.footer = Some(record.footer()),
                other => {
                    trace!(line = index + 1, record_type = ?other, "Skipping record");
                    unknown_types.push(other.unwrap_or_default().to_owned());
                }
            }
        }

        self.validate(&batch, &unknown_types)?;
        Ok(batch)
    }

    fn validate(&self, batch: &TrackingBatch, unknown_types: &[String]) -> Result<(), ParserError> {
        let mut problems = vec![];
        if batch.header.is_none() {
            problems.push("missing header record".to_owned());
        }
        if batch.footer.is_none() {
            problems.push("missing footer record".to_owned());
        }
        if batch.records.is_empty() {
            problems.push("no data records found".to_owned());
        }
        let actual = batch.records.len() as i64;
        if let Some(header) = &batch.header {
            if header.declared_record_count != actual {
                problems.push(format!(
                    "header record count mismatch: expected {}, got {actual}",
                    header.declared_record_count
                ));
            }
        }
        if let Some(footer) = &batch.footer {
            if footer.declared_record_count != actual {
                problems.push(format!(
                    "footer record count mismatch: expected {}, got {actual}",
                    footer.declared_record_count
                ));
            }
        }

        match self.mode {
            ValidationMode::Strict => {
                if let Some(record_type) = unknown_types.first() {
                    return Err(ParserError::Validation(format!(
                        "unknown record type: {record_type:?}"
                    )));
                }
                if let Some(problem) = problems.into_iter().next() {
                    return Err(ParserError::Validation(problem));
                }
            }
            ValidationMode::Tolerant => {
                for problem in problems {
                    warn!("Tolerating inconsistent tracking file: {problem}");
                }
            }
        }
        Ok(())
    }
}

struct Fields<'a>(&'a [Option<String>]);

impl Fields<'_> {
    fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|f| f.as_deref())
    }

    fn owned(&self, index: usize) -> Option<String> {
        self.get(index).map(str::to_owned)
    }

    fn string(&self, index: usize) -> String {
        self.owned(index).unwrap_or_default()
    }

    fn header(&self) -> HeaderRecord {
        HeaderRecord {
            record_type: self.string(0),
            file_id: self.string(1),
            timestamp: parse_timestamp(self.get(2)),
            declared_record_count: lenient_int(self.get(3)),
        }
    }

    fn data(&self) -> DataRecord {
        DataRecord {
            record_type: self.string(0),
            service: self.string(1),
            tracking_number: self.string(2),
            country: self.string(3),
            combined_id: self.string(4),
            status: self.string(5),
            timestamp: parse_timestamp(self.get(6)),
            location: self.owned(7),
            notes: self.owned(8),
            additional_info: self.owned(9),
            outcome: self.owned(10),
            recipient: self.owned(11),
            extra1: self.owned(12),
            extra2: self.owned(13),
        }
    }

    fn footer(&self) -> FooterRecord {
        FooterRecord {
            record_type: self.string(0),
            declared_record_count: lenient_int(self.get(1)),
        }
    }
}

/// Reads the leading integer of a count column; anything unreadable counts as 0.
fn lenient_int(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return 0;
    };
    let raw = raw.trim_start();
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    let value = digits[..end].parse::<i64>().unwrap_or(0);
    if negative {
        -value
    } else {
        value
    }
}
