//! Record types found in carrier tracking files.

use chrono::NaiveDateTime;
use serde::Serialize;

pub const HEADER_RECORD: &str = "00";
pub const DATA_RECORD: &str = "01";
pub const FOOTER_RECORD: &str = "99";

/// `00,<file id>,<timestamp>,<record count>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderRecord {
    pub record_type: String,
    pub file_id: String,
    pub timestamp: Option<NaiveDateTime>,
    pub declared_record_count: i64,
}

/// One tracking event for one parcel.
///
/// Columns after `timestamp` are optional and stay `None` when the line was
/// shorter or left them empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataRecord {
    pub record_type: String,
    pub service: String,
    pub tracking_number: String,
    pub country: String,
    pub combined_id: String,
    pub status: String,
    pub timestamp: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra2: Option<String>,
}

/// `99,<record count>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FooterRecord {
    pub record_type: String,
    pub declared_record_count: i64,
}

/// Everything parsed out of one tracking file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackingBatch {
    pub header: Option<HeaderRecord>,
    pub records: Vec<DataRecord>,
    pub footer: Option<FooterRecord>,
}
