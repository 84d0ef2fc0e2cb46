use chrono::{DateTime, NaiveDate, NaiveDateTime};

const COMPACT_LEN: usize = 14;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y%m%d%H%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d"];

/// Reads a tracking timestamp. Unparseable values yield `None` rather than an error.
///
/// Values of 14 or more characters are read positionally as `YYYYMMDDHHMMSS`,
/// anything shorter is tried against a handful of common date/time layouts.
pub fn parse_timestamp(raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.len() >= COMPACT_LEN {
        parse_compact(raw)
    } else {
        parse_free_form(raw)
    }
}

fn parse_compact(raw: &str) -> Option<NaiveDateTime> {
    let part = |range: std::ops::Range<usize>| -> Option<u32> {
        let s = raw.get(range)?;
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse().ok()
    };
    let year = i32::try_from(part(0..4)?).ok()?;
    NaiveDate::from_ymd_opt(year, part(4..6)?, part(6..8)?)?.and_hms_opt(
        part(8..10)?,
        part(10..12)?,
        part(12..14)?,
    )
}

fn parse_free_form(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
