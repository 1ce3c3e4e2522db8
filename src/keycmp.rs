//! Date-aware value ordering for key columns
//!
//! Merged tables are re-sorted by their key columns. A key value that parses
//! as a date under any recognized calendar representation sorts as a date;
//! everything else sorts as an ordinal string. Key values with an explicit
//! per-column format override are normalized to ISO form before they enter a
//! composite key, so "01/02/2024" and "2024-02-01" produce the same identity.

use chrono::{NaiveDate, NaiveDateTime};
use std::cmp::Ordering;

/// Calendar representations probed, most specific first.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y%m%d",
];

/// Try each recognized representation in turn, like a type-probing parse.
pub fn parse_calendar_value(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Normalize a key value under an explicit column format override.
///
/// Unparseable values pass through trimmed, so a stray non-date cell still
/// yields a stable (if ordinal) identity.
pub fn normalize_date_value(value: &str, format: &str) -> String {
    let trimmed = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
        return dt.format("%Y-%m-%dT%H:%M:%S").to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, format) {
        return d.format("%Y-%m-%d").to_string();
    }
    trimmed.to_string()
}

/// Compare two values as dates when both parse, otherwise as ordinal strings.
pub fn compare_values(a: &str, b: &str) -> Ordering {
    match (parse_calendar_value(a), parse_calendar_value(b)) {
        (Some(da), Some(db)) => da.cmp(&db),
        _ => a.cmp(b),
    }
}

/// Order two rows by their key columns in declared order, date-aware per
/// column, with a full-line ordinal tiebreak.
pub fn compare_rows_by_key(a: &[String], b: &[String], key_indexes: &[usize]) -> Ordering {
    for &idx in key_indexes {
        let va = a.get(idx).map(String::as_str).unwrap_or("");
        let vb = b.get(idx).map(String::as_str).unwrap_or("");
        let ord = compare_values(va, vb);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.cmp(b)
}
