//! Presentation of decoded records as text lines.
//!
//! The only locale-dependent choice, which timezone timestamps are shown
//! in, lives here so the decoder stays presentation-free.

use crate::types::{ChatMessage, Record};
use chrono::{DateTime, Local, Utc};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d.%H%M%S";

/// Which timezone to render timestamps in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeDisplay {
    /// The machine's local timezone, matching the legacy reader's output.
    #[default]
    Local,
    Utc,
}

/// Format a timestamp as the fixed-width `YYYY-MM-DD.HHMMSS` string.
pub fn format_timestamp(timestamp: DateTime<Utc>, display: TimeDisplay) -> String {
    match display {
        TimeDisplay::Local => timestamp
            .with_timezone(&Local)
            .format(TIMESTAMP_FORMAT)
            .to_string(),
        TimeDisplay::Utc => timestamp.format(TIMESTAMP_FORMAT).to_string(),
    }
}

/// Format one borrowed record as its output line.
///
/// Non-UTF-8 bytes in the text fields are replaced, not dropped; the
/// decoder hands spans through untouched.
pub fn format_record(record: &Record<'_>, display: TimeDisplay) -> String {
    format!(
        "{} {} <-> {}: {}",
        format_timestamp(record.datetime(), display),
        record.sender_text(),
        record.recipients_text(),
        record.message_text(),
    )
}

/// Format one owned message as its output line.
pub fn format_message(message: &ChatMessage, display: TimeDisplay) -> String {
    format!(
        "{} {} <-> {}: {}",
        format_timestamp(message.timestamp, display),
        message.sender,
        message.recipients,
        message.message,
    )
}
