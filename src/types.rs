//! Core data types for markers, decoded records and decode errors.

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// The closed set of byte sequences delimiting the fields of one record.
///
/// Every marker is a process-wide constant; the variants are listed in the
/// order the markers appear inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// `l33l`, begins every record.
    RecordStart,
    /// Begins the chat members field.
    ChatFieldStart,
    /// `#`, prefixes the sender username.
    SenderFieldStart,
    /// `/`, splits the sender from the recipients.
    MemberSeparator,
    /// One byte sitting between the separator and the recipients text.
    RecipientPrefix,
    /// `;`, ends the member list.
    MemberListEnd,
    /// Begins the 6-byte time field.
    TimeFieldStart,
    /// Begins the null-terminated message text.
    MessageFieldStart,
}

impl Marker {
    /// The exact bytes this marker matches in the log.
    pub const fn bytes(self) -> &'static [u8] {
        match self {
            Marker::RecordStart => b"\x6C\x33\x33\x6C",
            Marker::ChatFieldStart => b"\xE0\x03",
            Marker::SenderFieldStart => b"\x23",
            Marker::MemberSeparator => b"\x2F",
            Marker::RecipientPrefix => b"\x34",
            Marker::MemberListEnd => b"\x3B",
            Marker::TimeFieldStart => b"\xE5\x03",
            Marker::MessageFieldStart => b"\xFC\x03",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Marker::RecordStart => "record start",
            Marker::ChatFieldStart => "chat field start",
            Marker::SenderFieldStart => "sender field start",
            Marker::MemberSeparator => "member separator",
            Marker::RecipientPrefix => "recipient prefix",
            Marker::MemberListEnd => "member list end",
            Marker::TimeFieldStart => "time field start",
            Marker::MessageFieldStart => "message field start",
        };
        f.write_str(name)
    }
}

/// One decoded chat message, borrowing its text fields from the buffer it
/// was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Unix seconds recovered from the bit-packed time field.
    pub timestamp: u32,
    /// Username of the message author.
    pub sender: &'a [u8],
    /// The chat members other than the sender, joined as stored in the log.
    pub recipients: &'a [u8],
    /// The message text, without its terminator byte.
    pub message: &'a [u8],
}

impl Record<'_> {
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(i64::from(self.timestamp), 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn sender_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.sender)
    }

    pub fn recipients_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.recipients)
    }

    pub fn message_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.message)
    }

    /// Whether the recipients list holds more member separators than a
    /// two-member chat would. Such lists are never decomposed, only flagged.
    pub fn has_extra_members(&self) -> bool {
        self.recipients.contains(&Marker::MemberSeparator.bytes()[0])
    }
}

/// An owned, serializable copy of one decoded record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    pub recipients: String,
    pub message: String,
}

impl ChatMessage {
    pub fn from_record(record: &Record<'_>) -> Self {
        ChatMessage {
            timestamp: record.datetime(),
            sender: record.sender_text().into_owned(),
            recipients: record.recipients_text().into_owned(),
            message: record.message_text().into_owned(),
        }
    }
}

/// The outcome of decoding one log file.
#[derive(Debug, Clone)]
pub struct ChatLog {
    pub path: PathBuf,
    /// Messages decoded before the end of the stream or the first anomaly.
    pub messages: Vec<ChatMessage>,
    /// Why decoding stopped early, if it did. Messages decoded before the
    /// stop remain valid.
    pub error: Option<DecodeError>,
    /// How many recipient lists carried extra member separators.
    pub extra_member_lists: usize,
}

/// Why decoding a buffer stopped before its end.
///
/// A missing record-start marker is the normal end of the stream and is not
/// represented here; these variants all mean a malformed record tail that
/// was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing {marker} marker (searched from offset {offset})")]
    MissingMarker { marker: Marker, offset: usize },
    #[error("message field at offset {offset} has no terminator")]
    MissingTerminator { offset: usize },
    #[error("buffer too short for the {field} field at offset {offset}: need {need} bytes, {got} remain")]
    BufferTooShort {
        field: &'static str,
        offset: usize,
        need: usize,
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_start_marker_is_l33l() {
        assert_eq!(Marker::RecordStart.bytes(), b"l33l");
        assert_eq!(Marker::SenderFieldStart.bytes(), b"#");
        assert_eq!(Marker::MemberSeparator.bytes(), b"/");
        assert_eq!(Marker::MemberListEnd.bytes(), b";");
    }

    #[test]
    fn extra_members_flagged_by_embedded_separator() {
        let record = Record {
            timestamp: 0,
            sender: b"alice",
            recipients: b"bob/carol",
            message: b"hi",
        };
        assert!(record.has_extra_members());

        let record = Record {
            recipients: b"bob",
            ..record
        };
        assert!(!record.has_extra_members());
    }

    #[test]
    fn decode_error_names_the_missing_marker() {
        let err = DecodeError::MissingMarker {
            marker: Marker::TimeFieldStart,
            offset: 42,
        };
        assert_eq!(
            err.to_string(),
            "missing time field start marker (searched from offset 42)"
        );
    }
}
