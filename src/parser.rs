//! Decoding logic for the `.dbb` record stream.
//!
//! A record is a fixed ordered sequence of marker-delimited fields:
//! record start, a 14-byte opaque gap, the chat members field (sender,
//! member separator, recipient prefix, recipients, member list end), an
//! opaque gap, the 6-byte time field, and the null-terminated message
//! text. [`RecordCursor`] walks a buffer one record at a time, carving
//! borrowed spans and stopping at the first anomaly.

use crate::types::{DecodeError, Marker, Record};

/// Opaque bytes between the record start marker and the chat field.
pub const RECORD_HEADER_GAP: usize = 14;
/// Full width of the time field; the sixth byte is constant and unused.
pub const TIME_FIELD_LEN: usize = 6;
/// Bytes of the time field that actually carry the packed timestamp.
pub const TIMESTAMP_LEN: usize = 5;
/// Zero byte ending the message text.
pub const MESSAGE_TERMINATOR: u8 = 0;

/// Find the first occurrence of `marker` in `buffer[search_start..]`.
///
/// Returns the offset immediately after the match, which is where callers
/// resume scanning or start carving a field. `None` when the marker does
/// not occur in the range, including when `search_start` is past the end
/// of the buffer.
pub fn find_after(buffer: &[u8], search_start: usize, marker: Marker) -> Option<usize> {
    let needle = marker.bytes();
    if search_start > buffer.len() {
        return None;
    }
    buffer[search_start..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|found| search_start + found + needle.len())
}

/// Recover the Unix timestamp packed into the first 5 bytes of the time
/// field.
///
/// The format stores the 32-bit little-endian timestamp as the low 7 bits
/// of each of the first four bytes (whose top bit is always set) plus the
/// low 4 bits of the fifth byte. Each output byte takes its low bits from
/// one input byte and borrows the remainder from the next.
pub fn decode_timestamp(raw: &[u8; TIMESTAMP_LEN]) -> u32 {
    let mut out = [0u8; 4];
    for i in 0..4 {
        let borrowed = (raw[i + 1] << (7 - i)) & (0xFFu8 << (7 - i));
        let kept = (raw[i] >> i) & (0x7Fu8 >> i);
        out[i] = borrowed | kept;
    }
    u32::from_le_bytes(out)
}

/// Walks a buffer record-by-record, yielding each decoded [`Record`].
///
/// A missing record start marker is the normal end of the stream; any
/// other missing marker yields one `Err` and fuses the cursor, so the
/// malformed tail is dropped rather than guessed at. Records yielded
/// before the error remain valid.
#[derive(Debug)]
pub struct RecordCursor<'a> {
    buffer: &'a [u8],
    pos: usize,
    stopped: bool,
}

impl<'a> RecordCursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        RecordCursor {
            buffer,
            pos: 0,
            stopped: false,
        }
    }

    fn expect(&self, pos: usize, marker: Marker) -> Result<usize, DecodeError> {
        find_after(self.buffer, pos, marker)
            .ok_or(DecodeError::MissingMarker { marker, offset: pos })
    }

    fn decode_record(&mut self, record_start: usize) -> Result<Record<'a>, DecodeError> {
        let buffer = self.buffer;

        let pos = self.expect(record_start + RECORD_HEADER_GAP, Marker::ChatFieldStart)?;
        let sender_start = self.expect(pos, Marker::SenderFieldStart)?;

        let after_separator = self.expect(sender_start, Marker::MemberSeparator)?;
        let sender = &buffer[sender_start..after_separator - Marker::MemberSeparator.bytes().len()];

        // The prefix byte is skipped blindly, not scanned for: its value can
        // legitimately occur inside a recipient name.
        let recipients_start = after_separator + Marker::RecipientPrefix.bytes().len();
        let after_members = self.expect(recipients_start, Marker::MemberListEnd)?;
        let recipients =
            &buffer[recipients_start..after_members - Marker::MemberListEnd.bytes().len()];

        let time_pos = self.expect(after_members, Marker::TimeFieldStart)?;
        let remaining = buffer.len() - time_pos;
        if remaining < TIME_FIELD_LEN {
            return Err(DecodeError::BufferTooShort {
                field: "time",
                offset: time_pos,
                need: TIME_FIELD_LEN,
                got: remaining,
            });
        }
        let mut raw = [0u8; TIMESTAMP_LEN];
        raw.copy_from_slice(&buffer[time_pos..time_pos + TIMESTAMP_LEN]);
        let timestamp = decode_timestamp(&raw);

        let message_start = self.expect(time_pos + TIME_FIELD_LEN, Marker::MessageFieldStart)?;
        let terminator = buffer[message_start..]
            .iter()
            .position(|&byte| byte == MESSAGE_TERMINATOR)
            .ok_or(DecodeError::MissingTerminator {
                offset: message_start,
            })?;
        let message = &buffer[message_start..message_start + terminator];

        // Resume on the terminator byte itself; the next record start is
        // searched for from there.
        self.pos = message_start + terminator;

        Ok(Record {
            timestamp,
            sender,
            recipients,
            message,
        })
    }
}

impl<'a> Iterator for RecordCursor<'a> {
    type Item = Result<Record<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stopped {
            return None;
        }
        let Some(record_start) = find_after(self.buffer, self.pos, Marker::RecordStart) else {
            // No further record start marker: clean end of the stream.
            self.stopped = true;
            return None;
        };
        match self.decode_record(record_start) {
            Ok(record) => Some(Ok(record)),
            Err(err) => {
                self.stopped = true;
                Some(Err(err))
            }
        }
    }
}

/// Decode every record in `buffer`, in file order.
///
/// Returns the records decoded before the stream ended and, if decoding
/// stopped on a malformed record, the error that stopped it.
pub fn decode_buffer(buffer: &[u8]) -> (Vec<Record<'_>>, Option<DecodeError>) {
    let mut records = Vec::new();
    let mut error = None;
    for item in RecordCursor::new(buffer) {
        match item {
            Ok(record) => records.push(record),
            Err(err) => {
                error = Some(err);
                break;
            }
        }
    }
    (records, error)
}


#[cfg(test)]
mod tests {
    use super::fixtures::{encode_timestamp, record_bytes};
    use super::*;
    use proptest::prelude::*;

    // 2009-02-13 23:31:30 UTC
    const SAMPLE_TS: u32 = 1_234_567_890;

    #[test]
    fn find_after_returns_position_after_match() {
        let buffer = b"xxl33lyy";
        assert_eq!(find_after(buffer, 0, Marker::RecordStart), Some(6));
        assert_eq!(find_after(buffer, 2, Marker::RecordStart), Some(6));
    }

    #[test]
    fn find_after_not_found_past_last_occurrence() {
        let buffer = b"xxl33lyy";
        assert_eq!(find_after(buffer, 3, Marker::RecordStart), None);
    }

    #[test]
    fn find_after_no_match_on_truncated_marker_at_end() {
        let buffer = b"xxl33";
        assert_eq!(find_after(buffer, 0, Marker::RecordStart), None);
    }

    #[test]
    fn find_after_at_buffer_end_is_not_found() {
        let buffer = b"l33l";
        assert_eq!(find_after(buffer, buffer.len(), Marker::RecordStart), None);
    }

    #[test]
    fn decode_timestamp_known_sample() {
        assert_eq!(encode_timestamp(SAMPLE_TS), [0xD2, 0x85, 0xD8, 0xCC, 0x04]);
        assert_eq!(decode_timestamp(&[0xD2, 0x85, 0xD8, 0xCC, 0x04]), SAMPLE_TS);
    }

    #[test]
    fn decode_timestamp_ignores_high_nibble_of_fifth_byte() {
        let mut raw = encode_timestamp(SAMPLE_TS);
        raw[4] |= 0xA0;
        assert_eq!(decode_timestamp(&raw), SAMPLE_TS);
    }

    #[test]
    fn single_record_then_end_of_stream() {
        let buffer = record_bytes("alice", "bob", SAMPLE_TS, "hello there");
        let mut cursor = RecordCursor::new(&buffer);

        let record = cursor.next().unwrap().unwrap();
        assert_eq!(record.sender, b"alice");
        assert_eq!(record.recipients, b"bob");
        assert_eq!(record.message, b"hello there");
        assert_eq!(record.timestamp, SAMPLE_TS);

        assert!(cursor.next().is_none());
    }

    #[test]
    fn concatenated_records_come_out_in_file_order() {
        let mut buffer = Vec::new();
        for index in 0..4u32 {
            buffer.extend_from_slice(&record_bytes(
                "alice",
                "bob",
                SAMPLE_TS + index,
                &format!("message {index}"),
            ));
        }

        let (records, error) = decode_buffer(&buffer);
        assert!(error.is_none());
        assert_eq!(records.len(), 4);
        for (index, record) in records.iter().enumerate() {
            assert_eq!(record.timestamp, SAMPLE_TS + index as u32);
            assert_eq!(record.message, format!("message {index}").as_bytes());
        }
    }

    #[test]
    fn leading_garbage_is_skipped() {
        let mut buffer = b"garbage bytes before the first marker".to_vec();
        buffer.extend_from_slice(&record_bytes("alice", "bob", SAMPLE_TS, "hi"));

        let (records, error) = decode_buffer(&buffer);
        assert!(error.is_none());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sender, b"alice");
    }

    #[test]
    fn empty_buffer_is_a_clean_end_of_stream() {
        let (records, error) = decode_buffer(&[]);
        assert!(records.is_empty());
        assert!(error.is_none());
    }

    #[test]
    fn missing_message_terminator_drops_the_tail_only() {
        let mut buffer = record_bytes("alice", "bob", SAMPLE_TS, "first");
        let mut truncated = record_bytes("alice", "bob", SAMPLE_TS + 1, "second");
        // Cut right after the message field marker, terminator and all.
        let cut = truncated.len() - "second".len() - 1;
        truncated.truncate(cut);
        buffer.extend_from_slice(&truncated);

        let (records, error) = decode_buffer(&buffer);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, b"first");
        assert!(matches!(error, Some(DecodeError::MissingTerminator { .. })));
    }

    #[test]
    fn missing_mid_record_marker_stops_the_stream() {
        let full = record_bytes("alice", "bob", SAMPLE_TS, "hi");
        // Keep the record start and header gap, drop the chat field onwards.
        let buffer = &full[..Marker::RecordStart.bytes().len() + RECORD_HEADER_GAP];

        let (records, error) = decode_buffer(buffer);
        assert!(records.is_empty());
        assert_eq!(
            error,
            Some(DecodeError::MissingMarker {
                marker: Marker::ChatFieldStart,
                offset: Marker::RecordStart.bytes().len() + RECORD_HEADER_GAP,
            })
        );
    }

    #[test]
    fn truncated_time_field_reports_buffer_too_short() {
        let full = record_bytes("alice", "bob", SAMPLE_TS, "hi");
        let time_payload = full
            .windows(Marker::TimeFieldStart.bytes().len())
            .position(|window| window == Marker::TimeFieldStart.bytes())
            .unwrap()
            + Marker::TimeFieldStart.bytes().len();
        let buffer = &full[..time_payload + 3];

        let (records, error) = decode_buffer(buffer);
        assert!(records.is_empty());
        assert_eq!(
            error,
            Some(DecodeError::BufferTooShort {
                field: "time",
                offset: time_payload,
                need: TIME_FIELD_LEN,
                got: 3,
            })
        );
    }

    #[test]
    fn cursor_is_fused_after_an_error() {
        let full = record_bytes("alice", "bob", SAMPLE_TS, "hi");
        let buffer = &full[..Marker::RecordStart.bytes().len() + RECORD_HEADER_GAP];

        let mut cursor = RecordCursor::new(buffer);
        assert!(matches!(cursor.next(), Some(Err(_))));
        assert!(cursor.next().is_none());
    }

    #[test]
    fn multi_member_recipient_list_is_kept_whole() {
        let buffer = record_bytes("alice", "bob/carol", SAMPLE_TS, "hi all");
        let (records, error) = decode_buffer(&buffer);
        assert!(error.is_none());
        assert_eq!(records[0].recipients, b"bob/carol");
        assert!(records[0].has_extra_members());
    }

    proptest! {
        #[test]
        fn timestamp_roundtrip_from_value(timestamp in any::<u32>()) {
            prop_assert_eq!(decode_timestamp(&encode_timestamp(timestamp)), timestamp);
        }

        #[test]
        fn timestamp_roundtrip_from_valid_raw_bytes(
            low in proptest::array::uniform4(0u8..0x80),
            nibble in 0u8..0x10,
        ) {
            // The format's invariant: top bit set on bytes 0-3, only the
            // low nibble of byte 4 carries value.
            let raw = [
                0x80 | low[0],
                0x80 | low[1],
                0x80 | low[2],
                0x80 | low[3],
                nibble,
            ];
            prop_assert_eq!(encode_timestamp(decode_timestamp(&raw)), raw);
        }
    }
}
