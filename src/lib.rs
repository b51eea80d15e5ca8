//! Skypelog - a reader for legacy Skype `.dbb` binary chat logs
//!
//! This library recovers chat history from the undocumented binary log
//! format the old Skype client kept in its profile directory. Given the
//! raw bytes of one log file it locates the marker-delimited records,
//! undoes the bit-packed timestamp encoding, and yields (timestamp,
//! sender, recipients, message) tuples ready for printing or export.
//!
//! # Examples
//!
//! ## Decoding one log file
//!
//! ```no_run
//! use skypelog::{format_message, load_chat_log, TimeDisplay};
//! use std::path::Path;
//!
//! let log = load_chat_log(Path::new("/path/to/profile/chat512.dbb")).unwrap();
//! for message in &log.messages {
//!     println!("{}", format_message(message, TimeDisplay::Local));
//! }
//! if let Some(err) = &log.error {
//!     eprintln!("decoding stopped early: {err}");
//! }
//! ```
//!
//! ## Walking a buffer record by record
//!
//! ```no_run
//! use skypelog::RecordCursor;
//!
//! let buffer = std::fs::read("chat512.dbb").unwrap();
//! for item in RecordCursor::new(&buffer) {
//!     match item {
//!         Ok(record) => println!("{}: {}", record.sender_text(), record.message_text()),
//!         Err(err) => {
//!             eprintln!("{err}");
//!             break;
//!         }
//!     }
//! }
//! ```

pub mod loader;
pub mod parser;
pub mod render;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use loader::{find_log_files, is_log_file_name, load_chat_log, load_profile};
pub use parser::{decode_buffer, decode_timestamp, find_after, RecordCursor};
pub use render::{format_message, format_record, format_timestamp, TimeDisplay};
pub use types::{ChatLog, ChatMessage, DecodeError, Marker, Record};
