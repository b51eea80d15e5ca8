//! Log file discovery and batch decoding.

use crate::parser::RecordCursor;
use crate::types::{ChatLog, ChatMessage};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const LOG_PREFIX: &str = "chat";
const LOG_SUFFIX: &str = ".dbb";

/// Whether a file name matches the `chat*.dbb` pattern the client uses for
/// its per-chat logs. Case-sensitive, as the client names them.
pub fn is_log_file_name(name: &str) -> bool {
    name.starts_with(LOG_PREFIX) && name.ends_with(LOG_SUFFIX)
}

/// Find all `chat*.dbb` logs directly inside a profile directory, sorted
/// by name for deterministic output order.
pub fn find_log_files(profile: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(profile)
        .with_context(|| format!("reading directory `{}`", profile.display()))?;

    let mut results = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("reading entry inside `{}`", profile.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            if is_log_file_name(name) {
                results.push(path);
            }
        }
    }

    if results.is_empty() {
        Err(anyhow!(
            "could not find any {LOG_PREFIX}*{LOG_SUFFIX} log inside `{}`",
            profile.display()
        ))
    } else {
        results.sort();
        Ok(results)
    }
}

/// Read one log file fully into memory and decode it.
///
/// Decode anomalies are not failures: they are recorded on the returned
/// [`ChatLog`] together with the messages decoded before the stop. Only
/// I/O errors propagate.
pub fn load_chat_log(path: &Path) -> Result<ChatLog> {
    let buffer = fs::read(path).with_context(|| format!("reading `{}`", path.display()))?;

    let mut messages = Vec::new();
    let mut extra_member_lists = 0usize;
    let mut error = None;
    for item in RecordCursor::new(&buffer) {
        match item {
            Ok(record) => {
                if record.has_extra_members() {
                    extra_member_lists += 1;
                }
                messages.push(ChatMessage::from_record(&record));
            }
            Err(err) => {
                error = Some(err);
                break;
            }
        }
    }

    Ok(ChatLog {
        path: path.to_path_buf(),
        messages,
        error,
        extra_member_lists,
    })
}

/// Load every discovered log in a profile directory, in name order.
pub fn load_profile(profile: &Path) -> Result<Vec<ChatLog>> {
    let files = find_log_files(profile)?;
    let mut logs = Vec::with_capacity(files.len());
    for path in files {
        logs.push(load_chat_log(&path)?);
    }
    Ok(logs)
}
