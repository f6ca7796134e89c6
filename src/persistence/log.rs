//! Durability log backed by a JSON-lines file
//!
//! Each call to [`DurabilityLog::write`] is its own small transaction: open
//! the file in append mode (creating it if needed), write one encoded record
//! and a newline, close. Writes are serialised by a lock owned by the log and
//! shared with nothing else.
//!
//! Reading decodes every line against [`LogRecord`]. In strict mode (the
//! default) the first malformed line aborts the read with its line number; in
//! lenient mode malformed lines are counted and skipped.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::broker::message::Message;
use crate::utils::{QueueError, Result};

/// Operation carried by a log record. Only `Enqueue` is ever written here;
/// the others are recognised so that replay can ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogOp {
    Enqueue,
    Ack,
    Nack,
    DeadLetter,
}

/// One line of the durability log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub op: LogOp,
    pub topic: String,
    /// Required for `ENQUEUE`; other ops may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    pub fn enqueue(topic: &str, message: &Message) -> Self {
        Self {
            op: LogOp::Enqueue,
            topic: topic.to_string(),
            message: Some(message.clone()),
            timestamp: Utc::now(),
        }
    }

    fn decode(raw: &[u8]) -> std::result::Result<Self, String> {
        let line = std::str::from_utf8(raw).map_err(|e| format!("invalid utf-8: {e}"))?;
        let record: Self = serde_json::from_str(line).map_err(|e| e.to_string())?;
        if record.topic.is_empty() {
            return Err("empty topic name".to_string());
        }
        match &record.message {
            None if record.op == LogOp::Enqueue => {
                Err("ENQUEUE record without a message".to_string())
            }
            Some(msg) if msg.id.as_str().is_empty() => Err("empty message id".to_string()),
            _ => Ok(record),
        }
    }
}

/// How replay treats lines that do not decode as a [`LogRecord`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayMode {
    /// Fail the whole read on the first malformed line.
    #[default]
    Strict,
    /// Skip malformed lines, logging each one.
    Lenient,
}

/// Records decoded from a log file, in file order.
#[derive(Debug, Default)]
pub struct LoadedLog {
    pub records: Vec<LogRecord>,
    /// Lines skipped in lenient mode.
    pub malformed: usize,
}

#[derive(Debug)]
pub struct DurabilityLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DurabilityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a single line.
    pub fn write(&self, record: &LogRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Decodes every record in `path`.
    ///
    /// Failing to open or read the file is an error in either mode. A line
    /// that is not UTF-8 is malformed like any other undecodable line. Blank
    /// lines are ignored.
    pub fn read(path: impl AsRef<Path>, mode: ReplayMode) -> Result<LoadedLog> {
        let file = File::open(path.as_ref())?;
        let mut loaded = LoadedLog::default();

        for (idx, line) in BufReader::new(file).split(b'\n').enumerate() {
            let line = line?;
            let line_no = idx + 1;
            if line.trim_ascii().is_empty() {
                continue;
            }
            match LogRecord::decode(&line) {
                Ok(record) => loaded.records.push(record),
                Err(reason) => match mode {
                    ReplayMode::Strict => {
                        return Err(QueueError::MalformedRecord {
                            line: line_no,
                            reason,
                        });
                    }
                    ReplayMode::Lenient => {
                        warn!(line = line_no, %reason, "skipping malformed log record");
                        loaded.malformed += 1;
                    }
                },
            }
        }

        Ok(loaded)
    }
}
