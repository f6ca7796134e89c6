//! The `error` module defines the error types used within `openmq`.
//!
//! Queue-state failures (`Empty`, `NotFound`) are expected outcomes that the
//! caller handles. `Io`, `Encode` and `MalformedRecord` come from the
//! durability log.

use thiserror::Error;

use crate::broker::message::MessageId;

/// Errors returned by queue operations and the durability log.
#[derive(Error, Debug)]
pub enum QueueError {
    /// `dequeue` found no ready message. Back off and poll again later.
    #[error("no messages ready in topic `{topic}`")]
    Empty { topic: String },

    /// `ack`/`nack` referenced an id that is not currently in flight.
    #[error("message `{id}` is not in flight on topic `{topic}`")]
    NotFound { topic: String, id: MessageId },

    /// The log file could not be opened, written or read.
    #[error("durability log i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// A log record could not be encoded.
    #[error("failed to encode log record: {0}")]
    Encode(#[from] serde_json::Error),

    /// A log line did not match the record schema.
    #[error("malformed log record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
}

impl QueueError {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
