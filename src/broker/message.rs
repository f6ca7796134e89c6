use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, process-unique identifier assigned to every message at enqueue time.
///
/// Ids are random (UUID v4); their value carries no ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Represents a unit of work held by a topic queue.
///
/// The id, payload, timestamp and TTL never change after creation; only
/// `retry_count` moves, and only when a delivery is negatively acknowledged.
///
/// The serialized field names are the ones used inside durability log records.
///
/// # Fields
///
/// - `id` - Unique identifier assigned at enqueue time.
/// - `payload` - The message content, opaque to the queue.
/// - `timestamp` - When the message was created (or replayed).
/// - `ttl` - Optional time-to-live. Carried and persisted, never enforced.
/// - `retry_count` - Number of failed deliveries so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "ID")]
    pub id: MessageId,
    #[serde(rename = "Payload")]
    pub payload: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "TTL", with = "ttl_nanos", default)]
    pub ttl: Option<Duration>,
    #[serde(rename = "RetryCount", default)]
    pub retry_count: u32,
}

impl Message {
    pub fn new(payload: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self::with_id(MessageId::generate(), payload, ttl)
    }

    /// Builds a fresh message around an existing id, as replay does.
    pub fn with_id(id: MessageId, payload: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            id,
            payload: payload.into(),
            timestamp: Utc::now(),
            ttl,
            retry_count: 0,
        }
    }
}

/// TTL travels through the log as an integer count of nanoseconds, or `null`.
mod ttl_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ttl: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match ttl {
            Some(d) => {
                let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
                s.serialize_some(&nanos)
            }
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_nanos))
    }
}
