//! Queue manager
//!
//! This module contains the registry that routes operations by topic name:
//! - resolving (and lazily creating) the `TopicQueue` for a name
//! - delegating enqueue/dequeue/ack/nack/dead-letter reads to it
//! - appending an `ENQUEUE` record to the durability log when persistence is on
//! - replaying a durability log back into ready sequences
//!
//! Concurrency notes:
//! - Each topic sits behind its own mutex, held for the whole operation, so
//!   operations on one topic are serialised while distinct topics proceed in
//!   parallel. The registry lock is only taken to find or create a topic.
//! - The log has its own lock. The enqueue record is written while the topic
//!   lock is still held, so within one topic the file order matches the
//!   enqueue order. Across topics the file order is not synchronised with the
//!   in-memory order.
//! - Nothing here blocks waiting for messages; dequeue on an empty topic is
//!   an immediate `QueueError::Empty`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::broker::message::{Message, MessageId};
use crate::broker::topic::{NackOutcome, TopicQueue, TopicStats};
use crate::config::QueueSettings;
use crate::persistence::{DurabilityLog, FaultObserver, LogOp, LogRecord, ReplayMode};
use crate::utils::{QueueError, Result};

/// Summary of a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// `ENQUEUE` records turned back into ready messages.
    pub applied: usize,
    /// Well-formed records with any other op.
    pub ignored: usize,
    /// `ENQUEUE` records whose id the topic already tracks.
    pub duplicates: usize,
    /// Lines skipped by lenient replay.
    pub malformed: usize,
}

pub struct QueueManager {
    topics: RwLock<HashMap<String, Arc<Mutex<TopicQueue>>>>,
    log: Option<DurabilityLog>,
    observer: Option<Arc<dyn FaultObserver>>,
    log_failures: AtomicU64,
}

impl QueueManager {
    /// Creates a manager. With `persistent` set, every enqueue is appended to
    /// the log at `log_path`; otherwise the path is ignored.
    pub fn new(persistent: bool, log_path: impl Into<PathBuf>) -> Self {
        let log = persistent.then(|| DurabilityLog::new(log_path));
        Self {
            topics: RwLock::new(HashMap::new()),
            log,
            observer: None,
            log_failures: AtomicU64::new(0),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(false, PathBuf::new())
    }

    pub fn from_settings(settings: &QueueSettings) -> Self {
        Self::new(settings.persistent, &settings.log_path)
    }

    /// Registers the observer notified whenever a log write fails.
    pub fn with_fault_observer(mut self, observer: impl FaultObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.log.is_some()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(DurabilityLog::path)
    }

    /// Number of enqueue records that could not be written so far.
    pub fn log_failures(&self) -> u64 {
        self.log_failures.load(Ordering::Relaxed)
    }

    /// Adds a message to the tail of `topic` and returns its id.
    ///
    /// Always succeeds. A failed log write is reported through tracing, the
    /// failure counter and the fault observer, never through the return value.
    pub fn enqueue(
        &self,
        topic: &str,
        payload: impl Into<String>,
        ttl: Option<Duration>,
    ) -> MessageId {
        let handle = self.topic(topic);
        let mut queue = lock(&handle);
        let msg = queue.enqueue(payload, ttl);
        let id = msg.id.clone();

        if let Some(log) = &self.log {
            if let Err(e) = log.write(&LogRecord::enqueue(topic, msg)) {
                self.report_log_failure(topic, &id, &e);
            }
        }
        id
    }

    pub fn dequeue(&self, topic: &str) -> Result<Message> {
        lock(&self.topic(topic)).dequeue()
    }

    pub fn ack(&self, topic: &str, id: &MessageId) -> Result<()> {
        lock(&self.topic(topic)).ack(id)
    }

    pub fn nack(&self, topic: &str, id: &MessageId) -> Result<NackOutcome> {
        let outcome = lock(&self.topic(topic)).nack(id)?;
        if let NackOutcome::DeadLettered { retry_count } = outcome {
            info!(topic, id = %id, retry_count, "message moved to dead-letter queue");
        }
        Ok(outcome)
    }

    pub fn dead_letters(&self, topic: &str) -> Vec<Message> {
        lock(&self.topic(topic)).dead_letters()
    }

    pub fn stats(&self, topic: &str) -> TopicStats {
        lock(&self.topic(topic)).stats()
    }

    /// Names of every topic referenced so far, sorted.
    pub fn topics(&self) -> Vec<String> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = topics.keys().cloned().collect();
        names.sort();
        names
    }

    /// Strict replay: see [`QueueManager::replay_with`].
    pub fn replay(&self, path: impl AsRef<Path>) -> Result<ReplayReport> {
        self.replay_with(path, ReplayMode::Strict)
    }

    /// Re-creates the messages of every `ENQUEUE` record in `path`, in file
    /// order, at the tail of their topic's ready sequence.
    ///
    /// Only the id, payload and TTL come back; the timestamp is reset and the
    /// retry count starts over. In-flight and dead-letter state is not
    /// reconstructed and records with other ops are ignored. In strict mode a
    /// malformed line fails the call before any message is applied. Replay
    /// never writes to the log.
    pub fn replay_with(&self, path: impl AsRef<Path>, mode: ReplayMode) -> Result<ReplayReport> {
        let path = path.as_ref();
        let loaded = DurabilityLog::read(path, mode)?;
        let mut report = ReplayReport {
            malformed: loaded.malformed,
            ..ReplayReport::default()
        };

        for record in loaded.records {
            let stored = match (record.op, record.message) {
                (LogOp::Enqueue, Some(stored)) => stored,
                _ => {
                    report.ignored += 1;
                    continue;
                }
            };
            let msg = Message::with_id(stored.id, stored.payload, stored.ttl);
            let id = msg.id.clone();
            if lock(&self.topic(&record.topic)).restore(msg) {
                report.applied += 1;
            } else {
                warn!(topic = %record.topic, id = %id, "skipping replayed message already tracked");
                report.duplicates += 1;
            }
        }

        info!(
            path = %path.display(),
            applied = report.applied,
            ignored = report.ignored,
            duplicates = report.duplicates,
            malformed = report.malformed,
            "replayed durability log"
        );
        Ok(report)
    }

    /// Returns the queue for `name`, creating it on first reference.
    pub(crate) fn topic(&self, name: &str) -> Arc<Mutex<TopicQueue>> {
        {
            let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(queue) = topics.get(name) {
                return Arc::clone(queue);
            }
        }
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            topics
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(TopicQueue::new(name)))),
        )
    }

    fn report_log_failure(&self, topic: &str, id: &MessageId, err: &QueueError) {
        self.log_failures.fetch_add(1, Ordering::Relaxed);
        error!(topic, id = %id, error = %err, "failed to append enqueue record to durability log");
        if let Some(observer) = &self.observer {
            observer.on_log_failure(topic, id, err);
        }
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueManager")
            .field("topics", &self.topics())
            .field("log", &self.log)
            .field("observer", &self.observer.is_some())
            .field("log_failures", &self.log_failures())
            .finish()
    }
}

// A panic while a topic lock is held cannot leave a half-applied transition:
// every mutation completes before anything that could unwind.
fn lock(queue: &Mutex<TopicQueue>) -> MutexGuard<'_, TopicQueue> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}
