use crate::broker::message::MessageId;
use crate::utils::QueueError;

/// Receives durability-log write failures.
///
/// A failed write never rolls back or blocks the enqueue that caused it; the
/// message stays in memory and the caller gets its id. Observers are how an
/// embedding application learns that the log fell behind.
pub trait FaultObserver: Send + Sync {
    fn on_log_failure(&self, topic: &str, id: &MessageId, error: &QueueError);
}

impl<F> FaultObserver for F
where
    F: Fn(&str, &MessageId, &QueueError) + Send + Sync,
{
    fn on_log_failure(&self, topic: &str, id: &MessageId, error: &QueueError) {
        self(topic, id, error)
    }
}
