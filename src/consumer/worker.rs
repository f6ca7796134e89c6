use std::sync::Arc;

use tracing::{debug, warn};

use crate::broker::{Message, NackOutcome, QueueManager};
use crate::utils::{QueueError, Result};

/// What happened to the message a single `process_next` call looked at.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Nothing was ready.
    Idle,
    /// The handler succeeded and the message was acknowledged.
    Acked(Message),
    /// The handler failed; the message is back at the head of the topic.
    Requeued(Message),
    /// The handler failed for the last time; the message was dead-lettered.
    DeadLettered(Message),
}

/// Totals for a `drain` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub acked: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
}

/// Pulls messages from one topic and settles each one according to the
/// handler's verdict: `Ok` acknowledges, `Err` negatively acknowledges.
#[derive(Debug, Clone)]
pub struct Consumer {
    manager: Arc<QueueManager>,
    topic: String,
}

impl Consumer {
    pub fn new(manager: Arc<QueueManager>, topic: &str) -> Self {
        Self {
            manager,
            topic: topic.to_string(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Delivers at most one message to `handler`.
    ///
    /// An empty topic is `Delivery::Idle`, not an error. Ack/nack failures
    /// are returned as-is.
    pub fn process_next<F, E>(&self, mut handler: F) -> Result<Delivery>
    where
        F: FnMut(&Message) -> std::result::Result<(), E>,
        E: std::fmt::Display,
    {
        let msg = match self.manager.dequeue(&self.topic) {
            Ok(msg) => msg,
            Err(QueueError::Empty { .. }) => return Ok(Delivery::Idle),
            Err(e) => return Err(e),
        };

        match handler(&msg) {
            Ok(()) => {
                self.manager.ack(&self.topic, &msg.id)?;
                debug!(topic = %self.topic, id = %msg.id, "handler succeeded");
                Ok(Delivery::Acked(msg))
            }
            Err(e) => {
                warn!(topic = %self.topic, id = %msg.id, error = %e, "handler failed");
                let mut msg = msg;
                match self.manager.nack(&self.topic, &msg.id)? {
                    NackOutcome::Requeued { retry_count } => {
                        msg.retry_count = retry_count;
                        Ok(Delivery::Requeued(msg))
                    }
                    NackOutcome::DeadLettered { retry_count } => {
                        msg.retry_count = retry_count;
                        Ok(Delivery::DeadLettered(msg))
                    }
                }
            }
        }
    }

    /// Calls `process_next` until the topic has nothing ready.
    ///
    /// Terminates because every failure moves a message one step closer to
    /// the dead-letter queue.
    pub fn drain<F, E>(&self, mut handler: F) -> Result<DrainSummary>
    where
        F: FnMut(&Message) -> std::result::Result<(), E>,
        E: std::fmt::Display,
    {
        let mut summary = DrainSummary::default();
        loop {
            match self.process_next(&mut handler)? {
                Delivery::Idle => return Ok(summary),
                Delivery::Acked(_) => summary.acked += 1,
                Delivery::Requeued(_) => summary.requeued += 1,
                Delivery::DeadLettered(_) => summary.dead_lettered += 1,
            }
        }
    }
}
