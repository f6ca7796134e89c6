use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use tracing::debug;

use crate::broker::message::{Message, MessageId};
use crate::utils::{QueueError, Result};

/// What a negative acknowledgement did with the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackOutcome {
    /// Back at the head of the ready sequence, next in line for delivery.
    Requeued { retry_count: u32 },
    /// Retries exhausted; parked in the dead-letter sequence for good.
    DeadLettered { retry_count: u32 },
}

/// Point-in-time sizes of a topic's three collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicStats {
    pub ready: usize,
    pub in_flight: usize,
    pub dead_letter: usize,
}

impl TopicStats {
    pub fn total(&self) -> usize {
        self.ready + self.in_flight + self.dead_letter
    }
}

/// Represents one topic's delivery state.
///
/// Every tracked message is owned once, by `messages`. The `ready`,
/// `in_flight` and `dead_letter` collections only hold ids, and each id in
/// `messages` appears in exactly one of them. An acknowledged message leaves
/// `messages` entirely.
///
/// A `TopicQueue` is not synchronised on its own; the `QueueManager` keeps
/// each one behind its own mutex.
#[derive(Debug, Default)]
pub struct TopicQueue {
    pub name: String,
    pub(crate) messages: HashMap<MessageId, Message>,
    pub(crate) ready: VecDeque<MessageId>,
    pub(crate) in_flight: HashSet<MessageId>,
    pub(crate) dead_letter: Vec<MessageId>,
}

impl TopicQueue {
    /// Number of failed deliveries after which a message is dead-lettered.
    pub const MAX_RETRIES: u32 = 3;

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Appends a new message to the tail of the ready sequence.
    pub fn enqueue(&mut self, payload: impl Into<String>, ttl: Option<Duration>) -> &Message {
        let msg = Message::new(payload, ttl);
        let id = msg.id.clone();
        debug!(topic = %self.name, id = %id, "enqueued");
        self.ready.push_back(id.clone());
        self.messages.entry(id).or_insert(msg)
    }

    /// Hands the head of the ready sequence to the caller and marks it in flight.
    ///
    /// Never waits: an empty ready sequence is reported as `QueueError::Empty`
    /// and nothing changes.
    pub fn dequeue(&mut self) -> Result<Message> {
        let Some(id) = self.ready.pop_front() else {
            return Err(QueueError::Empty {
                topic: self.name.clone(),
            });
        };
        let msg = self.messages.get(&id).cloned();
        debug_assert!(msg.is_some(), "ready id {id} has no message");
        let Some(msg) = msg else {
            return Err(self.not_found(&id));
        };
        self.in_flight.insert(id);
        debug!(topic = %self.name, id = %msg.id, "dequeued");
        Ok(msg)
    }

    /// Settles an in-flight message; it is dropped with no further trace.
    pub fn ack(&mut self, id: &MessageId) -> Result<()> {
        if !self.in_flight.remove(id) {
            return Err(self.not_found(id));
        }
        self.messages.remove(id);
        debug!(topic = %self.name, id = %id, "acked");
        Ok(())
    }

    /// Records a failed delivery.
    ///
    /// Below `MAX_RETRIES` the message goes back to the HEAD of `ready`, ahead
    /// of never-delivered messages. On reaching it the message moves to
    /// `dead_letter` and is never delivered again.
    pub fn nack(&mut self, id: &MessageId) -> Result<NackOutcome> {
        if !self.in_flight.remove(id) {
            return Err(self.not_found(id));
        }
        let Some(msg) = self.messages.get_mut(id) else {
            return Err(self.not_found(id));
        };
        msg.retry_count += 1;
        let retry_count = msg.retry_count;

        if retry_count >= Self::MAX_RETRIES {
            self.dead_letter.push(id.clone());
            debug!(topic = %self.name, id = %id, retry_count, "dead-lettered");
            Ok(NackOutcome::DeadLettered { retry_count })
        } else {
            self.ready.push_front(id.clone());
            debug!(topic = %self.name, id = %id, retry_count, "requeued at head");
            Ok(NackOutcome::Requeued { retry_count })
        }
    }

    /// Copies of the dead-lettered messages, oldest first.
    pub fn dead_letters(&self) -> Vec<Message> {
        self.dead_letter
            .iter()
            .filter_map(|id| self.messages.get(id).cloned())
            .collect()
    }

    /// Appends a replayed message to the tail of `ready`.
    ///
    /// Returns `false`, leaving the topic untouched, when the id is already tracked.
    pub fn restore(&mut self, msg: Message) -> bool {
        if self.messages.contains_key(&msg.id) {
            return false;
        }
        self.ready.push_back(msg.id.clone());
        self.messages.insert(msg.id.clone(), msg);
        true
    }

    pub fn stats(&self) -> TopicStats {
        TopicStats {
            ready: self.ready.len(),
            in_flight: self.in_flight.len(),
            dead_letter: self.dead_letter.len(),
        }
    }

    fn not_found(&self, id: &MessageId) -> QueueError {
        QueueError::NotFound {
            topic: self.name.clone(),
            id: id.clone(),
        }
    }
}
