//! # openmq
//!
//! `openmq` is an embedded, single-process message queue. Named topics hold
//! FIFO sequences of messages that consumers take with at-least-once
//! delivery: a failed delivery puts the message back at the head of its
//! topic, and after three failures it is parked in a dead-letter queue.
//! Enqueues can optionally be appended to a JSON-lines durability log and
//! replayed after a restart.
//!
//! ## Core Modules
//!
//! - `broker`: messages, the per-topic state machine and the `QueueManager` registry.
//! - `persistence`: the durability log, its record schema and replay reader.
//! - `consumer`: a helper that runs the dequeue → handle → ack/nack cycle.
//! - `config`: loading settings from files and environment variables.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod config;
pub mod consumer;
pub mod persistence;
pub mod utils;

pub use broker::{Message, MessageId, NackOutcome, QueueManager, ReplayReport, TopicStats};
pub use consumer::{Consumer, Delivery, DrainSummary};
pub use persistence::{FaultObserver, ReplayMode};
pub use utils::{QueueError, Result};
