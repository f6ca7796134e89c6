//! The `consumer` module wraps the dequeue → handle → ack/nack cycle that
//! every worker in front of a topic repeats.

pub mod worker;

pub use worker::{Consumer, Delivery, DrainSummary};
