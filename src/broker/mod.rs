pub mod engine;
pub mod message;
pub mod topic;

pub use engine::{QueueManager, ReplayReport};
pub use message::{Message, MessageId};
pub use topic::{NackOutcome, TopicQueue, TopicStats};

#[cfg(test)]
mod tests;
