//! The `persistence` module provides the durability log.
//!
//! The log is an append-only UTF-8 file holding one JSON record per line.
//! Only enqueues are recorded, so replaying it recovers the submitted
//! workload but not delivery, acknowledgement or retry progress.

pub mod fault;
pub mod log;

pub use fault::FaultObserver;
pub use log::{DurabilityLog, LoadedLog, LogOp, LogRecord, ReplayMode};
