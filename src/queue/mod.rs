//! Job records, their persistence and the sequential render worker.
//!
//! A job moves `queued -> processing -> completed | failed` exactly once. The worker owns a job
//! while it is processing; everything else only reads it or enqueues new ids.

/// Job record types.
pub mod job;
/// Log-line progress inference and monotonic tracking.
pub mod progress;
/// Job persistence.
pub mod store;
/// Single-worker FIFO queue.
pub mod worker;
