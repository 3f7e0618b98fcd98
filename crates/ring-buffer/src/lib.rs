//! Fixed-Capacity Ring Buffer
//!
//! Provides a pre-allocated history buffer for per-frame state that keeps the
//! most recent N entries and evicts the oldest by index.

mod buffer;

pub use buffer::RingBuffer;

use thiserror::Error;

/// Ring buffer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingBufferError {
    #[error("Ring buffer capacity must be at least 1")]
    ZeroCapacity,
}
