//! Failure taxonomy for pool operations.

use std::error::Error;
use std::fmt;

use crate::tcb::ThreadId;

/// Errors reported by the lifecycle API.
///
/// Every fallible operation returns these to the immediate caller; none
/// escalate to process termination. Precondition violations (a corrupted
/// registry, scheduling on an empty pool) are logic errors and panic
/// instead of being represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Every registry slot is occupied.
    CapacityExhausted,
    /// No live thread has the requested identity.
    NotFound(ThreadId),
    /// The operation needs a current thread and none is established yet.
    NoCurrentThread,
    /// The thread has not reached its terminal state (reported by reap).
    NotFinished(ThreadId),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::CapacityExhausted => write!(f, "thread pool capacity exhausted"),
            PoolError::NotFound(tid) => write!(f, "no thread with id {tid}"),
            PoolError::NoCurrentThread => write!(f, "no current thread"),
            PoolError::NotFinished(tid) => write!(f, "thread {tid} has not finished"),
        }
    }
}

impl Error for PoolError {}
