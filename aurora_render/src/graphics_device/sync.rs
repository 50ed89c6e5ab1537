/// Fence and semaphore traits

use crate::error::Result;

/// CPU-observable GPU completion signal
pub trait Fence: Send + Sync {
    /// Block until the fence is signaled or `timeout_ns` elapses
    fn wait(&self, timeout_ns: u64) -> Result<()>;

    /// Return the fence to the unsignaled state
    fn reset(&self) -> Result<()>;

    /// Non-blocking status query
    fn is_signaled(&self) -> Result<bool>;
}

/// GPU-side ordering primitive between queue operations
pub trait Semaphore: Send + Sync {}
