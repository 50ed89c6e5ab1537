//! Error types for the Aurora rendering core
//!
//! Variants follow the failure classes of the frame loop: fatal initialization,
//! fatal runtime GPU errors, resource lookup misses and contract violations.
//! Presentation staleness (out-of-date / suboptimal surfaces) is not an error:
//! it is reported through `AcquireOutcome` / `PresentOutcome` and absorbed by the
//! renderer's rebuild path.

use std::fmt;

/// Result type for Aurora operations
pub type Result<T> = std::result::Result<T, Error>;

/// Aurora rendering errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific runtime error (acquire, submit, present, API misuse)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource or creation parameters (zero extent, mismatched attachments, ...)
    InvalidResource(String),

    /// Initialization failed (device, surface, swapchain, pipelines)
    InitializationFailed(String),

    /// Lookup of a pipeline, model, render pass or entity that was never loaded
    ResourceNotFound(String),

    /// A configured hard limit was exceeded (e.g. light count per type)
    LimitExceeded(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ResourceNotFound(key) => write!(f, "Resource not found: {}", key),
            Error::LimitExceeded(msg) => write!(f, "Limit exceeded: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Whether the error must stop the render loop
    ///
    /// Every variant except a lookup miss during an optional step is fatal for the
    /// frame loop; the renderer never retries after a backend error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::ResourceNotFound(_) | Error::LimitExceeded(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
