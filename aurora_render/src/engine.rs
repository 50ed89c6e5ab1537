/// Aurora Engine - process-wide facade for the logging sink
///
/// The renderer itself is an explicit object with injected collaborators; the
/// only global state left is the logger, shared by every component through the
/// `engine_*` macros.

use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

fn logger_slot() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

fn install(logger: Box<dyn Logger>) {
    if let Ok(mut slot) = logger_slot().write() {
        *slot = logger;
    }
}

/// Engine facade
///
/// # Example
///
/// ```no_run
/// use aurora_render::aurora::Engine;
/// use aurora_render::aurora::log::LogBridge;
///
/// env_logger::init();
/// Engine::set_logger(LogBridge);
/// ```
pub struct Engine;

impl Engine {
    /// Replace the process-wide logger
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        install(Box::new(logger));
    }

    /// Go back to the colored console logger
    pub fn reset_logger() {
        install(Box::new(DefaultLogger));
    }

    /// Log without a source location (engine_trace! to engine_warn!)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        emit(severity, source, message, None);
    }

    /// Log with the `file:line` of the call site (engine_error!, engine_err!, engine_bail!)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        emit(severity, source, message, Some((file, line)));
    }
}

/// Hand one entry to the installed logger; a poisoned slot drops the entry
fn emit(severity: LogSeverity, source: &str, message: String, location: Option<(&'static str, u32)>) {
    let Ok(logger) = logger_slot().read() else {
        return;
    };
    logger.log(&LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_owned(),
        message,
        file: location.map(|(file, _)| file),
        line: location.map(|(_, line)| line),
    });
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
