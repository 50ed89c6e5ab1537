//! Unit tests for log.rs
//!
//! Tests Logger trait, LogEntry, LogSeverity, DefaultLogger formatting and the `log` bridge.

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, LogBridge};
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "aurora::Renderer".to_string(),
        message: "Swapchain size : 3".to_string(),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_debug() {
    assert_eq!(format!("{:?}", LogSeverity::Trace), "Trace");
    assert_eq!(format!("{:?}", LogSeverity::Error), "Error");
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_format_plain_without_location() {
    let text = DefaultLogger::format_plain(&entry(LogSeverity::Info, None, None));
    assert!(text.contains("[INFO ]"));
    assert!(text.contains("[aurora::Renderer]"));
    assert!(text.ends_with("Swapchain size : 3"));
}

#[test]
fn test_format_plain_with_location() {
    let text = DefaultLogger::format_plain(&entry(LogSeverity::Error, Some("renderer.rs"), Some(42)));
    assert!(text.contains("[ERROR]"));
    assert!(text.ends_with("(renderer.rs:42)"));
}

#[test]
fn test_format_plain_timestamp_shape() {
    let text = DefaultLogger::format_plain(&entry(LogSeverity::Debug, None, None));
    // [YYYY-MM-DD HH:MM:SS.mmm]
    let close = text.find(']').unwrap();
    assert_eq!(close, 24);
}

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&entry(severity, None, None));
        logger.log(&entry(severity, Some("test.rs"), Some(7)));
    }
}

// ============================================================================
// LOG BRIDGE TESTS
// ============================================================================

#[test]
fn test_bridge_level_mapping() {
    assert_eq!(LogBridge::level(LogSeverity::Trace), log::Level::Trace);
    assert_eq!(LogBridge::level(LogSeverity::Debug), log::Level::Debug);
    assert_eq!(LogBridge::level(LogSeverity::Info), log::Level::Info);
    assert_eq!(LogBridge::level(LogSeverity::Warn), log::Level::Warn);
    assert_eq!(LogBridge::level(LogSeverity::Error), log::Level::Error);
}

#[test]
fn test_bridge_without_backend_is_silent() {
    // No `log` backend installed in unit tests: must not panic
    LogBridge.log(&entry(LogSeverity::Error, Some("a.rs"), Some(1)));
}

// ============================================================================
// LOGGER TRAIT TESTS
// ============================================================================

struct CountingLogger {
    count: std::sync::Mutex<usize>,
}

impl Logger for CountingLogger {
    fn log(&self, _entry: &LogEntry) {
        *self.count.lock().unwrap() += 1;
    }
}

#[test]
fn test_custom_logger_implementation() {
    let logger = CountingLogger { count: std::sync::Mutex::new(0) };
    logger.log(&entry(LogSeverity::Info, None, None));
    logger.log(&entry(LogSeverity::Warn, None, None));
    assert_eq!(*logger.count.lock().unwrap(), 2);
}

#[test]
fn test_loggers_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
    assert_send_sync::<LogBridge>();
}
