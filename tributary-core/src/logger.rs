//! Logging Boundary
//!
//! Engines and features report what they do through a [`Logger`]. Logging
//! is best-effort: a logger cannot fail, and nothing it does can alter a
//! state stream.
//!
//! Loggers are always passed explicitly. [`TracingLogger`] forwards to
//! `tracing`, [`NoopLogger`] discards everything.

use std::sync::Arc;

/// Receives diagnostic messages from engines and features.
///
/// `origin` names the component that produced the message.
pub trait Logger: Send + Sync {
    fn log(&self, origin: &str, message: &str);

    fn log_error(&self, origin: &str, message: &str, error: &(dyn std::error::Error + 'static));
}

/// A logger shared between an engine and its features.
pub type SharedLogger = Arc<dyn Logger>;

/// Forwards messages to `tracing`: plain messages at debug level, errors
/// at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, origin: &str, message: &str) {
        tracing::debug!(origin, "{}", message);
    }

    fn log_error(&self, origin: &str, message: &str, error: &(dyn std::error::Error + 'static)) {
        tracing::warn!(origin, error = %error, "{}", message);
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _origin: &str, _message: &str) {}

    fn log_error(&self, _origin: &str, _message: &str, _error: &(dyn std::error::Error + 'static)) {}
}

/// Logger that records every message, for assertions in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingLogger {
    lines: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingLogger {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub(crate) fn count_containing(&self, needle: &str) -> usize {
        self.lines.lock().iter().filter(|l| l.contains(needle)).count()
    }
}

#[cfg(test)]
impl Logger for RecordingLogger {
    fn log(&self, origin: &str, message: &str) {
        self.lines.lock().push(format!("{origin} {message}"));
    }

    fn log_error(&self, origin: &str, message: &str, error: &(dyn std::error::Error + 'static)) {
        self.lines.lock().push(format!("{origin} {message}: {error}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_logger_keeps_messages_in_order() {
        let logger = RecordingLogger::default();
        logger.log("engine", "first");
        logger.log("engine", "second");

        assert_eq!(logger.lines(), vec!["engine first", "engine second"]);
    }

    #[test]
    fn recording_logger_includes_error() {
        let logger = RecordingLogger::default();
        let error = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        logger.log_error("feature", "failed", &error);

        assert_eq!(logger.count_containing("boom"), 1);
    }

    #[test]
    fn builtin_loggers_accept_messages() {
        let error = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        TracingLogger.log("engine", "hello");
        TracingLogger.log_error("engine", "hello", &error);
        NoopLogger.log("engine", "hello");
        NoopLogger.log_error("engine", "hello", &error);
    }
}
