//! Process-wide default logger
//!
//! Until [`init`] is called the default logger writes colored records with
//! [`DEFAULT_HEADER`](crate::DEFAULT_HEADER) to stderr at `Info`, synchronously. [`init`] replaces it
//! atomically: calls already in progress finish on the logger they started on.
//!
//! ```
//! use rotalog::{registry, LogLevel};
//!
//! registry::set_level(LogLevel::Warn);
//! registry::info("suppressed");
//! registry::warn("printed to stderr");
//! ```

use crate::core::{CallSite, HeaderFormat, LogLevel, Logger, Result, SharedSink};
use crate::redirect::{RedirectTarget, Redirector};
use crate::sinks::ConsoleWriter;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// A replaceable current logger
pub struct LogRegistry {
    current: RwLock<Arc<Logger>>,
}

impl LogRegistry {
    pub fn new(logger: Logger) -> Self {
        Self {
            current: RwLock::new(Arc::new(logger)),
        }
    }

    pub fn current(&self) -> Arc<Logger> {
        Arc::clone(&self.current.read())
    }

    /// Install `logger`, returning the one it replaces
    pub fn init(&self, logger: Logger) -> Arc<Logger> {
        std::mem::replace(&mut *self.current.write(), Arc::new(logger))
    }

    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.current().shutdown(timeout)
    }
}

static CONSOLE: Lazy<Arc<Mutex<ConsoleWriter>>> =
    Lazy::new(|| Arc::new(Mutex::new(ConsoleWriter::stderr())));

static GLOBAL: Lazy<LogRegistry> = Lazy::new(|| {
    let console: SharedSink = console_writer();
    LogRegistry::new(Logger::with_header(
        HeaderFormat::standard(),
        LogLevel::Info,
        vec![console],
    ))
});

/// The registry holding the process-wide logger
pub fn global() -> &'static LogRegistry {
    &GLOBAL
}

/// The current process-wide logger
pub fn logger() -> Arc<Logger> {
    GLOBAL.current()
}

/// The console sink registered with the default logger
///
/// Lock it to recolor or disable colors, or pass it to [`remove_sink`].
pub fn console_writer() -> Arc<Mutex<ConsoleWriter>> {
    Arc::clone(&CONSOLE)
}

/// Replace the process-wide logger
///
/// On failure the current logger stays in place. The replaced logger is
/// shut down once the last in-flight call on it completes. The current
/// logger is never dropped; call [`shutdown`] before exiting to drain an
/// asynchronous one.
pub fn init(sink: SharedSink, level: LogLevel, format: &str, async_mode: bool) -> Result<()> {
    let logger = if async_mode {
        Logger::new_async(sink, level, format)?
    } else {
        Logger::new(sink, level, format)?
    };
    GLOBAL.init(logger);
    Ok(())
}

/// Replace the process-wide logger with one built elsewhere
pub fn set_logger(logger: Logger) -> Arc<Logger> {
    GLOBAL.init(logger)
}

pub fn level() -> LogLevel {
    logger().level()
}

pub fn set_level(level: LogLevel) {
    logger().set_level(level);
}

pub fn add_sink(sink: SharedSink) {
    logger().add_sink(sink);
}

pub fn remove_sink(sink: &SharedSink) -> bool {
    logger().remove_sink(sink)
}

#[track_caller]
pub fn add_redirect<T: RedirectTarget>(
    target: T,
    level: LogLevel,
    tag: impl Into<String>,
) -> Result<Redirector<T>> {
    logger().add_redirect(target, level, tag)
}

pub fn cancel_redirect<T: RedirectTarget>(redirector: Redirector<T>) -> Result<()> {
    logger().cancel_redirect(redirector)
}

pub fn flush() -> Result<()> {
    logger().flush()
}

pub fn shutdown(timeout: Duration) -> bool {
    GLOBAL.shutdown(timeout)
}

pub fn output(level: LogLevel, site: &CallSite, message: &str) {
    logger().output(level, site, message);
}

pub fn output_json<T: Serialize + ?Sized>(level: LogLevel, site: &CallSite, record: &T) {
    logger().output_json(level, site, record);
}

#[track_caller]
pub fn log(level: LogLevel, message: impl AsRef<str>) {
    logger().output(level, &CallSite::caller(), message.as_ref());
}

#[track_caller]
pub fn debug(message: impl AsRef<str>) {
    logger().output(LogLevel::Debug, &CallSite::caller(), message.as_ref());
}

#[track_caller]
pub fn info(message: impl AsRef<str>) {
    logger().output(LogLevel::Info, &CallSite::caller(), message.as_ref());
}

#[track_caller]
pub fn warn(message: impl AsRef<str>) {
    logger().output(LogLevel::Warn, &CallSite::caller(), message.as_ref());
}

#[track_caller]
pub fn error(message: impl AsRef<str>) {
    logger().output(LogLevel::Error, &CallSite::caller(), message.as_ref());
}

#[track_caller]
pub fn critical(message: impl AsRef<str>) {
    logger().output(LogLevel::Critical, &CallSite::caller(), message.as_ref());
}

#[track_caller]
pub fn log_json<T: Serialize + ?Sized>(level: LogLevel, record: &T) {
    logger().output_json(level, &CallSite::caller(), record);
}

#[track_caller]
pub fn debug_json<T: Serialize + ?Sized>(record: &T) {
    logger().output_json(LogLevel::Debug, &CallSite::caller(), record);
}

#[track_caller]
pub fn info_json<T: Serialize + ?Sized>(record: &T) {
    logger().output_json(LogLevel::Info, &CallSite::caller(), record);
}

#[track_caller]
pub fn warn_json<T: Serialize + ?Sized>(record: &T) {
    logger().output_json(LogLevel::Warn, &CallSite::caller(), record);
}

#[track_caller]
pub fn error_json<T: Serialize + ?Sized>(record: &T) {
    logger().output_json(LogLevel::Error, &CallSite::caller(), record);
}

#[track_caller]
pub fn critical_json<T: Serialize + ?Sized>(record: &T) {
    logger().output_json(LogLevel::Critical, &CallSite::caller(), record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{shared, Sink};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Sink for Capture {
        fn write(&mut self, msg: &[u8], _level: LogLevel) {
            self.0.lock().extend_from_slice(msg);
        }
    }

    fn registry(capture: &Capture) -> LogRegistry {
        LogRegistry::new(Logger::new(shared(capture.clone()), LogLevel::Info, "").unwrap())
    }

    #[test]
    fn test_replace_returns_previous() {
        let first = Capture::default();
        let second = Capture::default();
        let registry = registry(&first);

        let held = registry.current();
        let previous = registry.init(
            Logger::new(shared(second.clone()), LogLevel::Info, "").unwrap(),
        );
        assert!(Arc::ptr_eq(&held, &previous));

        held.info("to first");
        registry.current().info("to second");

        assert_eq!(&*first.0.lock(), b"to first\n");
        assert_eq!(&*second.0.lock(), b"to second\n");
    }

    #[test]
    fn test_default_logger() {
        let default = global().current();
        assert_eq!(default.level(), LogLevel::Info);
        assert_eq!(default.header(), &HeaderFormat::standard());
        assert!(!default.is_async());

        let console: SharedSink = console_writer();
        assert!(default.remove_sink(&console));
        default.add_sink(console);
    }
}
