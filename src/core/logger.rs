//! Main logger implementation

use super::{
    config::{AsyncConfig, LoggerConfig},
    dispatch::{deliver, AsyncDispatcher, Record, SinkSlot, SinkSlots},
    error::Result,
    header::HeaderFormat,
    log_event::{CallSite, LogEvent},
    log_level::LogLevel,
    metrics::LoggerMetrics,
    sink::{same_sink, shared, SharedSink, Sink},
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default shutdown timeout for logger cleanup (5 seconds)
///
/// This timeout is used when the logger is dropped without explicit shutdown.
/// For custom timeout control, use the `shutdown()` method instead.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A leveled logger writing header-prefixed records to a set of sinks
///
/// All methods take `&self`; a `Logger` is usually shared behind an `Arc`.
/// In synchronous mode records are written on the calling thread while the
/// sink list is locked. In asynchronous mode they are handed to a dispatcher
/// thread (see [`AsyncConfig`]).
///
/// ```
/// use rotalog::{Logger, LogLevel};
/// use rotalog::sinks::ConsoleWriter;
///
/// let logger = Logger::builder()
///     .level(LogLevel::Debug)
///     .format("[%(levelno)] %(filename):%(lineno) ")
///     .sink(ConsoleWriter::stderr())
///     .build()
///     .unwrap();
///
/// logger.info("service started");
/// ```
pub struct Logger {
    level: AtomicU8,
    header: HeaderFormat,
    slots: SinkSlots,
    pipeline: Option<AsyncDispatcher>,
    metrics: Arc<LoggerMetrics>,
}

impl Logger {
    /// Create a synchronous logger with one sink
    pub fn new(sink: SharedSink, level: LogLevel, format: &str) -> Result<Self> {
        Self::assemble(HeaderFormat::compile(format)?, level, vec![sink], None)
    }

    /// Create an asynchronous logger with one sink and default queue sizes
    pub fn new_async(sink: SharedSink, level: LogLevel, format: &str) -> Result<Self> {
        Self::assemble(
            HeaderFormat::compile(format)?,
            level,
            vec![sink],
            Some(AsyncConfig::default()),
        )
    }

    /// Create a logger from a configuration and its initial sinks
    pub fn from_config<I>(config: &LoggerConfig, sinks: I) -> Result<Self>
    where
        I: IntoIterator<Item = SharedSink>,
    {
        config.validate()?;
        Self::assemble(
            HeaderFormat::compile(&config.format)?,
            config.level,
            sinks.into_iter().collect(),
            config.async_mode,
        )
    }

    pub(crate) fn assemble(
        header: HeaderFormat,
        level: LogLevel,
        sinks: Vec<SharedSink>,
        async_config: Option<AsyncConfig>,
    ) -> Result<Self> {
        let slots: SinkSlots = Arc::new(Mutex::new(Vec::with_capacity(sinks.len())));
        let metrics = Arc::new(LoggerMetrics::new());
        let pipeline = match async_config {
            Some(config) => Some(AsyncDispatcher::start(
                config,
                Arc::clone(&slots),
                Arc::clone(&metrics),
            )?),
            None => None,
        };

        let logger = Self {
            level: AtomicU8::new(level as u8),
            header,
            slots,
            pipeline,
            metrics,
        };
        for sink in sinks {
            logger.attach(sink)?;
        }
        Ok(logger)
    }

    /// Synchronous logger over an already compiled header
    pub(crate) fn with_header(header: HeaderFormat, level: LogLevel, sinks: Vec<SharedSink>) -> Self {
        let slots = sinks
            .into_iter()
            .map(|sink| SinkSlot { sink, queue: None })
            .collect();
        Self {
            level: AtomicU8::new(level as u8),
            header,
            slots: Arc::new(Mutex::new(slots)),
            pipeline: None,
            metrics: Arc::new(LoggerMetrics::new()),
        }
    }

    /// Create a builder for Logger
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    #[inline]
    pub fn level(&self) -> LogLevel {
        LogLevel::from_index(self.level.load(Ordering::Relaxed))
    }

    /// Change the threshold; visible to subsequent calls on every thread
    #[inline]
    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    pub fn header(&self) -> &HeaderFormat {
        &self.header
    }

    pub fn is_async(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Register a sink; it receives every record emitted after this call
    ///
    /// The same sink may be registered more than once and then receives each
    /// record once per registration.
    pub fn add_sink(&self, sink: SharedSink) {
        if let Err(e) = self.attach(Arc::clone(&sink)) {
            eprintln!(
                "[LOGGER ERROR] Failed to register sink '{}': {}",
                sink.lock().name(),
                e
            );
        }
    }

    fn attach(&self, sink: SharedSink) -> Result<()> {
        let queue = match &self.pipeline {
            Some(pipeline) if pipeline.is_running() => Some(pipeline.attach(Arc::clone(&sink))?),
            _ => None,
        };
        self.slots.lock().push(SinkSlot { sink, queue });
        Ok(())
    }

    /// Unregister the first registration of `sink`
    ///
    /// Returns `false` if the sink was not registered. In asynchronous mode
    /// records already queued for the sink are still written to it.
    pub fn remove_sink(&self, sink: &SharedSink) -> bool {
        let removed = {
            let mut slots = self.slots.lock();
            slots
                .iter()
                .position(|slot| same_sink(&slot.sink, sink))
                .map(|index| slots.remove(index))
        };

        match removed {
            Some(slot) => {
                if let (Some(pipeline), Some(queue)) = (&self.pipeline, slot.queue) {
                    pipeline.detach(queue);
                }
                true
            }
            None => false,
        }
    }

    pub fn sink_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Render `message` behind the header and hand it to every sink
    ///
    /// A trailing newline is appended unless `message` already ends with one.
    pub fn output(&self, level: LogLevel, site: &CallSite, message: &str) {
        if !self.is_enabled(level) {
            return;
        }

        let event = LogEvent::new(level, *site);
        let mut buf = Vec::with_capacity(64 + message.len());
        self.header.render(&mut buf, &event);
        buf.extend_from_slice(message.as_bytes());
        if !message.ends_with('\n') {
            buf.push(b'\n');
        }
        self.dispatch(buf, level);
    }

    /// Emit `record` as one JSON line with the header fields merged in
    ///
    /// `record` must serialize to a JSON object. Header fields overwrite
    /// record fields of the same name and header literals are omitted.
    /// Records that fail to serialize, or are not objects, are counted in
    /// [`LoggerMetrics::discarded_records`] and dropped.
    pub fn output_json<T>(&self, level: LogLevel, site: &CallSite, record: &T)
    where
        T: Serialize + ?Sized,
    {
        if !self.is_enabled(level) {
            return;
        }

        let mut object = match serde_json::to_value(record) {
            Ok(Value::Object(object)) => object,
            _ => {
                self.metrics.record_discarded();
                return;
            }
        };

        let event = LogEvent::new(level, *site);
        for (name, value) in self.header.render_fields(&event) {
            object.insert(name.to_string(), Value::String(value));
        }

        match serde_json::to_vec(&object) {
            Ok(mut buf) => {
                buf.push(b'\n');
                self.dispatch(buf, level);
            }
            Err(_) => {
                self.metrics.record_discarded();
            }
        }
    }

    fn dispatch(&self, msg: Vec<u8>, level: LogLevel) {
        match &self.pipeline {
            Some(pipeline) => pipeline.submit(Record {
                msg: msg.into(),
                level,
            }),
            None => {
                let slots = self.slots.lock();
                for slot in slots.iter() {
                    deliver(&slot.sink, &msg, level, &self.metrics);
                }
            }
        }
    }

    #[inline]
    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.output(level, &CallSite::caller(), message.as_ref());
    }

    #[inline]
    #[track_caller]
    pub fn debug(&self, message: impl AsRef<str>) {
        self.output(LogLevel::Debug, &CallSite::caller(), message.as_ref());
    }

    #[inline]
    #[track_caller]
    pub fn info(&self, message: impl AsRef<str>) {
        self.output(LogLevel::Info, &CallSite::caller(), message.as_ref());
    }

    #[inline]
    #[track_caller]
    pub fn warn(&self, message: impl AsRef<str>) {
        self.output(LogLevel::Warn, &CallSite::caller(), message.as_ref());
    }

    #[inline]
    #[track_caller]
    pub fn error(&self, message: impl AsRef<str>) {
        self.output(LogLevel::Error, &CallSite::caller(), message.as_ref());
    }

    #[inline]
    #[track_caller]
    pub fn critical(&self, message: impl AsRef<str>) {
        self.output(LogLevel::Critical, &CallSite::caller(), message.as_ref());
    }

    #[track_caller]
    pub fn log_json<T: Serialize + ?Sized>(&self, level: LogLevel, record: &T) {
        self.output_json(level, &CallSite::caller(), record);
    }

    #[track_caller]
    pub fn debug_json<T: Serialize + ?Sized>(&self, record: &T) {
        self.output_json(LogLevel::Debug, &CallSite::caller(), record);
    }

    #[track_caller]
    pub fn info_json<T: Serialize + ?Sized>(&self, record: &T) {
        self.output_json(LogLevel::Info, &CallSite::caller(), record);
    }

    #[track_caller]
    pub fn warn_json<T: Serialize + ?Sized>(&self, record: &T) {
        self.output_json(LogLevel::Warn, &CallSite::caller(), record);
    }

    #[track_caller]
    pub fn error_json<T: Serialize + ?Sized>(&self, record: &T) {
        self.output_json(LogLevel::Error, &CallSite::caller(), record);
    }

    #[track_caller]
    pub fn critical_json<T: Serialize + ?Sized>(&self, record: &T) {
        self.output_json(LogLevel::Critical, &CallSite::caller(), record);
    }

    /// Get the logger metrics for detailed observability
    ///
    /// ```
    /// use rotalog::{sinks::ConsoleWriter, shared, Logger, LogLevel};
    ///
    /// let logger = Logger::new(shared(ConsoleWriter::stderr()), LogLevel::Info, "").unwrap();
    /// logger.info("ready");
    /// assert_eq!(logger.metrics().delivered_count(), 1);
    /// ```
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Flush every registered sink
    ///
    /// Records still queued in asynchronous mode are not waited for; use
    /// [`shutdown`](Self::shutdown) to drain them.
    pub fn flush(&self) -> Result<()> {
        let sinks: Vec<SharedSink> = self
            .slots
            .lock()
            .iter()
            .map(|slot| Arc::clone(&slot.sink))
            .collect();

        let mut first_error = None;
        for sink in sinks {
            if let Err(e) = sink.lock().flush() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Gracefully shutdown the logger with a custom timeout
    ///
    /// In asynchronous mode the ingress is closed, then the dispatcher and every
    /// sink worker drain their queues. Records emitted afterwards are dropped.
    /// Sinks are flushed in both modes; a sink still busy at the deadline is
    /// skipped.
    ///
    /// **Note**: When the logger is dropped without calling `shutdown()` explicitly,
    /// it uses [`DEFAULT_SHUTDOWN_TIMEOUT`] (5 seconds).
    ///
    /// Returns `true` if shutdown completed within `timeout`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let drained = match &self.pipeline {
            Some(pipeline) => pipeline.shutdown(&self.slots, timeout),
            None => true,
        };

        match self.flush_until(deadline) {
            Ok(flushed) => drained && flushed,
            Err(e) => {
                eprintln!("[LOGGER ERROR] Failed to flush during shutdown: {}", e);
                false
            }
        }
    }

    /// Whether an asynchronous logger has been shut down
    pub fn is_stopped(&self) -> bool {
        self.pipeline.as_ref().is_some_and(|pipeline| !pipeline.is_running())
    }

    /// Flush every sink that can be locked before `deadline`
    ///
    /// `Ok(false)` means some sink was still held by a writer and was skipped.
    fn flush_until(&self, deadline: Instant) -> Result<bool> {
        let Some(slots) = self.slots.try_lock_until(deadline) else {
            return Ok(false);
        };
        let sinks: Vec<SharedSink> = slots.iter().map(|slot| Arc::clone(&slot.sink)).collect();
        drop(slots);

        let mut complete = true;
        let mut first_error = None;
        for sink in sinks {
            match sink.try_lock_until(deadline) {
                Some(mut guard) => {
                    if let Err(e) = guard.flush() {
                        first_error.get_or_insert(e);
                    }
                }
                None => complete = false,
            }
        }
        first_error.map_or(Ok(complete), Err)
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.pipeline.as_ref().is_some_and(AsyncDispatcher::is_running) {
            self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        } else if let Err(e) = self.flush_until(Instant::now() + DEFAULT_SHUTDOWN_TIMEOUT) {
            eprintln!("[LOGGER ERROR] Failed to flush during shutdown: {}", e);
        }

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger shutting down with {} dropped logs (drop rate: {:.2}%)",
                dropped,
                self.metrics.drop_rate()
            );
        }
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use rotalog::prelude::*;
///
/// let logger = Logger::builder()
///     .level(LogLevel::Debug)
///     .sink(ConsoleWriter::stderr())
///     .async_mode()
///     .build()
///     .unwrap();
/// ```
pub struct LoggerBuilder {
    config: LoggerConfig,
    sinks: Vec<SharedSink>,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            sinks: Vec::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Set the header format, compiled by [`build`](Self::build)
    #[must_use = "builder methods return a new value"]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.config.format = format.into();
        self
    }

    /// Add a sink owned by the logger
    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(shared(sink));
        self
    }

    /// Add a sink the caller keeps a handle to, e.g. for later removal
    #[must_use = "builder methods return a new value"]
    pub fn shared_sink(mut self, sink: SharedSink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Enable async mode with default queue sizes
    ///
    /// If not called, the logger will use synchronous mode.
    #[must_use = "builder methods return a new value"]
    pub fn async_mode(self) -> Self {
        self.async_config(AsyncConfig::default())
    }

    #[must_use = "builder methods return a new value"]
    pub fn async_config(mut self, config: AsyncConfig) -> Self {
        self.config.async_mode = Some(config);
        self
    }

    /// Replace level, format and mode with `config`
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the Logger, failing if the format or queue sizes are invalid
    pub fn build(self) -> Result<Logger> {
        Logger::from_config(&self.config, self.sinks)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LoggerError;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Sink for Capture {
        fn write(&mut self, msg: &[u8], _level: LogLevel) {
            self.0.lock().extend_from_slice(msg);
        }
    }

    struct Panicking;

    impl Sink for Panicking {
        fn write(&mut self, _msg: &[u8], _level: LogLevel) {
            panic!("sink failure");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    fn sync_logger(format: &str, capture: &Capture) -> Logger {
        Logger::new(shared(capture.clone()), LogLevel::Debug, format).unwrap()
    }

    #[test]
    fn test_output_appends_newline_once() {
        let capture = Capture::default();
        let logger = sync_logger("[%(levelno)] ", &capture);

        logger.info("hello");
        logger.warn("already terminated\n");
        logger.debug("");

        assert_eq!(capture.text(), "[I] hello\n[W] already terminated\n[D] \n");
    }

    #[test]
    fn test_level_gating() {
        let capture = Capture::default();
        let logger = sync_logger("", &capture);

        logger.set_level(LogLevel::Warn);
        assert_eq!(logger.level(), LogLevel::Warn);
        logger.debug("d");
        logger.info("i");
        logger.warn("w");
        logger.critical("c");

        assert_eq!(capture.text(), "w\nc\n");
    }

    #[test]
    fn test_invalid_format() {
        let err = Logger::new(shared(Capture::default()), LogLevel::Info, "%(when)").err();
        assert!(matches!(err, Some(LoggerError::UnknownKeyword { .. })));
    }

    #[test]
    fn test_call_site_is_the_caller() {
        let capture = Capture::default();
        let logger = sync_logger("%(filename):%(lineno) ", &capture);

        let line = line!() + 1;
        logger.info("here");

        assert_eq!(capture.text(), format!("logger.rs:{} here\n", line));
    }

    #[test]
    fn test_remove_first_registration_only() {
        let capture = Capture::default();
        let sink = shared(capture.clone());
        let logger = Logger::builder().format("").build().unwrap();

        logger.add_sink(Arc::clone(&sink));
        logger.add_sink(Arc::clone(&sink));
        logger.info("twice");

        assert!(logger.remove_sink(&sink));
        logger.info("once");

        assert!(logger.remove_sink(&sink));
        assert!(!logger.remove_sink(&sink));
        logger.info("never");

        assert_eq!(capture.text(), "twice\ntwice\nonce\n");
        assert_eq!(logger.sink_count(), 0);
    }

    #[test]
    fn test_remove_unregistered_sink() {
        let logger = sync_logger("", &Capture::default());
        assert!(!logger.remove_sink(&shared(Capture::default())));
        assert_eq!(logger.sink_count(), 1);
    }

    #[test]
    fn test_json_merges_header_fields() {
        let capture = Capture::default();
        let logger = sync_logger("<%(levelno:lvl)> %(lineno) ", &capture);

        let record = serde_json::json!({"msg": "hi", "lvl": "overwritten"});
        logger.warn_json(&record);

        let line = capture.text();
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["msg"], "hi");
        assert_eq!(value["lvl"], "W");
        assert!(value["lineno"].as_str().unwrap().parse::<u32>().is_ok());
        assert_eq!(value.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_json_non_object_is_discarded() {
        let capture = Capture::default();
        let logger = sync_logger("", &capture);

        logger.info_json(&42);
        logger.info_json(&vec!["a", "b"]);

        assert!(capture.text().is_empty());
        assert_eq!(logger.metrics().discarded_records(), 2);
    }

    #[test]
    fn test_json_respects_threshold() {
        let capture = Capture::default();
        let logger = sync_logger("", &capture);
        logger.set_level(LogLevel::Error);

        logger.warn_json(&serde_json::json!({"k": 1}));
        logger.critical_json(&serde_json::json!({"k": 2}));

        assert_eq!(capture.text(), "{\"k\":2}\n");
    }

    #[test]
    fn test_panicking_sink_is_isolated() {
        let capture = Capture::default();
        let logger = Logger::builder()
            .format("")
            .sink(Panicking)
            .shared_sink(shared(capture.clone()))
            .build()
            .unwrap();

        logger.error("still delivered");

        assert_eq!(capture.text(), "still delivered\n");
        assert_eq!(logger.metrics().delivered_count(), 1);
    }

    #[test]
    fn test_async_preserves_order() {
        let capture = Capture::default();
        let logger = Logger::builder()
            .format("")
            .shared_sink(shared(capture.clone()))
            .async_mode()
            .build()
            .unwrap();
        assert!(logger.is_async());

        for i in 0..100 {
            logger.info(format!("{}", i));
        }
        assert!(logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));

        let expected: String = (0..100).map(|i| format!("{}\n", i)).collect();
        assert_eq!(capture.text(), expected);
        assert_eq!(logger.metrics().dropped_count(), 0);
    }

    #[test]
    fn test_async_drop_drains() {
        let capture = Capture::default();
        {
            let logger = Logger::new_async(shared(capture.clone()), LogLevel::Info, "").unwrap();
            logger.info("drained on drop");
        }
        assert_eq!(capture.text(), "drained on drop\n");
    }

    #[test]
    fn test_async_output_after_shutdown_is_ignored() {
        let capture = Capture::default();
        let logger = Logger::new_async(shared(capture.clone()), LogLevel::Info, "").unwrap();

        assert!(logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
        logger.info("late");

        assert!(capture.text().is_empty());
    }

    #[test]
    fn test_builder_rejects_zero_capacity() {
        let result = Logger::builder()
            .async_config(AsyncConfig {
                buffer: 0,
                sink_buffer: 10,
            })
            .build();
        assert!(matches!(result, Err(LoggerError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_builder_default() {
        let logger = LoggerBuilder::default().build().unwrap();
        assert_eq!(logger.level(), LogLevel::Info);
        assert_eq!(logger.header(), &HeaderFormat::standard());
        assert!(!logger.is_async());
        assert_eq!(logger.sink_count(), 0);
    }
}
