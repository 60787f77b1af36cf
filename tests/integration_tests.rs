//! Integration tests for the logger system
//!
//! These tests verify:
//! - Header rendering into real files
//! - Rotation through a logger
//! - Structured (JSON lines) output
//! - Configuration loading
//! - The process-wide registry facade

use parking_lot::Mutex;
use rotalog::sinks::{RotateMode, RotateWriter};
use rotalog::{
    registry, shared, AsyncConfig, LogFields, LogLevel, Logger, LoggerConfig,
    LoggerError, Sink, DEFAULT_HEADER, DEFAULT_SHUTDOWN_TIMEOUT,
};
use serde::Serialize;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().clone()).expect("utf-8 output")
    }

    fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }
}

impl Sink for Capture {
    fn write(&mut self, msg: &[u8], _level: LogLevel) {
        self.0.lock().extend_from_slice(msg);
    }
}

#[test]
fn test_default_header_in_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("app.log");

    let writer = RotateWriter::new(&log_file, RotateMode::None).expect("Failed to create writer");
    let logger = Logger::new(shared(writer), LogLevel::Info, DEFAULT_HEADER).expect("valid header");

    rotalog::info!(logger, "user {} logged in", 42);
    logger.debug("filtered out");
    logger.flush().expect("Failed to flush");

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);

    // "YYYY-MM-DD HH:MM:SS.mmm [I][integration_tests.rs:test_default_header_in_file:NN] user 42 logged in"
    let line = lines[0];
    assert_eq!(line.as_bytes()[4], b'-');
    assert_eq!(line.as_bytes()[19], b'.');
    assert!(line[24..].starts_with("[I][integration_tests.rs:test_default_header_in_file:"));
    assert!(line.ends_with("] user 42 logged in"));
}

#[test]
fn test_plain_methods_attribute_caller() {
    let capture = Capture::default();
    let logger = Logger::new(
        shared(capture.clone()),
        LogLevel::Debug,
        "%(filename):%(function):%(lineno) ",
    )
    .expect("valid header");

    let line = line!() + 1;
    logger.warn("plain");

    assert_eq!(
        capture.text(),
        format!("integration_tests.rs:test_plain_methods_attribute_caller:{} plain\n", line)
    );
}

#[inline(never)]
fn handle_request(logger: &Logger) {
    logger.info("served");
}

#[test]
fn test_default_header_names_plain_method_caller() {
    let capture = Capture::default();
    let logger = Logger::new(shared(capture.clone()), LogLevel::Info, DEFAULT_HEADER).expect("valid header");

    handle_request(&logger);

    let text = capture.text();
    assert!(
        text[24..].starts_with("[I][integration_tests.rs:handle_request:"),
        "unexpected header: {}",
        text
    );
    assert!(text.ends_with("] served\n"));
}

#[test]
fn test_size_rotation_through_logger() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("sized.log");

    let mut writer = RotateWriter::new(&log_file, RotateMode::BySize).expect("Failed to create writer");
    writer.set_rotate_size(100);
    let logger = Logger::new(shared(writer), LogLevel::Info, "").expect("valid header");

    // 10 records of 10 bytes reach the threshold exactly
    for i in 0..10 {
        logger.info(format!("record-{:02}", i));
    }
    logger.info("overflow");
    logger.flush().expect("Failed to flush");

    let mut archives: Vec<_> = fs::read_dir(temp_dir.path())
        .expect("read dir")
        .map(|e| e.expect("entry").path())
        .filter(|p| p != &log_file)
        .collect();
    assert_eq!(archives.len(), 1);

    let archive = archives.pop().expect("one archive");
    let archived = fs::read_to_string(&archive).expect("read archive");
    assert_eq!(archived.len(), 100);
    assert!(archived.starts_with("record-00\n"));
    assert!(archived.ends_with("record-09\n"));
    assert_eq!(fs::read_to_string(&log_file).expect("read live"), "overflow\n");

    let name = archive.file_name().expect("name").to_string_lossy().into_owned();
    assert!(name.starts_with("sized.log."));
}

#[test]
fn test_async_file_logging() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("async.log");

    let writer = RotateWriter::new(&log_file, RotateMode::ByDay).expect("Failed to create writer");
    let logger = Logger::builder()
        .level(LogLevel::Debug)
        .format("[%(levelno)] ")
        .sink(writer)
        .async_mode()
        .build()
        .expect("Failed to build logger");

    for i in 0..50 {
        logger.info(format!("Message {}", i));
    }
    assert!(logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 50);
    assert_eq!(lines[0], "[I] Message 0");
    assert_eq!(lines[49], "[I] Message 49");
}

#[derive(Serialize)]
struct Request<'a> {
    method: &'a str,
    status: u16,
    time: &'a str,
}

#[test]
fn test_json_lines() {
    let capture = Capture::default();
    let logger = Logger::new(
        shared(capture.clone()),
        LogLevel::Info,
        "%(asctime:time) [%(levelno:level)] %(function) ",
    )
    .expect("valid header");

    let request = Request {
        method: "GET",
        status: 200,
        time: "replaced by header",
    };
    logger.warn_json(&request);
    rotalog::log_json!(
        logger,
        LogLevel::Info,
        &LogFields::new().with_field("user", "alice").with_field("ok", true)
    );

    let lines = capture.lines();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(&lines[0]).expect("valid json");
    assert_eq!(first["method"], "GET");
    assert_eq!(first["status"], 200);
    assert_eq!(first["level"], "W");
    assert_ne!(first["time"], "replaced by header");
    assert_eq!(first["function"], "test_json_lines");

    let second: serde_json::Value = serde_json::from_str(&lines[1]).expect("valid json");
    assert_eq!(second["user"], "alice");
    assert_eq!(second["ok"], true);
    assert_eq!(second["level"], "I");
    assert_eq!(second["function"], "test_json_lines");
}

#[test]
fn test_invalid_format_touches_no_sink() {
    let capture = Capture::default();
    let result = Logger::new(shared(capture.clone()), LogLevel::Info, "[%(levelno)] %(bogus) ");

    match result {
        Err(LoggerError::UnknownKeyword { keyword }) => assert_eq!(keyword, "bogus"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("logger constructed with an unknown keyword"),
    }
    assert!(capture.text().is_empty());
}

#[test]
fn test_logger_from_config_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("logger.json");
    fs::write(
        &config_path,
        r#"{"level": "warn", "format": "%(levelno) ", "async_mode": {"buffer": 16, "sink_buffer": 32}}"#,
    )
    .expect("write config");

    let config = LoggerConfig::from_json(&fs::read_to_string(&config_path).expect("read config"))
        .expect("valid config");
    assert_eq!(
        config.async_mode,
        Some(AsyncConfig {
            buffer: 16,
            sink_buffer: 32
        })
    );

    let capture = Capture::default();
    let logger = Logger::from_config(&config, [shared(capture.clone())])
        .expect("Failed to build logger");
    assert!(logger.is_async());

    logger.info("below threshold");
    logger.error("kept");
    assert!(logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));

    assert_eq!(capture.text(), "E kept\n");
}

#[test]
fn test_registry_facade() {
    let capture = Capture::default();
    registry::init(
        shared(capture.clone()),
        LogLevel::Debug,
        "[%(levelno)] %(filename) %(function) ",
        false,
    )
    .expect("init");

    registry::debug("through the facade");
    registry::set_level(LogLevel::Warn);
    assert_eq!(registry::level(), LogLevel::Warn);
    registry::info("suppressed");
    rotalog::warn!(registry::logger(), "macro {}", 1);

    let extra = Capture::default();
    let extra_sink: rotalog::SharedSink = shared(extra.clone());
    registry::add_sink(Arc::clone(&extra_sink));
    registry::error("both sinks");
    assert!(registry::remove_sink(&extra_sink));
    assert!(!registry::remove_sink(&extra_sink));

    assert_eq!(
        capture.lines(),
        vec![
            "[D] integration_tests.rs test_registry_facade through the facade",
            "[W] integration_tests.rs test_registry_facade macro 1",
            "[E] integration_tests.rs test_registry_facade both sinks",
        ]
    );
    assert_eq!(extra.text(), "[E] integration_tests.rs test_registry_facade both sinks\n");

    let failed = registry::init(shared(Capture::default()), LogLevel::Info, "%(nope)", false);
    assert!(failed.is_err());
    registry::critical("still the first logger");
    assert!(capture.text().ends_with("[C] integration_tests.rs test_registry_facade still the first logger\n"));

    assert!(registry::shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
}
