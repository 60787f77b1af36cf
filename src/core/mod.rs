//! Core logger types and traits

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fields;
pub mod header;
pub mod log_event;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod sink;

pub use config::{AsyncConfig, LoggerConfig, DEFAULT_ASYNC_BUFFER, DEFAULT_SINK_BUFFER};
pub use dispatch::should_drop;
pub use error::{LoggerError, Result};
pub use fields::{FieldValue, LogFields};
pub use header::{HeaderField, HeaderFormat, HeaderSession, DEFAULT_HEADER};
pub use log_event::{CallSite, Caller, LogEvent, UNKNOWN_CALLER};
pub use log_level::{set_level_tag, LogLevel};
pub use logger::{Logger, LoggerBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
pub use metrics::LoggerMetrics;
pub use sink::{same_sink, shared, SharedSink, Sink};
