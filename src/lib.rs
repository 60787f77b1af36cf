//! # rotalog
//!
//! A leveled logger with compiled header formats, rotating file output and
//! stream redirection.
//!
//! ## Features
//!
//! - **Compiled headers**: `%(asctime) [%(levelno)][%(filename):%(function):%(lineno)] `
//!   is parsed once; rendering never re-parses the format
//! - **Sync or async**: write on the calling thread, or through per-sink
//!   queues that shed `Debug`/`Info` under pressure and never drop `Warn` and above
//! - **Rotation**: hourly, daily or size-based archives with optional gzip
//! - **Redirection**: splice stdout, stderr or any writer into the logger
//! - **JSON lines**: serialize any `Serialize` record with header fields merged in
//!
//! ## Quick start
//!
//! ```no_run
//! use rotalog::prelude::*;
//!
//! let file = RotateWriter::new("logs/app.log", RotateMode::ByDay).unwrap();
//! registry::init(shared(file), LogLevel::Debug, DEFAULT_HEADER, true).unwrap();
//!
//! registry::info("service started");
//! rotalog::info!(registry::logger(), "listening on {}", 8080);
//!
//! registry::shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
//! ```

pub mod compat;
pub mod core;
pub mod macros;
pub mod redirect;
pub mod registry;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        shared, AsyncConfig, CallSite, FieldValue, HeaderFormat, LogFields, LogLevel, Logger,
        LoggerBuilder, LoggerConfig, LoggerError, LoggerMetrics, Result, SharedSink, Sink,
        DEFAULT_HEADER, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::redirect::{RedirectTarget, Redirector, StreamSlot};
    pub use crate::registry;
    pub use crate::sinks::{ConsoleWriter, RotateMode, RotateWriter};
}

pub use crate::core::{
    same_sink, set_level_tag, shared, should_drop, AsyncConfig, CallSite, Caller, FieldValue,
    HeaderField, HeaderFormat, HeaderSession, LogEvent, LogFields, LogLevel, Logger,
    LoggerBuilder, LoggerConfig, LoggerError, LoggerMetrics, Result, SharedSink, Sink,
    DEFAULT_HEADER, DEFAULT_SHUTDOWN_TIMEOUT,
};
#[cfg(unix)]
pub use crate::redirect::FdTarget;
pub use crate::redirect::{RedirectTarget, Redirector, StreamSlot};
pub use crate::registry::LogRegistry;
