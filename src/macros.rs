//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`. Unlike the plain
//! methods on [`Logger`](crate::Logger) they also record the calling
//! function's name for the `%(function)` header keyword, and they skip
//! formatting entirely when the level is below the logger's threshold.
//!
//! # Examples
//!
//! ```
//! use rotalog::prelude::*;
//! use rotalog::info;
//!
//! let logger = Logger::new(shared(ConsoleWriter::stderr()), LogLevel::Info, DEFAULT_HEADER).unwrap();
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! ```

/// The [`CallSite`](crate::CallSite) of the macro invocation, including the
/// enclosing function's path.
///
/// ```
/// fn handler() -> rotalog::CallSite {
///     rotalog::call_site!()
/// }
///
/// let site = handler();
/// assert!(site.function.unwrap().ends_with("handler"));
/// ```
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(::core::file!(), ::core::line!(), {
            fn __f() {}
            fn __type_name_of<T>(_: T) -> &'static str {
                ::core::any::type_name::<T>()
            }
            let name = __type_name_of(__f);
            ::core::option::Option::Some(name.strip_suffix("::__f").unwrap_or(name))
        })
    };
}

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # use rotalog::prelude::*;
/// # let logger = Logger::new(shared(ConsoleWriter::stderr()), LogLevel::Info, "").unwrap();
/// use rotalog::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let level = $level;
        let logger = &$logger;
        if logger.is_enabled(level) {
            logger.output(level, &$crate::call_site!(), &::std::format!($($arg)+));
        }
    }};
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use rotalog::prelude::*;
/// # let logger = Logger::new(shared(ConsoleWriter::stderr()), LogLevel::Debug, "").unwrap();
/// use rotalog::debug;
/// debug!(logger, "Debug information");
/// debug!(logger, "Counter value: {}", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rotalog::prelude::*;
/// # let logger = Logger::new(shared(ConsoleWriter::stderr()), LogLevel::Info, "").unwrap();
/// use rotalog::error;
/// let code = 404;
/// error!(logger, "Request failed with code: {}", code);
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a critical-level message.
#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Critical, $($arg)+)
    };
}

/// Emit a serializable record as a JSON line at `level`.
///
/// # Examples
///
/// ```
/// # use rotalog::prelude::*;
/// # let logger = Logger::new(shared(ConsoleWriter::stderr()), LogLevel::Info, "%(levelno:level) ").unwrap();
/// use rotalog::log_json;
/// let fields = LogFields::new().with_field("user_id", 42);
/// log_json!(logger, LogLevel::Info, &fields);
/// ```
#[macro_export]
macro_rules! log_json {
    ($logger:expr, $level:expr, $record:expr) => {{
        let level = $level;
        let logger = &$logger;
        if logger.is_enabled(level) {
            logger.output_json(level, &$crate::call_site!(), $record);
        }
    }};
}
