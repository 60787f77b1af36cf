//! `print`/`fatal`/`panic` entry points for code migrating from a plain
//! line logger

use crate::core::{CallSite, LogLevel, Logger, DEFAULT_SHUTDOWN_TIMEOUT};
use crate::registry;

impl Logger {
    /// Log at `Info`
    #[track_caller]
    pub fn print(&self, message: impl AsRef<str>) {
        self.output(LogLevel::Info, &CallSite::caller(), message.as_ref());
    }

    /// Log at `Critical`, drain the logger and exit the process with status 1
    #[track_caller]
    pub fn fatal(&self, message: impl AsRef<str>) -> ! {
        self.output(LogLevel::Critical, &CallSite::caller(), message.as_ref());
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        std::process::exit(1)
    }

    /// Log at `Critical`, then panic with the same message
    #[track_caller]
    pub fn panic(&self, message: impl AsRef<str>) -> ! {
        let message = message.as_ref();
        self.output(LogLevel::Critical, &CallSite::caller(), message);
        let _ = self.flush();
        panic!("{}", message)
    }
}

/// [`Logger::print`] on the process-wide logger
#[track_caller]
pub fn print(message: impl AsRef<str>) {
    registry::logger().output(LogLevel::Info, &CallSite::caller(), message.as_ref());
}

/// [`Logger::fatal`] on the process-wide logger
#[track_caller]
pub fn fatal(message: impl AsRef<str>) -> ! {
    registry::logger().fatal(message)
}

/// [`Logger::panic`] on the process-wide logger
#[track_caller]
pub fn panic(message: impl AsRef<str>) -> ! {
    registry::logger().panic(message)
}
