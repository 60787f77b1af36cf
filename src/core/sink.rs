//! Sink trait for log output destinations

use super::{error::Result, log_level::LogLevel};
use parking_lot::Mutex;
use std::sync::Arc;

/// A destination for rendered log records
///
/// `write` receives one complete, newline-terminated record. Sinks report
/// their own failures (typically on stderr); the logger never retries.
pub trait Sink: Send {
    fn write(&mut self, msg: &[u8], level: LogLevel);

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "sink"
    }
}

/// A sink shared between the caller and one or more loggers
///
/// Registration is by identity: two clones of the same `SharedSink` are the
/// same sink, two separately constructed sinks never are.
pub type SharedSink = Arc<Mutex<dyn Sink>>;

/// Wrap a sink so it can be registered with a logger
pub fn shared<S: Sink + 'static>(sink: S) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

/// Whether `a` and `b` refer to the same sink allocation
#[inline]
pub fn same_sink(a: &SharedSink, b: &SharedSink) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
