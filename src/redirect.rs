//! Splicing output streams into a logger
//!
//! A redirect replaces a stream with the write end of a pipe and starts a
//! scanner thread on the read end. Every line written to the stream becomes
//! one record `"<tag> <line>"` at the redirect's level, attributed to the
//! place where the redirect was installed.
//!
//! The stream is abstracted by [`RedirectTarget`]:
//!
//! - [`StreamSlot`] is an in-process, swappable writer. Code that writes
//!   through a slot is redirected; nothing else is.
//! - [`FdTarget`] (unix) swaps a file descriptor with `dup2`, which catches
//!   everything written to it, including output from C libraries.
//!
//! A sink must not write to a stream redirected into its own logger. The
//! built-in [`ConsoleWriter`](crate::sinks::ConsoleWriter) writes to a
//! descriptor duplicated at construction, so it is unaffected.

use crate::core::{CallSite, LogLevel, Logger, LoggerError, Result, DEFAULT_SHUTDOWN_TIMEOUT};
use os_pipe::{PipeReader, PipeWriter};
use parking_lot::Mutex;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A stream that can be swapped for a pipe and restored later
pub trait RedirectTarget: Send + 'static {
    /// Whatever is needed to undo [`install`](Self::install)
    type Saved: Send + 'static;

    /// Route the stream into `pipe` and return the previous state
    fn install(&self, pipe: PipeWriter) -> io::Result<Self::Saved>;

    /// Put the previous state back, closing the pipe's write end
    fn restore(&self, saved: Self::Saved) -> io::Result<()>;
}

/// A cloneable, swappable writer
///
/// All clones share the same destination; [`replace`](Self::replace) swaps it
/// for every clone at once.
///
/// ```
/// use rotalog::StreamSlot;
/// use std::io::Write;
///
/// let mut out = StreamSlot::new(Vec::new());
/// writeln!(out, "goes to the vector").unwrap();
/// ```
#[derive(Clone)]
pub struct StreamSlot {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl StreamSlot {
    pub fn new<W: Write + Send + 'static>(dst: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(dst))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Swap the destination, returning the previous one
    pub fn replace(&self, dst: Box<dyn Write + Send>) -> Box<dyn Write + Send> {
        std::mem::replace(&mut *self.inner.lock(), dst)
    }
}

impl Write for StreamSlot {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.lock().write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl RedirectTarget for StreamSlot {
    type Saved = Box<dyn Write + Send>;

    fn install(&self, pipe: PipeWriter) -> io::Result<Self::Saved> {
        let mut previous = self.replace(Box::new(pipe));
        let _ = previous.flush();
        Ok(previous)
    }

    fn restore(&self, saved: Self::Saved) -> io::Result<()> {
        let mut pipe = self.replace(saved);
        pipe.flush()
    }
}

/// A file descriptor redirected with `dup`/`dup2`
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct FdTarget {
    fd: std::os::fd::RawFd,
}

#[cfg(unix)]
impl FdTarget {
    /// Target `fd`, which must stay open for as long as it is redirected
    pub fn new(fd: std::os::fd::RawFd) -> Self {
        Self { fd }
    }

    pub fn stdout() -> Self {
        Self::new(libc::STDOUT_FILENO)
    }

    pub fn stderr() -> Self {
        Self::new(libc::STDERR_FILENO)
    }

    pub fn fd(&self) -> std::os::fd::RawFd {
        self.fd
    }

    fn flush_std(&self) {
        if self.fd == libc::STDOUT_FILENO {
            let _ = io::stdout().flush();
        }
    }
}

#[cfg(unix)]
impl RedirectTarget for FdTarget {
    type Saved = std::os::fd::OwnedFd;

    fn install(&self, pipe: PipeWriter) -> io::Result<Self::Saved> {
        use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

        self.flush_std();

        // SAFETY: dup only reads the descriptor table
        let saved = unsafe { libc::dup(self.fd) };
        if saved < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `saved` is a fresh descriptor owned by nobody else
        let saved = unsafe { OwnedFd::from_raw_fd(saved) };

        // SAFETY: both descriptors are open; dup2 atomically replaces `self.fd`
        if unsafe { libc::dup2(pipe.as_raw_fd(), self.fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(saved)
    }

    fn restore(&self, saved: Self::Saved) -> io::Result<()> {
        use std::os::fd::AsRawFd;

        self.flush_std();

        // SAFETY: `saved` is open and owned; this closes the pipe copy at `self.fd`
        if unsafe { libc::dup2(saved.as_raw_fd(), self.fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// An installed redirect
///
/// Dropping it restores the stream without the closing record; use
/// [`Logger::cancel_redirect`] for an orderly shutdown.
pub struct Redirector<T: RedirectTarget> {
    tag: String,
    level: LogLevel,
    site: CallSite,
    target: T,
    saved: Option<T::Saved>,
    scanner: Option<JoinHandle<()>>,
    logger: Arc<Logger>,
}

impl<T: RedirectTarget> Redirector<T> {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Restore the stream and wait up to `timeout` for the scanner to drain
    ///
    /// Emits `close redirector pipe <tag>` at `Warn` first. Returns an error
    /// if the stream could not be restored; the scanner is still waited for.
    pub fn cancel(mut self, timeout: Duration) -> Result<()> {
        self.logger.output(
            LogLevel::Warn,
            &self.site,
            &format!("close redirector pipe {}", self.tag),
        );

        let restored = self.restore();
        if let Some(scanner) = self.scanner.take() {
            join_scanner(scanner, timeout, &self.tag);
        }
        restored
    }

    fn restore(&mut self) -> Result<()> {
        match self.saved.take() {
            Some(saved) => self
                .target
                .restore(saved)
                .map_err(|e| LoggerError::redirect(self.tag.as_str(), format!("restore failed: {}", e))),
            None => Ok(()),
        }
    }
}

impl<T: RedirectTarget> Drop for Redirector<T> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            eprintln!("[LOGGER ERROR] {}", e);
        }
    }
}

impl Logger {
    /// Route `target` into this logger at `level`, prefixing each line with `tag`
    ///
    /// Records carry the call site of this call. Fails if the logger has been
    /// shut down, the pipe cannot be created, the target cannot be swapped, or
    /// the scanner cannot start; the target is left untouched in every case.
    ///
    /// ```
    /// use rotalog::{shared, Logger, LogLevel, StreamSlot};
    /// use rotalog::sinks::ConsoleWriter;
    /// use std::io::Write;
    /// use std::sync::Arc;
    ///
    /// let logger = Arc::new(Logger::new(shared(ConsoleWriter::stderr()), LogLevel::Info, "").unwrap());
    /// let mut out = StreamSlot::new(Vec::new());
    ///
    /// let redirect = logger.add_redirect(out.clone(), LogLevel::Info, "[child]").unwrap();
    /// writeln!(out, "captured").unwrap();
    /// logger.cancel_redirect(redirect).unwrap();
    /// ```
    #[track_caller]
    pub fn add_redirect<T: RedirectTarget>(
        self: &Arc<Self>,
        target: T,
        level: LogLevel,
        tag: impl Into<String>,
    ) -> Result<Redirector<T>> {
        if self.is_stopped() {
            return Err(LoggerError::LoggerStopped);
        }
        // The scanner runs on another thread, so resolve the function now
        let site = CallSite::caller().with_function();
        let tag = tag.into();

        let (reader, writer) = os_pipe::pipe()
            .map_err(|e| LoggerError::redirect(tag.as_str(), format!("pipe creation failed: {}", e)))?;
        let saved = target
            .install(writer)
            .map_err(|e| LoggerError::redirect(tag.as_str(), format!("install failed: {}", e)))?;

        let logger = Arc::clone(self);
        let scanner_tag = tag.clone();
        let scanner = thread::Builder::new()
            .name(format!("rotalog-redirect-{}", tag))
            .spawn(move || scan(&logger, reader, level, &scanner_tag, &site));

        match scanner {
            Ok(scanner) => Ok(Redirector {
                tag,
                level,
                site,
                target,
                saved: Some(saved),
                scanner: Some(scanner),
                logger: Arc::clone(self),
            }),
            Err(e) => {
                let _ = target.restore(saved);
                Err(LoggerError::redirect(tag, format!("scanner failed to start: {}", e)))
            }
        }
    }

    /// Restore a redirect's stream, waiting for its remaining lines
    pub fn cancel_redirect<T: RedirectTarget>(&self, redirector: Redirector<T>) -> Result<()> {
        redirector.cancel(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

fn scan(logger: &Logger, reader: PipeReader, level: LogLevel, tag: &str, site: &CallSite) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if line.last() == Some(&b'\n') {
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                }
                let text = String::from_utf8_lossy(&line);
                logger.output(level, site, &format!("{} {}", tag, text));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("[LOGGER ERROR] Redirect '{}' read failed: {}", tag, e);
                break;
            }
        }
    }

    logger.output(
        LogLevel::Warn,
        site,
        &format!("read redirector pipe {} complete", tag),
    );
}

fn join_scanner(handle: JoinHandle<()>, timeout: Duration, tag: &str) {
    let deadline = Instant::now() + timeout;
    loop {
        if handle.is_finished() {
            if handle.join().is_err() {
                eprintln!("[LOGGER ERROR] Redirect '{}' scanner panicked", tag);
            }
            return;
        }
        if Instant::now() >= deadline {
            eprintln!(
                "[LOGGER WARNING] Redirect '{}' scanner did not finish within {:?}; \
                 is another copy of the pipe still open?",
                tag, timeout
            );
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
