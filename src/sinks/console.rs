//! Console sink with per-level ANSI colors

use crate::core::{LogLevel, Result, Sink};
use colored::control::SHOULD_COLORIZE;
use colored::Color;
use std::io::{self, Write};

const RESET: &[u8] = b"\x1b[0m";

/// Writes records to a terminal stream, wrapping each in its level's color
///
/// [`ConsoleWriter::stderr`] and [`ConsoleWriter::stdout`] write to a
/// duplicate of the descriptor taken at construction, so output keeps going
/// to the terminal even if the process stream is later redirected into a
/// logger.
pub struct ConsoleWriter {
    colored: bool,
    brushes: [String; 5],
    dst: Box<dyn Write + Send>,
}

impl ConsoleWriter {
    pub fn new<W: Write + Send + 'static>(dst: W) -> Self {
        Self {
            colored: SHOULD_COLORIZE.should_colorize(),
            brushes: LogLevel::ALL.map(|level| brush(level.color_code())),
            dst: Box::new(dst),
        }
    }

    pub fn stderr() -> Self {
        Self {
            dst: detached_stderr(),
            ..Self::new(io::sink())
        }
    }

    pub fn stdout() -> Self {
        Self {
            dst: detached_stdout(),
            ..Self::new(io::sink())
        }
    }

    pub fn is_colored(&self) -> bool {
        self.colored
    }

    pub fn set_colored(&mut self, colored: bool) {
        self.colored = colored;
    }

    /// Set the raw escape sequence written before records of `level`
    pub fn set_brush(&mut self, level: LogLevel, brush: impl Into<String>) {
        self.brushes[level.index()] = brush.into();
    }

    pub fn set_color(&mut self, level: LogLevel, color: Color) {
        self.set_brush(level, brush(color));
    }

    fn paint(&mut self, msg: &[u8], level: LogLevel) -> io::Result<()> {
        if self.colored {
            self.dst.write_all(self.brushes[level.index()].as_bytes())?;
            self.dst.write_all(msg)?;
            self.dst.write_all(RESET)
        } else {
            self.dst.write_all(msg)
        }
    }
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::stderr()
    }
}

impl Sink for ConsoleWriter {
    fn write(&mut self, msg: &[u8], level: LogLevel) {
        if let Err(e) = self.paint(msg, level) {
            eprintln!("[LOGGER ERROR] Console write failed: {}", e);
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.dst.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

fn brush(color: Color) -> String {
    format!("\x1b[{}m", color.to_fg_str())
}

#[cfg(unix)]
fn detached_stderr() -> Box<dyn Write + Send> {
    use std::os::fd::AsFd;
    match io::stderr().as_fd().try_clone_to_owned() {
        Ok(fd) => Box::new(std::fs::File::from(fd)),
        Err(_) => Box::new(io::stderr()),
    }
}

#[cfg(not(unix))]
fn detached_stderr() -> Box<dyn Write + Send> {
    Box::new(io::stderr())
}

#[cfg(unix)]
fn detached_stdout() -> Box<dyn Write + Send> {
    use std::os::fd::AsFd;
    match io::stdout().as_fd().try_clone_to_owned() {
        Ok(fd) => Box::new(std::fs::File::from(fd)),
        Err(_) => Box::new(io::stdout()),
    }
}

#[cfg(not(unix))]
fn detached_stdout() -> Box<dyn Write + Send> {
    Box::new(io::stdout())
}
