//! Rotating file sink
//!
//! A [`RotateWriter`] appends records to one live file and renames it to an
//! archive when the rotation policy fires:
//!
//! | mode      | fires when                          | archive name                     |
//! |-----------|-------------------------------------|----------------------------------|
//! | `None`    | never                               |                                  |
//! | `ByHour`  | the local hour changes              | `<path>.YYYY-MM-DD-HH` (old hour)|
//! | `ByDay`   | the local date changes              | `<path>.YYYY-MM-DD` (old day)    |
//! | `BySize`  | written bytes reach the threshold   | `<path>.YYYY-MM-DD.HHMMSS.ffffff`|
//!
//! The policy is checked before each write, so the record that triggers a
//! rotation is the first one in the new file. Archives are never overwritten:
//! if the name is taken, `.1`, `.2`, ... is appended. An existing file is adopted on
//! construction: its modification time seeds the hour/day bucket and its
//! size seeds the byte counter.

use crate::core::{LogLevel, LoggerError, Result, Sink};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Size threshold used until [`RotateWriter::set_rotate_size`] is called
pub const DEFAULT_ROTATE_SIZE: u64 = 100_000_000;

pub const FORMAT_TIME_DAY: &str = "%Y-%m-%d";
pub const FORMAT_TIME_HOUR: &str = "%Y-%m-%d-%H";
pub const FORMAT_TIME_SIZE: &str = "%Y-%m-%d.%H%M%S.%6f";

/// Rotation policy of a [`RotateWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotateMode {
    #[default]
    None,
    ByHour,
    ByDay,
    BySize,
}

impl RotateMode {
    /// Time bucket `time` falls into, for the time-based modes
    pub fn bucket(&self, time: &DateTime<Local>) -> Option<String> {
        match self {
            RotateMode::ByHour => Some(time.format(FORMAT_TIME_HOUR).to_string()),
            RotateMode::ByDay => Some(time.format(FORMAT_TIME_DAY).to_string()),
            RotateMode::None | RotateMode::BySize => None,
        }
    }
}

/// Source of the current time, replaceable for deterministic rotation
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// File sink with hour, day or size based rotation
///
/// # Example
///
/// ```no_run
/// use rotalog::sinks::{RotateMode, RotateWriter};
/// use rotalog::{shared, Logger, LogLevel, DEFAULT_HEADER};
///
/// let mut file = RotateWriter::new("logs/app.log", RotateMode::BySize).unwrap();
/// file.set_rotate_size(10 * 1024 * 1024);
///
/// let logger = Logger::new(shared(file), LogLevel::Info, DEFAULT_HEADER).unwrap();
/// logger.info("written to logs/app.log");
/// ```
pub struct RotateWriter {
    path: PathBuf,
    mode: RotateMode,
    rotate_size: u64,
    written: u64,
    bucket: Option<String>,
    last_suffix: Option<String>,
    file: Option<File>,
    compress: bool,
    clock: Clock,
}

impl RotateWriter {
    /// Open (or create) `path` for appending
    ///
    /// # Errors
    ///
    /// Returns error if the parent directory cannot be created or the file
    /// cannot be opened
    pub fn new<P: AsRef<Path>>(path: P, mode: RotateMode) -> Result<Self> {
        Self::with_clock(path, mode, Arc::new(Local::now))
    }

    pub fn with_clock<P: AsRef<Path>>(path: P, mode: RotateMode, clock: Clock) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let now = clock();
        let mut writer = Self {
            path,
            mode,
            rotate_size: DEFAULT_ROTATE_SIZE,
            written: 0,
            bucket: mode.bucket(&now),
            last_suffix: None,
            file: None,
            compress: false,
            clock,
        };
        writer.adopt_existing();
        writer.file = Some(open_append(&writer.path)?);
        Ok(writer)
    }

    /// Seed rotation state from a file left by a previous run
    fn adopt_existing(&mut self) {
        let Ok(metadata) = fs::metadata(&self.path) else {
            return;
        };
        if !metadata.is_file() || metadata.len() == 0 {
            return;
        }

        match self.mode {
            RotateMode::ByHour | RotateMode::ByDay => {
                if let Ok(modified) = metadata.modified() {
                    self.bucket = self.mode.bucket(&DateTime::<Local>::from(modified));
                }
            }
            RotateMode::BySize => self.written = metadata.len(),
            RotateMode::None => {}
        }
    }

    /// Set the size threshold for [`RotateMode::BySize`]
    pub fn set_rotate_size(&mut self, size: u64) {
        self.rotate_size = size;
    }

    /// Gzip archives after rotating them, replacing `<archive>` with `<archive>.gz`
    pub fn set_compress(&mut self, compress: bool) {
        self.compress = compress;
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn mode(&self) -> RotateMode {
        self.mode
    }

    #[must_use]
    pub fn rotate_size(&self) -> u64 {
        self.rotate_size
    }

    /// Bytes written to the live file, including what it held when adopted
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Suffix of the most recent archive, if any rotation happened
    #[must_use]
    pub fn last_suffix(&self) -> Option<&str> {
        self.last_suffix.as_deref()
    }

    /// Path the live file is renamed to for `suffix`
    pub fn archive_path(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Archive suffix if the policy fires at `now`
    fn due(&self, now: &DateTime<Local>) -> Option<String> {
        match self.mode {
            RotateMode::None => None,
            RotateMode::ByHour | RotateMode::ByDay => match (&self.bucket, self.mode.bucket(now)) {
                (Some(old), Some(current)) if *old != current => Some(old.clone()),
                _ => None,
            },
            RotateMode::BySize => (self.written >= self.rotate_size)
                .then(|| now.format(FORMAT_TIME_SIZE).to_string()),
        }
    }

    /// `suffix`, or `suffix.N` with the smallest `N` that names no existing
    /// archive (plain or gzipped)
    fn free_suffix(&self, suffix: &str) -> String {
        let taken = |candidate: &str| {
            let archive = self.archive_path(candidate);
            archive.exists() || with_extension_suffix(&archive, ".gz").exists()
        };

        if !taken(suffix) {
            return suffix.to_string();
        }
        (1u32..)
            .map(|n| format!("{}.{}", suffix, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| suffix.to_string())
    }

    fn rotate(&mut self, suffix: &str, now: &DateTime<Local>) -> Result<()> {
        let suffix = self.free_suffix(suffix);
        let suffix = suffix.as_str();
        let archive = self.archive_path(suffix);

        // Release the handle before renaming the file under it
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        if self.path.is_file() {
            if let Err(e) = fs::rename(&self.path, &archive) {
                self.file = open_append(&self.path).ok();
                return Err(LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to rename to '{}': {}", archive.display(), e),
                ));
            }
        }

        // On failure the bucket is left stale so the next write retries
        self.file = Some(open_append(&self.path)?);
        self.written = 0;
        self.bucket = self.mode.bucket(now);
        self.last_suffix = Some(suffix.to_string());

        if self.compress && archive.is_file() {
            if let Err(e) = compress_file(&archive) {
                eprintln!("[LOGGER WARNING] Archive compression failed: {}", e);
            }
        }
        Ok(())
    }

    /// Write `msg` as if the clock read `now`
    pub fn write_at(&mut self, msg: &[u8], now: DateTime<Local>) -> Result<()> {
        if let Some(suffix) = self.due(&now) {
            self.rotate(&suffix, &now)?;
        }

        if self.file.is_none() {
            self.file = Some(open_append(&self.path)?);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(msg).map_err(|e| {
                LoggerError::io_operation(
                    "write log file",
                    format!("Failed to write to '{}'", self.path.display()),
                    e,
                )
            })?;
        }
        self.written += msg.len() as u64;
        Ok(())
    }
}

impl Sink for RotateWriter {
    fn write(&mut self, msg: &[u8], _level: LogLevel) {
        let now = (self.clock)();
        if let Err(e) = self.write_at(msg, now) {
            eprintln!("[LOGGER ERROR] RotateWriter dropped a record: {}", e);
        }
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "rotate"
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoggerError::io_operation(
                "open log file",
                format!("Failed to open '{}'", path.display()),
                e,
            )
        })
}

fn with_extension_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Gzip `path` into `<path>.gz`, removing the original only on success
fn compress_file(path: &Path) -> Result<()> {
    let gz_path = with_extension_suffix(path, ".gz");
    let temp_gz_path = with_extension_suffix(path, ".gz.tmp");

    let compressed = (|| -> io::Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let output = BufWriter::with_capacity(64 * 1024, File::create(&temp_gz_path)?);
        let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());

        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            encoder.write_all(&buffer[..bytes_read])?;
        }
        encoder.finish()?.flush()?;
        fs::rename(&temp_gz_path, &gz_path)
    })();

    if let Err(e) = compressed {
        let _ = fs::remove_file(&temp_gz_path);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress '{}'", path.display()),
            e,
        ));
    }

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compression succeeded but failed to remove original file {}: {}",
            path.display(),
            e
        );
    }
    Ok(())
}
