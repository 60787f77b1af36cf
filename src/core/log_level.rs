//! Log level definitions and the runtime level-tag table

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    #[default]
    Info = 1,
    Warn = 2,
    Error = 3,
    Critical = 4,
}

/// Tags printed by the `levelno` header keyword, indexed by level.
static LEVEL_TAGS: Lazy<RwLock<[String; 5]>> = Lazy::new(|| {
    RwLock::new([
        "D".to_string(),
        "I".to_string(),
        "W".to_string(),
        "E".to_string(),
        "C".to_string(),
    ])
});

/// Replace the tag printed for `level`.
///
/// Tags are read at render time, so the change applies to every logger
/// immediately.
///
/// ```
/// use rotalog::{set_level_tag, LogLevel};
///
/// set_level_tag(LogLevel::Warn, "WARN");
/// assert_eq!(LogLevel::Warn.tag(), "WARN");
/// set_level_tag(LogLevel::Warn, "W");
/// ```
pub fn set_level_tag(level: LogLevel, tag: impl Into<String>) {
    LEVEL_TAGS.write()[level.index()] = tag.into();
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub(crate) fn from_index(index: u8) -> Self {
        match index {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            3 => LogLevel::Error,
            _ => LogLevel::Critical,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Current tag of this level in the level-tag table
    pub fn tag(&self) -> String {
        LEVEL_TAGS.read()[self.index()].clone()
    }

    /// Append the current tag without allocating an intermediate string
    pub(crate) fn write_tag(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(LEVEL_TAGS.read()[self.index()].as_bytes());
    }

    /// Look up the level currently tagged `tag`; unknown tags map to `Debug`
    pub fn from_tag(tag: &str) -> Self {
        let tags = LEVEL_TAGS.read();
        tags.iter()
            .position(|t| t == tag)
            .map(|i| LogLevel::from_index(i as u8))
            .unwrap_or(LogLevel::Debug)
    }

    /// Default console color
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::Debug => Green,
            LogLevel::Info => White,
            LogLevel::Warn => BrightYellow,
            LogLevel::Error => BrightRed,
            LogLevel::Critical => BrightMagenta,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(format!("Invalid log level: '{}'", s)),
        }
    }
}
