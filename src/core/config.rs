//! Serializable logger configuration

use super::error::{LoggerError, Result};
use super::header::DEFAULT_HEADER;
use super::log_level::LogLevel;
use serde::{Deserialize, Serialize};

/// Capacity of the ingress channel shared by all callers
pub const DEFAULT_ASYNC_BUFFER: usize = 1000;

/// Capacity of each per-sink queue
pub const DEFAULT_SINK_BUFFER: usize = 10000;

/// Queue sizes for asynchronous mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsyncConfig {
    pub buffer: usize,
    pub sink_buffer: usize,
}

impl AsyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buffer == 0 {
            return Err(LoggerError::config("async", "buffer must be at least 1"));
        }
        if self.sink_buffer == 0 {
            return Err(LoggerError::config("async", "sink_buffer must be at least 1"));
        }
        Ok(())
    }
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_ASYNC_BUFFER,
            sink_buffer: DEFAULT_SINK_BUFFER,
        }
    }
}

/// Everything needed to build a [`Logger`](super::Logger) except its sinks
///
/// ```
/// use rotalog::{LoggerConfig, LogLevel};
///
/// let config = LoggerConfig::from_json(r#"{"level": "debug", "async_mode": {"sink_buffer": 64}}"#).unwrap();
/// assert_eq!(config.level, LogLevel::Debug);
/// assert_eq!(config.async_mode.unwrap().sink_buffer, 64);
/// assert_eq!(config.async_mode.unwrap().buffer, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub format: String,
    /// `None` selects synchronous mode
    pub async_mode: Option<AsyncConfig>,
}

impl LoggerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match &self.async_mode {
            Some(async_config) => async_config.validate(),
            None => Ok(()),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: DEFAULT_HEADER.to_string(),
            async_mode: None,
        }
    }
}
