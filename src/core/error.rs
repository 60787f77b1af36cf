//! Error types for the logger system

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Header format contains a placeholder with an unrecognized keyword
    #[error("unknown keyword [{keyword}]")]
    UnknownKeyword { keyword: String },

    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Stream redirection could not be installed or restored
    #[error("Redirect '{tag}' failed: {message}")]
    RedirectError { tag: String, message: String },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Logger already stopped
    #[error("Logger already stopped")]
    LoggerStopped,
}

impl LoggerError {
    /// Create an unknown keyword error for the given placeholder content
    pub fn unknown_keyword(keyword: impl Into<String>) -> Self {
        LoggerError::UnknownKeyword {
            keyword: keyword.into(),
        }
    }

    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a redirect error
    pub fn redirect(tag: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::RedirectError {
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::unknown_keyword("bogus");
        assert!(matches!(err, LoggerError::UnknownKeyword { .. }));

        let err = LoggerError::config("LoggerBuilder", "sink buffer must be positive");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = LoggerError::redirect("[stderr]", "pipe creation failed");
        assert!(matches!(err, LoggerError::RedirectError { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = LoggerError::unknown_keyword("bogus:alias");
        assert_eq!(err.to_string(), "unknown keyword [bogus:alias]");

        let err = LoggerError::file_rotation("/var/log/app.log", "Disk full");
        assert_eq!(
            err.to_string(),
            "File rotation failed for '/var/log/app.log': Disk full"
        );

        let err = LoggerError::redirect("[stdout]", "bad descriptor");
        assert_eq!(err.to_string(), "Redirect '[stdout]' failed: bad descriptor");
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = LoggerError::io_operation("renaming log file", "cannot archive", io_err);

        assert!(matches!(err, LoggerError::IoOperation { .. }));
        assert!(err.to_string().contains("renaming log file"));
        assert!(err.to_string().contains("cannot archive"));
    }
}
