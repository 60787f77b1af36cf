//! Header format compiler
//!
//! A header format is plain text with embedded placeholders of the form
//! `%(keyword)` or `%(keyword:alias)`. The format is compiled once into an
//! ordered list of [`HeaderSession`]s; rendering walks that list and appends
//! into a byte buffer, so the format string is never re-parsed on the hot path.
//!
//! | keyword    | renders                                          |
//! |------------|--------------------------------------------------|
//! | `asctime`  | local time, `YYYY-MM-DD HH:MM:SS.mmm`            |
//! | `levelno`  | the level's current tag (`D`, `I`, `W`, ...)     |
//! | `filename` | basename of the caller's source file             |
//! | `function` | caller's function name without module path       |
//! | `lineno`   | caller's line number                             |
//!
//! The alias, when given, is the field name used for structured (JSON)
//! records; otherwise the keyword itself is used.

use super::error::{LoggerError, Result};
use super::log_event::LogEvent;
use std::io::Write;

/// Header used by the process-wide default logger
pub const DEFAULT_HEADER: &str = "%(asctime) [%(levelno)][%(filename):%(function):%(lineno)] ";

const ASCTIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A dynamic header field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    AscTime,
    LevelNo,
    FileName,
    Function,
    LineNo,
}

impl HeaderField {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "asctime" => Some(HeaderField::AscTime),
            "levelno" => Some(HeaderField::LevelNo),
            "filename" => Some(HeaderField::FileName),
            "function" => Some(HeaderField::Function),
            "lineno" => Some(HeaderField::LineNo),
            _ => None,
        }
    }

    fn render(&self, buf: &mut Vec<u8>, event: &LogEvent) {
        match self {
            HeaderField::AscTime => {
                // Writing into a Vec cannot fail
                let _ = write!(buf, "{}", event.time().format(ASCTIME_FORMAT));
            }
            HeaderField::LevelNo => event.level().write_tag(buf),
            HeaderField::FileName => buf.extend_from_slice(event.caller().filename.as_bytes()),
            HeaderField::Function => buf.extend_from_slice(event.function().as_bytes()),
            HeaderField::LineNo => {
                let _ = write!(buf, "{}", event.caller().line);
            }
        }
    }
}

/// One compiled unit of a header format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSession {
    /// Text copied verbatim
    Literal(String),
    /// A field rendered per event, with its structured-output name
    Field { field: HeaderField, name: String },
}

impl HeaderSession {
    /// Structured-output name, `None` for literal text
    pub fn name(&self) -> Option<&str> {
        match self {
            HeaderSession::Literal(_) => None,
            HeaderSession::Field { name, .. } => Some(name),
        }
    }

    pub fn render(&self, buf: &mut Vec<u8>, event: &LogEvent) {
        match self {
            HeaderSession::Literal(text) => buf.extend_from_slice(text.as_bytes()),
            HeaderSession::Field { field, .. } => field.render(buf, event),
        }
    }
}

/// A compiled header format
///
/// Immutable once compiled, so it can be rendered from many threads at once
/// without synchronization.
///
/// ```
/// use rotalog::HeaderFormat;
///
/// let header = HeaderFormat::compile("[%(levelno)] %(filename:file): ").unwrap();
/// assert_eq!(header.sessions().len(), 5);
/// assert!(HeaderFormat::compile("%(bogus)").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderFormat {
    sessions: Vec<HeaderSession>,
}

impl HeaderFormat {
    /// Compile `format`, failing on the first unknown keyword
    pub fn compile(format: &str) -> Result<Self> {
        let mut sessions = Vec::new();
        let mut literal_start = 0;
        let mut cursor = 0;

        while let Some(offset) = format[cursor..].find("%(") {
            let open = cursor + offset;
            let Some(close) = placeholder_end(format, open) else {
                // Not a placeholder; keep scanning after the '%'
                cursor = open + 1;
                continue;
            };

            if open > literal_start {
                sessions.push(HeaderSession::Literal(format[literal_start..open].to_string()));
            }

            let spec = &format[open + 2..close];
            let mut parts = spec.split(':');
            let keyword = parts.next().unwrap_or_default();
            let name = parts.next().unwrap_or(keyword);

            let field = HeaderField::from_keyword(keyword)
                .ok_or_else(|| LoggerError::unknown_keyword(spec))?;
            sessions.push(HeaderSession::Field {
                field,
                name: name.to_string(),
            });

            cursor = close + 1;
            literal_start = cursor;
        }

        if literal_start < format.len() {
            sessions.push(HeaderSession::Literal(format[literal_start..].to_string()));
        }

        Ok(Self { sessions })
    }

    /// The compiled [`DEFAULT_HEADER`]
    pub fn standard() -> Self {
        // DEFAULT_HEADER only uses known keywords
        Self::compile(DEFAULT_HEADER).unwrap_or_default()
    }

    pub fn sessions(&self) -> &[HeaderSession] {
        &self.sessions
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Append the rendered header for `event` to `buf`
    pub fn render(&self, buf: &mut Vec<u8>, event: &LogEvent) {
        for session in &self.sessions {
            session.render(buf, event);
        }
    }

    /// Render each named field into its own string, skipping literal text
    pub fn render_fields(&self, event: &LogEvent) -> Vec<(&str, String)> {
        let mut value = Vec::new();
        self.sessions
            .iter()
            .filter_map(|session| {
                let name = session.name()?;
                value.clear();
                session.render(&mut value, event);
                Some((name, String::from_utf8_lossy(&value).into_owned()))
            })
            .collect()
    }
}

/// Index of the `)` closing the placeholder opened at `open`, if the bracket
/// content is a non-empty run of word characters and colons
fn placeholder_end(format: &str, open: usize) -> Option<usize> {
    let body_start = open + 2;
    let bytes = format.as_bytes();
    let mut i = body_start;
    while i < bytes.len() {
        match bytes[i] {
            b')' if i > body_start => return Some(i),
            b if b.is_ascii_alphanumeric() || b == b'_' || b == b':' => i += 1,
            _ => return None,
        }
    }
    None
}
