//! Per-call event context
//!
//! A [`LogEvent`] lives for the duration of one logging call. It carries the
//! raw [`CallSite`] captured at the caller and resolves the printable caller
//! information (file basename, unqualified function name) lazily, at most once,
//! no matter how many header sessions ask for it.
//!
//! A call site without a function name (anything captured by
//! `#[track_caller]` rather than a macro) has it looked up from the stack the
//! first time a header needs it. Results are cached per call site, so each
//! site walks the stack once per process.

use super::log_level::LogLevel;
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::panic::Location;
use std::path::Path;

/// Placeholder printed when caller information is unavailable
pub const UNKNOWN_CALLER: &str = "???";

/// Source location of a logging call
///
/// Methods on [`Logger`](crate::Logger) are `#[track_caller]` and capture the
/// file and line of the first frame outside the library. The logging macros
/// also fill in the function name via [`call_site!`](crate::call_site);
/// otherwise it is looked up from the stack on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub function: Option<&'static str>,
}

impl CallSite {
    pub const fn new(file: &'static str, line: u32, function: Option<&'static str>) -> Self {
        Self {
            file,
            line,
            function,
        }
    }

    /// Call site of the nearest caller not marked `#[track_caller]`
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    pub fn from_location(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            function: None,
        }
    }

    /// Fill in the function name from the current stack if it is missing
    ///
    /// Must run on the thread that made the call, while the calling frame is
    /// still live.
    pub fn with_function(self) -> Self {
        match self.function {
            Some(_) => self,
            None => Self {
                function: function_at(self.file, self.line),
                ..self
            },
        }
    }

    /// A call site with nothing resolved
    pub const fn unknown() -> Self {
        Self {
            file: "",
            line: 0,
            function: None,
        }
    }
}

/// Printable caller information, resolved from a [`CallSite`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub filename: &'static str,
    pub line: u32,
}

/// One logging call: level, timestamp and lazily-resolved caller
#[derive(Debug)]
pub struct LogEvent {
    level: LogLevel,
    time: DateTime<Local>,
    site: CallSite,
    caller: OnceCell<Caller>,
    function: OnceCell<&'static str>,
}

impl LogEvent {
    pub fn new(level: LogLevel, site: CallSite) -> Self {
        Self::at(level, site, Local::now())
    }

    /// Build an event with a fixed timestamp
    pub fn at(level: LogLevel, site: CallSite, time: DateTime<Local>) -> Self {
        Self {
            level,
            time,
            site,
            caller: OnceCell::new(),
            function: OnceCell::new(),
        }
    }

    #[inline]
    pub fn level(&self) -> LogLevel {
        self.level
    }

    #[inline]
    pub fn time(&self) -> &DateTime<Local> {
        &self.time
    }

    #[inline]
    pub fn site(&self) -> &CallSite {
        &self.site
    }

    /// Resolved caller, computed on first access and memoized for this event
    pub fn caller(&self) -> &Caller {
        self.caller.get_or_init(|| resolve(&self.site))
    }

    /// Unqualified name of the calling function, or [`UNKNOWN_CALLER`]
    ///
    /// Looked up from the stack when the call site does not carry it, so this
    /// must be called on the logging thread.
    pub fn function(&self) -> &'static str {
        self.function.get_or_init(|| {
            let function = match self.site.function {
                Some(function) => Some(function),
                None if self.site.file.is_empty() => None,
                None => function_at(self.site.file, self.site.line),
            };
            function.map(strip_function_path).unwrap_or(UNKNOWN_CALLER)
        })
    }

    /// Whether the caller has been resolved yet
    pub fn is_resolved(&self) -> bool {
        self.caller.get().is_some()
    }
}

fn resolve(site: &CallSite) -> Caller {
    if site.file.is_empty() {
        return Caller {
            filename: UNKNOWN_CALLER,
            line: 0,
        };
    }

    Caller {
        filename: basename(site.file),
        line: site.line,
    }
}

/// Names found per `(file, line)`, including misses
static FUNCTIONS: Lazy<RwLock<HashMap<(&'static str, u32), Option<&'static str>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Fully qualified name of the function on the current stack executing
/// `file:line`
///
/// Needs debug info; without it every lookup misses. Names are interned
/// for the life of the process, one per call site.
pub fn function_at(file: &'static str, line: u32) -> Option<&'static str> {
    if let Some(cached) = FUNCTIONS.read().get(&(file, line)) {
        return *cached;
    }

    let found = walk_stack(file, line).map(|name| &*Box::leak(name.into_boxed_str()));
    *FUNCTIONS.write().entry((file, line)).or_insert(found)
}

fn walk_stack(file: &str, line: u32) -> Option<String> {
    let mut found = None;
    backtrace::trace(|frame| {
        backtrace::resolve_frame(frame, |symbol| {
            if found.is_some() || symbol.lineno() != Some(line) {
                return;
            }
            if symbol.filename().is_some_and(|path| same_source(path, file)) {
                found = symbol.name().map(|name| format!("{:#}", name));
            }
        });
        found.is_none()
    });
    found
}

/// `file!()` paths are relative to the crate root, debug info paths usually
/// absolute
fn same_source(path: &Path, file: &str) -> bool {
    path.ends_with(file)
}

/// File name without its directories
pub fn basename(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Function name without its module qualification
///
/// Closure segments are dropped first, then everything up to the last `::`.
/// `app::server::handle::{{closure}}` becomes `handle`.
pub fn strip_function_path(path: &str) -> &str {
    let mut path = path;
    while let Some(stripped) = path.strip_suffix("::{{closure}}") {
        path = stripped;
    }
    match path.rfind("::") {
        Some(i) => &path[i + 2..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basename() {
        assert_eq!(basename("src/core/logger.rs"), "logger.rs");
        assert_eq!(basename("C:\\work\\main.rs"), "main.rs");
        assert_eq!(basename("main.rs"), "main.rs");
    }

    #[test]
    fn test_strip_function_path() {
        assert_eq!(strip_function_path("app::server::handle"), "handle");
        assert_eq!(strip_function_path("app::server::handle::{{closure}}"), "handle");
        assert_eq!(
            strip_function_path("app::run::{{closure}}::{{closure}}"),
            "run"
        );
        assert_eq!(strip_function_path("main"), "main");
    }

    #[test]
    fn test_caller_is_lazy_and_memoized() {
        let site = CallSite::new("src/bin/tool.rs", 42, Some("tool::main"));
        let event = LogEvent::new(LogLevel::Info, site);
        assert!(!event.is_resolved());

        let first = event.caller() as *const Caller;
        assert!(event.is_resolved());
        let second = event.caller() as *const Caller;
        assert_eq!(first, second);

        assert_eq!(
            event.caller(),
            &Caller {
                filename: "tool.rs",
                line: 42
            }
        );
        assert_eq!(event.function(), "main");
    }

    #[test]
    fn test_unknown_site() {
        let event = LogEvent::new(LogLevel::Warn, CallSite::unknown());
        assert_eq!(event.caller().filename, UNKNOWN_CALLER);
        assert_eq!(event.function(), UNKNOWN_CALLER);
        assert_eq!(event.caller().line, 0);
    }

    #[test]
    fn test_track_caller_captures_this_file() {
        let site = CallSite::caller();
        assert_eq!(basename(site.file), "log_event.rs");
        assert!(site.line > 0);
        assert_eq!(site.function, None);
    }

    #[inline(never)]
    fn lookup_target() -> CallSite {
        CallSite::caller().with_function()
    }

    #[test]
    fn test_function_looked_up_from_stack() {
        let site = lookup_target();
        assert_eq!(site.function.map(strip_function_path), Some("lookup_target"));

        // The lookup matches the frame's current line, so both calls share one
        let line = line!() + 1;
        let name = LogEvent::new(LogLevel::Info, CallSite::caller()).function();
        assert_eq!(name, "test_function_looked_up_from_stack");
        assert!(FUNCTIONS.read().contains_key(&(file!(), line)));
    }
}
