//! Diagnostic output produced on behalf of the module
//!
//! The string logger, the growth notifier and the unsupported-import stubs
//! all write here rather than straight to `tracing`, so the destination can
//! be the browser console, the tracing subscriber, or a recorder in tests.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Severity of a console entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    /// Plain output (the module's own log lines)
    Log,
    Info,
    Error,
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Error => "error",
        };
        f.write_str(text)
    }
}

/// A sink for host diagnostics
pub trait Console {
    fn emit(&self, level: ConsoleLevel, message: &str);

    fn log(&self, message: &str) {
        self.emit(ConsoleLevel::Log, message);
    }

    fn info(&self, message: &str) {
        self.emit(ConsoleLevel::Info, message);
    }

    fn error(&self, message: &str) {
        self.emit(ConsoleLevel::Error, message);
    }
}

/// Forwards console entries to the `tracing` subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

impl Console for TracingConsole {
    fn emit(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Log => tracing::info!(target: "gb_host::guest", "{message}"),
            ConsoleLevel::Info => tracing::info!(target: "gb_host::host", "{message}"),
            ConsoleLevel::Error => tracing::error!(target: "gb_host::host", "{message}"),
        }
    }
}

/// Keeps every entry in memory; clones share the same log
#[derive(Debug, Default, Clone)]
pub struct RecordingConsole {
    entries: Rc<RefCell<Vec<(ConsoleLevel, String)>>>,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries recorded so far, oldest first
    pub fn entries(&self) -> Vec<(ConsoleLevel, String)> {
        self.entries.borrow().clone()
    }

    /// Messages recorded at `level`
    pub fn messages(&self, level: ConsoleLevel) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|(entry_level, _)| *entry_level == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Console for RecordingConsole {
    fn emit(&self, level: ConsoleLevel, message: &str) {
        self.entries.borrow_mut().push((level, message.to_string()));
    }
}
