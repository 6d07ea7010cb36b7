//! Progress and warning reporting.
//!
//! Components receive a `Reporter` instead of writing to a process-wide
//! logger. Production code prints to stdout/stderr; tests inject a recording
//! reporter to assert on warnings (e.g. that an unmount failure is surfaced
//! without failing the run).

use std::sync::Mutex;

/// Reporting capability handed down into every pipeline component.
pub trait Reporter: Send + Sync {
    /// Report normal progress.
    fn info(&self, msg: &str);

    /// Report a non-fatal problem.
    fn warn(&self, msg: &str);
}

/// Reporter that prints to stdout/stderr.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&self, msg: &str) {
        println!("{}", msg);
    }

    fn warn(&self, msg: &str) {
        eprintln!("Warning: {}", msg);
    }
}

/// Reporter that records messages in memory.
///
/// Used by tests; lives here so integration tests can share it.
#[derive(Default)]
pub struct MemoryReporter {
    messages: Mutex<Vec<(Level, String)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded warnings.
    pub fn warnings(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _)| *level == Level::Warn)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// All recorded messages, warnings included.
    pub fn all(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, msg)| msg.clone())
            .collect()
    }
}

impl Reporter for MemoryReporter {
    fn info(&self, msg: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((Level::Info, msg.to_string()));
    }

    fn warn(&self, msg: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((Level::Warn, msg.to_string()));
    }
}
