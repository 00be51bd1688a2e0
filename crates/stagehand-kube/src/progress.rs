//! Stage progress reporting
//!
//! Every stage writes an ordered stream of info, success and error lines
//! describing what it did to the cluster. [`ConsoleLog`] prints them for an
//! operator; [`MemoryLog`] records them.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use console::style;

/// Append-only sink for stage progress lines
pub trait LogPersister: Send + Sync {
    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Styled terminal output on stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLog;

impl LogPersister for ConsoleLog {
    fn info(&self, message: &str) {
        let _ = writeln!(io::stderr(), "  {} {}", style("ℹ").blue(), message);
    }

    fn success(&self, message: &str) {
        let _ = writeln!(io::stderr(), "  {} {}", style("✓").green(), message);
    }

    fn error(&self, message: &str) {
        let _ = writeln!(io::stderr(), "  {} {}", style("✗").red(), message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// In-memory recorder; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Messages logged at `level`, in order
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.level == level)
            .map(|l| l.message)
            .collect()
    }

    /// Whether any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.message.contains(needle))
    }

    fn push(&self, level: LogLevel, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(LogLine {
                level,
                message: message.to_string(),
            });
        }
    }
}

impl LogPersister for MemoryLog {
    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn success(&self, message: &str) {
        self.push(LogLevel::Success, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_order() {
        let log = MemoryLog::new();
        let shared = log.clone();

        log.info("loading");
        shared.success("applied");
        log.error("failed");

        let levels: Vec<LogLevel> = log.lines().iter().map(|l| l.level).collect();
        assert_eq!(levels, [LogLevel::Info, LogLevel::Success, LogLevel::Error]);
        assert_eq!(log.messages(LogLevel::Success), ["applied"]);
        assert!(log.contains("fail"));
        assert!(!log.contains("deleted"));
    }
}
