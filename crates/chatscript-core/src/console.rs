//! Console sinks for script output
//!
//! `print` in a script ends up in a [`ConsoleSink`]. The sink decides where
//! the text goes; nothing here formats it beyond `Display`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

/// Destination for console output
pub trait ConsoleSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Forward a value's display representation to a sink
pub fn print(sink: &dyn ConsoleSink, value: impl Display) {
    sink.write_line(&value.to_string());
}

/// Writes to standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutConsole;

impl ConsoleSink for StdoutConsole {
    fn write_line(&self, line: &str) {
        println!("{}", line);
    }
}

/// Emits each line as a `tracing` event with target `console`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingConsole;

impl ConsoleSink for TracingConsole {
    fn write_line(&self, line: &str) {
        tracing::info!(target: "console", "{}", line);
    }
}

/// Keeps every line in memory
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CapturedConsole {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CapturedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured lines
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Take the captured lines, leaving the buffer empty
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl ConsoleSink for CapturedConsole {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Console selection in the config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Tracing,
}

impl ConsoleTarget {
    pub fn build(self) -> Arc<dyn ConsoleSink> {
        match self {
            ConsoleTarget::Stdout => Arc::new(StdoutConsole),
            ConsoleTarget::Tracing => Arc::new(TracingConsole),
        }
    }
}
