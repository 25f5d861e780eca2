//! Request-scoped logger that mirrors `tracing` output into a history buffer.

use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandLogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl CommandLogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "EROR",
        }
    }
}

/// Logger bound to one dispatch, e.g. `acme/infra/pull/7`.
///
/// Every line is emitted as a `tracing` event with a `source` field and
/// appended to the history rendered into verbose comments.
#[derive(Debug, Default)]
pub struct CommandLog {
    source: String,
    history: Mutex<Vec<String>>,
}

impl CommandLog {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(CommandLogLevel::Debug, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(CommandLogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(CommandLogLevel::Warn, message.as_ref());
    }

    pub fn err(&self, message: impl AsRef<str>) {
        self.log(CommandLogLevel::Error, message.as_ref());
    }

    pub fn log(&self, level: CommandLogLevel, message: &str) {
        match level {
            CommandLogLevel::Debug => tracing::debug!(source = %self.source, "{message}"),
            CommandLogLevel::Info => tracing::info!(source = %self.source, "{message}"),
            CommandLogLevel::Warn => tracing::warn!(source = %self.source, "{message}"),
            CommandLogLevel::Error => tracing::error!(source = %self.source, "{message}"),
        }
        lock_unpoisoned(&self.history).push(format!(
            "[{}] {}: {}",
            level.as_str(),
            self.source,
            message
        ));
    }

    /// Returns the accumulated history, one line per entry.
    pub fn history(&self) -> String {
        let history = lock_unpoisoned(&self.history);
        let mut rendered = history.join("\n");
        if !rendered.is_empty() {
            rendered.push('\n');
        }
        rendered
    }
}

/// Locks `mutex`, recovering the inner value if a previous holder panicked.
pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
