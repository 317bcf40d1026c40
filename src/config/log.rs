//! Logging capability handed to every stage of config data processing.
//!
//! Config data is processed before an application usually installs its
//! `tracing` subscriber, so components never log through ambient state.
//! They receive a [`Log`] handle instead. The default sink forwards to
//! `tracing`; a [`DeferredLog`] buffers records and can replay them later.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::Level;

/// Destination for log records produced while loading config data.
pub trait LogSink: Send + Sync + fmt::Debug {
    fn log(&self, level: Level, message: &str);
}

/// Forwards records to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "dragon_cfg::config", "{}", message),
            Level::WARN => tracing::warn!(target: "dragon_cfg::config", "{}", message),
            Level::INFO => tracing::info!(target: "dragon_cfg::config", "{}", message),
            Level::DEBUG => tracing::debug!(target: "dragon_cfg::config", "{}", message),
            _ => tracing::trace!(target: "dragon_cfg::config", "{}", message),
        }
    }
}

/// Buffers log records in memory until they can be replayed.
#[derive(Debug, Default)]
pub struct DeferredLog {
    records: Mutex<Vec<(Level, String)>>,
}

impl DeferredLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the buffered records.
    pub fn records(&self) -> Vec<(Level, String)> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns `true` if any buffered message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(_, message)| message.contains(needle))
    }

    /// Drains the buffer into `sink`, oldest first.
    pub fn replay_to(&self, sink: &dyn LogSink) {
        let records =
            std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner));
        for (level, message) in records {
            sink.log(level, &message);
        }
    }
}

impl LogSink for DeferredLog {
    fn log(&self, level: Level, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}

/// Cheaply cloneable handle to a [`LogSink`].
#[derive(Debug, Clone)]
pub struct Log {
    sink: Arc<dyn LogSink>,
}

impl Log {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn trace(&self, message: fmt::Arguments<'_>) {
        self.sink.log(Level::TRACE, &message.to_string());
    }

    pub fn debug(&self, message: fmt::Arguments<'_>) {
        self.sink.log(Level::DEBUG, &message.to_string());
    }

    pub fn warn(&self, message: fmt::Arguments<'_>) {
        self.sink.log(Level::WARN, &message.to_string());
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}
