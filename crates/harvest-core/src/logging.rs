//! Recent log capture.
//!
//! [`RecentLogs`] keeps the last few rendered log lines in memory so a status
//! snapshot can show what the engine has been doing. It plugs into a
//! `tracing_subscriber` registry as a [`Layer`].

use chrono::Local;
use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Default number of lines kept.
pub const DEFAULT_CAPACITY: usize = 100;

/// Target prefix of events worth keeping.
const TARGET_PREFIX: &str = "harvest";

/// Bounded, shareable buffer of recent log lines.
#[derive(Debug, Clone)]
pub struct RecentLogs {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Default for RecentLogs {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecentLogs {
    /// Create a buffer holding at most `capacity` lines.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append a line, evicting the oldest one when full.
    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// Copy of the buffered lines, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Drop all buffered lines.
    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// A tracing layer that feeds this buffer.
    #[must_use]
    pub fn layer(&self) -> RecentLogsLayer {
        RecentLogsLayer {
            logs: self.clone(),
            min_level: Level::INFO,
        }
    }
}

/// Layer that renders `harvest*` events at INFO or above into [`RecentLogs`].
#[derive(Debug, Clone)]
pub struct RecentLogsLayer {
    logs: RecentLogs,
    min_level: Level,
}

impl<S: Subscriber> Layer<S> for RecentLogsLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        // Level ordering: TRACE > DEBUG > INFO > WARN > ERROR
        if *meta.level() > self.min_level || !meta.target().starts_with(TARGET_PREFIX) {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.logs.push(format!(
            "{} {:<5} {}",
            Local::now().format("%H:%M:%S"),
            meta.level(),
            visitor.finish()
        ));
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
