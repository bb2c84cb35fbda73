//! EventLog - append-only run audit trail
//!
//! - `Event`: envelope with id + timestamp + kind
//! - `EventKind`: program / step / node level variants
//! - `EventLog`: thread-safe, append-only log, dumped by the CLI under
//!   `--trace`
//!
//! Uses `Arc<str>` for step labels to enable zero-cost cloning across the
//! executor, and elapsed-ms timestamps relative to log creation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Single event in the run execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since log creation (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// All possible event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // PROGRAM LEVEL
    // ═══════════════════════════════════════════
    ProgramStarted {
        step_count: usize,
        /// Unique run ID for this execution
        run_id: String,
    },
    ProgramCompleted {
        total_duration_ms: u64,
    },
    ProgramFailed {
        error: String,
        failed_step: Option<Arc<str>>,
    },

    // ═══════════════════════════════════════════
    // STEP LEVEL
    // ═══════════════════════════════════════════
    StepStarted {
        step: Arc<str>,
        node: String,
    },
    StepCompleted {
        step: Arc<str>,
        duration_ms: u64,
    },
    StepFailed {
        step: Arc<str>,
        error: String,
        duration_ms: u64,
    },

    // ═══════════════════════════════════════════
    // NODE LEVEL (fine-grained)
    // ═══════════════════════════════════════════
    NodeInvoked {
        step: Arc<str>,
        node: String,
    },
    NodeExited {
        step: Arc<str>,
    },
}

impl EventKind {
    /// Step label this event is about, if any
    pub fn step(&self) -> Option<&str> {
        match self {
            EventKind::StepStarted { step, .. }
            | EventKind::StepCompleted { step, .. }
            | EventKind::StepFailed { step, .. }
            | EventKind::NodeInvoked { step, .. }
            | EventKind::NodeExited { step } => Some(step),
            EventKind::ProgramFailed { failed_step, .. } => failed_step.as_deref(),
            _ => None,
        }
    }
}

struct LogInner {
    events: RwLock<Vec<Event>>,
    next_id: AtomicU64,
    start: Instant,
}

/// Thread-safe, append-only event log shared across the executor
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<LogInner>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LogInner {
                events: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
                start: Instant::now(),
            }),
        }
    }

    /// Append an event, stamping id and elapsed time
    pub fn emit(&self, kind: EventKind) {
        let event = Event {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            timestamp_ms: self.inner.start.elapsed().as_millis() as u64,
            kind,
        };
        self.inner.events.write().push(event);
    }

    /// Copy of all events in emission order
    pub fn snapshot(&self) -> Vec<Event> {
        self.inner.events.read().clone()
    }

    /// Events about one step
    pub fn filter_step(&self, step: &str) -> Vec<Event> {
        self.inner
            .events
            .read()
            .iter()
            .filter(|e| e.kind.step() == Some(step))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.events.read().is_empty()
    }
}
