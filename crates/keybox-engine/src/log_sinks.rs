//! Log sinks fed by `tracing`.
//!
//! Two of the device's log destinations are engine-specific and live here as
//! [`tracing_subscriber::Layer`]s; console and file output are plain `fmt`
//! layers set up by the binary.
//!
//! - [`DisplayLogLayer`] keeps the last few lines for the front panel during
//!   startup and is detached afterwards through its [`DisplayLog`] handle.
//! - [`BackendErrorLayer`] queues ERROR records for the Remote Sync Manager
//!   to forward. It never blocks: when the queue is full the record is
//!   dropped and counted.
//!
//! Neither layer emits `tracing` events itself, so a failing sink cannot
//! feed back into the chain.
//!
//! ```
//! use keybox_engine::log_sinks::{display_log, error_forwarding};
//! use tracing_subscriber::prelude::*;
//!
//! let (display_layer, display) = display_log(5);
//! let (error_layer, mut errors) = error_forwarding(32);
//! let subscriber = tracing_subscriber::registry()
//!     .with(display_layer)
//!     .with(error_layer);
//!
//! tracing::subscriber::with_default(subscriber, || {
//!     tracing::info!("booting");
//!     tracing::error!("sensor missing");
//! });
//!
//! assert_eq!(display.lines().len(), 2);
//! assert_eq!(errors.try_next().unwrap().message, "sensor missing");
//! ```

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Collects an event's message and fields into one line.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
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

impl Visit for MessageVisitor {
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

fn render(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor::default();
    event.record(&mut visitor);
    visitor.finish()
}

#[derive(Debug)]
struct DisplayState {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
    attached: AtomicBool,
}

/// Handle to the front-panel log buffer.
#[derive(Debug, Clone)]
pub struct DisplayLog {
    state: Arc<DisplayState>,
}

impl DisplayLog {
    /// Buffered lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.state
            .lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Stop collecting; the layer ignores every later event.
    pub fn detach(&self) {
        self.state.attached.store(false, Ordering::Relaxed);
    }

    pub fn is_attached(&self) -> bool {
        self.state.attached.load(Ordering::Relaxed)
    }
}

/// Layer keeping the most recent INFO-and-above lines for the display.
#[derive(Debug)]
pub struct DisplayLogLayer {
    state: Arc<DisplayState>,
}

/// Create the display sink, keeping up to `capacity` lines.
pub fn display_log(capacity: usize) -> (DisplayLogLayer, DisplayLog) {
    let state = Arc::new(DisplayState {
        lines: Mutex::new(VecDeque::with_capacity(capacity)),
        capacity,
        attached: AtomicBool::new(true),
    });
    (
        DisplayLogLayer {
            state: Arc::clone(&state),
        },
        DisplayLog { state },
    )
}

impl<S: Subscriber> Layer<S> for DisplayLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !self.state.attached.load(Ordering::Relaxed) || *event.metadata().level() > Level::INFO
        {
            return;
        }

        let line = format!("{}: {}", event.metadata().level(), render(event));
        // A poisoned buffer only loses display lines.
        if let Ok(mut lines) = self.state.lines.lock() {
            if lines.len() == self.state.capacity {
                lines.pop_front();
            }
            if self.state.capacity > 0 {
                lines.push_back(line);
            }
        }
    }
}

/// One ERROR record waiting to be forwarded to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Local>,
    pub level: String,
    pub message: String,
}

/// Layer forwarding ERROR records into a bounded queue.
#[derive(Debug)]
pub struct BackendErrorLayer {
    sender: mpsc::Sender<ErrorRecord>,
    dropped: Arc<AtomicU64>,
}

/// Receiving end of [`BackendErrorLayer`].
#[derive(Debug)]
pub struct ErrorQueue {
    receiver: mpsc::Receiver<ErrorRecord>,
    dropped: Arc<AtomicU64>,
}

impl ErrorQueue {
    /// Next queued record, if any.
    pub fn try_next(&mut self) -> Option<ErrorRecord> {
        self.receiver.try_recv().ok()
    }

    /// Records dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Create the backend error sink with a queue of `capacity` records.
pub fn error_forwarding(capacity: usize) -> (BackendErrorLayer, ErrorQueue) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        BackendErrorLayer {
            sender,
            dropped: Arc::clone(&dropped),
        },
        ErrorQueue { receiver, dropped },
    )
}

impl<S: Subscriber> Layer<S> for BackendErrorLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }

        let record = ErrorRecord {
            timestamp: Local::now(),
            level: event.metadata().level().to_string(),
            message: render(event),
        };
        if self.sender.try_send(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
