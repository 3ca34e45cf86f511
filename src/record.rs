//! The record: an immutable-after-activation carrier passed through the
//! handler pipeline.

use crate::attribute::AttributePack;
use std::cell::{Cell, RefCell};

/// Wall-clock timestamp with microsecond precision.
///
/// Stored as microseconds since the Unix epoch; `0` marks an unactivated
/// record (see [`Record::is_active`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// The current wall-clock time.
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Timestamp(now.timestamp_micros())
    }
}

/// A log record flowing through the pipeline from logger to sinks.
///
/// A record does not own its attribute lists or pattern storage: callers
/// guarantee these outlive the call. Activation is idempotent and
/// performed exactly once by the logger before the first handler observes
/// the record.
pub struct Record<'a> {
    severity: i32,
    message_pattern: &'a str,
    pack: AttributePack<'a>,
    formatted_message: RefCell<String>,
    timestamp: Cell<Timestamp>,
    process_id: u32,
    thread_id: u64,
    thread_name: Option<&'a str>,
}

impl<'a> Record<'a> {
    /// Constructs an inactive record with the given severity, unformatted
    /// message pattern, and attribute pack.
    pub fn new(severity: i32, message_pattern: &'a str, pack: AttributePack<'a>) -> Self {
        Record {
            severity,
            message_pattern,
            pack,
            formatted_message: RefCell::new(String::new()),
            timestamp: Cell::new(Timestamp(0)),
            process_id: std::process::id(),
            thread_id: current_thread_id(),
            thread_name: None,
        }
    }

    /// Reconstructs an already-activated record from previously captured
    /// fields, preserving the original timestamp and formatted message
    /// rather than re-deriving them.
    ///
    /// Used by the async sink wrapper's consumer thread to hand a
    /// deep-copied, dequeued record back to an inner sink's `emit`. The
    /// inner sink must see the record exactly as it was when originally
    /// activated on the producer's thread, not the delivery time.
    #[allow(clippy::too_many_arguments)]
    pub fn replay(
        severity: i32,
        message_pattern: &'a str,
        pack: AttributePack<'a>,
        timestamp: Timestamp,
        formatted_message: String,
        process_id: u32,
        thread_id: u64,
        thread_name: Option<&'a str>,
    ) -> Self {
        Record {
            severity,
            message_pattern,
            pack,
            formatted_message: RefCell::new(formatted_message),
            timestamp: Cell::new(timestamp),
            process_id,
            thread_id,
            thread_name,
        }
    }

    /// The record's severity.
    pub fn severity(&self) -> i32 {
        self.severity
    }

    /// The original, unformatted message pattern.
    pub fn message_pattern(&self) -> &'a str {
        self.message_pattern
    }

    /// The pack of attributes visible to this record.
    pub fn pack(&self) -> &AttributePack<'a> {
        &self.pack
    }

    /// Whether [`Self::activate`] has been called.
    pub fn is_active(&self) -> bool {
        self.timestamp.get().0 > 0
    }

    /// Activates the record: stamps `now()` and fills the formatted
    /// message buffer via `fill`. Idempotent: a second call is a no-op.
    pub fn activate(&self, fill: impl FnOnce(&mut String)) {
        if self.is_active() {
            return;
        }
        self.timestamp.set(Timestamp::now());
        fill(&mut self.formatted_message.borrow_mut());
    }

    /// The record's timestamp. `0` before activation.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp.get()
    }

    /// The activated, formatted message. Empty before activation.
    pub fn formatted_message(&self) -> std::cell::Ref<'_, String> {
        self.formatted_message.borrow()
    }

    /// The process id captured at construction.
    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// The thread id captured at construction.
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// The thread name, if one was set on the current thread.
    pub fn thread_name(&self) -> Option<&'a str> {
        self.thread_name
    }

    /// Overrides the thread name (used by the logger when constructing the
    /// record, since `std::thread::current().name()` only borrows for the
    /// calling thread's lifetime, not `'a`).
    pub fn with_thread_name(mut self, name: Option<&'a str>) -> Self {
        self.thread_name = name;
        self
    }
}

/// A stable-for-the-process numeric id for the current thread.
///
/// `std::thread::ThreadId` does not expose a numeric value on stable Rust,
/// so the core derives one from the thread's `Thread` debug representation
/// hash instead, sufficient for display purposes (`{thread:x}` /
/// `{thread:d}`), not for identity comparisons.
fn current_thread_id() -> u64 {
    use std::hash::{Hash, Hasher};
    let id = std::thread::current().id();
    let mut hasher = ahash::AHasher::default();
    id.hash(&mut hasher);
    hasher.finish()
}
