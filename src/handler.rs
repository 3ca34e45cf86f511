//! Handler: one formatter fanned out to one or more sinks.
//!
//! Format once, then write to whichever destinations are configured,
//! generalized past a single hard-coded console/file pair into an
//! arbitrary sink list.

use crate::error::{LoglyError, Result};
use crate::format::Formatter;
use crate::record::Record;
use crate::sink::Sink;

/// A formatter paired with the sinks it feeds.
///
/// A handler formats a record exactly once and hands the resulting bytes to
/// every sink whose own [`Sink::filter`] accepts the record. A sink's error
/// is caught and reported to stderr; it never stops the remaining sinks in
/// the same handler, and never propagates past `execute`. Errors are
/// contained per-sink, with stderr reporting as the fallback, rather than
/// silently swallowed.
///
/// Unlike the literal wording in the expanded design notes (a shared
/// `RefCell`-held buffer reused across calls), `execute` allocates a fresh
/// `String` per call: a handler sits behind the root logger's
/// `RwLock<Vec<Handler>>` and can be invoked concurrently by multiple
/// producer threads, so a single shared `RefCell` buffer would not be
/// `Sync`-sound. See `DESIGN.md` for this deviation.
pub struct Handler {
    formatter: Box<dyn Formatter>,
    sinks: Vec<Box<dyn Sink>>,
}

impl Handler {
    /// Builds a handler from a formatter and a non-empty list of sinks.
    pub fn new(formatter: Box<dyn Formatter>, sinks: Vec<Box<dyn Sink>>) -> Result<Self> {
        if sinks.is_empty() {
            return Err(LoglyError::InvalidArgument {
                message: "a handler requires at least one sink".to_string(),
            });
        }
        Ok(Handler { formatter, sinks })
    }

    /// Formats `record` once and delivers it to every sink that accepts it.
    ///
    /// A formatter error is returned to the caller immediately; without a
    /// rendered message there is nothing any sink could usefully receive.
    pub fn execute(&self, record: &Record<'_>) -> Result<()> {
        let mut buf = String::new();
        self.formatter.format(record, &mut buf)?;
        let bytes = buf.as_bytes();
        for sink in &self.sinks {
            if !sink.filter(record) {
                continue;
            }
            if let Err(err) = sink.emit(record, bytes) {
                eprintln!("logly: sink error: {err}");
            }
        }
        Ok(())
    }
}
