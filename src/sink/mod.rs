//! Sinks: byte destinations a [`crate::handler::Handler`] fans formatted
//! records out to.

mod async_sink;
mod console;
mod file;
mod flush;
mod rotate;
mod tcp;
mod udp;

pub use async_sink::{AsyncSink, DropOverflow, OverflowPolicy, WaitOverflow};
pub use console::{Color, ConsoleSink, ConsoleStream};
pub use file::{FileSink, FileSinkBuilder, RotationPeriod};
pub use flush::{BytecountFlusher, Flusher, RepeatFlusher};
pub use rotate::{InodeRotate, RotatePolicy};
pub use tcp::TcpSink;
pub use udp::UdpSink;

use crate::error::Result;
use crate::record::Record;

/// A byte destination. Every sink accepts the already-formatted bytes for
/// a record, plus the record itself (for filtering and metadata such as
/// severity-driven coloring).
pub trait Sink: Send + Sync {
    /// Per-sink filter, consulted before `emit`. Default accepts
    /// everything.
    fn filter(&self, record: &Record<'_>) -> bool {
        let _ = record;
        true
    }

    /// Delivers `formatted` (the bytes a formatter produced for `record`)
    /// to this sink's destination.
    fn emit(&self, record: &Record<'_>, formatted: &[u8]) -> Result<()>;
}
