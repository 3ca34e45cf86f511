//! Flusher policies: decide when a buffered sink should call `flush()` on
//! its backing writer.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use byte_unit::Byte;

use crate::error::{LoglyError, Result};

/// Decides, after each write of `bytes_written` bytes, whether the sink
/// should flush now.
pub trait Flusher: Send + Sync {
    /// Called once per write with the number of bytes just written.
    fn should_flush(&self, bytes_written: usize) -> bool;
}

/// Flushes every `every`-th write. `every == 0` disables periodic
/// flushing (never flush until close).
pub struct RepeatFlusher {
    every: usize,
    counter: AtomicUsize,
}

impl RepeatFlusher {
    /// A flusher that flushes once every `every` writes.
    pub fn new(every: usize) -> Self {
        RepeatFlusher {
            every,
            counter: AtomicUsize::new(0),
        }
    }
}

impl Flusher for RepeatFlusher {
    fn should_flush(&self, _bytes_written: usize) -> bool {
        if self.every == 0 {
            return false;
        }
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        n % self.every == 0
    }
}

/// Flushes once a rolling byte counter reaches `threshold`, then wraps the
/// counter with a true modulo (so the long-run flush count is
/// `floor(total_bytes / threshold)` even when a single write spans more
/// than one threshold's worth of bytes).
pub struct BytecountFlusher {
    threshold: u64,
    counter: AtomicU64,
}

impl BytecountFlusher {
    /// A flusher with an explicit byte threshold.
    pub fn new(threshold: u64) -> Self {
        BytecountFlusher {
            threshold: threshold.max(1),
            counter: AtomicU64::new(0),
        }
    }

    /// Parses a threshold using the `B`/`kB`/`MB`/`GB`/`KiB`/`MiB`/`GiB`
    /// suffix grammar, e.g. `"4MiB"`.
    pub fn parse(spec: &str) -> Result<Self> {
        let byte = Byte::parse_str(spec, true).map_err(|e| LoglyError::InvalidArgument {
            message: format!("invalid byte-count spec \"{spec}\": {e}"),
        })?;
        Ok(BytecountFlusher::new(byte.as_u64()))
    }
}

impl Flusher for BytecountFlusher {
    fn should_flush(&self, bytes_written: usize) -> bool {
        let mut flushed = false;
        self.counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |counter| {
                let mut next = counter + bytes_written as u64;
                if next >= self.threshold {
                    next %= self.threshold;
                    flushed = true;
                }
                Some(next)
            })
            .expect("fetch_update closure always returns Some");
        flushed
    }
}
