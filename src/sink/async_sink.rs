//! Async sink wrapper: decouples a producer thread from a slow or blocking
//! inner sink via a bounded SPSC queue.
//!
//! Every `emit` deep-copies the record (attributes, pattern, formatted
//! message) into an owned queue entry. The inner sink's `emit` always
//! runs later, on the single consumer thread, so nothing borrowed from the
//! caller's stack can survive the hand-off. The queue itself is a
//! lock-free ring ([`crossbeam_queue::ArrayQueue`]) rather than a channel,
//! giving a fixed-capacity, overflow-policy-driven design instead of an
//! unbounded or blocking one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use parking_lot::{Condvar, Mutex};

use crate::attribute::{AttributeList, AttributePack, Value, ValueView};
use crate::error::{LoglyError, Result};
use crate::record::{Record, Timestamp};
use crate::sink::Sink;

/// What a producer should do when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Try enqueuing again.
    Retry,
    /// Give up on this record.
    Drop,
}

/// Decides what happens when [`AsyncSink`]'s queue is full.
pub trait OverflowPolicy: Send + Sync {
    /// Called once per failed enqueue attempt.
    fn overflow(&self) -> Overflow;

    /// Called after a successful enqueue, to release anything blocked in
    /// [`Self::overflow`]. Default: no-op (policies with nothing to wake,
    /// like [`DropOverflow`], never override this).
    fn wakeup(&self) {}
}

/// Drops the record immediately on a full queue.
#[derive(Default)]
pub struct DropOverflow;

impl OverflowPolicy for DropOverflow {
    fn overflow(&self) -> Overflow {
        Overflow::Drop
    }
}

/// Blocks the producer (with a short timeout, to avoid a lost-wakeup
/// deadlock) until the consumer makes room.
pub struct WaitOverflow {
    mutex: Mutex<()>,
    condvar: Condvar,
    timeout: Duration,
}

impl WaitOverflow {
    /// A wait policy that re-checks every 5ms.
    pub fn new() -> Self {
        WaitOverflow::with_timeout(Duration::from_millis(5))
    }

    /// A wait policy with an explicit re-check interval.
    pub fn with_timeout(timeout: Duration) -> Self {
        WaitOverflow {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
            timeout,
        }
    }
}

impl Default for WaitOverflow {
    fn default() -> Self {
        WaitOverflow::new()
    }
}

impl OverflowPolicy for WaitOverflow {
    fn overflow(&self) -> Overflow {
        let mut guard = self.mutex.lock();
        let _ = self.condvar.wait_for(&mut guard, self.timeout);
        Overflow::Retry
    }

    fn wakeup(&self) {
        self.condvar.notify_all();
    }
}

/// A deep-copied, queued record: every borrow the producer held is
/// materialized into owned storage before crossing to the consumer
/// thread.
struct QueuedItem {
    severity: i32,
    message_pattern: Box<str>,
    rendered_message: String,
    timestamp: Timestamp,
    process_id: u32,
    thread_id: u64,
    thread_name: Option<Box<str>>,
    attributes: Vec<(Box<str>, Value)>,
    formatted: Vec<u8>,
}

impl QueuedItem {
    fn capture(record: &Record<'_>, formatted: &[u8]) -> Self {
        let attributes = record
            .pack()
            .iter(false)
            .map(|(k, v)| (Box::from(k), v.to_owned_value()))
            .collect();
        QueuedItem {
            severity: record.severity(),
            message_pattern: Box::from(record.message_pattern()),
            rendered_message: record.formatted_message().clone(),
            timestamp: record.timestamp(),
            process_id: record.process_id(),
            thread_id: record.thread_id(),
            thread_name: record.thread_name().map(Box::from),
            attributes,
            formatted: formatted.to_vec(),
        }
    }

    /// Reconstructs a borrowed-lifetime [`Record`] from this owned item and
    /// hands it to `sink`.
    fn deliver(&self, sink: &dyn Sink) -> Result<()> {
        let views: Vec<(&str, ValueView<'_>)> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.as_ref(), v.view()))
            .collect();
        let list: &AttributeList<'_> = &views;
        let mut pack = AttributePack::new();
        pack.push(list);
        let record = Record::replay(
            self.severity,
            &self.message_pattern,
            pack,
            self.timestamp,
            self.rendered_message.clone(),
            self.process_id,
            self.thread_id,
            self.thread_name.as_deref(),
        );
        sink.emit(&record, &self.formatted)
    }
}

/// Wraps an inner [`Sink`] with a bounded queue and a single consumer
/// thread, so a slow or blocking destination never stalls the logging
/// call site.
pub struct AsyncSink {
    queue: Arc<ArrayQueue<QueuedItem>>,
    inner: Arc<dyn Sink>,
    overflow: Arc<dyn OverflowPolicy>,
    stop: Arc<AtomicBool>,
    consumer: Option<thread::JoinHandle<()>>,
}

impl AsyncSink {
    /// Wraps `inner` with a queue of capacity `2^factor` (`factor` must be
    /// in `2..=20`) and `overflow` as the full-queue policy.
    pub fn new(inner: Box<dyn Sink>, factor: u32, overflow: Box<dyn OverflowPolicy>) -> Result<Self> {
        if !(2..=20).contains(&factor) {
            return Err(LoglyError::InvalidArgument {
                message: format!("async sink capacity factor must be in 2..=20, got {factor}"),
            });
        }
        let capacity = 1usize << factor;
        let queue = Arc::new(ArrayQueue::new(capacity));
        let inner: Arc<dyn Sink> = Arc::from(inner);
        let overflow: Arc<dyn OverflowPolicy> = Arc::from(overflow);
        let stop = Arc::new(AtomicBool::new(false));

        let consumer_queue = Arc::clone(&queue);
        let consumer_inner = Arc::clone(&inner);
        let consumer_stop = Arc::clone(&stop);
        let consumer = thread::Builder::new()
            .name("logly-async-sink".to_string())
            .spawn(move || run_consumer(consumer_queue, consumer_inner, consumer_stop))
            .map_err(|e| LoglyError::SystemError {
                message: format!("failed to spawn async sink consumer thread: {e}"),
                code: None,
            })?;

        Ok(AsyncSink {
            queue,
            inner,
            overflow,
            stop,
            consumer: Some(consumer),
        })
    }
}

/// Dequeues items until the queue is empty and `stop` is set, handing each
/// to `inner.emit`. A delivery error is reported to stderr and terminates
/// this consumer thread. The producer continues enqueuing until the queue
/// fills and the overflow policy takes over, unlike a synchronous handler,
/// which contains sink errors per-handler.
fn run_consumer(queue: Arc<ArrayQueue<QueuedItem>>, inner: Arc<dyn Sink>, stop: Arc<AtomicBool>) {
    loop {
        match queue.pop() {
            Some(item) => {
                if let Err(err) = item.deliver(inner.as_ref()) {
                    eprintln!("logly: async sink consumer terminating: {err}");
                    return;
                }
            }
            None => {
                if stop.load(Ordering::Acquire) {
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
        }
    }
}

impl Sink for AsyncSink {
    fn filter(&self, record: &Record<'_>) -> bool {
        self.inner.filter(record)
    }

    fn emit(&self, record: &Record<'_>, formatted: &[u8]) -> Result<()> {
        if !self.inner.filter(record) {
            return Ok(());
        }
        let mut item = QueuedItem::capture(record, formatted);
        loop {
            match self.queue.push(item) {
                Ok(()) => {
                    self.overflow.wakeup();
                    return Ok(());
                }
                Err(returned) => {
                    item = returned;
                    match self.overflow.overflow() {
                        Overflow::Retry => continue,
                        Overflow::Drop => return Ok(()),
                    }
                }
            }
        }
    }
}

impl Drop for AsyncSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.overflow.wakeup();
        if let Some(handle) = self.consumer.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributePack;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    struct CountingSink {
        count: Arc<AtomicUsize>,
    }

    impl Sink for CountingSink {
        fn emit(&self, _record: &Record<'_>, _formatted: &[u8]) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// A sink whose first `emit` blocks forever (the barrier's other party
    /// never arrives), simulating a permanently stalled destination.
    struct BlockingSink {
        barrier: Arc<Barrier>,
        attempts: Arc<AtomicUsize>,
    }

    impl Sink for BlockingSink {
        fn emit(&self, _record: &Record<'_>, _formatted: &[u8]) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.barrier.wait();
            Ok(())
        }
    }

    fn sample_record() -> Record<'static> {
        let record = Record::new(0, "msg", AttributePack::new());
        record.activate(|b| b.push_str("msg"));
        record
    }

    #[test]
    fn delivers_everything_under_wait_policy_when_not_contended() {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Box::new(CountingSink {
            count: Arc::clone(&count),
        });
        let sink = AsyncSink::new(inner, 4, Box::new(WaitOverflow::new())).unwrap();
        let record = sample_record();
        for _ in 0..50 {
            sink.emit(&record, b"line").unwrap();
        }
        drop(sink);
        assert_eq!(count.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn drop_policy_discards_records_once_a_stalled_consumer_fills_the_queue() {
        // factor 2 => capacity 4. `barrier` has no second party in this
        // test, so the consumer's first `emit` blocks forever; exactly
        // one record is ever handed to the inner sink. The rest either sit
        // in the full queue or are dropped by the overflow policy, and
        // every `emit` below still returns promptly.
        let barrier = Arc::new(Barrier::new(2));
        let attempts = Arc::new(AtomicUsize::new(0));
        let inner = Box::new(BlockingSink {
            barrier,
            attempts: Arc::clone(&attempts),
        });
        let sink = AsyncSink::new(inner, 2, Box::new(DropOverflow)).unwrap();
        let record = sample_record();
        for _ in 0..1000 {
            sink.emit(&record, b"line").unwrap();
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        // The consumer thread is permanently parked in `barrier.wait()`;
        // joining it in `Drop` would hang the test process, so the sink
        // (and its thread) is deliberately leaked here instead of dropped.
        std::mem::forget(sink);
    }

    #[test]
    fn rejects_out_of_range_capacity_factor() {
        let inner = Box::new(CountingSink {
            count: Arc::new(AtomicUsize::new(0)),
        });
        let err = AsyncSink::new(inner, 1, Box::new(DropOverflow)).unwrap_err();
        assert!(matches!(err, LoglyError::InvalidArgument { .. }));
    }
}
