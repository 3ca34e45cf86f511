//! Logger composition: the root logger, attribute-carrying wrapper loggers,
//! and the thread-scoped-frame manager accessor they share.
//!
//! The filter/handler storage shape follows the configure/add/remove
//! handler surface and `Lazy<RwLock<LoggerState>>` pattern common to
//! singleton-style logging facades, generalized here into a composable
//! `Logger` trait with a root implementation plus delegating wrappers.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;

use crate::attribute::{AttributeList, AttributePack, ValueView};
use crate::handler::Handler;
use crate::record::Record;
use crate::scope::ScopeManager;

/// A filter predicate: given a severity, the unformatted message pattern,
/// and the pack of attributes visible to the call, decides whether the
/// record should be built at all.
pub type FilterFn = dyn Fn(i32, &str, &AttributePack<'_>) -> bool + Send + Sync;

/// Anything that accepts log calls: the root logger and every wrapper built
/// on top of it, sharing a three-operation contract (`log`, `log_with`,
/// `log_lazy`).
///
/// `dispatch` is the one method every implementor must supply; it receives
/// an already-assembled pack (the caller-supplied attributes plus whatever
/// every wrapper between the call site and the root has contributed) and is
/// responsible either for appending more attributes and delegating further
/// in (wrappers), or for collecting thread-scoped frames, filtering,
/// activating, and fanning out to handlers (the root). Keeping this as the
/// single required, object-safe method lets a wrapper chain of arbitrary
/// depth share one `Arc<dyn Logger>` without needing a second, non-dyn-
/// compatible trait.
pub trait Logger: Send + Sync {
    /// Logs `message` with no additional attributes.
    fn log(&self, severity: i32, message: &str) {
        self.log_with(severity, message, &[]);
    }

    /// Logs `message` with the attributes in `extra` layered over whatever
    /// this logger's wrappers and the calling thread's scoped frames
    /// already contribute.
    ///
    /// `extra` is the most local, most explicit source for a key (the call
    /// site itself), thread-scoped frames are the next most local (the
    /// dynamic scope the call happens to run in), and wrapper-contributed
    /// attributes are the least local (bound once, at wrapper construction,
    /// possibly far from any particular call site). Collecting frames here,
    /// before `dispatch` starts walking the wrapper chain, is what gives
    /// frames priority over wrapper attributes: by the time a wrapper's
    /// `dispatch` appends its own list, `pack` already holds `extra` and
    /// every frame ahead of it.
    fn log_with(&self, severity: i32, message: &str, extra: &AttributeList<'_>) {
        let mut pack = AttributePack::new();
        pack.push(extra);
        crate::scope::collect_into(&mut pack);
        let owned = message.to_string();
        self.dispatch(severity, message, pack, &mut |buf| buf.push_str(&owned));
    }

    /// Logs a message computed lazily: `fill` is only invoked if filtering
    /// accepts the record, so expensive formatting is skipped entirely for
    /// suppressed severities. `pattern` is retained on the record as the
    /// unformatted message pattern.
    fn log_lazy(&self, severity: i32, pattern: &str, extra: &AttributeList<'_>, fill: &mut dyn FnMut(&mut String)) {
        let mut pack = AttributePack::new();
        pack.push(extra);
        crate::scope::collect_into(&mut pack);
        self.dispatch(severity, pattern, pack, fill);
    }

    /// Accepts an already-assembled pack and either appends more attributes
    /// and delegates (wrappers) or performs the terminal
    /// filter/activate/fan-out algorithm (the root).
    fn dispatch(&self, severity: i32, pattern: &str, pack: AttributePack<'_>, fill: &mut dyn FnMut(&mut String));

    /// The thread-scoped-frame manager backing this logger's chain.
    ///
    /// Every logger in a wrapper chain shares the same manager: scoped
    /// frames are a thread-local, not a per-logger, concept.
    fn manager(&self) -> ScopeManager;
}

/// Owns the filter predicate and the handler vector; the terminal logger at
/// the base of every wrapper chain.
///
/// The filter is stored in an [`ArcSwap`] so readers on the hot path never
/// block: replacing it is a single atomic pointer swap, wait-free for
/// readers. The handler vector is not hot-path to mutate, so it sits behind
/// a [`parking_lot::RwLock`] instead.
pub struct RootLogger {
    filter: ArcSwap<Box<FilterFn>>,
    handlers: RwLock<Vec<Handler>>,
    manager: ScopeManager,
}

impl RootLogger {
    /// A root logger that accepts everything and has no handlers yet.
    pub fn new() -> Self {
        let accept_all: Box<FilterFn> = Box::new(|_: i32, _: &str, _: &AttributePack<'_>| true);
        RootLogger {
            filter: ArcSwap::from_pointee(accept_all),
            handlers: RwLock::new(Vec::new()),
            manager: ScopeManager::new(),
        }
    }

    /// Atomically replaces the filter predicate. Readers mid-call observe
    /// either the old or the new predicate in full, never a torn state.
    pub fn set_filter(&self, filter: impl Fn(i32, &str, &AttributePack<'_>) -> bool + Send + Sync + 'static) {
        let boxed: Box<FilterFn> = Box::new(filter);
        self.filter.store(Arc::new(boxed));
    }

    /// Appends a handler to the registration-order list consulted on every
    /// accepted call.
    pub fn add_handler(&self, handler: Handler) {
        self.handlers.write().push(handler);
    }

    /// Removes every handler, e.g. to reconfigure a logger in place.
    pub fn clear_handlers(&self) {
        self.handlers.write().clear();
    }
}

impl Default for RootLogger {
    fn default() -> Self {
        RootLogger::new()
    }
}

impl Logger for RootLogger {
    fn dispatch(&self, severity: i32, pattern: &str, pack: AttributePack<'_>, fill: &mut dyn FnMut(&mut String)) {
        // Thread-scoped frames and the call-site `extra` pack are already
        // folded into `pack` by `Logger::log_with`/`log_lazy`, the true
        // entry point of every call (root or through a wrapper chain), so
        // this terminal `dispatch` only filters, activates, and fans out.
        let filter = self.filter.load();
        if !filter(severity, pattern, &pack) {
            return;
        }

        let name = current_thread_name();
        let record = Record::new(severity, pattern, pack).with_thread_name(name);
        record.activate(|buf| fill(buf));

        let handlers = self.handlers.read();
        for handler in handlers.iter() {
            if let Err(err) = handler.execute(&record) {
                eprintln!("logly: handler error: {err}");
            }
        }
    }

    fn manager(&self) -> ScopeManager {
        self.manager
    }
}

/// A delegating logger that appends an owned attribute list onto every call
/// it forwards to its inner logger.
///
/// The pack is seeded with the call-site `extra` list before any wrapper
/// sees it, and each wrapper's `dispatch` runs before it delegates further
/// in toward the root. Appending (rather than inserting at the front) means
/// whichever list landed in the pack earliest keeps its resolution
/// priority: the call-site list stays ahead of every wrapper, and the
/// wrapper closest to the call site, the one whose `dispatch` runs first,
/// stays ahead of wrappers further out. The innermost wrapper's attributes
/// end up first in the pack, with the call site itself as the innermost
/// scope of all.
pub struct WrapperLogger<'a> {
    inner: Arc<dyn Logger + 'a>,
    attributes: Box<AttributeList<'a>>,
}

impl<'a> WrapperLogger<'a> {
    /// Wraps `inner`, adding `attributes` to every call made through this
    /// wrapper.
    pub fn new(inner: Arc<dyn Logger + 'a>, attributes: Vec<(&'a str, ValueView<'a>)>) -> Self {
        WrapperLogger {
            inner,
            attributes: attributes.into_boxed_slice(),
        }
    }
}

impl Logger for WrapperLogger<'_> {
    fn dispatch(&self, severity: i32, pattern: &str, mut pack: AttributePack<'_>, fill: &mut dyn FnMut(&mut String)) {
        pack.push(&self.attributes);
        self.inner.dispatch(severity, pattern, pack, fill);
    }

    fn manager(&self) -> ScopeManager {
        self.inner.manager()
    }
}

/// Constructs a delegating logger with added attributes.
pub fn wrapper<'a>(log: Arc<dyn Logger + 'a>, attributes: Vec<(&'a str, ValueView<'a>)>) -> WrapperLogger<'a> {
    WrapperLogger::new(log, attributes)
}

/// A `'static` name for the calling thread, suitable for a [`Record`]'s
/// `thread_name` field.
///
/// `std::thread::current().name()` borrows from a temporary `Thread`
/// handle, so its lifetime cannot satisfy `Record<'a>`'s arbitrary `'a`.
/// Each thread leaks its own name into a `'static str` exactly once (the
/// thread-local cache below), which is sound because a thread has at most
/// one name for its entire lifetime and the number of threads a process
/// creates is bounded in practice.
fn current_thread_name() -> Option<&'static str> {
    thread_local! {
        static NAME: Option<&'static str> = std::thread::current()
            .name()
            .map(|s| -> &'static str { Box::leak(s.to_string().into_boxed_str()) });
    }
    NAME.with(|n| *n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as LoglyResult;
    use crate::format::StringFormatterBuilder;
    use crate::sink::{ConsoleSink, Sink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    struct CountingSink {
        count: StdArc<AtomicUsize>,
    }

    impl Sink for CountingSink {
        fn emit(&self, _record: &Record<'_>, _formatted: &[u8]) -> LoglyResult<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn handler_with_counter() -> (Handler, StdArc<AtomicUsize>) {
        let count = StdArc::new(AtomicUsize::new(0));
        let formatter = Box::new(StringFormatterBuilder::new("{message}").build().unwrap());
        let sink: Box<dyn Sink> = Box::new(CountingSink {
            count: StdArc::clone(&count),
        });
        (Handler::new(formatter, vec![sink]).unwrap(), count)
    }

    #[test]
    fn rejected_records_never_reach_a_handler() {
        let root = RootLogger::new();
        let (handler, count) = handler_with_counter();
        root.add_handler(handler);
        root.set_filter(|severity, _pattern, _pack| severity >= 2);
        root.log(1, "suppressed");
        assert_eq!(count.load(Ordering::SeqCst), 0);
        root.log(2, "accepted");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_fill_is_not_invoked_when_filtered_out() {
        let root = RootLogger::new();
        root.set_filter(|_, _, _| false);
        let invoked = StdArc::new(AtomicUsize::new(0));
        let invoked2 = StdArc::clone(&invoked);
        root.log_lazy(0, "pattern", &[], &mut |buf| {
            invoked2.fetch_add(1, Ordering::SeqCst);
            buf.push_str("computed");
        });
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn call_site_attributes_take_precedence_over_wrapper_duplicates() {
        let observed = StdArc::new(parking_lot::Mutex::new(String::new()));
        let observed2 = StdArc::clone(&observed);
        let root = RootLogger::new();
        root.set_filter(move |_, _, pack| {
            if let Some(ValueView::Str(s)) = pack.get("service") {
                *observed2.lock() = s.to_string();
            }
            true
        });
        let root: Arc<dyn Logger> = Arc::new(root);
        let wrapped = wrapper(root, vec![("service", ValueView::Str("wrapper-value"))]);
        let extra: &AttributeList = &[("service", ValueView::Str("call-site-value"))];
        wrapped.log_with(0, "msg", extra);
        assert_eq!(&*observed.lock(), "call-site-value");
    }

    #[test]
    fn wrapper_chain_closest_to_call_site_wins() {
        let observed = StdArc::new(parking_lot::Mutex::new(String::new()));
        let observed2 = StdArc::clone(&observed);
        let root = RootLogger::new();
        root.set_filter(move |_, _, pack| {
            if let Some(ValueView::Str(s)) = pack.get("k") {
                *observed2.lock() = s.to_string();
            }
            true
        });
        let root: Arc<dyn Logger> = Arc::new(root);
        let outer = Arc::new(wrapper(root, vec![("k", ValueView::Str("outer"))]));
        let inner = wrapper(outer, vec![("k", ValueView::Str("inner"))]);
        inner.log(0, "msg");
        assert_eq!(&*observed.lock(), "inner");
    }

    #[test]
    fn console_sink_builds_cleanly_inside_a_handler() {
        let formatter = Box::new(StringFormatterBuilder::new("{message}").build().unwrap());
        let sink: Box<dyn Sink> = Box::new(ConsoleSink::stdout());
        let handler = Handler::new(formatter, vec![sink]).unwrap();
        let root = RootLogger::new();
        root.add_handler(handler);
        root.log(0, "hello");
    }
}
