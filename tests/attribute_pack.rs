//! Exercises attribute-pack layering precedence (wrapper chain, thread
//! scope, call-site attributes) as a filter and a formatter would actually
//! observe it, through the public `logger`/`scope` surface rather than
//! constructing packs by hand.

use logly_core::attribute::{AttributeList, ValueView};
use logly_core::logger::{wrapper, Logger, RootLogger};
use logly_core::scope::{ScopeManager, ScopedFrame};
use std::sync::{Arc, Mutex};

#[test]
fn call_site_and_wrapper_attributes_outrank_thread_scope() {
    // The call-site `extra` pack and the thread's scoped frames are folded
    // in before any wrapper gets to append its own list, so both outrank
    // every wrapper's contribution for the same key.
    let observed = Arc::new(Mutex::new(String::new()));
    let observed2 = Arc::clone(&observed);
    let root = RootLogger::new();
    root.set_filter(move |_, _, pack| {
        if let Some(ValueView::Str(s)) = pack.get("tenant") {
            *observed2.lock().unwrap() = s.to_string();
        }
        true
    });
    let root: Arc<dyn Logger> = Arc::new(root);
    let wrapped = wrapper(root, vec![("tenant", ValueView::Str("wrapper"))]);

    let frame_list: &AttributeList = &[("tenant", ValueView::Str("scoped"))];
    let _frame = ScopedFrame::new(ScopeManager::new(), frame_list);

    let extra: &AttributeList = &[("tenant", ValueView::Str("call-site"))];
    wrapped.log_with(0, "msg", extra);

    assert_eq!(&*observed.lock().unwrap(), "call-site");
}

#[test]
fn scope_is_visible_when_nothing_closer_to_the_call_site_sets_the_key() {
    let observed = Arc::new(Mutex::new(String::new()));
    let observed2 = Arc::clone(&observed);
    let root = RootLogger::new();
    root.set_filter(move |_, _, pack| {
        if let Some(ValueView::Str(s)) = pack.get("tenant") {
            *observed2.lock().unwrap() = s.to_string();
        }
        true
    });
    let frame_list: &AttributeList = &[("tenant", ValueView::Str("scoped"))];
    let _frame = ScopedFrame::new(ScopeManager::new(), frame_list);
    root.log(0, "msg");
    assert_eq!(&*observed.lock().unwrap(), "scoped");
}

#[test]
fn call_site_attributes_win_when_no_scope_or_wrapper_sets_the_key() {
    let observed = Arc::new(Mutex::new(String::new()));
    let observed2 = Arc::clone(&observed);
    let root = RootLogger::new();
    root.set_filter(move |_, _, pack| {
        if let Some(ValueView::Str(s)) = pack.get("tenant") {
            *observed2.lock().unwrap() = s.to_string();
        }
        true
    });
    let extra: &AttributeList = &[("tenant", ValueView::Str("call-site"))];
    root.log_with(0, "msg", extra);
    assert_eq!(&*observed.lock().unwrap(), "call-site");
}
