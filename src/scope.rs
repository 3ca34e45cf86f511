//! Thread-scoped attribute frames.
//!
//! A [`ScopedFrame`] is a stack-allocated value whose constructor pushes
//! itself onto the *current thread's* frame stack and whose destructor pops
//! itself, restoring the previous top exactly. Frames never migrate
//! between threads: the stack is a thread-local intrusive linked list.

use crate::attribute::AttributeList;
use std::cell::Cell;
use std::ptr;

struct FrameNode<'a> {
    list: &'a AttributeList<'a>,
    previous: *const FrameNode<'a>,
}

thread_local! {
    static TOP: Cell<*const FrameNode<'static>> = const { Cell::new(ptr::null()) };
}

/// Handle to the current thread's scoped-frame stack.
///
/// Its entire public contract is `get()`/`reset()`: scoped frames use
/// these in their constructor/destructor, and a logger move rebinds an
/// existing chain by walking from the current top (the only legal
/// mutation of an existing frame).
#[derive(Clone, Copy, Default)]
pub struct ScopeManager;

impl ScopeManager {
    /// Returns a new handle. `ScopeManager` is a zero-sized marker: all
    /// state lives in the thread-local stack, not in this value.
    pub fn new() -> Self {
        ScopeManager
    }

    /// The current top-of-stack pointer for this thread, opaque to callers
    /// other than [`ScopedFrame`].
    fn get(&self) -> *const FrameNode<'static> {
        TOP.with(|top| top.get())
    }

    /// Replaces the current thread's top-of-stack pointer.
    fn reset(&self, new_top: *const FrameNode<'static>) {
        TOP.with(|top| top.set(new_top));
    }
}

/// A RAII value that adds attributes to the current thread's pack for the
/// duration of its lifetime.
///
/// Construction pushes `list` onto the calling thread's frame stack;
/// destruction restores exactly the previous top, even under unwind.
pub struct ScopedFrame<'a> {
    node: Box<FrameNode<'a>>,
    manager: ScopeManager,
}

impl<'a> ScopedFrame<'a> {
    /// Pushes `list` onto `manager`'s thread's frame stack.
    pub fn new(manager: ScopeManager, list: &'a AttributeList<'a>) -> Self {
        let previous = manager.get();
        let node = Box::new(FrameNode { list, previous });
        // SAFETY: the thread-local stack only ever stores pointers whose
        // lifetime is bounded by the `ScopedFrame` that owns them; we erase
        // the lifetime here and restore it in `walk_current_thread`, which
        // is only ever called from within the lifetime of the frames still
        // on the stack.
        let erased: *const FrameNode<'static> =
            (&*node as *const FrameNode<'a>).cast::<FrameNode<'static>>();
        manager.reset(erased);
        ScopedFrame { node, manager }
    }
}

impl Drop for ScopedFrame<'_> {
    fn drop(&mut self) {
        self.manager.reset(self.node.previous);
    }
}

/// Appends every attribute list currently on the calling thread's frame
/// stack onto `pack`, walking from the current top down to the root.
///
/// Frames are appended *outermost last* so that attributes closer to the
/// call site take precedence under the pack's first-wins resolution rule;
/// since the stack is walked top (innermost) first, pushing in traversal
/// order already satisfies this.
pub fn collect_into<'a>(pack: &mut crate::attribute::AttributePack<'a>) {
    let manager = ScopeManager::new();
    let mut cursor = manager.get();
    while !cursor.is_null() {
        // SAFETY: `cursor` only ever points at a live `FrameNode` owned by
        // a `ScopedFrame` further up this same thread's call stack.
        let node = unsafe { &*cursor };
        let list: &'a AttributeList<'a> = unsafe {
            std::mem::transmute::<&AttributeList<'_>, &'a AttributeList<'a>>(node.list)
        };
        pack.push(list);
        cursor = node.previous;
    }
}

/// Constructs a scoped frame on `manager`'s thread. Equivalent to
/// [`ScopedFrame::new`]; provided as a free function for symmetry with
/// [`crate::logger::wrapper`].
pub fn scoped<'a>(manager: ScopeManager, list: &'a AttributeList<'a>) -> ScopedFrame<'a> {
    ScopedFrame::new(manager, list)
}

/// Current stack depth for the calling thread, exposed for tests verifying
/// the RAII invariant that depth after the outermost frame is destroyed
/// equals depth before it was constructed.
#[cfg(test)]
pub fn depth() -> usize {
    let manager = ScopeManager::new();
    let mut cursor = manager.get();
    let mut n = 0;
    while !cursor.is_null() {
        n += 1;
        let node = unsafe { &*cursor };
        cursor = node.previous;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributePack, ValueView};

    #[test]
    fn push_and_pop_restore_previous_top_exactly() {
        let before = depth();
        let list: &AttributeList = &[("k", ValueView::Int(1))];
        {
            let _frame = ScopedFrame::new(ScopeManager::new(), list);
            assert_eq!(depth(), before + 1);
        }
        assert_eq!(depth(), before);
    }

    #[test]
    fn nested_frames_resolve_inner_first() {
        let outer: &AttributeList = &[("service", ValueView::Str("A"))];
        let inner: &AttributeList = &[("service", ValueView::Str("B"))];
        let _outer_frame = ScopedFrame::new(ScopeManager::new(), outer);
        {
            let _inner_frame = ScopedFrame::new(ScopeManager::new(), inner);
            let mut pack = AttributePack::new();
            collect_into(&mut pack);
            match pack.get("service") {
                Some(ValueView::Str(s)) => assert_eq!(s, "B"),
                other => panic!("unexpected {other:?}"),
            }
        }
        let mut pack = AttributePack::new();
        collect_into(&mut pack);
        match pack.get("service") {
            Some(ValueView::Str(s)) => assert_eq!(s, "A"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
