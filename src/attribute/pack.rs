//! Attribute lists and the layered attribute pack.

use super::view::ValueView;
use ahash::AHashSet;
use smallvec::SmallVec;

/// A single ordered `(key, value)` list as seen at a log call site.
///
/// Duplicates are allowed and significant; insertion order is preserved.
pub type AttributeList<'a> = [(&'a str, ValueView<'a>)];

/// The ordered stack of attribute lists visible to one log call.
///
/// Lists are pushed innermost-first: a wrapper logger or scoped frame
/// closer to the call site appears earlier in the pack than one further
/// out, which is exactly the order resolution needs for "inner scope
/// overrides outer" (first match wins).
#[derive(Default, Clone)]
pub struct AttributePack<'a> {
    lists: SmallVec<[&'a AttributeList<'a>; 4]>,
}

impl<'a> AttributePack<'a> {
    /// An empty pack.
    pub fn new() -> Self {
        AttributePack {
            lists: SmallVec::new(),
        }
    }

    /// Pushes a list onto the pack. Later pushes are considered "more
    /// outer" for resolution purposes, so callers append their own lists
    /// onto the pack outermost-last, so caller lists take precedence.
    pub fn push(&mut self, list: &'a AttributeList<'a>) {
        if !list.is_empty() {
            self.lists.push(list);
        }
    }

    /// Number of lists currently in the pack.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// Whether the pack has no lists.
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Resolves `key` using the first-wins rule: the first list (in pack
    /// order) containing `key` determines the result.
    pub fn get(&self, key: &str) -> Option<ValueView<'a>> {
        for list in &self.lists {
            for (k, v) in list.iter() {
                if *k == key {
                    return Some(*v);
                }
            }
        }
        None
    }

    /// Iterates every `(key, value)` pair in pack order.
    ///
    /// When `unique` is true, a key already yielded by an earlier list is
    /// skipped on subsequent lists (first-wins, matching [`Self::get`]).
    pub fn iter(&self, unique: bool) -> PackIter<'_, 'a> {
        PackIter {
            pack: self,
            list_idx: 0,
            item_idx: 0,
            unique,
            seen: if unique { Some(AHashSet::new()) } else { None },
        }
    }
}

/// Iterator over a pack's attributes in traversal order.
pub struct PackIter<'p, 'a> {
    pack: &'p AttributePack<'a>,
    list_idx: usize,
    item_idx: usize,
    unique: bool,
    seen: Option<AHashSet<&'a str>>,
}

impl<'a> Iterator for PackIter<'_, 'a> {
    type Item = (&'a str, ValueView<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let list = self.pack.lists.get(self.list_idx)?;
            match list.get(self.item_idx) {
                None => {
                    self.list_idx += 1;
                    self.item_idx = 0;
                }
                Some((k, v)) => {
                    self.item_idx += 1;
                    if self.unique {
                        let seen = self.seen.as_mut().expect("unique iterator has seen-set");
                        if !seen.insert(k) {
                            continue;
                        }
                    }
                    return Some((*k, *v));
                }
            }
        }
    }
}
