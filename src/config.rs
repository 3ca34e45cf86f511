//! The config node boundary: a trait this crate consumes, never
//! implements, so a configuration loader (YAML, JSON, whatever a caller
//! already has) can hand the core a variant tree without the core knowing
//! anything about file formats.

use crate::error::{LoglyError, Result};

/// A node in a caller-supplied configuration tree.
///
/// Implementations are expected to come from outside this crate (a YAML or
/// JSON document, a hand-built test fixture, …). Type-mismatched getters
/// return [`LoglyError::BadCast`]; subscripting a missing key or index
/// yields a [`NoneNode`] rather than an error, so a chain of `.get(...)`
/// calls can be written without an intervening presence check at every
/// step. Only the final getter needs to handle absence.
pub trait ConfigNode {
    /// Reads this node as a boolean.
    fn as_bool(&self) -> Result<bool>;
    /// Reads this node as a signed integer.
    fn as_i64(&self) -> Result<i64>;
    /// Reads this node as an unsigned integer.
    fn as_u64(&self) -> Result<u64>;
    /// Reads this node as a floating-point number.
    fn as_f64(&self) -> Result<f64>;
    /// Reads this node as a string.
    fn as_str(&self) -> Result<&str>;

    /// Looks up `key` in this node, treated as an object/map.
    ///
    /// Returns a [`NoneNode`]-backed node, not an error, when `key` is
    /// absent or this node is not an object. Every getter on the result
    /// then fails with [`LoglyError::BadOptionalAccess`].
    fn get(&self, key: &str) -> Box<dyn ConfigNode>;

    /// Looks up `index` in this node, treated as an array.
    ///
    /// As with [`Self::get`], absence yields a [`NoneNode`], never an
    /// error.
    fn at(&self, index: usize) -> Box<dyn ConfigNode>;

    /// Invokes `f` once per element, for an array-typed node. A no-op on
    /// any other node kind.
    fn each(&self, f: &mut dyn FnMut(&dyn ConfigNode));

    /// Invokes `f` once per `(key, value)` pair, for an object-typed node.
    /// A no-op on any other node kind.
    fn each_map(&self, f: &mut dyn FnMut(&str, &dyn ConfigNode));
}

/// The universal "missing" node: every getter fails with
/// [`LoglyError::BadOptionalAccess`], and every subscript recursively
/// yields another `NoneNode`, so a deep lookup chain against a
/// partially-absent tree never panics and never needs a presence check
/// until the caller actually reads a value.
#[derive(Default, Clone, Copy)]
pub struct NoneNode;

impl ConfigNode for NoneNode {
    fn as_bool(&self) -> Result<bool> {
        Err(LoglyError::BadOptionalAccess)
    }

    fn as_i64(&self) -> Result<i64> {
        Err(LoglyError::BadOptionalAccess)
    }

    fn as_u64(&self) -> Result<u64> {
        Err(LoglyError::BadOptionalAccess)
    }

    fn as_f64(&self) -> Result<f64> {
        Err(LoglyError::BadOptionalAccess)
    }

    fn as_str(&self) -> Result<&str> {
        Err(LoglyError::BadOptionalAccess)
    }

    fn get(&self, _key: &str) -> Box<dyn ConfigNode> {
        Box::new(NoneNode)
    }

    fn at(&self, _index: usize) -> Box<dyn ConfigNode> {
        Box::new(NoneNode)
    }

    fn each(&self, _f: &mut dyn FnMut(&dyn ConfigNode)) {}

    fn each_map(&self, _f: &mut dyn FnMut(&str, &dyn ConfigNode)) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_node_getters_all_fail_with_bad_optional_access() {
        let node = NoneNode;
        assert!(matches!(node.as_bool(), Err(LoglyError::BadOptionalAccess)));
        assert!(matches!(node.as_i64(), Err(LoglyError::BadOptionalAccess)));
        assert!(matches!(node.as_u64(), Err(LoglyError::BadOptionalAccess)));
        assert!(matches!(node.as_f64(), Err(LoglyError::BadOptionalAccess)));
        assert!(matches!(node.as_str(), Err(LoglyError::BadOptionalAccess)));
    }

    #[test]
    fn none_node_subscripts_recurse_to_more_none_nodes() {
        let node = NoneNode;
        let child = node.get("missing");
        assert!(matches!(child.as_i64(), Err(LoglyError::BadOptionalAccess)));
        let grandchild = child.at(0).get("deeper");
        assert!(matches!(grandchild.as_str(), Err(LoglyError::BadOptionalAccess)));
    }

    #[test]
    fn none_node_iteration_is_a_no_op() {
        let node = NoneNode;
        let mut calls = 0;
        node.each(&mut |_| calls += 1);
        node.each_map(&mut |_, _| calls += 1);
        assert_eq!(calls, 0);
    }

    /// A minimal in-memory config node, used to confirm the trait is
    /// actually implementable by an outside caller rather than only by
    /// `NoneNode`.
    enum Fixture {
        Int(i64),
        Str(&'static str),
        List(Vec<Fixture>),
        Map(Vec<(&'static str, Fixture)>),
    }

    impl ConfigNode for Fixture {
        fn as_bool(&self) -> Result<bool> {
            Err(LoglyError::BadCast { expected: "bool" })
        }

        fn as_i64(&self) -> Result<i64> {
            match self {
                Fixture::Int(v) => Ok(*v),
                _ => Err(LoglyError::BadCast { expected: "i64" }),
            }
        }

        fn as_u64(&self) -> Result<u64> {
            Err(LoglyError::BadCast { expected: "u64" })
        }

        fn as_f64(&self) -> Result<f64> {
            Err(LoglyError::BadCast { expected: "f64" })
        }

        fn as_str(&self) -> Result<&str> {
            match self {
                Fixture::Str(v) => Ok(v),
                _ => Err(LoglyError::BadCast { expected: "str" }),
            }
        }

        fn get(&self, key: &str) -> Box<dyn ConfigNode> {
            match self {
                Fixture::Map(entries) => entries
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| -> Box<dyn ConfigNode> {
                        match v {
                            Fixture::Int(i) => Box::new(Fixture::Int(*i)),
                            Fixture::Str(s) => Box::new(Fixture::Str(s)),
                            Fixture::List(items) => Box::new(Fixture::List(clone_list(items))),
                            Fixture::Map(pairs) => Box::new(Fixture::Map(clone_map(pairs))),
                        }
                    })
                    .unwrap_or_else(|| Box::new(NoneNode)),
                _ => Box::new(NoneNode),
            }
        }

        fn at(&self, index: usize) -> Box<dyn ConfigNode> {
            match self {
                Fixture::List(items) => match items.get(index) {
                    Some(Fixture::Int(i)) => Box::new(Fixture::Int(*i)),
                    Some(Fixture::Str(s)) => Box::new(Fixture::Str(s)),
                    Some(Fixture::List(inner)) => Box::new(Fixture::List(clone_list(inner))),
                    Some(Fixture::Map(inner)) => Box::new(Fixture::Map(clone_map(inner))),
                    None => Box::new(NoneNode),
                },
                _ => Box::new(NoneNode),
            }
        }

        fn each(&self, f: &mut dyn FnMut(&dyn ConfigNode)) {
            if let Fixture::List(items) = self {
                for item in items {
                    f(item);
                }
            }
        }

        fn each_map(&self, f: &mut dyn FnMut(&str, &dyn ConfigNode)) {
            if let Fixture::Map(entries) = self {
                for (k, v) in entries {
                    f(k, v);
                }
            }
        }
    }

    fn clone_list(items: &[Fixture]) -> Vec<Fixture> {
        items
            .iter()
            .map(|item| match item {
                Fixture::Int(i) => Fixture::Int(*i),
                Fixture::Str(s) => Fixture::Str(s),
                Fixture::List(inner) => Fixture::List(clone_list(inner)),
                Fixture::Map(inner) => Fixture::Map(clone_map(inner)),
            })
            .collect()
    }

    fn clone_map(entries: &[(&'static str, Fixture)]) -> Vec<(&'static str, Fixture)> {
        entries
            .iter()
            .map(|(k, v)| {
                (
                    *k,
                    match v {
                        Fixture::Int(i) => Fixture::Int(*i),
                        Fixture::Str(s) => Fixture::Str(s),
                        Fixture::List(inner) => Fixture::List(clone_list(inner)),
                        Fixture::Map(inner) => Fixture::Map(clone_map(inner)),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn fixture_node_resolves_present_keys_and_falls_back_for_missing_ones() {
        let node = Fixture::Map(vec![("count", Fixture::Int(7)), ("name", Fixture::Str("svc"))]);
        assert_eq!(node.get("count").as_i64().unwrap(), 7);
        assert_eq!(node.get("name").as_str().unwrap(), "svc");
        assert!(matches!(
            node.get("missing").as_i64(),
            Err(LoglyError::BadOptionalAccess)
        ));
    }
}
