//! Owning attribute value.

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Inline-capacity string used for short attribute keys/values.
///
/// Most attribute keys and many values are short; storing up to 22 bytes
/// inline avoids a heap allocation on the common path while falling back
/// transparently to an owned `String` for longer payloads.
#[derive(Clone)]
pub struct SmallString(SmallVec<[u8; 22]>);

impl SmallString {
    /// Builds a `SmallString` from any `&str`.
    pub fn new(s: &str) -> Self {
        SmallString(SmallVec::from_slice(s.as_bytes()))
    }

    /// Borrows the contents as `&str`.
    ///
    /// # Panics
    /// Never: construction only ever accepts valid UTF-8.
    pub fn as_str(&self) -> &str {
        // SAFETY: all constructors only ever copy from a `&str`.
        unsafe { std::str::from_utf8_unchecked(&self.0) }
    }
}

impl fmt::Debug for SmallString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl PartialEq for SmallString {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl From<&str> for SmallString {
    fn from(s: &str) -> Self {
        SmallString::new(s)
    }
}

impl From<String> for SmallString {
    fn from(s: String) -> Self {
        SmallString::new(&s)
    }
}

/// A user-supplied renderer invoked lazily at formatting time.
///
/// A value whose textual representation is expensive or only meaningful
/// once a formatter is actually writing bytes (e.g. a large structure
/// serialized on demand).
pub type OwnedRenderFn = Arc<dyn Fn(&mut dyn fmt::Write) -> fmt::Result + Send + Sync>;

/// An owning, sum-typed attribute value.
///
/// Equality is structural; the `Function` variant compares by pointer
/// identity of the underlying `Arc`, since two renderers are never
/// semantically "equal" in the general case.
#[derive(Clone)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed 64-bit integer.
    Int(i64),
    /// An unsigned 64-bit integer.
    Uint(u64),
    /// A double-precision float.
    Double(f64),
    /// A string, inline for short payloads.
    Str(SmallString),
    /// A lazily-rendered value.
    Function(OwnedRenderFn),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Uint(u) => write!(f, "Uint({u})"),
            Value::Double(d) => write!(f, "Double({d})"),
            Value::Str(s) => write!(f, "Str({:?})", s.as_str()),
            Value::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// Borrows this owned value as a non-owning [`super::view::ValueView`],
    /// used by the async sink wrapper to hand a deep-copied queued record
    /// back to an inner sink's `emit`.
    pub fn view(&self) -> super::view::ValueView<'_> {
        use super::view::ValueView;
        match self {
            Value::Null => ValueView::Null,
            Value::Bool(b) => ValueView::Bool(*b),
            Value::Int(i) => ValueView::Int(*i),
            Value::Uint(u) => ValueView::Uint(*u),
            Value::Double(d) => ValueView::Double(*d),
            Value::Str(s) => ValueView::Str(s.as_str()),
            Value::Function(f) => ValueView::Function(&**f),
        }
    }
}

/// Writes a `Value` through any `fmt::Write`, without quoting strings.
///
/// Used by the string-pattern formatter's default attribute rendering; the
/// JSON formatter maps variants to `serde_json::Value` directly instead.
pub fn write_plain(value: &Value, w: &mut dyn fmt::Write) -> fmt::Result {
    match value {
        Value::Null => w.write_str("null"),
        Value::Bool(b) => write!(w, "{b}"),
        Value::Int(i) => write!(w, "{i}"),
        Value::Uint(u) => write!(w, "{u}"),
        Value::Double(d) => write!(w, "{d}"),
        Value::Str(s) => w.write_str(s.as_str()),
        Value::Function(f) => f(w),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_string_round_trips_short_and_long() {
        let short = SmallString::new("svc");
        assert_eq!(short.as_str(), "svc");
        let long = SmallString::new("a string that is definitely longer than twenty-two bytes");
        assert_eq!(
            long.as_str(),
            "a string that is definitely longer than twenty-two bytes"
        );
    }

    #[test]
    fn equality_is_structural_for_scalars() {
        assert_eq!(Value::Int(1), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Uint(1));
        assert_eq!(Value::Str(SmallString::new("x")), Value::Str("x".into()));
    }

    #[test]
    fn view_borrows_without_copying_strings() {
        use super::super::view::ValueView;
        let value = Value::Str(SmallString::new("borrowed"));
        match value.view() {
            ValueView::Str(s) => assert_eq!(s, "borrowed"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn write_plain_renders_each_variant() {
        let mut out = String::new();
        write_plain(&Value::Bool(true), &mut out).unwrap();
        write_plain(&Value::Int(-5), &mut out).unwrap();
        write_plain(&Value::Str("hi".into()), &mut out).unwrap();
        assert_eq!(out, "true-5hi");
    }
}
