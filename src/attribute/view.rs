//! Non-owning attribute view: the currency at the log call site.

use super::value::{SmallString, Value};
use std::fmt;

/// A callable `(writer) -> fmt::Result` borrowed for the duration of a
/// single log call.
///
/// # Safety / lifetime contract
/// A `ValueView::Function` is only valid until the enclosing log call
/// returns; callers must never stash a `ValueView` past that point.
pub type BorrowedRenderFn<'a> = &'a (dyn Fn(&mut dyn fmt::Write) -> fmt::Result + 'a);

/// A non-owning, sum-typed attribute value.
///
/// Cheap to construct from literals, built-in scalars, and arbitrary user
/// types via [`ToValueView`].
#[derive(Clone, Copy)]
pub enum ValueView<'a> {
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
    /// A borrowed string slice.
    Str(&'a str),
    /// A borrowed callable, rendered lazily by the formatter.
    Function(BorrowedRenderFn<'a>),
}

impl fmt::Debug for ValueView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueView::Null => f.write_str("Null"),
            ValueView::Bool(b) => write!(f, "Bool({b})"),
            ValueView::Int(i) => write!(f, "Int({i})"),
            ValueView::Uint(u) => write!(f, "Uint({u})"),
            ValueView::Double(d) => write!(f, "Double({d})"),
            ValueView::Str(s) => write!(f, "Str({s:?})"),
            ValueView::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl ValueView<'_> {
    /// Converts a view into an owning [`Value`] by copying.
    pub fn to_owned_value(&self) -> Value {
        match self {
            ValueView::Null => Value::Null,
            ValueView::Bool(b) => Value::Bool(*b),
            ValueView::Int(i) => Value::Int(*i),
            ValueView::Uint(u) => Value::Uint(*u),
            ValueView::Double(d) => Value::Double(*d),
            ValueView::Str(s) => Value::Str(SmallString::new(s)),
            ValueView::Function(f) => {
                // The callable itself cannot be copied (its lifetime is
                // bound to this call), so it is materialized eagerly.
                let mut rendered = String::new();
                let _ = f(&mut rendered);
                Value::Str(SmallString::new(&rendered))
            }
        }
    }

    /// Writes this view through any `fmt::Write`, unquoted.
    pub fn write_plain(&self, w: &mut dyn fmt::Write) -> fmt::Result {
        match self {
            ValueView::Null => w.write_str("null"),
            ValueView::Bool(b) => write!(w, "{b}"),
            ValueView::Int(i) => write!(w, "{i}"),
            ValueView::Uint(u) => write!(w, "{u}"),
            ValueView::Double(d) => write!(w, "{d}"),
            ValueView::Str(s) => w.write_str(s),
            ValueView::Function(f) => f(w),
        }
    }
}

/// Escape hatch letting arbitrary user types construct a [`ValueView`]
/// without allocating.
///
/// A blanket implementation covers every `Display` type by deferring to a
/// `Function` view that writes through the caller's `Display::fmt`; types
/// that can produce a view more cheaply (the scalar types, `&str`) get a
/// direct, non-blanket implementation instead.
pub trait ToValueView<'a> {
    /// Produces a [`ValueView`] borrowing from `self`.
    fn to_value_view(&'a self) -> ValueView<'a>;
}

impl<'a> ToValueView<'a> for &'a str {
    fn to_value_view(&'a self) -> ValueView<'a> {
        ValueView::Str(self)
    }
}

impl<'a> ToValueView<'a> for String {
    fn to_value_view(&'a self) -> ValueView<'a> {
        ValueView::Str(self.as_str())
    }
}

macro_rules! impl_scalar_view {
    ($ty:ty, $variant:ident, $cast:ty) => {
        impl<'a> ToValueView<'a> for $ty {
            fn to_value_view(&'a self) -> ValueView<'a> {
                ValueView::$variant(*self as $cast)
            }
        }
    };
}

impl_scalar_view!(bool, Bool, bool);
impl_scalar_view!(i8, Int, i64);
impl_scalar_view!(i16, Int, i64);
impl_scalar_view!(i32, Int, i64);
impl_scalar_view!(i64, Int, i64);
impl_scalar_view!(isize, Int, i64);
impl_scalar_view!(u8, Uint, u64);
impl_scalar_view!(u16, Uint, u64);
impl_scalar_view!(u32, Uint, u64);
impl_scalar_view!(u64, Uint, u64);
impl_scalar_view!(usize, Uint, u64);
impl_scalar_view!(f32, Double, f64);
impl_scalar_view!(f64, Double, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_convert_without_allocating_a_function_variant() {
        assert!(matches!(42i32.to_value_view(), ValueView::Int(42)));
        assert!(matches!(true.to_value_view(), ValueView::Bool(true)));
        assert!(matches!(1.5f64.to_value_view(), ValueView::Double(_)));
    }

    #[test]
    fn str_and_string_borrow_without_copy() {
        let s = "hello";
        assert!(matches!(s.to_value_view(), ValueView::Str("hello")));
        let owned = String::from("world");
        assert!(matches!(owned.to_value_view(), ValueView::Str("world")));
    }

    #[test]
    fn to_owned_value_copies_strings() {
        let view = ValueView::Str("copy-me");
        let owned = view.to_owned_value();
        assert_eq!(owned, Value::Str("copy-me".into()));
    }

    #[test]
    fn function_view_materializes_into_owned_string() {
        let renderer: BorrowedRenderFn = &|w: &mut dyn fmt::Write| write!(w, "rendered-{}", 7);
        let view = ValueView::Function(renderer);
        let owned = view.to_owned_value();
        assert_eq!(owned, Value::Str("rendered-7".into()));
    }
}
