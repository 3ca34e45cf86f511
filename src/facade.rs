//! The facade: a compile-once front-end over a fixed message pattern.
//!
//! The facade scans a pattern known ahead of time into literal/placeholder
//! spans exactly once, then on each call walks the spans and writes
//! literals plus formatted positional arguments directly into the record's
//! message buffer, skipping both the attribute-pack machinery of
//! [`crate::format::StringFormatter`] and the re-parsing that formatter
//! would otherwise redo on every call. It shares the logger's lazy-fill
//! mechanism ([`crate::logger::Logger::log_lazy`]) so argument rendering is
//! skipped entirely when filtering rejects the call.
//!
//! The facade is a pure front-end: it does not observe attributes, pack
//! layering, or scoped frames. Those are the logger's concern, not this
//! one's.

use std::fmt;

use crate::error::{LoglyError, Result};
use crate::logger::Logger;

/// One piece of a compiled pattern.
enum Span {
    /// Literal text, copied verbatim.
    Literal(String),
    /// A positional placeholder; `spec` is the text between `:` and `}`,
    /// forwarded to [`apply_spec`] (empty when the placeholder was bare
    /// `{}`).
    Arg { spec: String },
}

/// A pattern compiled once into a sequence of spans.
///
/// Construction is the only place parsing happens; [`Facade::render`] is a
/// single append-only pass with no further parsing. Rust has no
/// `constexpr`-equivalent to do the scan at actual compile time, so the
/// work is instead paid once, at `Facade::new`, rather than once per log
/// call.
pub struct Facade {
    pattern: String,
    spans: Vec<Span>,
    arg_count: usize,
}

impl Facade {
    /// Compiles `pattern`. Recognizes `{{` / `}}` as escaped braces, `{}`
    /// as a bare positional placeholder, and `{:spec}` as a placeholder
    /// with a forwarded spec. A bare `}` with no matching `{` is a parse
    /// error, the same brace rule the string formatter uses, since the
    /// facade's placeholder grammar is a strict subset of that
    /// formatter's.
    pub fn new(pattern: &str) -> Result<Self> {
        let mut spans = Vec::new();
        let mut literal = String::new();
        let mut arg_count = 0;
        let bytes = pattern.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            match c {
                b'{' if bytes.get(i + 1) == Some(&b'{') => {
                    literal.push('{');
                    i += 2;
                }
                b'}' if bytes.get(i + 1) == Some(&b'}') => {
                    literal.push('}');
                    i += 2;
                }
                b'{' => {
                    if !literal.is_empty() {
                        spans.push(Span::Literal(std::mem::take(&mut literal)));
                    }
                    let start = i;
                    i += 1;
                    let spec_start = i;
                    let close = loop {
                        match bytes.get(i) {
                            Some(b'}') => break i,
                            Some(_) => i += 1,
                            None => {
                                return Err(LoglyError::ParseError {
                                    pos: start,
                                    message: "unterminated placeholder".to_string(),
                                    snippet: pattern[start..].to_string(),
                                });
                            }
                        }
                    };
                    let inner = &pattern[spec_start..close];
                    let spec = match inner.strip_prefix(':') {
                        Some(spec) => spec.to_string(),
                        None if inner.is_empty() => String::new(),
                        None => {
                            return Err(LoglyError::ParseError {
                                pos: start,
                                message: "facade placeholders are positional; expected `{}` or `{:spec}`".to_string(),
                                snippet: pattern[start..=close].to_string(),
                            });
                        }
                    };
                    spans.push(Span::Arg { spec });
                    arg_count += 1;
                    i = close + 1;
                }
                b'}' => {
                    return Err(LoglyError::ParseError {
                        pos: i,
                        message: "unmatched `}`".to_string(),
                        snippet: pattern[i..].to_string(),
                    });
                }
                _ => {
                    let start = i;
                    while i < bytes.len() && bytes[i] != b'{' && bytes[i] != b'}' {
                        i += 1;
                    }
                    literal.push_str(&pattern[start..i]);
                }
            }
        }
        if !literal.is_empty() {
            spans.push(Span::Literal(literal));
        }
        Ok(Facade {
            pattern: pattern.to_string(),
            spans,
            arg_count,
        })
    }

    /// The number of positional arguments this pattern expects.
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// Renders the compiled pattern into `out`, substituting `args` for
    /// each placeholder span in order.
    pub fn render(&self, args: &[&dyn fmt::Display], out: &mut String) -> Result<()> {
        if args.len() != self.arg_count {
            return Err(LoglyError::InvalidArgument {
                message: format!("facade pattern expects {} argument(s), got {}", self.arg_count, args.len()),
            });
        }
        let mut next_arg = 0;
        for span in &self.spans {
            match span {
                Span::Literal(text) => out.push_str(text),
                Span::Arg { spec } => {
                    apply_spec(args[next_arg], spec, out);
                    next_arg += 1;
                }
            }
        }
        Ok(())
    }

    /// Logs `severity` through `logger`, rendering `args` into the message
    /// buffer only if `logger`'s filter accepts the call.
    ///
    /// A rendering failure (argument-count mismatch) is written into the
    /// record's message in place of the intended text rather than
    /// propagated: `log_lazy`'s fill callback has no return channel, and a
    /// malformed facade call should still surface visibly in the log
    /// rather than silently vanish.
    pub fn log(&self, logger: &dyn Logger, severity: i32, args: &[&dyn fmt::Display]) {
        logger.log_lazy(severity, &self.pattern, &[], &mut |buf| {
            if let Err(err) = self.render(args, buf) {
                buf.push_str(&format!("<facade error: {err}>"));
            }
        });
    }
}

/// Applies a forwarded format spec to one argument's rendered text.
///
/// Supports the practical subset of Rust's own mini-language that makes
/// sense for a single opaque `Display` value at runtime: fill character,
/// alignment (`<`, `>`, `^`), minimum width, and `.N` precision (applied as
/// a character truncation of the rendered text, matching how `Display`
/// impls that only ever produce short values are used in practice here).
/// An empty spec is the common case and skips all of this.
fn apply_spec(value: &dyn fmt::Display, spec: &str, out: &mut String) {
    if spec.is_empty() {
        use std::fmt::Write;
        let _ = write!(out, "{value}");
        return;
    }

    let mut chars: Vec<char> = spec.chars().collect();
    let mut fill = ' ';
    let mut align = None;
    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^') {
        fill = chars[0];
        align = Some(chars[1]);
        chars.drain(0..2);
    } else if !chars.is_empty() && matches!(chars[0], '<' | '>' | '^') {
        align = Some(chars[0]);
        chars.drain(0..1);
    }

    let rest: String = chars.into_iter().collect();
    let (width_part, precision_part) = match rest.split_once('.') {
        Some((w, p)) => (w, Some(p)),
        None => (rest.as_str(), None),
    };
    let width: Option<usize> = if width_part.is_empty() {
        None
    } else {
        width_part.parse().ok()
    };
    let precision: Option<usize> = precision_part.and_then(|p| p.parse().ok());

    let mut rendered = value.to_string();
    if let Some(p) = precision {
        if rendered.chars().count() > p {
            rendered = rendered.chars().take(p).collect();
        }
    }

    match width {
        Some(w) if rendered.chars().count() < w => {
            let pad = w - rendered.chars().count();
            match align.unwrap_or('<') {
                '>' => {
                    out.extend(std::iter::repeat(fill).take(pad));
                    out.push_str(&rendered);
                }
                '^' => {
                    let left = pad / 2;
                    let right = pad - left;
                    out.extend(std::iter::repeat(fill).take(left));
                    out.push_str(&rendered);
                    out.extend(std::iter::repeat(fill).take(right));
                }
                _ => {
                    out.push_str(&rendered);
                    out.extend(std::iter::repeat(fill).take(pad));
                }
            }
        }
        _ => out.push_str(&rendered),
    }
}
