//! The string-pattern formatter: a parser for the extended
//! `{placeholder[:spec]}` grammar and a single-pass executor.

use std::fmt::Write as _;
use std::ops::Range;

use crate::attribute::{ValueView, write_plain};
use crate::datetime::{BrokenDownTime, DatetimeGenerator};
use crate::error::{LoglyError, Result};
use crate::record::Record;

/// Maps a severity integer to its textual form, given the default
/// rendering spec (anything other than `:d`). Registered on
/// [`StringFormatterBuilder::mapping`]; defaults to the integer itself.
pub type SeverityMapFn = Box<dyn Fn(i32, &str, &mut String) + Send + Sync>;

/// One parsed token of a compiled pattern.
///
/// Every variant carries the byte-offset `span` of the text it was parsed
/// from (the literal run, or the whole `{...}` placeholder including its
/// braces) within the original pattern string, so the pattern can be
/// reconstructed losslessly and so error snippets can point at the exact
/// offending placeholder.
enum Token {
    Literal { text: String, span: Range<usize> },
    Message { span: Range<usize> },
    Severity { spec: String, span: Range<usize> },
    Timestamp { generator: DatetimeGenerator, kind: TimestampKind, span: Range<usize> },
    Process { spec: String, span: Range<usize> },
    Thread { spec: String, span: Range<usize> },
    Leftover { pattern: LeftoverPattern, separator: String, span: Range<usize> },
    Attribute { key: String, default: Option<String>, spec: String, span: Range<usize> },
}

impl Token {
    fn span(&self) -> &Range<usize> {
        match self {
            Token::Literal { span, .. }
            | Token::Message { span }
            | Token::Severity { span, .. }
            | Token::Timestamp { span, .. }
            | Token::Process { span, .. }
            | Token::Thread { span, .. }
            | Token::Leftover { span, .. }
            | Token::Attribute { span, .. } => span,
        }
    }
}

#[derive(Clone, Copy)]
enum TimestampKind {
    Micros,
    Gmtime,
    Localtime,
}

/// Parsed leftover sub-pattern: literal spans interleaved with `{name}` /
/// `{value}` placeholders, each carrying its own (opaque, forwarded) spec.
struct LeftoverPattern {
    parts: Vec<LeftoverPart>,
}

enum LeftoverPart {
    Literal(String),
    Name,
    Value,
}

/// A compiled string pattern, parsed once at construction.
pub struct StringFormatter {
    tokens: Vec<Token>,
    severity_map: Option<SeverityMapFn>,
    unique: bool,
    source: String,
}

/// Builder for [`StringFormatter`].
pub struct StringFormatterBuilder {
    pattern: String,
    severity_map: Option<SeverityMapFn>,
    unique: bool,
}

impl StringFormatterBuilder {
    /// Starts a builder for `pattern`, parsed eagerly on [`Self::build`].
    pub fn new(pattern: impl Into<String>) -> Self {
        StringFormatterBuilder {
            pattern: pattern.into(),
            severity_map: None,
            unique: false,
        }
    }

    /// Registers a custom severity-to-string mapping, invoked whenever the
    /// `{severity}` placeholder's spec is absent or not exactly `:d`.
    pub fn mapping(mut self, f: impl Fn(i32, &str, &mut String) + Send + Sync + 'static) -> Self {
        self.severity_map = Some(Box::new(f));
        self
    }

    /// Enables unique mode for the leftover placeholder: later duplicates
    /// of an already-seen attribute key are suppressed.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Parses the pattern, returning a [`LoglyError::ParseError`] on
    /// malformed grammar.
    pub fn build(self) -> Result<StringFormatter> {
        let tokens = Parser::new(&self.pattern).parse_all()?;
        Ok(StringFormatter {
            tokens,
            severity_map: self.severity_map,
            unique: self.unique,
            source: self.pattern,
        })
    }
}

/// Tiny explicit FSM over `{Unknown, Literal, Placeholder, Broken}`,
/// tracking brace depth while scanning a placeholder's spec so nested
/// sub-specs (timestamp, leftover) don't close the outer placeholder
/// early.
struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

enum RawToken {
    Literal { text: String, span: Range<usize> },
    Placeholder { name: String, spec: String, span: Range<usize> },
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Parser {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn err(&self, pos: usize, message: impl Into<String>) -> LoglyError {
        let end = (pos + 12).min(self.src.len());
        let start = pos.min(self.src.len());
        LoglyError::ParseError {
            pos,
            message: message.into(),
            snippet: self.src[start..end].to_string(),
        }
    }

    fn parse_all(mut self) -> Result<Vec<Token>> {
        let mut raw = Vec::new();
        let mut literal = String::new();
        let mut literal_start = self.pos;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'{' if self.peek_is(self.pos + 1, b'{') => {
                    literal.push('{');
                    self.pos += 2;
                }
                b'}' if self.peek_is(self.pos + 1, b'}') => {
                    literal.push('}');
                    self.pos += 2;
                }
                b'{' => {
                    if !literal.is_empty() {
                        raw.push(RawToken::Literal {
                            text: std::mem::take(&mut literal),
                            span: literal_start..self.pos,
                        });
                    }
                    raw.push(self.parse_placeholder()?);
                    literal_start = self.pos;
                }
                b'}' => {
                    return Err(self.err(self.pos, "unmatched '}'"));
                }
                _ => {
                    let start = self.pos;
                    while self.pos < self.bytes.len()
                        && self.bytes[self.pos] != b'{'
                        && self.bytes[self.pos] != b'}'
                    {
                        self.pos += 1;
                    }
                    literal.push_str(&self.src[start..self.pos]);
                }
            }
        }
        if !literal.is_empty() {
            raw.push(RawToken::Literal {
                text: literal,
                span: literal_start..self.pos,
            });
        }
        raw.into_iter().map(|r| self.compile_token(r)).collect()
    }

    fn peek_is(&self, idx: usize, b: u8) -> bool {
        self.bytes.get(idx).copied() == Some(b)
    }

    /// Parses one `{name[:spec]}` starting at `self.pos == '{'`, tracking
    /// brace depth so nested specs survive.
    fn parse_placeholder(&mut self) -> Result<RawToken> {
        let open_pos = self.pos;
        self.pos += 1; // consume '{'
        let name_start = self.pos;
        // Leftover placeholders start with "...".
        if self.src[name_start..].starts_with("...") {
            self.pos = name_start + 3;
        }
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let name = self.src[name_start..self.pos].to_string();
        if name.is_empty() && !self.src[name_start..].starts_with("...") {
            return Err(self.err(open_pos, "empty placeholder name"));
        }
        let spec = if self.peek_is(self.pos, b':') {
            self.pos += 1;
            self.scan_balanced_spec(open_pos)?
        } else {
            String::new()
        };
        if !self.peek_is(self.pos, b'}') {
            return Err(self.err(open_pos, "unterminated placeholder"));
        }
        self.pos += 1; // consume closing '}'
        Ok(RawToken::Placeholder {
            name,
            spec,
            span: open_pos..self.pos,
        })
    }

    /// Scans a placeholder's spec text up to (not including) the closing
    /// `}` that balances the placeholder's opening `{`, respecting nested
    /// `{...}` sub-specs via brace-depth tracking.
    fn scan_balanced_spec(&mut self, open_pos: usize) -> Result<String> {
        let start = self.pos;
        let mut depth = 0i32;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'{' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        if depth != 0 || self.pos >= self.bytes.len() {
            return Err(self.err(open_pos, "unterminated placeholder spec"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn compile_token(&self, raw: RawToken) -> Result<Token> {
        match raw {
            RawToken::Literal { text, span } => Ok(Token::Literal { text, span }),
            RawToken::Placeholder { name, spec, span } => match name.as_str() {
                "message" => Ok(Token::Message { span }),
                "severity" => Ok(Token::Severity { spec, span }),
                "timestamp" => self.compile_timestamp(&spec, span),
                "process" => Ok(Token::Process { spec, span }),
                "thread" => Ok(Token::Thread { spec, span }),
                n if n.starts_with("...") => self.compile_leftover(&spec, span),
                key => self.compile_attribute(key, &spec, span),
            },
        }
    }

    fn compile_timestamp(&self, spec: &str, span: Range<usize>) -> Result<Token> {
        // Grammar: optional `{pattern}` then an optional type letter.
        let (pattern, type_letter) = if let Some(rest) = spec.strip_prefix('{') {
            match rest.find('}') {
                Some(end) => (&rest[..end], rest[end + 1..].trim()),
                None => {
                    return Err(self.err(0, "unterminated timestamp pattern"));
                }
            }
        } else {
            ("%Y-%m-%d %H:%M:%S.%f", spec.trim())
        };
        let kind = match type_letter {
            "d" => TimestampKind::Micros,
            "l" => TimestampKind::Localtime,
            "s" | "" => TimestampKind::Gmtime,
            other => {
                return Err(self.err(0, format!("unknown timestamp type letter '{other}'")));
            }
        };
        let generator = DatetimeGenerator::compile(pattern)?;
        Ok(Token::Timestamp { generator, kind, span })
    }

    fn compile_leftover(&self, spec: &str, span: Range<usize>) -> Result<Token> {
        let mut pattern_src = "{name}: {value}".to_string();
        let mut separator = ", ".to_string();
        let mut rest = spec;
        while let Some(brace) = rest.find('{') {
            let after_open = &rest[brace + 1..];
            let close = balanced_close(after_open).ok_or_else(|| {
                self.err(0, "unterminated leftover sub-spec")
            })?;
            let inner = &after_open[..close];
            let tail = &after_open[close + 1..];
            if let Some(p) = inner.strip_suffix(":p") {
                pattern_src = p.to_string();
            } else if let Some(s) = inner.strip_suffix(":s") {
                separator = s.to_string();
            } else if inner.ends_with(":p") || inner.ends_with(":s") {
                // handled above
            }
            rest = tail;
        }
        let pattern = parse_leftover_pattern(&pattern_src);
        Ok(Token::Leftover { pattern, separator, span })
    }

    fn compile_attribute(&self, key: &str, spec: &str, span: Range<usize>) -> Result<Token> {
        if key.is_empty() {
            return Err(self.err(0, "empty attribute name"));
        }
        let (default, rest_spec) = if let Some(stripped) = spec.strip_prefix('{') {
            match stripped.find("default:") {
                Some(idx) if idx == 0 => {
                    let after = &stripped[idx + "default:".len()..];
                    let close = balanced_close(after)
                        .ok_or_else(|| self.err(0, "unterminated default spec"))?;
                    let default_lit = after[..close].to_string();
                    (Some(default_lit), after[close + 1..].to_string())
                }
                _ => (None, spec.to_string()),
            }
        } else {
            (None, spec.to_string())
        };
        Ok(Token::Attribute {
            key: key.to_string(),
            default,
            spec: rest_spec,
            span,
        })
    }
}

/// Finds the index of the `}` that balances an already-consumed `{`,
/// within `s` (which starts just after that `{`).
fn balanced_close(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

fn parse_leftover_pattern(src: &str) -> LeftoverPattern {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = src.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '{' {
            if src[i..].starts_with("{name}") {
                if !literal.is_empty() {
                    parts.push(LeftoverPart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(LeftoverPart::Name);
                for _ in 0..5 {
                    chars.next();
                }
            } else if src[i..].starts_with("{value}") {
                if !literal.is_empty() {
                    parts.push(LeftoverPart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(LeftoverPart::Value);
                for _ in 0..6 {
                    chars.next();
                }
            } else {
                literal.push(c);
            }
        } else {
            literal.push(c);
        }
    }
    if !literal.is_empty() {
        parts.push(LeftoverPart::Literal(literal));
    }
    LeftoverPattern { parts }
}

impl StringFormatter {
    /// Renders `record` into `out` in a single append-only pass.
    pub fn format(&self, record: &Record<'_>, out: &mut String) -> Result<()> {
        let mut consumed = std::collections::HashSet::new();
        for token in &self.tokens {
            if let Token::Attribute { key, .. } = token {
                consumed.insert(key.as_str());
            }
        }
        for token in &self.tokens {
            match token {
                Token::Literal { text, .. } => out.push_str(text),
                Token::Message { .. } => out.push_str(&record.formatted_message()),
                Token::Severity { spec, .. } => self.render_severity(record.severity(), spec, out),
                Token::Timestamp { generator, kind, .. } => {
                    let micros = record.timestamp().0;
                    match kind {
                        TimestampKind::Micros => {
                            let _ = write!(out, "{micros}");
                        }
                        TimestampKind::Gmtime => {
                            let dt = chrono::DateTime::<chrono::Utc>::from_timestamp_micros(micros)
                                .unwrap_or_default();
                            let tm = BrokenDownTime::from_utc(dt);
                            generator.apply(&tm, out);
                        }
                        TimestampKind::Localtime => {
                            let dt = chrono::DateTime::<chrono::Utc>::from_timestamp_micros(micros)
                                .unwrap_or_default()
                                .with_timezone(&chrono::Local);
                            let tm = BrokenDownTime::from_local(dt);
                            generator.apply(&tm, out);
                        }
                    }
                }
                Token::Process { spec, .. } => {
                    if spec == "s" {
                        out.push_str(
                            &std::env::current_exe()
                                .ok()
                                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                                .unwrap_or_default(),
                        );
                    } else {
                        let _ = write!(out, "{}", record.process_id());
                    }
                }
                Token::Thread { spec, .. } => match spec.as_str() {
                    "s" => out.push_str(record.thread_name().unwrap_or("")),
                    "d" => {
                        let _ = write!(out, "{}", record.thread_id());
                    }
                    _ => {
                        let _ = write!(out, "{:x}", record.thread_id());
                    }
                },
                Token::Leftover { pattern, separator, .. } => {
                    self.render_leftover(record, pattern, separator, &consumed, out);
                }
                Token::Attribute { key, default, .. } => {
                    match record.pack().get(key) {
                        Some(v) => {
                            let _ = v.write_plain(out);
                        }
                        None => match default {
                            Some(d) => out.push_str(d),
                            None => {
                                return Err(LoglyError::AttributeNotFound { key: key.clone() });
                            }
                        },
                    }
                }
            }
        }
        Ok(())
    }

    /// The original pattern string this formatter was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Reconstructs the original pattern from the compiled tokens' source
    /// spans: concatenating each literal run's span and each placeholder's
    /// full `{...}` span, in token order, reproduces the input pattern
    /// exactly (including escaped `{{`/`}}` sequences).
    pub fn reconstruct_pattern(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        for token in &self.tokens {
            out.push_str(&self.source[token.span().clone()]);
        }
        out
    }

    fn render_severity(&self, severity: i32, spec: &str, out: &mut String) {
        if spec == "d" {
            let _ = write!(out, "{severity}");
            return;
        }
        if let Some(map) = &self.severity_map {
            map(severity, spec, out);
        } else {
            let _ = write!(out, "{severity}");
        }
    }

    fn render_leftover(
        &self,
        record: &Record<'_>,
        pattern: &LeftoverPattern,
        separator: &str,
        consumed: &std::collections::HashSet<&str>,
        out: &mut String,
    ) {
        let mut first = true;
        for (key, value) in record.pack().iter(self.unique) {
            if consumed.contains(key) {
                continue;
            }
            if !first {
                out.push_str(separator);
            }
            first = false;
            for part in &pattern.parts {
                match part {
                    LeftoverPart::Literal(l) => out.push_str(l),
                    LeftoverPart::Name => out.push_str(key),
                    LeftoverPart::Value => {
                        let _ = value.write_plain(out);
                    }
                }
            }
        }
    }
}

/// Renders a [`ValueView`] for the leftover placeholder; kept as a free
/// function so the JSON formatter's attribute-collection pass can reuse
/// the same "stringify a function value" fallback.
pub fn render_value_view(value: &ValueView<'_>, out: &mut String) {
    let _ = write_plain(&value.to_owned_value(), out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeList, AttributePack};

    fn record_with<'a>(
        severity: i32,
        message: &'a str,
        pack: AttributePack<'a>,
    ) -> Record<'a> {
        let record = Record::new(severity, message, pack);
        record.activate(|buf| buf.push_str(message));
        record
    }

    #[test]
    fn severity_passthrough_scenario() {
        let fmt = StringFormatterBuilder::new("[{severity:d}]: {message}")
            .build()
            .unwrap();
        let pack = AttributePack::new();
        let record = record_with(0, "value", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        assert_eq!(out, "[0]: value");
    }

    #[test]
    fn thread_scoped_override_scenario() {
        let wrapper_list: &AttributeList = &[("service", ValueView::Str("A"))];
        let frame_list: &AttributeList = &[("service", ValueView::Str("B"))];
        let fmt = StringFormatterBuilder::new("{service}").build().unwrap();

        let mut pack = AttributePack::new();
        pack.push(frame_list);
        pack.push(wrapper_list);
        let record = record_with(0, "msg", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        assert_eq!(out, "B");

        let mut pack2 = AttributePack::new();
        pack2.push(wrapper_list);
        let record2 = record_with(0, "msg", pack2);
        let mut out2 = String::new();
        fmt.format(&record2, &mut out2).unwrap();
        assert_eq!(out2, "A");
    }

    #[test]
    fn leftover_with_custom_pattern_and_separator() {
        let fmt = StringFormatterBuilder::new("{...:{{name}={value}:p}{ | :s}s}")
            .build()
            .unwrap();
        let list: &AttributeList = &[
            ("k1", ValueView::Int(42)),
            ("k2", ValueView::Str("v2")),
        ];
        let mut pack = AttributePack::new();
        pack.push(list);
        let record = record_with(0, "msg", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        assert!(out == "k1=42 | k2=v2" || out == "k2=v2 | k1=42");
    }

    #[test]
    fn leftover_unique_mode_keeps_earliest() {
        let fmt = StringFormatterBuilder::new("{...:{{name}={value}:p}{,:s}s}")
            .unique()
            .build()
            .unwrap();
        let inner: &AttributeList = &[("k1", ValueView::Int(100))];
        let outer: &AttributeList = &[("k1", ValueView::Int(42)), ("k2", ValueView::Str("v2"))];
        let mut pack = AttributePack::new();
        pack.push(inner);
        pack.push(outer);
        let record = record_with(0, "msg", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        assert!(out.contains("k1=100"));
        assert!(!out.contains("k1=42"));
    }

    #[test]
    fn missing_attribute_without_default_errors() {
        let fmt = StringFormatterBuilder::new("{missing}").build().unwrap();
        let pack = AttributePack::new();
        let record = record_with(0, "msg", pack);
        let mut out = String::new();
        let err = fmt.format(&record, &mut out).unwrap_err();
        assert!(matches!(err, LoglyError::AttributeNotFound { .. }));
    }

    #[test]
    fn attribute_with_default_falls_back() {
        let fmt = StringFormatterBuilder::new("{missing:{default:fallback}}")
            .build()
            .unwrap();
        let pack = AttributePack::new();
        let record = record_with(0, "msg", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        assert_eq!(out, "fallback");
    }

    #[test]
    fn escaped_braces_round_trip() {
        let fmt = StringFormatterBuilder::new("{{literal}} {message}")
            .build()
            .unwrap();
        let pack = AttributePack::new();
        let record = record_with(0, "x", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        assert_eq!(out, "{literal} x");
    }

    #[test]
    fn bare_closing_brace_is_ill_formed() {
        let err = StringFormatterBuilder::new("oops}").build().unwrap_err();
        assert!(matches!(err, LoglyError::ParseError { .. }));
    }

    #[test]
    fn reconstruct_pattern_recovers_the_original_source() {
        let pattern = "{...:{{name}={value}:p}{,:s}s} {missing:{default:x}} {{brace}}";
        let fmt = StringFormatterBuilder::new(pattern).build().unwrap();
        assert_eq!(fmt.reconstruct_pattern(), pattern);
    }

    #[test]
    fn timestamp_default_pattern_microseconds() {
        let fmt = StringFormatterBuilder::new("{timestamp}").build().unwrap();
        let pack = AttributePack::new();
        let record = record_with(0, "msg", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        // gmtime-formatted default pattern ends in 6-digit microseconds.
        let frac = out.rsplit('.').next().unwrap();
        assert_eq!(frac.len(), 6);
    }
}
