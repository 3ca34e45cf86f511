//! TSKV formatter: the tab-separated key=value sibling of the JSON
//! formatter, as used by some log shippers in place of JSON lines.

use std::fmt::Write as _;

use crate::attribute::ValueView;
use crate::datetime::{BrokenDownTime, DatetimeGenerator};
use crate::error::Result;
use crate::record::Record;

enum TimestampRender {
    Micros,
    Pattern { generator: DatetimeGenerator, local: bool },
}

struct FieldNames {
    message: String,
    timestamp: String,
    severity: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        FieldNames {
            message: "message".to_string(),
            timestamp: "timestamp".to_string(),
            severity: "severity".to_string(),
        }
    }
}

/// A compiled TSKV formatter.
pub struct TskvFormatter {
    fields: FieldNames,
    unique: bool,
    timestamp: TimestampRender,
}

/// Builder for [`TskvFormatter`].
#[derive(Default)]
pub struct TskvFormatterBuilder {
    fields: FieldNames,
    unique: bool,
    pattern: Option<(String, bool)>,
}

impl TskvFormatterBuilder {
    /// A builder with standard field names and a raw-microseconds timestamp.
    pub fn new() -> Self {
        TskvFormatterBuilder::default()
    }

    /// Renames the `message` field.
    pub fn rename_message(mut self, name: impl Into<String>) -> Self {
        self.fields.message = name.into();
        self
    }

    /// Renames the `timestamp` field.
    pub fn rename_timestamp(mut self, name: impl Into<String>) -> Self {
        self.fields.timestamp = name.into();
        self
    }

    /// Renames the `severity` field.
    pub fn rename_severity(mut self, name: impl Into<String>) -> Self {
        self.fields.severity = name.into();
        self
    }

    /// Enables unique mode: a later duplicate of an already-seen
    /// attribute key is suppressed.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Renders `timestamp` via a compiled strftime-like pattern instead
    /// of the default raw microseconds integer.
    pub fn timestamp_pattern(mut self, pattern: impl Into<String>, local: bool) -> Self {
        self.pattern = Some((pattern.into(), local));
        self
    }

    /// Compiles the formatter, parsing any timestamp pattern.
    pub fn build(self) -> Result<TskvFormatter> {
        let timestamp = match self.pattern {
            Some((pattern, local)) => TimestampRender::Pattern {
                generator: DatetimeGenerator::compile(&pattern)?,
                local,
            },
            None => TimestampRender::Micros,
        };
        Ok(TskvFormatter {
            fields: self.fields,
            unique: self.unique,
            timestamp,
        })
    }
}

impl TskvFormatter {
    /// Renders `record` as one `tskv\tk=v\t...` line (without a trailing
    /// newline; sinks own line termination) appended to `out`.
    pub fn format(&self, record: &Record<'_>, out: &mut String) -> Result<()> {
        out.push_str("tskv");
        write_pair(out, &self.fields.message, record.formatted_message().as_str());
        let mut severity_buf = String::new();
        let _ = write!(severity_buf, "{}", record.severity());
        write_pair(out, &self.fields.severity, &severity_buf);

        let mut ts_buf = String::new();
        self.render_timestamp(record, &mut ts_buf);
        write_pair(out, &self.fields.timestamp, &ts_buf);

        for (key, view) in record.pack().iter(self.unique) {
            let mut value_buf = String::new();
            let _ = view.write_plain(&mut value_buf);
            write_pair(out, key, &value_buf);
        }
        Ok(())
    }

    fn render_timestamp(&self, record: &Record<'_>, buf: &mut String) {
        match &self.timestamp {
            TimestampRender::Micros => {
                let _ = write!(buf, "{}", record.timestamp().0);
            }
            TimestampRender::Pattern { generator, local } => {
                let micros = record.timestamp().0;
                if *local {
                    let dt = chrono::DateTime::<chrono::Utc>::from_timestamp_micros(micros)
                        .unwrap_or_default()
                        .with_timezone(&chrono::Local);
                    generator.apply(&BrokenDownTime::from_local(dt), buf);
                } else {
                    let dt = chrono::DateTime::<chrono::Utc>::from_timestamp_micros(micros)
                        .unwrap_or_default();
                    generator.apply(&BrokenDownTime::from_utc(dt), buf);
                }
            }
        }
    }
}

fn write_pair(out: &mut String, key: &str, value: &str) {
    out.push('\t');
    escape_into(out, key);
    out.push('=');
    escape_into(out, value);
}

/// Escapes `\t`, `\n`, and `\\`, the three bytes that would otherwise
/// break TSKV's field/record delimiting.
fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeList, AttributePack};

    fn activated_record<'a>(severity: i32, message: &'a str, pack: AttributePack<'a>) -> Record<'a> {
        let record = Record::new(severity, message, pack);
        record.activate(|buf| buf.push_str(message));
        record
    }

    #[test]
    fn renders_tab_separated_pairs_with_tskv_header() {
        let fmt = TskvFormatterBuilder::new().build().unwrap();
        let list: &AttributeList = &[("k", ValueView::Int(1))];
        let mut pack = AttributePack::new();
        pack.push(list);
        let record = activated_record(0, "hello", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        assert!(out.starts_with("tskv\tmessage=hello\tseverity=0\t"));
        assert!(out.ends_with("k=1"));
    }

    #[test]
    fn escapes_tabs_newlines_and_backslashes_in_values() {
        let fmt = TskvFormatterBuilder::new().build().unwrap();
        let record = activated_record(0, "line one\tline two\\three\nfour", AttributePack::new());
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        assert!(out.contains("line one\\tline two\\\\three\\nfour"));
        assert!(!out.contains('\n'));
    }

    #[test]
    fn field_rename_changes_keys() {
        let fmt = TskvFormatterBuilder::new().rename_message("msg").build().unwrap();
        let record = activated_record(0, "x", AttributePack::new());
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        assert!(out.contains("msg=x"));
        assert!(!out.contains("message="));
    }
}
