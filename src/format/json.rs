//! JSON formatter: renders a record as one `serde_json` object per line.

use serde_json::{Map, Value as Json};

use crate::attribute::ValueView;
use crate::datetime::{BrokenDownTime, DatetimeGenerator};
use crate::error::{LoglyError, Result};
use crate::record::Record;

/// How the `timestamp` field is rendered.
enum TimestampRender {
    /// Raw microseconds-since-epoch integer.
    Micros,
    /// A compiled datetime pattern, in UTC or local time.
    Pattern { generator: DatetimeGenerator, local: bool },
}

/// Maps a severity integer to its JSON representation. Defaults to a
/// bare number when unset.
pub type SeverityMapFn = Box<dyn Fn(i32) -> Json + Send + Sync>;

/// A compiled JSON formatter.
pub struct JsonFormatter {
    routes: Vec<(Vec<String>, Vec<String>)>,
    renames: Vec<(String, String)>,
    unique: bool,
    newline: bool,
    timestamp: TimestampRender,
    severity_map: Option<SeverityMapFn>,
}

/// Builder for [`JsonFormatter`].
#[derive(Default)]
pub struct JsonFormatterBuilder {
    routes: Vec<(Vec<String>, Vec<String>)>,
    renames: Vec<(String, String)>,
    unique: bool,
    newline: bool,
    pattern: Option<(String, bool)>,
    severity_map: Option<SeverityMapFn>,
}

impl JsonFormatterBuilder {
    /// A builder with all defaults: standard field names, micros
    /// timestamp, no routing, no dedup.
    pub fn new() -> Self {
        JsonFormatterBuilder::default()
    }

    /// Registers an old-name -> new-name rename, applied as a final pass
    /// over every object key (top-level standard fields, attributes, and
    /// routed keys alike) right before serialization. Repeatable: each
    /// call adds one more entry to the rename map.
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.push((from.into(), to.into()));
        self
    }

    /// Routes every key in `keys` under the nested object path described
    /// by `path` (`/`-separated, e.g. `/fields/external`) instead of the
    /// record's top level. A routed key keeps its own name as the leaf
    /// field; only its container changes. Keys not named in any route
    /// stay at the root.
    pub fn route(mut self, path: impl AsRef<str>, keys: &[&str]) -> Self {
        let segments: Vec<String> = path
            .as_ref()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        self.routes
            .push((segments, keys.iter().map(|s| s.to_string()).collect()));
        self
    }

    /// Enables unique mode: a later duplicate of an already-seen
    /// attribute key is suppressed.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Appends a single `\n` after each record's JSON object.
    pub fn newline(mut self) -> Self {
        self.newline = true;
        self
    }

    /// Renders `timestamp` via a compiled strftime-like pattern instead
    /// of the default raw microseconds integer.
    pub fn timestamp_pattern(mut self, pattern: impl Into<String>, local: bool) -> Self {
        self.pattern = Some((pattern.into(), local));
        self
    }

    /// Registers a custom severity-to-JSON mapping.
    pub fn severity_mapping(mut self, f: impl Fn(i32) -> Json + Send + Sync + 'static) -> Self {
        self.severity_map = Some(Box::new(f));
        self
    }

    /// Compiles the formatter, parsing any timestamp pattern.
    pub fn build(self) -> Result<JsonFormatter> {
        let timestamp = match self.pattern {
            Some((pattern, local)) => TimestampRender::Pattern {
                generator: DatetimeGenerator::compile(&pattern)?,
                local,
            },
            None => TimestampRender::Micros,
        };
        Ok(JsonFormatter {
            routes: self.routes,
            renames: self.renames,
            unique: self.unique,
            newline: self.newline,
            timestamp,
            severity_map: self.severity_map,
        })
    }
}

impl JsonFormatter {
    /// Renders `record` as a single-line JSON object appended to `out`.
    pub fn format(&self, record: &Record<'_>, out: &mut String) -> Result<()> {
        let mut root = Map::new();
        root.insert("message".to_string(), Json::String(record.formatted_message().clone()));
        root.insert("severity".to_string(), self.render_severity(record.severity()));
        root.insert("timestamp".to_string(), self.render_timestamp(record));
        root.insert("process".to_string(), Json::from(record.process_id()));
        root.insert(
            "thread".to_string(),
            match record.thread_name() {
                Some(name) => Json::String(name.to_string()),
                None => Json::from(record.thread_id()),
            },
        );

        for (key, view) in record.pack().iter(self.unique) {
            let value = value_to_json(&view);
            match self.routes.iter().find(|(_, keys)| keys.iter().any(|k| k == key)) {
                Some((path, _)) => insert_nested(&mut root, path, key, value),
                None => {
                    root.insert(key.to_string(), value);
                }
            }
        }

        if !self.renames.is_empty() {
            apply_renames(&mut root, &self.renames);
        }

        serde_json::to_writer(StringWriter(out), &Json::Object(root))
            .map_err(|e| LoglyError::SystemError { message: e.to_string(), code: None })?;
        if self.newline {
            out.push('\n');
        }
        Ok(())
    }

    fn render_severity(&self, severity: i32) -> Json {
        match &self.severity_map {
            Some(map) => map(severity),
            None => Json::from(severity),
        }
    }

    fn render_timestamp(&self, record: &Record<'_>) -> Json {
        match &self.timestamp {
            TimestampRender::Micros => Json::from(record.timestamp().0),
            TimestampRender::Pattern { generator, local } => {
                let micros = record.timestamp().0;
                let mut buf = String::new();
                if *local {
                    let dt = chrono::DateTime::<chrono::Utc>::from_timestamp_micros(micros)
                        .unwrap_or_default()
                        .with_timezone(&chrono::Local);
                    generator.apply(&BrokenDownTime::from_local(dt), &mut buf);
                } else {
                    let dt = chrono::DateTime::<chrono::Utc>::from_timestamp_micros(micros)
                        .unwrap_or_default();
                    generator.apply(&BrokenDownTime::from_utc(dt), &mut buf);
                }
                Json::String(buf)
            }
        }
    }
}

fn value_to_json(view: &ValueView<'_>) -> Json {
    match view {
        ValueView::Null => Json::Null,
        ValueView::Bool(b) => Json::Bool(*b),
        ValueView::Int(i) => Json::from(*i),
        ValueView::Uint(u) => Json::from(*u),
        ValueView::Double(d) => serde_json::Number::from_f64(*d).map(Json::Number).unwrap_or(Json::Null),
        ValueView::Str(s) => Json::String((*s).to_string()),
        ValueView::Function(f) => {
            let mut rendered = String::new();
            let _ = f(&mut rendered);
            Json::String(rendered)
        }
    }
}

/// Nests `value` under `path` (already split into segments), keyed by
/// `leaf` (the attribute's own name) at the bottom of the path. An empty
/// `path` nests nowhere, leaving `leaf` at the level `root` represents.
fn insert_nested(root: &mut Map<String, Json>, path: &[String], leaf: &str, value: Json) {
    let mut cursor = root;
    for segment in path {
        let entry = cursor
            .entry(segment.clone())
            .or_insert_with(|| Json::Object(Map::new()));
        if !entry.is_object() {
            *entry = Json::Object(Map::new());
        }
        cursor = entry.as_object_mut().expect("just normalized to an object");
    }
    cursor.insert(leaf.to_string(), value);
}

/// Applies every `(from, to)` rename pair to every object key found while
/// walking `root`, at any depth: top-level standard fields, attributes
/// left at the root, and the leaves of a routed subtree are all renamed
/// by the same pass. Per spec, renames apply "after collection" — this
/// runs once, after every field and attribute has already been inserted.
fn apply_renames(root: &mut Map<String, Json>, renames: &[(String, String)]) {
    let keys: Vec<String> = root.keys().cloned().collect();
    for key in keys {
        if let Some((_, to)) = renames.iter().find(|(from, _)| from == &key) {
            if let Some(value) = root.remove(&key) {
                root.insert(to.clone(), value);
            }
        }
    }
    for value in root.values_mut() {
        if let Json::Object(nested) = value {
            apply_renames(nested, renames);
        }
    }
}

/// Adapts `&mut String` to `std::io::Write` so `serde_json::to_writer` can
/// append directly into the formatter's output buffer without an extra
/// intermediate `Vec<u8>`.
struct StringWriter<'a>(&'a mut String);

impl std::io::Write for StringWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let s = std::str::from_utf8(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.0.push_str(s);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
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
    fn renders_standard_fields_and_attributes() {
        let fmt = JsonFormatterBuilder::new().build().unwrap();
        let list: &AttributeList = &[("user_id", ValueView::Int(7))];
        let mut pack = AttributePack::new();
        pack.push(list);
        let record = activated_record(2, "hello", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        let parsed: Json = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["message"], Json::String("hello".to_string()));
        assert_eq!(parsed["severity"], Json::from(2));
        assert_eq!(parsed["user_id"], Json::from(7));
    }

    #[test]
    fn field_rename_changes_keys() {
        let fmt = JsonFormatterBuilder::new()
            .rename("message", "msg")
            .rename("severity", "lvl")
            .build()
            .unwrap();
        let record = activated_record(1, "x", AttributePack::new());
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        let parsed: Json = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["msg"], Json::String("x".to_string()));
        assert_eq!(parsed["lvl"], Json::from(1));
        assert!(parsed.get("message").is_none());
    }

    #[test]
    fn routed_attribute_nests_under_path() {
        let fmt = JsonFormatterBuilder::new()
            .route("/user", &["user_id"])
            .build()
            .unwrap();
        let list: &AttributeList = &[("user_id", ValueView::Int(9))];
        let mut pack = AttributePack::new();
        pack.push(list);
        let record = activated_record(0, "x", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        let parsed: Json = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["user"]["user_id"], Json::from(9));
    }

    #[test]
    fn route_plus_rename_matches_spec_scenario_4() {
        // spec.md §8 scenario 4: rename("message", "@message") +
        // route("/fields", {"endpoint"}).
        let fmt = JsonFormatterBuilder::new()
            .rename("message", "@message")
            .route("/fields", &["endpoint"])
            .build()
            .unwrap();
        let list: &AttributeList = &[("endpoint", ValueView::Str("127.0.0.1:8080"))];
        let mut pack = AttributePack::new();
        pack.push(list);
        let record = activated_record(0, "value", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        let parsed: Json = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["@message"], Json::String("value".to_string()));
        assert_eq!(parsed["fields"]["endpoint"], Json::String("127.0.0.1:8080".to_string()));
        assert!(parsed.get("message").is_none());
    }

    #[test]
    fn unique_mode_drops_shadowed_duplicate() {
        let fmt = JsonFormatterBuilder::new().unique().build().unwrap();
        let inner: &AttributeList = &[("k", ValueView::Int(1))];
        let outer: &AttributeList = &[("k", ValueView::Int(2))];
        let mut pack = AttributePack::new();
        pack.push(inner);
        pack.push(outer);
        let record = activated_record(0, "x", pack);
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        let parsed: Json = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["k"], Json::from(1));
    }

    #[test]
    fn newline_option_appends_exactly_one_trailing_newline() {
        let fmt = JsonFormatterBuilder::new().newline().build().unwrap();
        let record = activated_record(0, "x", AttributePack::new());
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        assert!(out.ends_with("}\n"));
        assert_eq!(out.matches('\n').count(), 1);
    }

    #[test]
    fn timestamp_pattern_renders_as_string() {
        let fmt = JsonFormatterBuilder::new()
            .timestamp_pattern("%Y-%m-%d", false)
            .build()
            .unwrap();
        let record = activated_record(0, "x", AttributePack::new());
        let mut out = String::new();
        fmt.format(&record, &mut out).unwrap();
        let parsed: Json = serde_json::from_str(&out).unwrap();
        assert!(parsed["timestamp"].is_string());
    }
}
