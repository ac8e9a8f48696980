// Embedded descriptors and their string views.
//
// A descriptor is the JSON object stored in a song's comment tag. It can be
// read two ways behind the same `DescriptorLookup` interface: a structured
// parse into an ordered map, or a best-effort raw scan of the payload text
// for `"Key":"value"` pairs, used when the payload does not parse.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Field-level string access over a descriptor. Missing fields read as "".
pub trait DescriptorLookup {
    fn field(&self, key: &str) -> String;
}

/// Render a JSON value the way descriptors store it
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Extract the quoted value for `key` from unparsed descriptor text.
///
/// Only `"key":"value"` with no whitespace around the colon is recognised, so
/// numeric, null and spaced entries read as "".
pub fn get_raw(text: &str, key: &str) -> String {
    let needle = format!("\"{}\":\"", key);
    let mut rest = text;
    while let Some(at) = rest.find(&needle) {
        rest = &rest[at + needle.len()..];
        if let Some(end) = rest.find(|c: char| c == '"' || c == '\n') {
            if rest[end..].starts_with('"') {
                return rest[..end].to_string();
            }
        }
    }
    String::new()
}

/// Parsed descriptor: an insertion-ordered JSON object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Descriptor {
    fields: Map<String, Value>,
}

impl Descriptor {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Parse payload text. Anything other than a JSON object is rejected.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(fields)) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Merge another descriptor into this one; its keys win
    pub fn merge(&mut self, other: Descriptor) {
        for (key, value) in other.fields {
            self.fields.insert(key, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Compact single-line JSON, non-ASCII kept as-is
    pub fn to_payload(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

impl DescriptorLookup for Descriptor {
    fn field(&self, key: &str) -> String {
        self.fields.get(key).map(value_to_string).unwrap_or_default()
    }
}

/// Unparsed payload text read through [`get_raw`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDescriptor(String);

impl RawDescriptor {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DescriptorLookup for RawDescriptor {
    fn field(&self, key: &str) -> String {
        get_raw(&self.0, key)
    }
}

/// What a local file currently carries in its comment tag
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedDescriptor {
    Parsed(Descriptor),
    Raw(RawDescriptor),
    Absent,
}

impl EmbeddedDescriptor {
    /// Classify a payload: structured when it parses, raw scan otherwise
    pub fn from_payload(payload: Option<&str>) -> Self {
        match payload.map(str::trim) {
            None | Some("") => EmbeddedDescriptor::Absent,
            Some(text) => match Descriptor::parse(text) {
                Some(descriptor) => EmbeddedDescriptor::Parsed(descriptor),
                None => EmbeddedDescriptor::Raw(RawDescriptor::new(text)),
            },
        }
    }

    /// Structured form, if one exists
    pub fn descriptor(&self) -> Option<&Descriptor> {
        match self {
            EmbeddedDescriptor::Parsed(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, EmbeddedDescriptor::Absent)
    }
}

impl DescriptorLookup for EmbeddedDescriptor {
    fn field(&self, key: &str) -> String {
        match self {
            EmbeddedDescriptor::Parsed(d) => d.field(key),
            EmbeddedDescriptor::Raw(r) => r.field(key),
            EmbeddedDescriptor::Absent => String::new(),
        }
    }
}

/// A remote record with every value coerced to a string, in record order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRecord {
    fields: Vec<(String, String)>,
}

impl NormalizedRecord {
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The descriptor this record is written back as
    pub fn to_descriptor(&self) -> Descriptor {
        let fields = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Descriptor::new(fields)
    }

    pub fn to_payload(&self) -> String {
        self.to_descriptor().to_payload()
    }
}

/// First number in free text, used for version strings like "v2" or "1.5b"
pub fn leading_number(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    let re = NUMBER
        .get_or_init(|| Regex::new(r"[-+]?\d*\.\d+|\d+").ok())
        .as_ref()?;
    re.find(text).and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SOUND_OF_SILENCE: &str = r#"{"Date":"2023-04-26","Title":"Sound of Silence","Artist":"Disturbed","CoverArtist":"Neuro","Version":"1","Discnumber":"1","Track":"89/98","Comment":"None","Special":"0","xxHash":"1234"}"#;

    #[test]
    fn test_get_raw_known_keys() {
        assert_eq!(get_raw(SOUND_OF_SILENCE, "Title"), "Sound of Silence");
        assert_eq!(get_raw(SOUND_OF_SILENCE, "Artist"), "Disturbed");
        assert_eq!(get_raw(SOUND_OF_SILENCE, "Version"), "1");
        assert_eq!(get_raw(SOUND_OF_SILENCE, "xxHash"), "1234");
        assert_eq!(get_raw(SOUND_OF_SILENCE, "NonExistentKey"), "");
        assert_eq!(get_raw(SOUND_OF_SILENCE, "Sound of Silence"), "");
    }

    #[test]
    fn test_get_raw_edge_cases() {
        assert_eq!(get_raw(r#"{"Special":"0"}"#, "Special"), "0");
        assert_eq!(get_raw(r#"{"Special": 0}"#, "Special"), "");
        assert_eq!(get_raw(r#"{"Comment":""}"#, "Comment"), "");
        assert_eq!(get_raw(r#"{"Empty":null}"#, "Empty"), "");
        assert_eq!(get_raw(r#"{"Empty": null}"#, "Empty"), "");
    }

    #[test]
    fn test_get_raw_long_value_with_quotes() {
        let text = r#"{"Title":"It's Been So Long","Comment":"I said 'hey Pb, it only says 2023!'","xxHash":"f3395adc789baf3b"}"#;
        assert_eq!(get_raw(text, "Title"), "It's Been So Long");
        assert_eq!(get_raw(text, "xxHash"), "f3395adc789baf3b");
    }

    #[test]
    fn test_get_raw_key_is_literal() {
        assert_eq!(get_raw(r#"{"a.b":"x","aXb":"y"}"#, "a.b"), "x");
        assert_eq!(get_raw(r#"{"aXb":"y"}"#, "a.b"), "");
    }

    #[test]
    fn test_get_raw_damaged_payloads() {
        assert_eq!(get_raw("{\"Title\":\"unterminated", "Title"), "");
        assert_eq!(get_raw("{\"Title\":\"split\nline\",\"Title\":\"whole\"}", "Title"), "whole");
    }

    #[test]
    fn test_structured_and_raw_views_agree_on_strings() {
        let parsed = EmbeddedDescriptor::from_payload(Some(SOUND_OF_SILENCE));
        assert!(matches!(parsed, EmbeddedDescriptor::Parsed(_)));
        let raw = RawDescriptor::new(SOUND_OF_SILENCE);
        for key in ["Title", "Track", "xxHash", "Missing"] {
            assert_eq!(parsed.field(key), raw.field(key));
        }
    }

    #[test]
    fn test_structured_view_renders_non_strings() {
        let d = Descriptor::parse(r#"{"Special":0,"Empty":null,"Flag":true,"Version":1.5}"#).unwrap();
        assert_eq!(d.field("Special"), "0");
        assert_eq!(d.field("Empty"), "");
        assert_eq!(d.field("Flag"), "true");
        assert_eq!(d.field("Version"), "1.5");
    }

    #[test]
    fn test_payload_classification() {
        assert!(EmbeddedDescriptor::from_payload(None).is_absent());
        assert!(EmbeddedDescriptor::from_payload(Some("  ")).is_absent());
        let truncated = EmbeddedDescriptor::from_payload(Some(r#"{"xxHash":"abc","Title":"Cut"#));
        assert!(matches!(truncated, EmbeddedDescriptor::Raw(_)));
        assert_eq!(truncated.field("xxHash"), "abc");
        assert!(EmbeddedDescriptor::from_payload(Some("[1,2]")).descriptor().is_none());
    }

    #[test]
    fn test_normalized_record_keeps_order_and_coerces() {
        let fields = json!({"xxHash": "1234", "Version": 2, "Title": "Song", "Rate": 1.5})
            .as_object()
            .cloned()
            .unwrap();
        let record = NormalizedRecord::from_fields(&fields);
        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["xxHash", "Version", "Title", "Rate"]);
        assert_eq!(record.get("Version"), Some("2"));
        assert_eq!(record.get("Rate"), Some("1.5"));
        assert_eq!(
            record.to_payload(),
            r#"{"xxHash":"1234","Version":"2","Title":"Song","Rate":"1.5"}"#
        );
    }

    #[test]
    fn test_payload_keeps_non_ascii() {
        let mut d = Descriptor::default();
        d.insert("Title", Value::String("Café ♪".into()));
        assert_eq!(d.to_payload(), r#"{"Title":"Café ♪"}"#);
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("v2"), Some(2.0));
        assert_eq!(leading_number("1.5b"), Some(1.5));
        assert_eq!(leading_number("none"), None);
    }
}
