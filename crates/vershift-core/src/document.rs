//! Structured document parsing.
//!
//! Decodes JSON, YAML, and TOML text into a single [`Value`] tree so the
//! rest of the crate never has to care which format a manifest was written
//! in.
//!
//! # Example
//! ```
//! use vershift_core::document::{self, Value};
//!
//! let tree = document::parse("version = \"1.2.3\"", "toml").unwrap();
//! assert_eq!(tree.get("version"), Some(&Value::String("1.2.3".into())));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use camino::Utf8Path;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use thiserror::Error;
use tracing::{debug, instrument};

/// Key the `toml` deserializer uses to smuggle datetimes through serde.
const TOML_DATETIME_FIELD: &str = "$__toml_private_datetime";

/// Indicator used when a file name ends in a bare `.`.
const DEFAULT_INDICATOR: &str = "json";

/// Errors from document parsing.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The format indicator is not one of `json`, `yaml`, `yml`, `toml`.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The content is not valid for its format.
    #[error("failed to parse {format}: {message}")]
    Parse {
        /// Format the content was parsed as.
        format: Format,
        /// Diagnostic from the underlying parser.
        message: String,
    },
}

/// Result alias for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// A supported document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// JSON (`.json`).
    Json,
    /// YAML (`.yaml`, `.yml`).
    Yaml,
    /// TOML (`.toml`).
    Toml,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
            Self::Toml => write!(f, "toml"),
        }
    }
}

impl FromStr for Format {
    type Err = DocumentError;

    fn from_str(indicator: &str) -> Result<Self, Self::Err> {
        match indicator.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            _ => Err(DocumentError::UnsupportedFormat(indicator.to_string())),
        }
    }
}

impl Format {
    /// Determine the format of a file from its name.
    pub fn from_path(path: &Utf8Path) -> DocumentResult<Self> {
        format_indicator(path).parse()
    }

    /// Decode `content` in this format.
    pub fn parse(self, content: &str) -> DocumentResult<Value> {
        let parsed = match self {
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_saphyr::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| DocumentError::Parse {
            format: self,
            message,
        })
    }
}

/// The format indicator for a path: the text after the last `.` in the file
/// name.
///
/// A name ending in `.` yields `json`. A name with no `.` at all is returned
/// whole, so it surfaces verbatim in the unsupported-format error.
pub fn format_indicator(path: &Utf8Path) -> &str {
    let name = path.file_name().unwrap_or(path.as_str());
    match name.rsplit_once('.') {
        Some((_, "")) => DEFAULT_INDICATOR,
        Some((_, ext)) => ext,
        None => name,
    }
}

/// Parse `content` using the format named by `indicator`.
#[instrument(skip(content), fields(len = content.len()))]
pub fn parse(content: &str, indicator: &str) -> DocumentResult<Value> {
    let format: Format = indicator.parse()?;
    let value = format.parse(content)?;
    debug!(%format, "document parsed");
    Ok(value)
}

/// A parsed document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null`, `~`, or an empty YAML node.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer. Wide enough for every `i64` and `u64`.
    Integer(i128),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
    /// An ordered list.
    Sequence(Vec<Value>),
    /// A keyed mapping. Non-string keys are stored by their textual form.
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    /// Look up a key in a mapping, or an index in a sequence.
    ///
    /// Returns `None` for scalars, missing keys, and out-of-range indices.
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Mapping(map) => map.get(key),
            Self::Sequence(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Textual form of a scalar. `None` for `Null` and containers.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Null | Self::Sequence(_) | Self::Mapping(_) => None,
        }
    }

    /// Whether this is a mapping or a sequence.
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Sequence(_) | Self::Mapping(_))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON, YAML, or TOML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Integer(v.into()))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }

    fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = BTreeMap::new();
        while let Some(MapKey(key)) = map.next_key()? {
            let value: Value = map.next_value()?;
            if key == TOML_DATETIME_FIELD
                && entries.is_empty()
                && let Value::String(datetime) = value
            {
                return Ok(Value::String(datetime));
            }
            entries.insert(key, value);
        }
        Ok(Value::Mapping(entries))
    }
}

/// A mapping key in textual form, whatever scalar type the source used.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MapKeyVisitor)
    }
}

struct MapKeyVisitor;

impl Visitor<'_> for MapKeyVisitor {
    type Value = MapKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar mapping key")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<MapKey, E> {
        Ok(MapKey(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<MapKey, E> {
        Ok(MapKey("null".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version_of(value: &Value) -> Option<String> {
        value.get("version").and_then(Value::as_text)
    }

    #[test]
    fn parses_json() {
        let value = parse(r#"{"version": "1.2.3"}"#, "json").unwrap();
        assert_eq!(version_of(&value).as_deref(), Some("1.2.3"));
    }

    #[test]
    fn parses_yaml_and_yml() {
        for ext in ["yaml", "yml"] {
            let value = parse("version: 1.2.3\n", ext).unwrap();
            assert_eq!(version_of(&value).as_deref(), Some("1.2.3"), "{ext}");
        }
    }

    #[test]
    fn parses_toml() {
        let value = parse("version = \"1.2.3\"\n", "toml").unwrap();
        assert_eq!(version_of(&value).as_deref(), Some("1.2.3"));
    }

    #[test]
    fn indicator_is_case_insensitive() {
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("Yml".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("TOML".parse::<Format>().unwrap(), Format::Toml);
    }

    #[test]
    fn unsupported_format_names_the_indicator() {
        for ext in ["xml", "ini", "", "jsonc", "Makefile"] {
            let err = parse("{}", ext).unwrap_err();
            assert!(matches!(err, DocumentError::UnsupportedFormat(_)));
            assert!(err.to_string().contains(ext), "{err}");
        }
    }

    #[test]
    fn malformed_content_is_a_parse_error() {
        let err = parse("{not json", "json").unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Parse {
                format: Format::Json,
                ..
            }
        ));

        let err = parse("version = ", "toml").unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Parse {
                format: Format::Toml,
                ..
            }
        ));
    }

    #[test]
    fn indicator_comes_from_file_name() {
        assert_eq!(format_indicator(Utf8Path::new("package.json")), "json");
        assert_eq!(format_indicator(Utf8Path::new("./a.b/Chart.YAML")), "YAML");
        assert_eq!(format_indicator(Utf8Path::new(".config.toml")), "toml");
        assert_eq!(format_indicator(Utf8Path::new("weird.")), "json");
        assert_eq!(format_indicator(Utf8Path::new("dir/Makefile")), "Makefile");
    }

    #[test]
    fn from_path_rejects_unknown_extension() {
        let err = Format::from_path(Utf8Path::new("setup.cfg")).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file format: cfg");
    }

    #[test]
    fn numbers_and_booleans_keep_their_type() {
        let value = parse(r#"{"a": 5, "b": 1.5, "c": true, "d": null}"#, "json").unwrap();
        assert_eq!(value.get("a"), Some(&Value::Integer(5)));
        assert_eq!(value.get("b"), Some(&Value::Float(1.5)));
        assert_eq!(value.get("c"), Some(&Value::Bool(true)));
        assert_eq!(value.get("d"), Some(&Value::Null));
    }

    #[test]
    fn large_unsigned_integers_are_lossless() {
        let value = parse(r#"{"n": 18446744073709551615}"#, "json").unwrap();
        assert_eq!(value.get("n"), Some(&Value::Integer(u64::MAX.into())));
    }

    #[test]
    fn yaml_non_string_keys_are_textual() {
        let value = parse("1: one\ntrue: yes\n", "yaml").unwrap();
        assert_eq!(value.get("1"), Some(&Value::String("one".into())));
        assert!(value.get("true").is_some());
    }

    #[test]
    fn toml_datetime_becomes_string() {
        let value = parse("released = 1979-05-27T07:32:00Z\n", "toml").unwrap();
        assert_eq!(
            value.get("released"),
            Some(&Value::String("1979-05-27T07:32:00Z".into()))
        );
    }

    #[test]
    fn sequences_are_indexable() {
        let value = parse(r#"{"tags": ["a", "b"]}"#, "json").unwrap();
        let tags = value.get("tags").unwrap();
        assert_eq!(tags.get("1"), Some(&Value::String("b".into())));
        assert_eq!(tags.get("2"), None);
        assert_eq!(tags.get("x"), None);
    }

    #[test]
    fn float_text_drops_trailing_zero() {
        assert_eq!(Value::Float(1.0).as_text().as_deref(), Some("1"));
        assert_eq!(Value::Float(2.5).as_text().as_deref(), Some("2.5"));
    }
}
