//! Field type descriptors.
//!
//! A [`DataType`] is read from a restricted JSON-Schema vocabulary: `type`,
//! `format`, `items`, `prefixItems`, `allOf`/`anyOf`/`oneOf`, `maxLength` and
//! `minLength`. Everything else in a schema document is ignored.

use std::fmt;
use std::str::FromStr;

use serde_json::Value as JsonValue;

use crate::config::{DEFAULT_LOCALE, DEFAULT_TIME_ZONE};
use crate::error::{SchemaError, SchemaResult};
use crate::types::temporal::TemporalKind;

/// Maximum nesting accepted by [`DataType::from_schema_document`].
pub const MAX_SCHEMA_DEPTH: usize = 64;

const DEFAULT_ENCODING: &str = "UTF-8";

// =============================================================================
// Primitive kinds
// =============================================================================

/// JSON-Schema primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveKind {
    Number,
    Integer,
    #[default]
    String,
    Boolean,
    Array,
    Object,
    Null,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Number => "number",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::String => "string",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Array => "array",
            PrimitiveKind::Object => "object",
            PrimitiveKind::Null => "null",
        }
    }
}

impl FromStr for PrimitiveKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(PrimitiveKind::Number),
            "integer" => Ok(PrimitiveKind::Integer),
            "string" => Ok(PrimitiveKind::String),
            "boolean" => Ok(PrimitiveKind::Boolean),
            "array" => Ok(PrimitiveKind::Array),
            "object" => Ok(PrimitiveKind::Object),
            "null" => Ok(PrimitiveKind::Null),
            other => Err(SchemaError::InvalidEnumValue {
                kind: "type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// String formats
// =============================================================================

/// String format understood by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    #[default]
    None,
    Date,
    DateTime,
    Time,
    LocalDate,
    LocalDateTime,
    LocalTime,
    Uri,
    CommaSeparated,
    SemiColonSeparated,
    SpaceSeparated,
    PlainText,
}

impl StringFormat {
    pub fn name(self) -> &'static str {
        match self {
            StringFormat::None => "none",
            StringFormat::Date => "date",
            StringFormat::DateTime => "date-time",
            StringFormat::Time => "time",
            StringFormat::LocalDate => "local-date",
            StringFormat::LocalDateTime => "local-date-time",
            StringFormat::LocalTime => "local-time",
            StringFormat::Uri => "uri",
            StringFormat::CommaSeparated => "comma-separated",
            StringFormat::SemiColonSeparated => "semicolon-separated",
            StringFormat::SpaceSeparated => "space-separated",
            StringFormat::PlainText => "plain-text",
        }
    }

    /// Temporal shape and whether the rendering is localized.
    pub fn temporal(self) -> Option<(TemporalKind, bool)> {
        match self {
            StringFormat::Date => Some((TemporalKind::Date, false)),
            StringFormat::DateTime => Some((TemporalKind::DateTime, false)),
            StringFormat::Time => Some((TemporalKind::Time, false)),
            StringFormat::LocalDate => Some((TemporalKind::Date, true)),
            StringFormat::LocalDateTime => Some((TemporalKind::DateTime, true)),
            StringFormat::LocalTime => Some((TemporalKind::Time, true)),
            _ => None,
        }
    }
}

impl FromStr for StringFormat {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(StringFormat::None),
            "date" => Ok(StringFormat::Date),
            "date-time" => Ok(StringFormat::DateTime),
            "time" => Ok(StringFormat::Time),
            "local-date" => Ok(StringFormat::LocalDate),
            "local-date-time" => Ok(StringFormat::LocalDateTime),
            "local-time" => Ok(StringFormat::LocalTime),
            "uri" => Ok(StringFormat::Uri),
            "comma-separated" => Ok(StringFormat::CommaSeparated),
            "semicolon-separated" => Ok(StringFormat::SemiColonSeparated),
            "space-separated" => Ok(StringFormat::SpaceSeparated),
            "plain-text" => Ok(StringFormat::PlainText),
            other => Err(SchemaError::InvalidEnumValue {
                kind: "format",
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// DataType
// =============================================================================

/// Type, format and presentation settings of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct DataType {
    pub kind: PrimitiveKind,
    pub format: StringFormat,
    pub locale: String,
    pub time_zone: String,
    pub encoding: String,
    /// `0` means unlimited.
    pub max_length: usize,
    pub min_length: usize,
    /// Homogeneous element type. Exclusive with `prefix_items`.
    pub items: Option<Box<DataType>>,
    /// Positional element types. Exclusive with `items`.
    pub prefix_items: Option<Vec<DataType>>,
    pub all_of: Vec<DataType>,
    pub any_of: Vec<DataType>,
    pub one_of: Vec<DataType>,
}

impl Default for DataType {
    fn default() -> Self {
        Self {
            kind: PrimitiveKind::String,
            format: StringFormat::None,
            locale: DEFAULT_LOCALE.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
            max_length: 0,
            min_length: 0,
            items: None,
            prefix_items: None,
            all_of: Vec::new(),
            any_of: Vec::new(),
            one_of: Vec::new(),
        }
    }
}

impl DataType {
    pub fn new(kind: PrimitiveKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: StringFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_items(mut self, items: DataType) -> Self {
        self.items = Some(Box::new(items));
        self.prefix_items = None;
        self
    }

    pub fn with_prefix_items(mut self, prefix_items: Vec<DataType>) -> Self {
        self.prefix_items = Some(prefix_items);
        self.items = None;
        self
    }

    pub fn set_type(&mut self, kind: &str) -> SchemaResult<()> {
        self.kind = kind.parse()?;
        Ok(())
    }

    pub fn set_format(&mut self, format: &str) -> SchemaResult<()> {
        self.format = format.parse()?;
        Ok(())
    }

    /// Set the character encoding; the label must be known to `encoding_rs`.
    pub fn set_encoding(&mut self, label: &str) -> SchemaResult<()> {
        let encoding = encoding_rs::Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            SchemaError::InvalidEnumValue {
                kind: "encoding",
                value: label.to_string(),
            }
        })?;
        self.encoding = encoding.name().to_string();
        Ok(())
    }

    /// Build a type from a schema document, using `locale` and `time_zone`
    /// for every nested type.
    pub fn from_schema(doc: &JsonValue, locale: &str, time_zone: &str) -> SchemaResult<Self> {
        let mut data_type = Self::default()
            .with_locale(locale)
            .with_time_zone(time_zone);
        data_type.from_schema_document(doc)?;
        Ok(data_type)
    }

    /// Reset the structural settings, then apply `doc`.
    ///
    /// Locale, timezone and encoding are kept and inherited by nested types.
    pub fn from_schema_document(&mut self, doc: &JsonValue) -> SchemaResult<()> {
        self.apply_schema(doc, 0)
    }

    fn reset(&mut self) {
        self.kind = PrimitiveKind::String;
        self.format = StringFormat::None;
        self.max_length = 0;
        self.min_length = 0;
        self.items = None;
        self.prefix_items = None;
        self.all_of.clear();
        self.any_of.clear();
        self.one_of.clear();
    }

    fn child(&self, doc: &JsonValue, depth: usize) -> SchemaResult<DataType> {
        let mut child = DataType {
            locale: self.locale.clone(),
            time_zone: self.time_zone.clone(),
            encoding: self.encoding.clone(),
            ..DataType::default()
        };
        child.apply_schema(doc, depth)?;
        Ok(child)
    }

    fn children(
        &self,
        doc: &JsonValue,
        keyword: &str,
        depth: usize,
    ) -> SchemaResult<Vec<DataType>> {
        match doc {
            JsonValue::Array(list) => list.iter().map(|d| self.child(d, depth)).collect(),
            _ => Err(SchemaError::InvalidSchema(format!(
                "'{}' must be an array of schemas",
                keyword
            ))),
        }
    }

    fn apply_schema(&mut self, doc: &JsonValue, depth: usize) -> SchemaResult<()> {
        if depth > MAX_SCHEMA_DEPTH {
            return Err(SchemaError::TooDeep(MAX_SCHEMA_DEPTH));
        }
        let obj = doc
            .as_object()
            .ok_or_else(|| SchemaError::InvalidSchema("schema must be an object".to_string()))?;

        self.reset();

        match obj.get("type") {
            Some(JsonValue::String(kind)) => self.set_type(kind)?,
            // ["string", "null"]: the first non-null entry wins
            Some(JsonValue::Array(kinds)) => {
                let kind = kinds
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .find(|k| *k != "null")
                    .or_else(|| kinds.iter().find_map(JsonValue::as_str));
                if let Some(kind) = kind {
                    self.set_type(kind)?;
                }
            }
            Some(other) => {
                return Err(SchemaError::InvalidSchema(format!("invalid type {}", other)))
            }
            None => {}
        }

        if let Some(format) = obj.get("format") {
            let format = format
                .as_str()
                .ok_or_else(|| SchemaError::InvalidSchema("format must be a string".to_string()))?;
            self.set_format(format)?;
        }

        if let Some(n) = obj.get("maxLength").and_then(JsonValue::as_u64) {
            self.max_length = n as usize;
        }
        if let Some(n) = obj.get("minLength").and_then(JsonValue::as_u64) {
            self.min_length = n as usize;
        }

        if obj.contains_key("items") && obj.contains_key("prefixItems") {
            return Err(SchemaError::InvalidSchema(
                "'items' and 'prefixItems' are mutually exclusive".to_string(),
            ));
        }
        match obj.get("items") {
            Some(JsonValue::Array(_)) => {
                return Err(SchemaError::InvalidSchema(
                    "'items' must be a single schema, use 'prefixItems' for tuples".to_string(),
                ))
            }
            Some(items @ JsonValue::Object(_)) => {
                self.items = Some(Box::new(self.child(items, depth + 1)?));
            }
            _ => {}
        }
        if let Some(prefix) = obj.get("prefixItems") {
            self.prefix_items = Some(self.children(prefix, "prefixItems", depth + 1)?);
        }

        if let Some(all_of) = obj.get("allOf") {
            self.all_of = self.children(all_of, "allOf", depth + 1)?;
        }
        if let Some(any_of) = obj.get("anyOf") {
            self.any_of = self.children(any_of, "anyOf", depth + 1)?;
        }
        if let Some(one_of) = obj.get("oneOf") {
            self.one_of = self.children(one_of, "oneOf", depth + 1)?;
        }

        Ok(())
    }

    fn composed(&self) -> impl Iterator<Item = &DataType> {
        self.all_of.iter().chain(&self.any_of).chain(&self.one_of)
    }

    /// Liberal format check across the composition tree.
    pub fn expects_format(&self, format: StringFormat) -> bool {
        (format == StringFormat::None && self.format == StringFormat::None)
            || (self.format != StringFormat::None && self.format == format)
            || self.composed().any(|c| c.expects_format(format))
    }

    pub fn has_format(&self) -> bool {
        self.format != StringFormat::None || self.composed().any(DataType::has_format)
    }

    /// Separator used to join array elements into a string.
    pub fn value_separator(&self) -> &'static str {
        if self.expects_format(StringFormat::CommaSeparated) {
            ", "
        } else if self.expects_format(StringFormat::SemiColonSeparated) {
            "; "
        } else if self.expects_format(StringFormat::SpaceSeparated) {
            " "
        } else {
            ""
        }
    }

    /// First temporal format expected by this type, if any.
    pub fn temporal_format(&self) -> Option<(TemporalKind, bool)> {
        [
            StringFormat::DateTime,
            StringFormat::Date,
            StringFormat::Time,
            StringFormat::LocalDateTime,
            StringFormat::LocalDate,
            StringFormat::LocalTime,
        ]
        .into_iter()
        .find(|f| self.expects_format(*f))
        .and_then(StringFormat::temporal)
    }

    /// Element type at `index`: the positional type if declared, else `items`.
    pub fn item_type(&self, index: usize) -> Option<&DataType> {
        match (&self.prefix_items, &self.items) {
            (Some(prefix), _) => prefix.get(index),
            (None, Some(items)) => Some(&**items),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invalid_enum_literals() {
        let mut data_type = DataType::default();
        assert!(matches!(
            data_type.set_type("decimal"),
            Err(SchemaError::InvalidEnumValue { kind: "type", .. })
        ));
        assert!(matches!(
            data_type.set_format("yaml"),
            Err(SchemaError::InvalidEnumValue { kind: "format", .. })
        ));
        assert!(data_type.set_encoding("latin1").is_ok());
        assert_eq!(data_type.encoding, "windows-1252");
        assert!(data_type.set_encoding("klingon").is_err());
    }

    #[test]
    fn test_defaults_for_empty_schema() {
        let data_type = DataType::from_schema(&json!({}), "fr_FR", "Europe/Paris").unwrap();
        assert_eq!(data_type.kind, PrimitiveKind::String);
        assert_eq!(data_type.format, StringFormat::None);
        assert_eq!(data_type.locale, "fr_FR");
    }

    #[test]
    fn test_items_array_is_rejected() {
        let doc = json!({"type": "array", "items": [{"type": "string"}]});
        assert!(matches!(
            DataType::from_schema(&doc, "en_US", "UTC"),
            Err(SchemaError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_nested_types_inherit_locale() {
        let doc = json!({
            "type": "array",
            "prefixItems": [{"type": "integer"}, {"type": "string", "format": "date"}]
        });
        let data_type = DataType::from_schema(&doc, "de_DE", "Europe/Berlin").unwrap();
        let second = data_type.item_type(1).unwrap();
        assert_eq!(second.format, StringFormat::Date);
        assert_eq!(second.locale, "de_DE");
        assert_eq!(second.time_zone, "Europe/Berlin");
        assert!(data_type.item_type(2).is_none());
    }

    #[test]
    fn test_reparse_resets_composition() {
        let mut data_type = DataType::default();
        data_type
            .from_schema_document(&json!({
                "type": "string",
                "maxLength": 5,
                "allOf": [{"format": "comma-separated"}, {"format": "plain-text"}]
            }))
            .unwrap();
        assert!(data_type.expects_format(StringFormat::CommaSeparated));
        assert!(data_type.expects_format(StringFormat::PlainText));
        assert_eq!(data_type.value_separator(), ", ");

        data_type.from_schema_document(&json!({"type": "string"})).unwrap();
        assert!(data_type.all_of.is_empty());
        assert_eq!(data_type.max_length, 0);
        assert!(!data_type.has_format());
        assert!(data_type.expects_format(StringFormat::None));
    }

    #[test]
    fn test_nullable_type_list() {
        let data_type =
            DataType::from_schema(&json!({"type": ["null", "integer"]}), "en_US", "UTC").unwrap();
        assert_eq!(data_type.kind, PrimitiveKind::Integer);
    }

    #[test]
    fn test_depth_guard() {
        let mut doc = json!({"type": "string"});
        for _ in 0..(MAX_SCHEMA_DEPTH + 1) {
            doc = json!({"type": "array", "items": doc});
        }
        assert_eq!(
            DataType::from_schema(&doc, "en_US", "UTC"),
            Err(SchemaError::TooDeep(MAX_SCHEMA_DEPTH))
        );
    }

    #[test]
    fn test_separator_precedence() {
        let data_type =
            DataType::new(PrimitiveKind::String).with_format(StringFormat::SpaceSeparated);
        assert_eq!(data_type.value_separator(), " ");
        assert_eq!(DataType::default().value_separator(), "");
    }
}
