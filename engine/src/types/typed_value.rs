//! Value conversion between data types.
//!
//! Dispatch is driven by the runtime [`Value`] variant; the source
//! [`DataType`] only contributes its locale, timezone, format and element
//! types.

use crate::error::{ConversionError, ConversionResult};
use crate::models::Value;
use crate::types::data_type::{DataType, PrimitiveKind, StringFormat};
use crate::types::temporal::{self, TemporalKind};
use crate::types::{locale, text};

/// A value paired with the type it currently has.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    value: Value,
    data_type: DataType,
}

/// Structural type of a value, with default presentation settings.
pub fn infer_type(value: &Value) -> DataType {
    let kind = match value {
        Value::Null => PrimitiveKind::Null,
        Value::Bool(_) => PrimitiveKind::Boolean,
        Value::Int(_) => PrimitiveKind::Integer,
        Value::Float(_) => PrimitiveKind::Number,
        Value::String(_) => PrimitiveKind::String,
        Value::Array(_) => PrimitiveKind::Array,
    };
    DataType::new(kind)
}

fn cannot(value: &Value, kind: &'static str) -> ConversionError {
    ConversionError::CannotConvert {
        value: value.to_string(),
        kind,
    }
}

impl TypedValue {
    /// Wrap a value, inferring its type from its shape.
    pub fn new(value: Value) -> Self {
        let data_type = infer_type(&value);
        Self { value, data_type }
    }

    /// Wrap a value that is already of `data_type`.
    pub fn with_type(value: Value, data_type: DataType) -> Self {
        Self { value, data_type }
    }

    /// Wrap `value` (typed as `source`) and convert it to `target` right away.
    pub fn converted(value: Value, source: DataType, target: &DataType) -> ConversionResult<Self> {
        let mut typed = Self::with_type(value, source);
        typed.convert(target)?;
        Ok(typed)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Convert in place: on success both the value and the type change.
    pub fn convert(&mut self, target: &DataType) -> ConversionResult<()> {
        let value = match target.kind {
            PrimitiveKind::Boolean => Value::Bool(self.to_boolean()?),
            PrimitiveKind::Number => Value::Float(self.to_number()?),
            PrimitiveKind::Integer => Value::Int(self.to_integer()?),
            PrimitiveKind::String => Value::String(self.to_string_value(target)?),
            PrimitiveKind::Array => Value::Array(self.to_array(target)?),
            PrimitiveKind::Object | PrimitiveKind::Null => {
                return Err(cannot(&self.value, target.kind.name()))
            }
        };
        self.value = value;
        self.data_type = target.clone();
        Ok(())
    }

    /// Element `index` of an array value, typed by position.
    fn element(&self, index: usize) -> Option<TypedValue> {
        let item = self.value.as_array()?.get(index)?;
        let data_type = self.data_type.item_type(index).cloned().unwrap_or_else(|| {
            infer_type(item)
                .with_locale(self.data_type.locale.clone())
                .with_time_zone(self.data_type.time_zone.clone())
        });
        Some(TypedValue::with_type(item.clone(), data_type))
    }

    fn to_boolean(&self) -> ConversionResult<bool> {
        match &self.value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::String(s) => {
                let lowered = s.trim().to_lowercase();
                match lowered.strip_prefix('+').unwrap_or(&lowered) {
                    "1" | "true" => Ok(true),
                    "" | "0" | "false" => Ok(false),
                    _ => Err(cannot(&self.value, "boolean")),
                }
            }
            Value::Array(_) => match self.element(0) {
                Some(first) => first.to_boolean(),
                None => Ok(false),
            },
        }
    }

    fn to_number(&self) -> ConversionResult<f64> {
        match &self.value {
            Value::Null => Ok(0.0),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Int(n) => Ok(*n as f64),
            Value::Float(f) => Ok(*f),
            Value::String(s) => locale::lookup(&self.data_type.locale)
                .parse_number(s)
                .ok_or_else(|| cannot(&self.value, "number")),
            Value::Array(_) => match self.element(0) {
                Some(first) => first.to_number(),
                None => Ok(0.0),
            },
        }
    }

    fn to_integer(&self) -> ConversionResult<i64> {
        match &self.value {
            Value::Null => Ok(0),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Int(n) => Ok(*n),
            Value::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
            Value::Float(_) => Err(cannot(&self.value, "integer")),
            Value::String(s) => locale::lookup(&self.data_type.locale)
                .parse_integer(s)
                .ok_or_else(|| cannot(&self.value, "integer")),
            Value::Array(_) => match self.element(0) {
                Some(first) => first.to_integer(),
                None => Ok(0),
            },
        }
    }

    fn to_string_value(&self, target: &DataType) -> ConversionResult<String> {
        let base = match &self.value {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => locale::lookup(&target.locale).format_number(*f),
            Value::String(s) => s.clone(),
            Value::Array(items) => {
                let element_type = DataType::new(PrimitiveKind::String)
                    .with_locale(target.locale.clone())
                    .with_time_zone(target.time_zone.clone());
                let mut parts = Vec::with_capacity(items.len());
                for index in 0..items.len() {
                    if let Some(mut element) = self.element(index) {
                        element.convert(&element_type)?;
                        parts.push(element.into_value().to_plain_string());
                    }
                }
                text::join_non_empty(parts, target.value_separator())
            }
        };

        let mut result = match target.temporal_format() {
            Some((kind, local)) if !base.trim().is_empty() => {
                self.to_temporal(&base, kind, local, target)?
            }
            _ => base,
        };

        if target.expects_format(StringFormat::PlainText) {
            result = text::to_plain_text(&result);
        }
        Ok(text::truncate_chars(result, target.max_length))
    }

    /// Normalize `input` to the canonical rendering of `kind` in the source
    /// zone, then display it for the target (canonical or localized).
    fn to_temporal(
        &self,
        input: &str,
        kind: TemporalKind,
        local: bool,
        target: &DataType,
    ) -> ConversionResult<String> {
        let source_tz = temporal::time_zone(&self.data_type.time_zone)?;
        let target_tz = temporal::time_zone(&target.time_zone)?;
        let source_locale = locale::lookup(&self.data_type.locale);
        let fail = || ConversionError::CannotConvert {
            value: input.to_string(),
            kind: kind.name(),
        };

        let parsed = match self.data_type.format.temporal() {
            Some((source_kind, false)) => temporal::parse_canonical(input, source_kind, source_tz)
                .or_else(|| temporal::parse_heuristic(input, source_locale, source_tz)),
            _ => temporal::parse_heuristic(input, source_locale, source_tz),
        }
        .ok_or_else(fail)?;

        let canonical = temporal::coerce(parsed, kind, source_tz, source_tz).ok_or_else(fail)?;
        let shifted = temporal::coerce(canonical, kind, source_tz, target_tz).ok_or_else(fail)?;

        if local {
            Ok(temporal::format_local(&shifted, locale::lookup(&target.locale)))
        } else {
            Ok(temporal::format_canonical(&shifted))
        }
    }

    fn to_array(&self, target: &DataType) -> ConversionResult<Vec<Value>> {
        match &self.value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => {
                let mut converted = Vec::with_capacity(items.len());
                for index in 0..items.len() {
                    let Some(mut element) = self.element(index) else {
                        continue;
                    };
                    if let Some(item_type) = target.item_type(index) {
                        element.convert(item_type)?;
                    }
                    converted.push(element.into_value());
                }
                Ok(converted)
            }
            scalar => {
                let mut element = TypedValue::with_type(scalar.clone(), self.data_type.clone());
                let item_type = target
                    .items
                    .as_deref()
                    .or_else(|| target.prefix_items.as_ref().and_then(|p| p.first()));
                if let Some(item_type) = item_type {
                    element.convert(item_type)?;
                }
                Ok(vec![element.into_value()])
            }
        }
    }
}
