//! Domain models shared by the engine and integrations.
//!
//! - [`Value`] - Closed dynamic value (null, string, integer, float, bool, array)
//! - [`Record`] / [`RecordKey`] / [`Recordset`] - Extracted and loaded records
//! - [`RecordLocator`] - Addressing information for extract/load calls

mod value;

pub use value::Value;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// =============================================================================
// Records
// =============================================================================

/// Identity of a record inside an integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    /// Identifier value (usually an integer primary key).
    pub id: Value,
    /// Record type the identifier belongs to.
    pub record_type: String,
}

impl RecordKey {
    pub fn new(id: impl Into<Value>, record_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            record_type: record_type.into(),
        }
    }
}

/// A record: key plus field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: RecordKey,
    #[serde(default)]
    pub data: IndexMap<String, Value>,
}

impl Record {
    pub fn new(key: RecordKey) -> Self {
        Self {
            key,
            data: IndexMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn record_type(&self) -> &str {
        &self.key.record_type
    }
}

/// Ordered list of records returned by `extract`/`load`.
pub type Recordset = Vec<Record>;

// =============================================================================
// Record Locators
// =============================================================================

/// Addressing information for one side of an operation.
///
/// Besides the record type, a locator carries integration-specific keys
/// (`id`, `filter`, `sheet`, `index`, ...) in an explicit property map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordLocator {
    pub record_type: String,
    #[serde(flatten)]
    pub properties: IndexMap<String, Value>,
}

impl RecordLocator {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            properties: IndexMap::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Logical row index assigned when a node is unrolled.
    pub fn index(&self) -> Option<i64> {
        self.get("index").and_then(Value::as_i64)
    }

    pub fn set_index(&mut self, index: i64) {
        self.set("index", index);
    }

    /// Explicit record id to address.
    pub fn id(&self) -> Option<&Value> {
        self.get("id").filter(|v| !v.is_null())
    }

    /// Name of the column compared against the scope record id.
    pub fn scope_key(&self) -> Option<&str> {
        self.get("scopeKey").and_then(Value::as_str)
    }
}

/// Source and target locators of a graph node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordLocators {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RecordLocator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RecordLocator>,
}

impl RecordLocators {
    /// Swap source and target (used for result-mapping reversal).
    pub fn reversed(&self) -> Self {
        Self {
            source: self.target.clone(),
            target: self.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_properties_flatten() {
        let locator: RecordLocator = serde_json::from_value(serde_json::json!({
            "recordType": "grades",
            "sheet": "Sheet1",
            "index": 3
        }))
        .unwrap();

        assert_eq!(locator.record_type, "grades");
        assert_eq!(locator.get("sheet").and_then(Value::as_str), Some("Sheet1"));
        assert_eq!(locator.index(), Some(3));
    }

    #[test]
    fn test_locators_reversed() {
        let locators = RecordLocators {
            source: Some(RecordLocator::new("transcript")),
            target: Some(RecordLocator::new("students")),
        };
        let reversed = locators.reversed();
        assert_eq!(reversed.source.unwrap().record_type, "students");
        assert_eq!(reversed.target.unwrap().record_type, "transcript");
    }

    #[test]
    fn test_record_builder() {
        let record = Record::new(RecordKey::new(1, "grades"))
            .with("full_name", "Jane Doe")
            .with("grade", "A+");
        assert_eq!(record.record_type(), "grades");
        assert_eq!(record.get("grade"), Some(&Value::from("A+")));
    }
}
