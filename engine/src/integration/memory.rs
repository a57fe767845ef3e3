//! In-memory table integration.
//!
//! Every record type is a table with an auto-increment integer `id`. Fixtures
//! use this JSON shape:
//!
//! ```json
//! {
//!   "locale": "en_US",
//!   "timeZone": "UTC",
//!   "recordTypes": {
//!     "grades": {
//!       "properties": {"full_name": {"type": "string"}, "grade": {"type": "string"}},
//!       "rows": [{"full_name": "Jane Doe", "grade": "A+"}]
//!     }
//!   }
//! }
//! ```
//!
//! Locator keys understood by `extract`: `id`, `filterKey` + `filterValue`
//! and `scopeKey` (column compared with the scope record id).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Integration, IntegrationSchema, RecordTypeSchema, Response};
use crate::error::{IntegrationError, IntegrationResult, SchemaError};
use crate::graph::MappingEntry;
use crate::models::{Record, RecordKey, RecordLocator, Value};

const ID_FIELD: &str = "id";

type Tables = IndexMap<String, Vec<Record>>;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureTable {
    #[serde(default)]
    properties: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    rows: Vec<IndexMap<String, Value>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Fixture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
    #[serde(default)]
    record_types: IndexMap<String, FixtureTable>,
}

/// Tables kept in memory, with snapshot-based transactions.
#[derive(Debug, Clone, Default)]
pub struct MemoryIntegration {
    schema: IntegrationSchema,
    tables: Tables,
    snapshot: Option<Tables>,
}

/// Loose equality used by filters: `1`, `1.0` and `"1"` all match.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    a == b || (!a.is_null() && !b.is_null() && a.to_plain_string() == b.to_plain_string())
}

impl MemoryIntegration {
    pub fn new(locale: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            schema: IntegrationSchema::new(locale, time_zone),
            tables: IndexMap::new(),
            snapshot: None,
        }
    }

    /// Declare a table; an integer `id` property is added when missing.
    pub fn add_table(
        &mut self,
        name: impl Into<String>,
        properties: IndexMap<String, serde_json::Value>,
    ) {
        let name = name.into();
        let mut properties = properties;
        if !properties.contains_key(ID_FIELD) {
            properties.insert(ID_FIELD.to_string(), json!({"type": "integer"}));
            properties.move_index(properties.len() - 1, 0);
        }
        self.schema
            .record_types
            .insert(name.clone(), RecordTypeSchema { properties });
        self.tables.entry(name).or_default();
    }

    /// Builder form of [`add_table`](Self::add_table) taking a JSON object of
    /// property schemas.
    pub fn with_table(mut self, name: &str, properties: serde_json::Value) -> Self {
        let properties = match properties {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => IndexMap::new(),
        };
        self.add_table(name, properties);
        self
    }

    fn table_mut(&mut self, record_type: &str) -> IntegrationResult<&mut Vec<Record>> {
        self.tables
            .get_mut(record_type)
            .ok_or_else(|| SchemaError::UnknownRecordType(record_type.to_string()).into())
    }

    fn next_id(&self, record_type: &str) -> i64 {
        self.tables
            .get(record_type)
            .into_iter()
            .flatten()
            .filter_map(|r| r.key.id.as_i64())
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Insert a row, assigning an id unless the row carries one.
    pub fn insert<K, V, I>(&mut self, record_type: &str, row: I) -> IntegrationResult<RecordKey>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut data: IndexMap<String, Value> =
            row.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

        let id = match data.get(ID_FIELD) {
            Some(id) if !id.is_null() => id.clone(),
            _ => Value::Int(self.next_id(record_type)),
        };
        data.insert(ID_FIELD.to_string(), id.clone());
        data.move_index(data.len() - 1, 0);

        let key = RecordKey::new(id, record_type);
        self.table_mut(record_type)?.push(Record {
            key: key.clone(),
            data,
        });
        Ok(key)
    }

    /// Rows of a table, empty when the table is unknown.
    pub fn rows(&self, record_type: &str) -> &[Record] {
        self.tables
            .get(record_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Build an integration from a fixture document.
    pub fn from_fixture(doc: &serde_json::Value) -> IntegrationResult<Self> {
        let fixture: Fixture = serde_json::from_value(doc.clone())?;
        let defaults = IntegrationSchema::default();
        let mut integration = Self::new(
            fixture.locale.unwrap_or(defaults.locale),
            fixture.time_zone.unwrap_or(defaults.time_zone),
        );
        for (name, table) in fixture.record_types {
            integration.add_table(name.clone(), table.properties);
            for row in table.rows {
                integration.insert(&name, row)?;
            }
        }
        Ok(integration)
    }

    pub fn from_fixture_str(doc: &str) -> IntegrationResult<Self> {
        Self::from_fixture(&serde_json::from_str(doc)?)
    }

    /// Dump schema and rows in the fixture shape.
    pub fn to_fixture(&self) -> serde_json::Value {
        let record_types: IndexMap<String, FixtureTable> = self
            .schema
            .record_types
            .iter()
            .map(|(name, schema)| {
                let rows = self.rows(name).iter().map(|r| r.data.clone()).collect();
                (
                    name.clone(),
                    FixtureTable {
                        properties: schema.properties.clone(),
                        rows,
                    },
                )
            })
            .collect();
        let fixture = Fixture {
            locale: Some(self.schema.locale.clone()),
            time_zone: Some(self.schema.time_zone.clone()),
            record_types,
        };
        serde_json::to_value(fixture).unwrap_or(serde_json::Value::Null)
    }

    fn find(
        &self,
        locator: &RecordLocator,
        scope: Option<&RecordKey>,
    ) -> IntegrationResult<Vec<Record>> {
        let rows = self
            .tables
            .get(&locator.record_type)
            .ok_or_else(|| SchemaError::UnknownRecordType(locator.record_type.clone()))?;

        let filter = locator
            .get("filterKey")
            .and_then(Value::as_str)
            .map(|key| (key, locator.get("filterValue").cloned().unwrap_or_default()));
        let scoped = locator.scope_key().zip(scope);

        Ok(rows
            .iter()
            .filter(|r| locator.id().is_none_or(|id| loosely_equal(&r.key.id, id)))
            .filter(|r| {
                filter.as_ref().is_none_or(|(key, expected)| {
                    loosely_equal(r.get(key).unwrap_or(&Value::Null), expected)
                })
            })
            .filter(|r| {
                scoped.is_none_or(|(key, scope)| {
                    r.get(key).is_some_and(|value| loosely_equal(value, &scope.id))
                })
            })
            .cloned()
            .collect())
    }
}

impl Integration for MemoryIntegration {
    fn schema(&self) -> &IntegrationSchema {
        &self.schema
    }

    fn extract(
        &mut self,
        locator: &RecordLocator,
        _mapping: &[MappingEntry],
        scope: Option<&RecordKey>,
    ) -> IntegrationResult<Response> {
        Ok(Response::records(self.find(locator, scope)?))
    }

    fn load(
        &mut self,
        locator: &RecordLocator,
        mapping: &[MappingEntry],
        scope: Option<&RecordKey>,
    ) -> IntegrationResult<Response> {
        let record_type = locator.record_type.clone();
        let properties = &self.schema.record_type(&record_type)?.properties;

        let mut values = IndexMap::new();
        for entry in mapping {
            let field = IntegrationSchema::property_name_from_fqn(&entry.target.id);
            if !properties.contains_key(field) {
                return Err(SchemaError::UnknownProperty {
                    record_type: record_type.clone(),
                    property: field.to_string(),
                }
                .into());
            }
            values.insert(field.to_string(), entry.source.value.clone().unwrap_or_default());
        }

        let existing = match scope {
            Some(scope) if scope.record_type == record_type => Some(scope.id.clone()),
            _ => locator.id().cloned(),
        };

        let record = match existing {
            Some(id) => {
                let table = self.table_mut(&record_type)?;
                let row = table
                    .iter_mut()
                    .find(|r| loosely_equal(&r.key.id, &id))
                    .ok_or_else(|| {
                        IntegrationError::Failed(format!(
                            "no '{}' record with id {}",
                            record_type, id
                        ))
                    })?;
                for (field, value) in values {
                    if field != ID_FIELD {
                        row.data.insert(field, value);
                    }
                }
                row.clone()
            }
            None => {
                values.shift_remove(ID_FIELD);
                let key = self.insert(&record_type, values)?;
                self.rows(&record_type)
                    .iter()
                    .find(|r| r.key == key)
                    .cloned()
                    .unwrap_or_else(|| Record::new(key))
            }
        };

        tracing::debug!(record_type = %record_type, id = %record.key.id, "Record loaded");
        Ok(Response::loaded(record.key.clone()).with_recordset(vec![record]))
    }

    fn begin(&mut self) -> IntegrationResult<()> {
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn end(&mut self) -> IntegrationResult<()> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> IntegrationResult<()> {
        match self.snapshot.take() {
            Some(tables) => {
                self.tables = tables;
                Ok(())
            }
            None => Err(IntegrationError::Failed("no transaction in progress".to_string())),
        }
    }
}
