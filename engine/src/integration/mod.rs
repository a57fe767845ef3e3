//! Integration contract.
//!
//! An integration is a data store the engine extracts records from or loads
//! records into. The engine only talks to integrations through [`Integration`];
//! the concrete stores in this module ([`memory`], [`csv`]) serve the CLI and
//! the tests.

pub mod csv;
pub mod memory;

pub use memory::MemoryIntegration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_LOCALE, DEFAULT_TIME_ZONE};
use crate::error::{IntegrationError, IntegrationResult, SchemaError, SchemaResult};
use crate::graph::MappingEntry;
use crate::models::{Record, RecordKey, RecordLocator, Recordset};
use crate::types::DataType;

// =============================================================================
// Schema
// =============================================================================

/// Properties of one record type, as JSON-Schema property documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordTypeSchema {
    #[serde(default)]
    pub properties: IndexMap<String, serde_json::Value>,
}

/// Schema of an integration: record types plus presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSchema {
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default)]
    pub record_types: IndexMap<String, RecordTypeSchema>,
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.to_string()
}

impl Default for IntegrationSchema {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE, DEFAULT_TIME_ZONE)
    }
}

impl IntegrationSchema {
    pub fn new(locale: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            time_zone: time_zone.into(),
            record_types: IndexMap::new(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }

    pub fn record_type(&self, name: &str) -> SchemaResult<&RecordTypeSchema> {
        self.record_types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownRecordType(name.to_string()))
    }

    /// Type of `property` on `record_type`.
    ///
    /// A fully-qualified `property` overrides `record_type`. The returned type
    /// carries the schema locale and timezone.
    pub fn data_type(&self, record_type: &str, property: &str) -> SchemaResult<DataType> {
        let (record_type, property) = if Self::is_fully_qualified_name(property) {
            (
                Self::record_type_from_fqn(property).unwrap_or(record_type),
                Self::property_name_from_fqn(property),
            )
        } else {
            (record_type, property)
        };

        let doc = self
            .record_type(record_type)?
            .properties
            .get(property)
            .ok_or_else(|| SchemaError::UnknownProperty {
                record_type: record_type.to_string(),
                property: property.to_string(),
            })?;
        DataType::from_schema(doc, &self.locale, &self.time_zone)
    }

    /// `recordType:property[:variant]` names contain a colon.
    pub fn is_fully_qualified_name(name: &str) -> bool {
        name.contains(':')
    }

    pub fn record_type_from_fqn(name: &str) -> Option<&str> {
        name.split_once(':').map(|(record_type, _)| record_type)
    }

    /// Property part of a fully-qualified name; plain names are returned as is.
    pub fn property_name_from_fqn(name: &str) -> &str {
        match name.split(':').nth(1) {
            Some(property) => property,
            None => name,
        }
    }
}

// =============================================================================
// Integration contract
// =============================================================================

/// Reply of an `extract` or `load` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Records extracted, or records the target wants to hand back after a load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recordset: Option<Recordset>,
    /// Key of the record written by a load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_key: Option<RecordKey>,
}

impl Response {
    pub fn records(recordset: Recordset) -> Self {
        Self {
            recordset: Some(recordset),
            record_key: None,
        }
    }

    pub fn loaded(key: RecordKey) -> Self {
        Self {
            recordset: None,
            record_key: Some(key),
        }
    }

    pub fn with_recordset(mut self, recordset: Recordset) -> Self {
        self.recordset = Some(recordset);
        self
    }

    /// Records of the response, empty when none were sent.
    pub fn recordset(&self) -> &[Record] {
        self.recordset.as_deref().unwrap_or_default()
    }
}

/// A store the engine moves records between.
///
/// `mapping` holds fully resolved entries on `load`: every `source` carries
/// its final value.
pub trait Integration {
    fn schema(&self) -> &IntegrationSchema;

    fn extract(
        &mut self,
        locator: &RecordLocator,
        mapping: &[MappingEntry],
        scope: Option<&RecordKey>,
    ) -> IntegrationResult<Response>;

    fn load(
        &mut self,
        locator: &RecordLocator,
        mapping: &[MappingEntry],
        scope: Option<&RecordKey>,
    ) -> IntegrationResult<Response>;

    fn begin(&mut self) -> IntegrationResult<()> {
        Ok(())
    }

    fn end(&mut self) -> IntegrationResult<()> {
        Ok(())
    }

    fn rollback(&mut self) -> IntegrationResult<()> {
        Err(IntegrationError::Unsupported("rollback"))
    }
}
