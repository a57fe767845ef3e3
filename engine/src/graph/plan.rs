//! Execution plan document model.
//!
//! ```json
//! {
//!   "source": {...},
//!   "target": {...},
//!   "operations": [
//!     {"id": 0, "in": [], "out": [1]},
//!     {
//!       "id": 1, "in": [0], "out": [],
//!       "recordLocators": {
//!         "source": {"recordType": "grades"},
//!         "target": {"recordType": "transcript"}
//!       },
//!       "mapping": [{"source": {"id": "full_name"}, "target": {"id": "name"}}]
//!     }
//!   ]
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Node;
use crate::error::{PlanError, PlanResult};
use crate::models::Value;
use crate::validation;

/// Parsed execution plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Source integration descriptor, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<serde_json::Value>,
    /// Target integration descriptor, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<serde_json::Value>,
    pub operations: Vec<Node>,
}

impl ExecutionPlan {
    /// Parse and schema-check a plan document.
    pub fn parse(doc: &str) -> PlanResult<Self> {
        let json: serde_json::Value = serde_json::from_str(doc)?;
        validation::validate_plan(&json)
            .map_err(|errors| PlanError::InvalidExecutionPlan(errors.join("; ")))?;
        Ok(serde_json::from_value(json)?)
    }
}

// =============================================================================
// Mapping entries
// =============================================================================

/// Where a mapped value comes from.
///
/// Exactly one of `id`, `formula` or `value` is expected; `id` wins when
/// several are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapSource {
    /// Field reference, plain or `recordType:property`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Formula expression (string or array of strings).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<Value>,
    /// Static value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// The resolved form of a [`MapSource`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceKind<'a> {
    Field(&'a str),
    Formula(&'a Value),
    Static(&'a Value),
}

impl MapSource {
    pub fn field(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn formula(expression: impl Into<Value>) -> Self {
        Self {
            formula: Some(expression.into()),
            ..Self::default()
        }
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// A source that already holds its final value.
    pub fn resolved(value: Value) -> Self {
        Self::value(value)
    }

    pub fn kind(&self) -> PlanResult<SourceKind<'_>> {
        if let Some(id) = &self.id {
            Ok(SourceKind::Field(id))
        } else if let Some(formula) = &self.formula {
            Ok(SourceKind::Formula(formula))
        } else if let Some(value) = &self.value {
            Ok(SourceKind::Static(value))
        } else {
            Err(PlanError::InvalidExecutionPlan(
                "mapping source needs one of 'id', 'formula' or 'value'".to_string(),
            ))
        }
    }
}

/// Where a mapped value goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapTarget {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// One field mapping of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub source: MapSource,
    pub target: MapTarget,
    /// Case-insensitive substitution table applied to the source value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<IndexMap<String, Value>>,
}

impl MappingEntry {
    pub fn new(source: MapSource, target: impl Into<String>) -> Self {
        Self {
            source,
            target: MapTarget {
                id: target.into(),
                label: None,
            },
            transform: None,
        }
    }

    /// Shorthand for a field-to-field mapping.
    pub fn field(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(MapSource::field(source), target)
    }

    pub fn with_transform(mut self, transform: IndexMap<String, Value>) -> Self {
        self.transform = Some(transform);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind() {
        assert_eq!(MapSource::field("grade").kind().unwrap(), SourceKind::Field("grade"));
        assert!(matches!(
            MapSource::formula("=NOW()").kind().unwrap(),
            SourceKind::Formula(_)
        ));
        assert!(matches!(
            MapSource::default().kind(),
            Err(PlanError::InvalidExecutionPlan(_))
        ));
    }

    #[test]
    fn test_parse_plan() {
        let plan = ExecutionPlan::parse(
            r#"{
                "source": {"type": "memory"},
                "operations": [
                    {"id": 0, "in": [], "out": [1]},
                    {
                        "id": 1, "in": [0], "out": [],
                        "recordLocators": {"source": {"recordType": "grades"}},
                        "mapping": [
                            {"source": {"id": "grade"}, "target": {"id": "grade", "label": "Grade"},
                             "transform": {"a+": "A"}}
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(plan.operations.len(), 2);
        let entry = &plan.operations[1].mapping[0];
        assert_eq!(entry.target.label.as_deref(), Some("Grade"));
        assert_eq!(entry.transform.as_ref().unwrap()["a+"], Value::from("A"));
    }

    #[test]
    fn test_parse_rejects_schema_violations() {
        let err = ExecutionPlan::parse(r#"{"operations": [{"id": "zero"}]}"#).unwrap_err();
        assert!(matches!(err, PlanError::InvalidExecutionPlan(_)));

        let err = ExecutionPlan::parse("not json").unwrap_err();
        assert!(matches!(err, PlanError::Json(_)));
    }
}
