//! JSON Schema validation for execution plans.
//!
//! The plan schema is embedded at compile time from
//! `schemas/execution-plan.json` and checked with JSON Schema Draft 7.
//! Schema validation only covers the document shape; graph consistency
//! (edges, cycles, root node) is checked by [`crate::graph::Graph`].
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use integrator::validation::validate_plan;
//!
//! let plan = json!({"operations": [{"id": 0, "in": [], "out": []}]});
//! assert!(validate_plan(&plan).is_ok());
//! ```

use serde_json::Value;

const PLAN_SCHEMA: &str = include_str!("../../schemas/execution-plan.json");

/// Validate a JSON document against a JSON schema.
///
/// # Returns
/// * `Ok(())` when valid
/// * `Err(Vec<String>)` with one message per violation otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator =
        jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn plan_schema() -> Result<Value, Vec<String>> {
    serde_json::from_str(PLAN_SCHEMA)
        .map_err(|e| vec![format!("Invalid embedded plan schema: {}", e)])
}

/// Validate an execution plan document.
pub fn validate_plan(data: &Value) -> Result<(), Vec<String>> {
    validate(&plan_schema()?, data)
}

/// Quick check against the plan schema.
pub fn is_valid_plan(data: &Value) -> bool {
    plan_schema()
        .map(|schema| jsonschema::draft7::is_valid(&schema, data))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_plan() {
        let plan = json!({
            "source": {"type": "memory"},
            "target": {"type": "memory"},
            "operations": [
                {"id": 0, "in": [], "out": [1]},
                {
                    "id": 1, "in": [0], "out": [],
                    "recordLocators": {
                        "source": {"recordType": "transcript"},
                        "target": {"recordType": "students", "scopeKey": "studentId"}
                    },
                    "mapping": [
                        {"source": {"id": "full_name"}, "target": {"id": "name"}},
                        {"source": {"formula": "=UPPER(%%grade%%)"}, "target": {"id": "grade"}},
                        {"source": {"value": 3}, "target": {"id": "credits"}}
                    ],
                    "resultMapping": [
                        {"source": {"id": "id"}, "target": {"id": "studentId"}}
                    ]
                }
            ]
        });
        assert!(is_valid_plan(&plan));
    }

    #[test]
    fn test_missing_operations() {
        assert!(!is_valid_plan(&json!({"source": {}})));
    }

    #[test]
    fn test_mapping_without_source_form() {
        let plan = json!({
            "operations": [
                {"id": 0, "in": [], "out": []},
                {"id": 1, "mapping": [{"source": {"label": "x"}, "target": {"id": "name"}}]}
            ]
        });
        let errors = validate_plan(&plan).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_locator_requires_record_type() {
        let plan = json!({
            "operations": [
                {"id": 0, "recordLocators": {"source": {"sheet": "Sheet1"}}}
            ]
        });
        assert!(!is_valid_plan(&plan));
    }
}
