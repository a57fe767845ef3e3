//! Error types for the integration engine.
//!
//! This module defines one error type per concern:
//!
//! - [`SchemaError`] - Schema documents, enum literals and record type lookups
//! - [`ConversionError`] - Typed value coercion failures
//! - [`PlanError`] - Malformed execution plans and graph references
//! - [`MappingError`] - Per-entry mapping problems (logged, never propagated)
//! - [`FormulaError`] - Formula evaluator failures (replaced by `#VALUE!`)
//! - [`IntegrationError`] - Failures reported by an integration
//! - [`OperationError`] - Errors raised while running one graph node
//! - [`ExecutionError`] - Top-level errors returned by a full run
//! - [`ConfigError`] - Invalid environment configuration
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors while reading type descriptors or resolving record types.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    /// A literal outside of a closed enum set (type, format, encoding).
    #[error("Invalid {kind} value '{value}'")]
    InvalidEnumValue { kind: &'static str, value: String },

    /// Structurally invalid schema document.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Record type unknown to the integration.
    #[error("Unknown record type '{0}'")]
    UnknownRecordType(String),

    /// Property unknown to the record type.
    #[error("Unknown property '{property}' on record type '{record_type}'")]
    UnknownProperty { record_type: String, property: String },

    /// Schema nesting exceeded the supported depth.
    #[error("Schema nesting exceeds {0} levels")]
    TooDeep(usize),
}

// =============================================================================
// Conversion Errors
// =============================================================================

/// Errors during typed value conversion.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConversionError {
    /// The value cannot be represented in the target type.
    #[error("Cannot convert '{value}' to {kind}")]
    CannotConvert { value: String, kind: &'static str },

    /// Unknown IANA timezone name on a data type.
    #[error("Unknown timezone '{0}'")]
    InvalidTimeZone(String),
}

// =============================================================================
// Plan Errors
// =============================================================================

/// Errors in the execution plan or in graph manipulation.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Structural problem in the plan (bad node reference, copying the root, ...).
    #[error("Invalid execution plan: {0}")]
    InvalidExecutionPlan(String),

    /// The plan document is not valid JSON for the plan model.
    #[error("Plan JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Mapping Errors
// =============================================================================

/// Problems with a single mapping entry.
///
/// These are recoverable: the operation logs them and keeps going.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MappingError {
    /// Source field reference could not be resolved against the record.
    #[error("Unknown source field '{0}'")]
    UnknownSourceField(String),

    /// Target field reference could not be resolved against the target schema.
    #[error("Unknown target field '{field}': {reason}")]
    UnknownTargetField { field: String, reason: String },
}

// =============================================================================
// Formula Errors
// =============================================================================

/// A formula evaluator failed.
///
/// Never propagated: the operation replaces the result with `#VALUE!`.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Formula evaluation failed: {0}")]
pub struct FormulaError(pub String);

// =============================================================================
// Integration Errors
// =============================================================================

/// Errors reported by an integration.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// Optional capability not implemented by this integration.
    #[error("Operation not supported by integration: {0}")]
    Unsupported(&'static str),

    /// The integration failed to serve the request.
    #[error("Integration failure: {0}")]
    Failed(String),

    /// Record locator references an unknown record type or property.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// IO error while reading integration data.
    #[error("Integration IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while reading integration data.
    #[error("Integration JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed CSV input.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// =============================================================================
// Operation Errors
// =============================================================================

/// Errors raised while running a single operation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Plan-structural problem detected while running the node.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Schema problem on a record locator path.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A mapped value could not be converted.
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// The source or target integration failed.
    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),

    /// A field mapping needed a record but nothing was extracted.
    #[error("No record available to resolve field '{0}'")]
    RecordNotFound(String),

    /// Extraction returned no record: skip this node and its subtree.
    #[error("Extraction returned no record")]
    EmptyRecord,
}

// =============================================================================
// Execution Errors (top-level)
// =============================================================================

/// Top-level execution errors.
///
/// This is the error type returned by [`crate::execution::Execution::run`].
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Invalid plan or graph reference.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// An operation failed.
    #[error("Operation {node} failed: {source}")]
    Operation {
        node: u64,
        #[source]
        source: OperationError,
    },

    /// Transaction bracketing (`begin`/`end`) failed.
    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds an unusable value.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for value conversion.
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Result type for plan and graph operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Result type for integration calls.
pub type IntegrationResult<T> = Result<T, IntegrationError>;

/// Result type for a single operation.
pub type OperationResult<T> = Result<T, OperationError>;

/// Result type for a full execution.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cannot_convert_message() {
        let err = ConversionError::CannotConvert {
            value: "something".into(),
            kind: "boolean",
        };
        assert_eq!(err.to_string(), "Cannot convert 'something' to boolean");
    }

    #[test]
    fn test_error_conversion_chain() {
        // SchemaError -> IntegrationError -> OperationError
        let schema_err = SchemaError::UnknownRecordType("grades".into());
        let integration_err: IntegrationError = schema_err.into();
        let op_err: OperationError = integration_err.into();
        assert!(op_err.to_string().contains("grades"));

        // PlanError -> ExecutionError
        let plan_err = PlanError::InvalidExecutionPlan("node 7 not found".into());
        let exec_err: ExecutionError = plan_err.into();
        assert!(exec_err.to_string().contains("node 7"));
    }

    #[test]
    fn test_operation_error_wraps_node() {
        let err = ExecutionError::Operation {
            node: 3,
            source: OperationError::RecordNotFound("grade".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("Operation 3"));
        assert!(msg.contains("grade"));
    }
}
