//! # Integrator - execution-plan driven data integration
//!
//! Integrator moves records between integrations (databases, spreadsheets,
//! CSV files, ...) following a declarative execution plan: a DAG of
//! operations, each of which extracts a record, maps its fields and loads
//! the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │    Plan     │────▶│    Graph    │────▶│  Execution  │────▶│   Target    │
//! │   (JSON)    │     │ (DAG, copy) │     │ (DFS, scope)│     │ integration │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                               │
//!                                    ┌──────────┴──────────┐
//!                                    │ Operation: extract, │
//!                                    │ formula, TypedValue │
//!                                    └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use integrator::{Execution, MemoryIntegration};
//!
//! let mut source = MemoryIntegration::from_fixture_str(&source_fixture)?;
//! let mut target = MemoryIntegration::from_fixture_str(&target_fixture)?;
//! let mut execution = Execution::from_plan(Some(&plan), &mut source, &mut target)?;
//! execution.run(None)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Values, records and record locators
//! - [`types`] - Data types and typed value conversion
//! - [`graph`] - Execution plan and operation DAG
//! - [`execution`] - Graph traversal, operations and formulas
//! - [`integration`] - Integration contract, memory tables and CSV import
//! - [`validation`] - JSON Schema validation of plans
//! - [`logs`] - Operation logs
//! - [`config`] - Environment configuration

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Types and conversion
pub mod types;

// Plans
pub mod graph;
pub mod validation;

// Integrations
pub mod integration;

// Execution
pub mod execution;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    ConversionError,
    ExecutionError,
    FormulaError,
    IntegrationError,
    MappingError,
    OperationError,
    PlanError,
    SchemaError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Record,
    RecordKey,
    RecordLocator,
    RecordLocators,
    Recordset,
    Value,
};

// =============================================================================
// Re-exports - Types
// =============================================================================

pub use types::{DataType, PrimitiveKind, StringFormat, TypedValue};

// =============================================================================
// Re-exports - Graph
// =============================================================================

pub use graph::{ExecutionPlan, Graph, MapSource, MapTarget, MappingEntry, Node, NodeId, ROOT};

// =============================================================================
// Re-exports - Execution
// =============================================================================

pub use execution::{
    Execution,
    FormulaEvaluator,
    LocaleSettings,
    Operation,
    OperationOutcome,
    SubstitutionEvaluator,
};

// =============================================================================
// Re-exports - Integrations
// =============================================================================

pub use integration::{Integration, IntegrationSchema, MemoryIntegration, Response};

// =============================================================================
// Re-exports - Logs & Config
// =============================================================================

pub use config::EngineConfig;
pub use logs::{LogEntry, LogLevel, OperationLog};
pub use validation::{is_valid_plan, validate_plan};
