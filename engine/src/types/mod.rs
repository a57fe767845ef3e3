//! Typed value conversion.
//!
//! - [`DataType`] - Schema-driven type descriptor
//! - [`TypedValue`] - Value plus descriptor, converts between descriptors
//! - [`locale`] / [`temporal`] / [`text`] - Formatting helpers used by the converter

pub mod data_type;
pub mod locale;
pub mod temporal;
pub mod text;
pub mod typed_value;

pub use data_type::{DataType, PrimitiveKind, StringFormat, MAX_SCHEMA_DEPTH};
pub use typed_value::{infer_type, TypedValue};
