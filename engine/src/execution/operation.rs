//! A single extract/transform/load step.
//!
//! An [`Operation`] is built from one graph node. It extracts the source
//! record (or reuses one handed over by an unroll), resolves every mapping
//! entry to a final typed value, and loads the result into the target.

use indexmap::IndexMap;

use super::formula::{
    evaluate_guarded, has_aliases, is_formula, substitute_aliases, substitute_value,
    variables_from_record, FormulaEvaluator, LocaleScope, LocaleSettings, VALUE_ERROR,
};
use crate::error::{MappingError, OperationError, OperationResult, SchemaError};
use crate::graph::{MapSource, MappingEntry, Node, NodeId, SourceKind};
use crate::integration::{Integration, IntegrationSchema};
use crate::logs::OperationLog;
use crate::models::{Record, RecordKey, RecordLocator, RecordLocators, Recordset, Value};
use crate::types::{infer_type, DataType, TypedValue};

/// The parts of a node an operation runs from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationConfig {
    pub node: NodeId,
    pub record_locators: RecordLocators,
    pub mapping: Vec<MappingEntry>,
    pub result_mapping: Vec<MappingEntry>,
}

impl OperationConfig {
    pub fn from_node(node: &Node) -> Self {
        Self {
            node: node.id,
            record_locators: node.record_locators.clone().unwrap_or_default(),
            mapping: node.mapping.clone(),
            result_mapping: node.result_mapping.clone(),
        }
    }
}

/// What a finished operation extracted and loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationOutcome {
    /// Every record the extraction produced
    pub extracted: Recordset,
    /// Records the target handed back from `load`
    pub returned: Option<Recordset>,
    /// Key of the loaded record
    pub loaded_key: Option<RecordKey>,
}

impl OperationOutcome {
    /// Key of the first extracted record.
    pub fn extracted_key(&self) -> Option<&RecordKey> {
        self.extracted.first().map(|r| &r.key)
    }
}

pub struct Operation<'a> {
    config: OperationConfig,
    source: &'a mut dyn Integration,
    target: &'a mut dyn Integration,
    evaluator: &'a dyn FormulaEvaluator,
    locale: &'a LocaleScope,
    log: OperationLog,
}

/// Case-insensitive, trimmed lookup in a substitution table.
fn substitute(value: &Value, table: &IndexMap<String, Value>) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, table)).collect()),
        other => {
            let needle = other.to_plain_string().trim().to_lowercase();
            table
                .iter()
                .find(|(key, _)| key.trim().to_lowercase() == needle)
                .map(|(_, replacement)| replacement.clone())
                .unwrap_or_else(|| other.clone())
        }
    }
}

/// Schema errors that only concern one mapping entry: an unknown property,
/// or an unknown record type named by the entry's own qualified name.
fn is_entry_level(error: &SchemaError, locator_record_type: &str) -> bool {
    match error {
        SchemaError::UnknownProperty { .. } => true,
        SchemaError::UnknownRecordType(name) => name != locator_record_type,
        _ => false,
    }
}

impl<'a> Operation<'a> {
    pub fn new(
        config: OperationConfig,
        source: &'a mut dyn Integration,
        target: &'a mut dyn Integration,
        evaluator: &'a dyn FormulaEvaluator,
        locale: &'a LocaleScope,
    ) -> Self {
        Self {
            config,
            source,
            target,
            evaluator,
            locale,
            log: OperationLog::new(),
        }
    }

    pub fn config(&self) -> &OperationConfig {
        &self.config
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    /// Hand the accumulated log over to the caller.
    pub fn take_log(&mut self) -> OperationLog {
        std::mem::take(&mut self.log)
    }

    /// Extract, transform and load.
    ///
    /// Fails with [`OperationError::EmptyRecord`] when the source locator
    /// matches nothing.
    pub fn run(
        &mut self,
        source_scope: Option<&RecordKey>,
        target_scope: Option<&RecordKey>,
        pre_extracted: Option<Record>,
    ) -> OperationResult<OperationOutcome> {
        let node = self.config.node;

        let extracted = match (pre_extracted, self.config.record_locators.source.clone()) {
            (Some(record), _) => vec![record],
            (None, Some(locator)) => {
                let locator = self.resolve_locator(&locator, None);
                let response = self
                    .source
                    .extract(&locator, &self.config.mapping, source_scope)?;
                let records = response.recordset.unwrap_or_default();
                if records.is_empty() {
                    self.log.info(
                        node,
                        format!("No '{}' record extracted, skipping", locator.record_type),
                    );
                    return Err(OperationError::EmptyRecord);
                }
                self.log.info(
                    node,
                    format!("Extracted {} '{}' record(s)", records.len(), locator.record_type),
                );
                records
            }
            (None, None) => Vec::new(),
        };

        let record = extracted.first();
        let target_locator = self
            .config
            .record_locators
            .target
            .clone()
            .map(|locator| self.resolve_locator(&locator, record));

        let mapping = self.config.mapping.clone();
        let entries = self.transform(&mapping, target_locator.as_ref(), record)?;

        let mut outcome = OperationOutcome {
            extracted: Vec::new(),
            returned: None,
            loaded_key: None,
        };
        if let Some(locator) = target_locator {
            let response = self.target.load(&locator, &entries, target_scope)?;
            if let Some(key) = &response.record_key {
                self.log.success(
                    node,
                    format!("Loaded '{}' record {}", key.record_type, key.id),
                );
            }
            outcome.returned = response.recordset;
            outcome.loaded_key = response.record_key;
        }
        outcome.extracted = extracted;
        Ok(outcome)
    }

    /// Resolve every mapping entry to its final value, typed for the target.
    ///
    /// Entry-level problems are logged: an unknown source field yields `""`,
    /// an unknown target field drops the entry. An unknown target record type
    /// fails the whole transform.
    pub fn transform(
        &mut self,
        mapping: &[MappingEntry],
        target_locator: Option<&RecordLocator>,
        record: Option<&Record>,
    ) -> OperationResult<Vec<MappingEntry>> {
        let node = self.config.node;
        let mut resolved = Vec::with_capacity(mapping.len());

        for entry in mapping {
            let (value, source_type) = match entry.source.kind()? {
                SourceKind::Field(field) => self.field_value(field, record)?,
                SourceKind::Formula(expression) => {
                    let value = self.evaluate(expression, record);
                    let data_type = infer_type(&value);
                    (value, data_type)
                }
                SourceKind::Static(value) => (value.clone(), infer_type(value)),
            };

            let (value, source_type) = match &entry.transform {
                Some(table) if !table.is_empty() => {
                    let substituted = substitute(&value, table);
                    if substituted == value {
                        (value, source_type)
                    } else {
                        let data_type = infer_type(&substituted);
                        (substituted, data_type)
                    }
                }
                _ => (value, source_type),
            };

            let target_type = match target_locator {
                Some(locator) => match self
                    .target
                    .schema()
                    .data_type(&locator.record_type, &entry.target.id)
                {
                    Ok(data_type) => data_type,
                    Err(e) if is_entry_level(&e, &locator.record_type) => {
                        let error = MappingError::UnknownTargetField {
                            field: entry.target.id.clone(),
                            reason: e.to_string(),
                        };
                        self.log.warning(node, error.to_string());
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                },
                None => infer_type(&value),
            };

            let typed = TypedValue::converted(value, source_type, &target_type)?;
            resolved.push(MappingEntry {
                source: MapSource::resolved(typed.into_value()),
                target: entry.target.clone(),
                transform: None,
            });
        }

        Ok(resolved)
    }

    fn field_value(
        &mut self,
        field: &str,
        record: Option<&Record>,
    ) -> OperationResult<(Value, DataType)> {
        let record = record.ok_or_else(|| OperationError::RecordNotFound(field.to_string()))?;
        let property = IntegrationSchema::property_name_from_fqn(field);

        match record.get(property) {
            Some(value) => {
                let data_type = self
                    .source
                    .schema()
                    .data_type(record.record_type(), field)
                    .unwrap_or_else(|_| infer_type(value));
                Ok((value.clone(), data_type))
            }
            None => {
                let error = MappingError::UnknownSourceField(field.to_string());
                self.log.warning(self.config.node, error.to_string());
                let value = Value::from("");
                let data_type = infer_type(&value);
                Ok((value, data_type))
            }
        }
    }

    /// Evaluate a formula under the target locale; failures become `#VALUE!`.
    fn evaluate(&mut self, expression: &Value, record: Option<&Record>) -> Value {
        let variables = variables_from_record(record);
        let expression = substitute_value(expression, &variables);

        let schema = self.target.schema();
        let settings = LocaleSettings::new(schema.locale(), schema.time_zone());
        match evaluate_guarded(self.evaluator, &expression, &variables, self.locale, settings) {
            Ok(value) => value,
            Err(e) => {
                self.log.warning(self.config.node, e.to_string());
                Value::from(VALUE_ERROR)
            }
        }
    }

    /// Evaluate `=` formulas and substitute `%%alias%%` tokens in locator properties.
    fn resolve_locator(
        &mut self,
        locator: &RecordLocator,
        record: Option<&Record>,
    ) -> RecordLocator {
        let mut resolved = locator.clone();
        for (key, value) in &locator.properties {
            if is_formula(value) {
                let result = self.evaluate(value, record);
                resolved.set(key.clone(), result);
            } else if let Some(text) = value.as_str().filter(|s| has_aliases(s)) {
                let variables = variables_from_record(record);
                resolved.set(key.clone(), substitute_aliases(text, &variables));
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormulaError;
    use crate::execution::formula::{SubstitutionEvaluator, Variables};
    use crate::integration::MemoryIntegration;
    use crate::logs::LogLevel;
    use serde_json::json;

    fn grades() -> MemoryIntegration {
        let mut source = MemoryIntegration::new("en_US", "UTC").with_table(
            "grades",
            json!({
                "full_name": {"type": "string"},
                "grade": {"type": "string"},
                "score": {"type": "number"}
            }),
        );
        source
            .insert(
                "grades",
                [
                    ("full_name", Value::from("Jane Doe")),
                    ("grade", Value::from(" a+ ")),
                    ("score", Value::Float(1200.5)),
                ],
            )
            .unwrap();
        source
    }

    fn transcript() -> MemoryIntegration {
        MemoryIntegration::new("fr_FR", "Europe/Paris").with_table(
            "transcript",
            json!({
                "name": {"type": "string"},
                "grade": {"type": "string"},
                "score": {"type": "string"},
                "passed": {"type": "boolean"}
            }),
        )
    }

    fn config(mapping: Vec<MappingEntry>) -> OperationConfig {
        OperationConfig {
            node: 1,
            record_locators: RecordLocators {
                source: Some(RecordLocator::new("grades")),
                target: Some(RecordLocator::new("transcript")),
            },
            mapping,
            result_mapping: Vec::new(),
        }
    }

    #[test]
    fn test_run_maps_and_converts() {
        let mut source = grades();
        let mut target = transcript();
        let scope = LocaleScope::default();
        let mapping = vec![
            MappingEntry::field("full_name", "name"),
            MappingEntry::field("grade", "grade")
                .with_transform(IndexMap::from([("A+".to_string(), Value::from("A"))])),
            MappingEntry::field("grades:score", "score"),
            MappingEntry::new(MapSource::value("1"), "passed"),
        ];

        let outcome = Operation::new(
            config(mapping),
            &mut source,
            &mut target,
            &SubstitutionEvaluator,
            &scope,
        )
        .run(None, None, None)
        .unwrap();

        assert_eq!(outcome.extracted.len(), 1);
        assert_eq!(outcome.loaded_key, Some(RecordKey::new(1, "transcript")));
        let row = &target.rows("transcript")[0];
        assert_eq!(row.get("name"), Some(&Value::from("Jane Doe")));
        assert_eq!(row.get("grade"), Some(&Value::from("A")));
        assert_eq!(row.get("score"), Some(&Value::from("1\u{202f}200,5")));
        assert_eq!(row.get("passed"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_empty_extraction() {
        let mut source = grades();
        let mut target = transcript();
        let scope = LocaleScope::default();
        let mut config = config(vec![MappingEntry::field("full_name", "name")]);
        config.record_locators.source = Some(RecordLocator::new("grades").with("id", 42i64));

        let mut operation =
            Operation::new(config, &mut source, &mut target, &SubstitutionEvaluator, &scope);
        assert!(matches!(operation.run(None, None, None), Err(OperationError::EmptyRecord)));
        assert_eq!(operation.log().len(), 1);
        drop(operation);
        assert!(target.rows("transcript").is_empty());
    }

    #[test]
    fn test_field_mapping_without_record() {
        let mut source = grades();
        let mut target = transcript();
        let scope = LocaleScope::default();
        let mut config = config(vec![MappingEntry::field("full_name", "name")]);
        config.record_locators.source = None;

        let result =
            Operation::new(config, &mut source, &mut target, &SubstitutionEvaluator, &scope)
                .run(None, None, None);
        assert!(matches!(
            result,
            Err(OperationError::RecordNotFound(field)) if field == "full_name"
        ));
    }

    #[test]
    fn test_unknown_fields_are_logged() {
        let mut source = grades();
        let mut target = transcript();
        let scope = LocaleScope::default();
        let mapping = vec![
            MappingEntry::field("nickname", "name"),
            MappingEntry::field("grade", "rank"),
        ];

        let mut operation = Operation::new(
            config(mapping),
            &mut source,
            &mut target,
            &SubstitutionEvaluator,
            &scope,
        );
        operation.run(None, None, None).unwrap();
        let warnings = operation
            .log()
            .entries()
            .iter()
            .filter(|e| e.level == LogLevel::Warning)
            .count();
        assert_eq!(warnings, 2);
        drop(operation);

        let row = &target.rows("transcript")[0];
        assert_eq!(row.get("name"), Some(&Value::from("")));
        assert_eq!(row.get("rank"), None);
    }

    #[test]
    fn test_unknown_target_record_type_is_fatal() {
        let mut source = grades();
        let mut target = transcript();
        let scope = LocaleScope::default();
        let record = source.rows("grades")[0].clone();
        let mut operation = Operation::new(
            config(Vec::new()),
            &mut source,
            &mut target,
            &SubstitutionEvaluator,
            &scope,
        );

        let result = operation.transform(
            &[MappingEntry::field("full_name", "name")],
            Some(&RecordLocator::new("no_such_type")),
            Some(&record),
        );
        assert!(matches!(
            result,
            Err(OperationError::Schema(SchemaError::UnknownRecordType(name)))
                if name == "no_such_type"
        ));

        // a qualified target naming an unknown type only drops that entry
        let entries = operation
            .transform(
                &[
                    MappingEntry::field("full_name", "courses:title"),
                    MappingEntry::field("full_name", "name"),
                ],
                Some(&RecordLocator::new("transcript")),
                Some(&record),
            )
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target.id, "name");
        assert_eq!(operation.log().problems().count(), 1);
    }

    #[test]
    fn test_formula_uses_target_locale_and_aliases() {
        let mut source = grades();
        let mut target = transcript();
        let scope = LocaleScope::default();
        let evaluator = |expression: &Value,
                         _: &Variables,
                         locale: &LocaleSettings|
         -> Result<Value, FormulaError> {
            Ok(Value::from(format!("{} [{}]", expression, locale.locale)))
        };
        let mapping = vec![MappingEntry::new(MapSource::formula("=%%full_name%%"), "name")];

        Operation::new(config(mapping), &mut source, &mut target, &evaluator, &scope)
            .run(None, None, None)
            .unwrap();

        let row = &target.rows("transcript")[0];
        assert_eq!(row.get("name"), Some(&Value::from("=Jane Doe [fr_FR]")));
        assert_eq!(scope.current(), LocaleSettings::default());
    }

    #[test]
    fn test_failing_formula_yields_value_error() {
        let mut source = grades();
        let mut target = transcript();
        let scope = LocaleScope::default();
        let evaluator =
            |_: &Value, _: &Variables, _: &LocaleSettings| -> Result<Value, FormulaError> {
                Err(FormulaError("division by zero".into()))
            };
        let mapping = vec![MappingEntry::new(MapSource::formula("=1/0"), "name")];

        Operation::new(config(mapping), &mut source, &mut target, &evaluator, &scope)
            .run(None, None, None)
            .unwrap();
        assert_eq!(target.rows("transcript")[0].get("name"), Some(&Value::from(VALUE_ERROR)));
    }

    #[test]
    fn test_pre_extracted_record_and_locator_aliases() {
        let mut source = grades();
        let mut target = transcript();
        target.insert("transcript", [("name", "Old")]).unwrap();
        let scope = LocaleScope::default();

        let mut config = config(vec![MappingEntry::field("full_name", "name")]);
        config.record_locators.target =
            Some(RecordLocator::new("transcript").with("id", "%%row%%"));
        let record = Record::new(RecordKey::new(9, "grades"))
            .with("full_name", "Ada")
            .with("row", 1i64);

        let outcome =
            Operation::new(config, &mut source, &mut target, &SubstitutionEvaluator, &scope)
                .run(None, None, Some(record))
                .unwrap();

        assert_eq!(outcome.extracted_key(), Some(&RecordKey::new(9, "grades")));
        assert_eq!(target.rows("transcript").len(), 1);
        assert_eq!(target.rows("transcript")[0].get("name"), Some(&Value::from("Ada")));
    }

    #[test]
    fn test_substitution_table_recurses_into_arrays() {
        let table = IndexMap::from([("yes".to_string(), Value::from("1"))]);
        assert_eq!(
            substitute(&Value::from(vec![" YES", "no"]), &table),
            Value::from(vec!["1", "no"])
        );
    }
}
