//! Formula evaluation.
//!
//! The engine does not ship a spreadsheet formula language; it talks to one
//! through [`FormulaEvaluator`]. Before evaluation, `%%alias%%` tokens are
//! replaced with the current record's values. Evaluation runs under the
//! target locale, set through a [`LocaleScope`] guard that restores the
//! default locale on every exit path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::{DEFAULT_LOCALE, DEFAULT_TIME_ZONE};
use crate::error::FormulaError;
use crate::models::{Record, Value};

/// Result of a formula that could not be evaluated.
pub const VALUE_ERROR: &str = "#VALUE!";

/// Alias name to plain string value.
pub type Variables = HashMap<String, String>;

static ALIAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"%%([^%]+)%%").expect("alias pattern"));

// =============================================================================
// Locale scope
// =============================================================================

/// Locale and timezone a formula is evaluated under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleSettings {
    pub locale: String,
    pub time_zone: String,
}

impl LocaleSettings {
    pub fn new(locale: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            time_zone: time_zone.into(),
        }
    }
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE, DEFAULT_TIME_ZONE)
    }
}

/// The locale in effect for formula evaluation, owned by one execution.
#[derive(Debug, Default)]
pub struct LocaleScope {
    default: LocaleSettings,
    current: RefCell<LocaleSettings>,
}

/// Restores the default locale when dropped.
#[must_use = "the locale is restored as soon as the guard is dropped"]
pub struct LocaleGuard<'a> {
    scope: &'a LocaleScope,
}

impl LocaleScope {
    pub fn new(default: LocaleSettings) -> Self {
        Self {
            current: RefCell::new(default.clone()),
            default,
        }
    }

    pub fn current(&self) -> LocaleSettings {
        self.current.borrow().clone()
    }

    pub fn default_settings(&self) -> &LocaleSettings {
        &self.default
    }

    /// Switch to `settings` until the returned guard is dropped.
    pub fn enter(&self, settings: LocaleSettings) -> LocaleGuard<'_> {
        *self.current.borrow_mut() = settings;
        LocaleGuard { scope: self }
    }
}

impl Drop for LocaleGuard<'_> {
    fn drop(&mut self) {
        *self.scope.current.borrow_mut() = self.scope.default.clone();
    }
}

// =============================================================================
// Evaluators
// =============================================================================

/// External formula language.
///
/// `expression` is a string or an array of strings with aliases already
/// substituted; `variables` is passed along for evaluators that resolve
/// names themselves.
pub trait FormulaEvaluator {
    fn evaluate(
        &self,
        expression: &Value,
        variables: &Variables,
        locale: &LocaleSettings,
    ) -> Result<Value, FormulaError>;
}

impl<F> FormulaEvaluator for F
where
    F: Fn(&Value, &Variables, &LocaleSettings) -> Result<Value, FormulaError>,
{
    fn evaluate(
        &self,
        expression: &Value,
        variables: &Variables,
        locale: &LocaleSettings,
    ) -> Result<Value, FormulaError> {
        self(expression, variables, locale)
    }
}

/// Evaluator without a formula language: the expression text itself, minus
/// the leading `=`, is the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstitutionEvaluator;

impl FormulaEvaluator for SubstitutionEvaluator {
    fn evaluate(
        &self,
        expression: &Value,
        variables: &Variables,
        _locale: &LocaleSettings,
    ) -> Result<Value, FormulaError> {
        Ok(match substitute_value(expression, variables) {
            Value::String(s) => Value::String(s.strip_prefix('=').unwrap_or(&s).to_string()),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => {
                            Value::String(s.strip_prefix('=').unwrap_or(&s).to_string())
                        }
                        other => other,
                    })
                    .collect(),
            ),
            other => other,
        })
    }
}

/// Run `evaluator` under `settings`, restoring the default locale afterwards.
///
/// A panic inside the evaluator is reported as a [`FormulaError`].
pub fn evaluate_guarded(
    evaluator: &dyn FormulaEvaluator,
    expression: &Value,
    variables: &Variables,
    scope: &LocaleScope,
    settings: LocaleSettings,
) -> Result<Value, FormulaError> {
    let _guard = scope.enter(settings);
    let current = scope.current();

    panic::catch_unwind(AssertUnwindSafe(|| {
        evaluator.evaluate(expression, variables, &current)
    }))
    .unwrap_or_else(|_| Err(FormulaError("evaluator panicked".to_string())))
}

// =============================================================================
// Aliases
// =============================================================================

/// `%%field%%` and `%%recordType:field%%` variables for a record.
pub fn variables_from_record(record: Option<&Record>) -> Variables {
    let mut variables = Variables::new();
    if let Some(record) = record {
        for (field, value) in &record.data {
            let plain = value.to_plain_string();
            variables.insert(format!("{}:{}", record.record_type(), field), plain.clone());
            variables.insert(field.clone(), plain);
        }
    }
    variables
}

/// Replace `%%name%%` tokens; unknown names become empty strings.
pub fn substitute_aliases(text: &str, variables: &Variables) -> String {
    ALIAS
        .replace_all(text, |caps: &Captures| {
            variables.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

pub fn has_aliases(text: &str) -> bool {
    ALIAS.is_match(text)
}

/// Alias substitution over strings and arrays of strings.
pub fn substitute_value(value: &Value, variables: &Variables) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_aliases(s, variables)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_value(item, variables))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Strings starting with `=` are formulas.
pub fn is_formula(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.starts_with('='))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKey;

    fn record() -> Record {
        Record::new(RecordKey::new(1, "grades"))
            .with("full_name", "Jane Doe")
            .with("passed", true)
    }

    #[test]
    fn test_variables_and_substitution() {
        let variables = variables_from_record(Some(&record()));
        assert_eq!(variables["full_name"], "Jane Doe");
        assert_eq!(variables["grades:passed"], "1");

        assert_eq!(
            substitute_aliases("Hello %%full_name%% (%%grades:passed%%) %%missing%%!", &variables),
            "Hello Jane Doe (1) !"
        );
        assert!(has_aliases("%%x%%"));
        assert!(!has_aliases("100%"));
    }

    #[test]
    fn test_substitution_evaluator() {
        let variables = variables_from_record(Some(&record()));
        let result = SubstitutionEvaluator
            .evaluate(&Value::from("=%%full_name%%"), &variables, &LocaleSettings::default())
            .unwrap();
        assert_eq!(result, Value::from("Jane Doe"));

        let result = SubstitutionEvaluator
            .evaluate(&Value::from(vec!["=a", "b"]), &variables, &LocaleSettings::default())
            .unwrap();
        assert_eq!(result, Value::from(vec!["a", "b"]));
    }

    #[test]
    fn test_guard_restores_default_locale() {
        let scope = LocaleScope::default();
        let seen = RefCell::new(None);
        let evaluator =
            |_: &Value, _: &Variables, locale: &LocaleSettings| -> Result<Value, FormulaError> {
                *seen.borrow_mut() = Some(locale.clone());
                Ok(Value::from("ok"))
            };

        let settings = LocaleSettings::new("fr_FR", "Europe/Paris");
        let result = evaluate_guarded(
            &evaluator,
            &Value::from("=X"),
            &Variables::new(),
            &scope,
            settings.clone(),
        );
        assert_eq!(result.unwrap(), Value::from("ok"));
        assert_eq!(seen.borrow().as_ref(), Some(&settings));
        assert_eq!(scope.current(), LocaleSettings::default());
    }

    #[test]
    fn test_guard_restores_after_panic() {
        let scope = LocaleScope::default();
        let evaluator =
            |_: &Value, _: &Variables, _: &LocaleSettings| -> Result<Value, FormulaError> {
                panic!("boom")
            };

        let result = evaluate_guarded(
            &evaluator,
            &Value::from("=X"),
            &Variables::new(),
            &scope,
            LocaleSettings::new("de_DE", "Europe/Berlin"),
        );
        assert!(result.is_err());
        assert_eq!(scope.current(), LocaleSettings::default());
    }

    #[test]
    fn test_is_formula() {
        assert!(is_formula(&Value::from("=SUM(1,2)")));
        assert!(!is_formula(&Value::from("SUM")));
        assert!(!is_formula(&Value::Int(1)));
    }
}
