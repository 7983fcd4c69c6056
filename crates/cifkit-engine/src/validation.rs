//! Schema violations and where they go.
//!
//! Validation never aborts by itself. Every problem is handed to a
//! [`ViolationSink`]; the caller decides whether to collect the violations
//! ([`ValidationReport`]), log them ([`LogSink`]) or fail. Writes made through
//! the public API consult the [`ValidationMode`]: in strict mode an invalid
//! value is rejected, in lenient mode it is logged and stored anyway.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CifError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    #[default]
    Lenient,
    Strict,
}

/// Validation settings carried by a document and handed down to its blocks
/// and categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    pub mode: ValidationMode,
}

impl ValidationOptions {
    pub fn strict() -> Self {
        Self {
            mode: ValidationMode::Strict,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.mode == ValidationMode::Strict
    }

    /// Apply the mode to a violation found while assigning a value.
    pub(crate) fn enforce(&self, violation: SchemaViolation) -> Result<(), CifError> {
        match self.mode {
            ValidationMode::Strict => Err(CifError::Schema(violation)),
            ValidationMode::Lenient => {
                log::warn!("{violation}");
                Ok(())
            }
        }
    }
}

/// A value, item or category that does not conform to the dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    pub message: String,
}

impl SchemaViolation {
    pub fn category(category: &str, message: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            item: None,
            message: message.into(),
        }
    }

    pub fn item(category: &str, item: &str, message: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            item: Some(item.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item {
            Some(item) => write!(f, "_{}.{}: {}", self.category, item, self.message),
            None => write!(f, "{}: {}", self.category, self.message),
        }
    }
}

impl std::error::Error for SchemaViolation {}

/// Receives violations as validation finds them.
pub trait ViolationSink {
    fn report(&mut self, violation: SchemaViolation);
}

impl<S: ViolationSink + ?Sized> ViolationSink for &mut S {
    fn report(&mut self, violation: SchemaViolation) {
        (**self).report(violation);
    }
}

/// Collects violations; empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationReport {
    violations: Vec<SchemaViolation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SchemaViolation> {
        self.violations.iter()
    }

    pub fn extend(&mut self, other: ValidationReport) {
        self.violations.extend(other.violations);
    }
}

impl ViolationSink for ValidationReport {
    fn report(&mut self, violation: SchemaViolation) {
        self.violations.push(violation);
    }
}

impl IntoIterator for ValidationReport {
    type Item = SchemaViolation;
    type IntoIter = std::vec::IntoIter<SchemaViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationReport {
    type Item = &'a SchemaViolation;
    type IntoIter = std::slice::Iter<'a, SchemaViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}

/// Logs every violation as a warning and keeps count.
#[derive(Debug, Default)]
pub struct LogSink {
    pub count: usize,
}

impl ViolationSink for LogSink {
    fn report(&mut self, violation: SchemaViolation) {
        log::warn!("{violation}");
        self.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_with_and_without_item() {
        let v = SchemaViolation::item("atom_site", "id", "missing mandatory item");
        assert_eq!(v.to_string(), "_atom_site.id: missing mandatory item");

        let v = SchemaViolation::category("foo", "category is not defined in the dictionary");
        assert_eq!(v.to_string(), "foo: category is not defined in the dictionary");
    }

    #[test]
    fn report_collects_in_order() {
        let mut report = ValidationReport::new();
        assert!(report.is_valid());

        report.report(SchemaViolation::category("a", "one"));
        report.report(SchemaViolation::category("b", "two"));

        assert!(!report.is_valid());
        let categories: Vec<_> = report.iter().map(|v| v.category.as_str()).collect();
        assert_eq!(categories, vec!["a", "b"]);
    }

    #[test]
    fn strict_mode_rejects_lenient_mode_accepts() {
        let violation = SchemaViolation::item("cat", "x", "bad");

        let err = ValidationOptions::strict()
            .enforce(violation.clone())
            .unwrap_err();
        assert!(matches!(err, CifError::Schema(v) if v == violation));

        assert!(ValidationOptions::default().enforce(violation).is_ok());
    }

    #[test]
    fn log_sink_counts() {
        let mut sink = LogSink::default();
        sink.report(SchemaViolation::category("a", "one"));
        sink.report(SchemaViolation::category("a", "two"));
        assert_eq!(sink.count, 2);
    }

    #[test]
    fn report_serializes_as_list() {
        let mut report = ValidationReport::new();
        report.report(SchemaViolation::item("cat_1", "id", "value does not match type int"));
        report.report(SchemaViolation::category("cat_9", "undefined category"));
        insta::assert_yaml_snapshot!(report, @r"
        - category: cat_1
          item: id
          message: value does not match type int
        - category: cat_9
          message: undefined category
        ");
    }
}
