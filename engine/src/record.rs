//! Record type holding one row of a collection.

use crate::FieldName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Accessibility key matching every field without an explicit rule.
pub const WILDCARD: &str = "*";

/// A dirty-tracked bag of field values.
///
/// Records start out new; hydration from a backend marks them persisted and
/// clean. Field changes go through [`Record::set`], which keeps the dirty set
/// in sync. A record carrying errors is never written by a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Field values
    fields: Map<String, Value>,
    /// Fields changed since the record was last cleaned
    #[serde(default)]
    dirty: BTreeSet<FieldName>,
    /// Whether the record has never been persisted
    new: bool,
    /// Validation errors by field
    #[serde(default)]
    errors: BTreeMap<FieldName, Vec<String>>,
    /// Mass-assignment rules by field, `*` as fallback
    #[serde(default = "default_accessible")]
    accessible: BTreeMap<FieldName, bool>,
    /// Alias of the repository that produced the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

fn default_accessible() -> BTreeMap<FieldName, bool> {
    BTreeMap::from([(WILDCARD.to_string(), true)])
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    /// Create an empty, new record.
    pub fn new() -> Self {
        Self {
            fields: Map::new(),
            dirty: BTreeSet::new(),
            new: true,
            errors: BTreeMap::new(),
            accessible: default_accessible(),
            source: None,
        }
    }

    /// Create a new record with every given field set and dirty.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        let mut record = Self::new();
        for (field, value) in fields {
            record.set(field, value);
        }
        record
    }

    /// Create a persisted, clean record.
    pub fn persisted(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            new: false,
            ..Self::new()
        }
    }

    /// Builder-style method to set the source alias.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Alias of the repository that produced this record.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Set the source alias.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Whether a field is present and not null.
    pub fn has(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|v| !v.is_null())
    }

    /// Set a field value, marking it dirty when the value changes.
    pub fn set(&mut self, field: impl Into<FieldName>, value: Value) -> &mut Self {
        let field = field.into();
        if self.fields.get(&field) != Some(&value) {
            self.dirty.insert(field.clone());
        }
        self.fields.insert(field, value);
        self
    }

    /// Remove a field.
    pub fn unset(&mut self, field: &str) -> Option<Value> {
        self.dirty.remove(field);
        self.fields.remove(field)
    }

    /// All field values.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume the record, returning its field values.
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Values of the given fields that are present on the record.
    pub fn extract<S: AsRef<str>>(&self, fields: &[S]) -> Map<String, Value> {
        fields
            .iter()
            .filter_map(|f| {
                let f = f.as_ref();
                self.fields.get(f).map(|v| (f.to_string(), v.clone()))
            })
            .collect()
    }

    /// Values of the given key fields, or `None` if any of them is missing.
    pub fn key_values<S: AsRef<str>>(&self, fields: &[S]) -> Option<Vec<Value>> {
        fields
            .iter()
            .map(|f| self.fields.get(f.as_ref()).filter(|v| !v.is_null()).cloned())
            .collect()
    }

    /// Whether the record has never been persisted.
    pub fn is_new(&self) -> bool {
        self.new
    }

    /// Mark the record as new or persisted.
    pub fn set_new(&mut self, new: bool) {
        self.new = new;
    }

    /// Whether a single field is dirty.
    pub fn is_dirty(&self, field: &str) -> bool {
        self.dirty.contains(field)
    }

    /// Whether any field is dirty.
    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Dirty field names.
    pub fn dirty_fields(&self) -> Vec<&str> {
        self.dirty.iter().map(String::as_str).collect()
    }

    /// Mark a single field dirty or clean.
    pub fn set_dirty(&mut self, field: impl Into<FieldName>, dirty: bool) {
        let field = field.into();
        if dirty {
            self.dirty.insert(field);
        } else {
            self.dirty.remove(&field);
        }
    }

    /// Clear the dirty set and all errors.
    pub fn clean(&mut self) {
        self.dirty.clear();
        self.errors.clear();
    }

    /// Errors by field.
    pub fn errors(&self) -> &BTreeMap<FieldName, Vec<String>> {
        &self.errors
    }

    /// Errors attached to one field.
    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Attach an error message to a field.
    pub fn add_error(&mut self, field: impl Into<FieldName>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Whether the record carries any error.
    pub fn has_errors(&self) -> bool {
        self.errors.values().any(|e| !e.is_empty())
    }

    /// Whether a field may be mass-assigned.
    pub fn is_accessible(&self, field: &str) -> bool {
        self.accessible
            .get(field)
            .or_else(|| self.accessible.get(WILDCARD))
            .copied()
            .unwrap_or(false)
    }

    /// Set the mass-assignment rule for a field (or `*`).
    pub fn set_accessible(&mut self, field: impl Into<FieldName>, accessible: bool) -> &mut Self {
        self.accessible.insert(field.into(), accessible);
        self
    }

    /// Replace all mass-assignment rules.
    pub fn set_accessibility(&mut self, rules: BTreeMap<FieldName, bool>) {
        self.accessible = rules;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn create_record() {
        let record = Record::from_fields(fields(json!({"id": 1, "title": "Hello"})));

        assert!(record.is_new());
        assert_eq!(record.get("title"), Some(&json!("Hello")));
        assert_eq!(record.dirty_fields(), vec!["id", "title"]);
        assert!(record.source().is_none());
    }

    #[test]
    fn persisted_record_is_clean() {
        let record = Record::persisted(fields(json!({"id": 1})));

        assert!(!record.is_new());
        assert!(!record.has_dirty());
    }

    #[test]
    fn set_only_dirties_changes() {
        let mut record = Record::persisted(fields(json!({"id": 1, "title": "Hello"})));

        record.set("title", json!("Hello"));
        assert!(!record.has_dirty());

        record.set("title", json!("Bye"));
        assert!(record.is_dirty("title"));
        assert!(!record.is_dirty("id"));

        record.clean();
        assert!(!record.has_dirty());
    }

    #[test]
    fn key_values_require_every_field() {
        let record = Record::persisted(fields(json!({"a": 1, "b": null})));

        assert_eq!(record.key_values(&["a"]), Some(vec![json!(1)]));
        assert_eq!(record.key_values(&["a", "b"]), None);
        assert_eq!(record.key_values(&["a", "c"]), None);
    }

    #[test]
    fn extract_skips_missing_fields() {
        let record = Record::from_fields(fields(json!({"id": 1, "title": "x", "extra": true})));
        let extracted = record.extract(&["id", "title", "body"]);

        assert_eq!(extracted, fields(json!({"id": 1, "title": "x"})));
    }

    #[test]
    fn accessibility_rules() {
        let mut record = Record::new();
        assert!(record.is_accessible("anything"));

        record.set_accessible("id", false);
        assert!(!record.is_accessible("id"));
        assert!(record.is_accessible("title"));

        record.set_accessible(WILDCARD, false);
        assert!(!record.is_accessible("title"));
    }

    #[test]
    fn errors() {
        let mut record = Record::new();
        assert!(!record.has_errors());

        record.add_error("title", "must not be empty");
        assert!(record.has_errors());
        assert_eq!(record.field_errors("title"), ["must not be empty".to_string()]);
        assert!(record.field_errors("body").is_empty());
    }

    #[test]
    fn serialization_roundtrip() {
        let mut record = Record::from_fields(fields(json!({"id": 1}))).with_source("Articles");
        record.add_error("id", "taken");

        let json = serde_json::to_string(&record).unwrap();
        let parsed: Record = serde_json::from_str(&json).unwrap();

        assert_eq!(record, parsed);
    }
}
