//! Conversion of untrusted input into records.

use crate::{
    condition::key_text,
    error::Result,
    events::Event,
    FieldName, MarshalOptions, Record, Repository, Schema,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Builds and patches records from raw field maps.
///
/// Only schema columns are assigned. With the guard on, fields the record
/// marks inaccessible are dropped as well.
#[derive(Debug, Clone, Copy)]
pub struct Marshaller<'a> {
    repository: &'a Repository,
}

impl<'a> Marshaller<'a> {
    pub fn new(repository: &'a Repository) -> Self {
        Self { repository }
    }

    /// Build one new record.
    pub fn one(&self, data: Map<String, Value>, options: &MarshalOptions) -> Result<Record> {
        let mut record = self.repository.new_empty_record()?;
        self.assign(&mut record, data, options)?;
        Ok(record)
    }

    /// Build one new record per input.
    pub fn many(&self, data: Vec<Map<String, Value>>, options: &MarshalOptions) -> Result<Vec<Record>> {
        data.into_iter().map(|item| self.one(item, options)).collect()
    }

    /// Patch an existing record. Only changed values become dirty.
    pub fn merge(&self, record: &mut Record, data: Map<String, Value>, options: &MarshalOptions) -> Result<()> {
        self.assign(record, data, options)
    }

    /// Patch records with the inputs carrying the same primary key.
    ///
    /// Records without a matching input are returned unchanged; inputs
    /// without a matching record are ignored. The order of `records` is kept.
    pub fn merge_many(
        &self,
        records: Vec<Record>,
        data: Vec<Map<String, Value>>,
        options: &MarshalOptions,
    ) -> Result<Vec<Record>> {
        let key_fields = self.repository.primary_key()?;
        if key_fields.is_empty() {
            return Ok(records);
        }

        let mut by_key: HashMap<String, Map<String, Value>> = HashMap::new();
        for item in data {
            let key = key_fields
                .iter()
                .map(|f| item.get(f).filter(|v| !v.is_null()).cloned())
                .collect::<Option<Vec<_>>>();
            if let Some(key) = key {
                by_key.entry(pairing_key(&key)).or_insert(item);
            }
        }

        records
            .into_iter()
            .map(|mut record| {
                let item = record
                    .key_values(key_fields)
                    .and_then(|key| by_key.remove(&pairing_key(&key)));
                if let Some(item) = item {
                    self.merge(&mut record, item, options)?;
                }
                Ok(record)
            })
            .collect()
    }

    fn assign(&self, record: &mut Record, mut data: Map<String, Value>, options: &MarshalOptions) -> Result<()> {
        self.repository
            .events()
            .notify(Event::BeforeMarshal, |l| l.before_marshal(&mut data, options));

        let schema = self.repository.schema()?;
        for (field, accessible) in &options.accessible {
            record.set_accessible(field.clone(), *accessible);
        }

        for (field, value) in data {
            if accepts(schema, record, &field, options) {
                record.set(field, value);
            } else {
                tracing::trace!(field = %field, "field dropped while marshalling");
            }
        }
        Ok(())
    }
}

/// Key values compared by their text form, so numeric and string ids pair up.
fn pairing_key(values: &[Value]) -> String {
    Value::Array(
        values
            .iter()
            .map(|v| Value::String(key_text(Some(v))))
            .collect(),
    )
    .to_string()
}

fn accepts(schema: &Schema, record: &Record, field: &FieldName, options: &MarshalOptions) -> bool {
    schema.has_column(field) && options.allows(field) && (!options.guard || record.is_accessible(field))
}
