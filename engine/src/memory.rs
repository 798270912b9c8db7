//! In-memory transport.
//!
//! Holds collections in process and answers requests the way a remote backend
//! would. Every request is logged so callers can inspect the traffic a
//! repository produced.

use crate::{
    condition::{self, Condition, Matcher},
    error::Result,
    schema::ColumnType,
    transport::{OperationKind, RequestDescriptor, Transport, TransportResult},
    CollectionName, Error, FieldName, Record, Schema,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Rows of one collection.
#[derive(Debug, Clone)]
struct Collection {
    schema: Schema,
    rows: Vec<Map<String, Value>>,
}

impl Collection {
    fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    fn key_condition(&self, row: &Map<String, Value>) -> Option<Condition> {
        let key = self.schema.primary_key();
        if key.is_empty() {
            return None;
        }
        let values = key
            .iter()
            .map(|f| row.get(f).filter(|v| !v.is_null()).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(Condition::all_eq(key.iter().cloned().zip(values)))
    }

    fn check(&self, values: &Map<String, Value>) -> Result<()> {
        for (field, value) in values {
            let column = self.schema.column(field).ok_or_else(|| {
                Error::Transport(format!(
                    "unknown column '{field}' in '{}'",
                    self.schema.name
                ))
            })?;
            column.check(value).map_err(Error::Transport)?;
        }
        Ok(())
    }

    fn next_key(&self, field: &str) -> Value {
        match self.schema.column_type(field) {
            Some(ColumnType::Integer) => {
                let max = self
                    .rows
                    .iter()
                    .filter_map(|row| row.get(field).and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0);
                Value::from(max + 1)
            }
            _ => Value::String(uuid::Uuid::new_v4().to_string()),
        }
    }

    fn read(&self, request: &RequestDescriptor) -> Result<TransportResult> {
        let matcher = compile(request)?;
        let mut matched: Vec<&Map<String, Value>> = self
            .rows
            .iter()
            .filter(|row| selects(&matcher, row))
            .collect();

        if !request.order.is_empty() {
            matched.sort_by(|a, b| {
                request
                    .order
                    .iter()
                    .map(|clause| {
                        let ordering = match (a.get(&clause.field), b.get(&clause.field)) {
                            (Some(x), Some(y)) => condition::order(x, y).unwrap_or(Ordering::Equal),
                            (Some(_), None) => Ordering::Greater,
                            (None, Some(_)) => Ordering::Less,
                            (None, None) => Ordering::Equal,
                        };
                        match clause.direction {
                            crate::transport::Direction::Asc => ordering,
                            crate::transport::Direction::Desc => ordering.reverse(),
                        }
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        let total = matched.len() as u64;
        let offset = request
            .offset
            .map_or(0, |o| usize::try_from(o).unwrap_or(usize::MAX));
        let limit = request
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        let rows = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(row, &request.fields))
            .collect();

        Ok(TransportResult::Rows {
            rows,
            total: Some(total),
        })
    }

    fn create(&mut self, request: &RequestDescriptor) -> Result<Map<String, Value>> {
        self.check(&request.values)?;

        let mut row = request.values.clone();
        for (field, default) in self.schema.default_values() {
            row.entry(field).or_insert(default);
        }
        if let [field] = self.schema.primary_key() {
            if row.get(field).is_none_or(Value::is_null) {
                let key = self.next_key(field);
                row.insert(field.clone(), key);
            }
        }

        let key = self.key_condition(&row).ok_or_else(|| {
            Error::Transport(format!("row in '{}' has no complete key", self.schema.name))
        })?;
        let key = key.matcher()?;
        if self.rows.iter().any(|existing| key.matches(existing)) {
            return Err(Error::Transport(format!(
                "duplicate primary key in '{}'",
                self.schema.name
            )));
        }
        let missing: Vec<&str> = self
            .schema
            .columns()
            .into_iter()
            .filter(|c| self.schema.column(c).is_some_and(|col| !col.nullable))
            .filter(|c| row.get(*c).is_none_or(Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Transport(format!(
                "missing required columns: {}",
                missing.join(", ")
            )));
        }

        self.rows.push(row.clone());
        Ok(row)
    }

    fn update(&mut self, request: &RequestDescriptor) -> Result<u64> {
        self.check(&request.values)?;

        let matcher = compile(request)?;
        let mut affected = 0;
        for row in self.rows.iter_mut().filter(|row| selects(&matcher, row)) {
            row.extend(request.values.iter().map(|(k, v)| (k.clone(), v.clone())));
            affected += 1;
        }
        Ok(affected)
    }

    fn delete(&mut self, request: &RequestDescriptor) -> Result<u64> {
        let matcher = compile(request)?;
        let before = self.rows.len();
        self.rows.retain(|row| !selects(&matcher, row));
        Ok((before - self.rows.len()) as u64)
    }
}

fn compile(request: &RequestDescriptor) -> Result<Option<Matcher<'_>>> {
    request.conditions.as_ref().map(Condition::matcher).transpose()
}

/// Rows pass when there is no condition.
fn selects(matcher: &Option<Matcher<'_>>, row: &Map<String, Value>) -> bool {
    matcher.as_ref().is_none_or(|m| m.matches(row))
}

fn project(row: &Map<String, Value>, fields: &[FieldName]) -> Map<String, Value> {
    if fields.is_empty() {
        return row.clone();
    }
    fields
        .iter()
        .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}

/// Transport over process-local collections.
///
/// Thread-safe and can be shared across repositories via `Arc`.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    collections: RwLock<HashMap<CollectionName, Collection>>,
    requests: Mutex<Vec<RequestDescriptor>>,
    describes: AtomicUsize,
    echo_created: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty transport wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Builder-style method to add a collection.
    pub fn with_collection(self, schema: Schema) -> Self {
        self.add_collection(schema);
        self
    }

    /// Builder-style method to answer creates with the stored row as a record
    /// instead of an affected count.
    pub fn echo_created(mut self, echo: bool) -> Self {
        self.echo_created = echo;
        self
    }

    /// Add a collection, replacing any collection with the same name.
    pub fn add_collection(&self, schema: Schema) {
        tracing::debug!(collection = %schema.name, "collection added");
        self.collections
            .write()
            .insert(schema.name.clone(), Collection::new(schema));
    }

    /// Seed a row without logging a request.
    pub fn insert(&self, collection: &str, row: Map<String, Value>) -> Result<()> {
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        let mut request = RequestDescriptor::new(OperationKind::Create, collection);
        request.values = row;
        target.create(&request).map(|_| ())
    }

    /// Current rows of a collection.
    pub fn rows(&self, collection: &str) -> Vec<Map<String, Value>> {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.rows.clone())
            .unwrap_or_default()
    }

    /// Every request executed so far, in order.
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().clone()
    }

    /// Number of executed requests of one kind.
    pub fn request_count(&self, kind: OperationKind) -> usize {
        self.requests.lock().iter().filter(|r| r.kind == kind).count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    /// Number of `describe` calls served.
    pub fn describe_count(&self) -> usize {
        self.describes.load(AtomicOrdering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn describe(&self, collection: &str) -> Result<Schema> {
        self.describes.fetch_add(1, AtomicOrdering::SeqCst);
        self.collections
            .read()
            .get(collection)
            .map(|c| c.schema.clone())
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))
    }

    fn execute(&self, request: &RequestDescriptor) -> Result<TransportResult> {
        self.requests.lock().push(request.clone());

        let mut collections = self.collections.write();
        let collection = collections
            .get_mut(&request.collection)
            .ok_or_else(|| Error::CollectionNotFound(request.collection.clone()))?;

        match request.kind {
            OperationKind::Read => collection.read(request),
            OperationKind::Create => {
                let row = collection.create(request)?;
                if self.echo_created {
                    Ok(TransportResult::Resource(Record::persisted(row)))
                } else {
                    Ok(TransportResult::Affected(1))
                }
            }
            OperationKind::Update => collection.update(request).map(TransportResult::Affected),
            OperationKind::Delete => collection.delete(request).map(TransportResult::Affected),
        }
    }
}
