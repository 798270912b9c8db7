//! Transport adapter contract.
//!
//! A transport executes normalized [`RequestDescriptor`]s against a concrete
//! backend. The engine never speaks a wire protocol itself; everything it needs
//! from a backend goes through [`Transport::describe`] and
//! [`Transport::execute`].

use crate::{
    condition::Condition, error::Result, CollectionName, Error, FieldName, Record, Schema,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Kind of operation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Read => write!(f, "read"),
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(Error::InvalidOptions(format!(
                "unknown sort direction '{other}'"
            ))),
        }
    }
}

/// One ordering clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    pub field: FieldName,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<FieldName>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<FieldName>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Parse the loose ordering syntax used in finder options.
    ///
    /// Accepts `"field"`, `"field DESC"`, arrays of those, or an object
    /// mapping fields to directions.
    pub fn parse_value(value: &Value) -> Result<Vec<OrderBy>> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::String(clause) => Ok(vec![Self::parse_clause(clause)?]),
            Value::Array(items) => items.iter().try_fold(Vec::new(), |mut acc, item| {
                acc.extend(Self::parse_value(item)?);
                Ok(acc)
            }),
            Value::Object(map) => map
                .iter()
                .map(|(field, direction)| {
                    let direction = direction.as_str().ok_or_else(|| {
                        Error::InvalidOptions(format!("direction for '{field}' must be a string"))
                    })?;
                    Ok(OrderBy {
                        field: field.clone(),
                        direction: Direction::parse(direction)?,
                    })
                })
                .collect(),
            other => Err(Error::InvalidOptions(format!("invalid order clause {other}"))),
        }
    }

    fn parse_clause(clause: &str) -> Result<OrderBy> {
        let mut parts = clause.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| Error::InvalidOptions("empty order clause".into()))?;
        let direction = Direction::parse(parts.next().unwrap_or(""))?;

        Ok(OrderBy {
            field: field.to_string(),
            direction,
        })
    }
}

/// The backend-agnostic description of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    /// Operation kind
    pub kind: OperationKind,
    /// Target collection
    pub collection: CollectionName,
    /// Condition tree, `None` for "everything"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Condition>,
    /// Projected fields for reads, empty for all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldName>,
    /// Written values for creates and updates
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub values: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    /// Finder options not understood by the engine
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl RequestDescriptor {
    /// Create a descriptor with no conditions or shape.
    pub fn new(kind: OperationKind, collection: impl Into<CollectionName>) -> Self {
        Self {
            kind,
            collection: collection.into(),
            conditions: None,
            fields: Vec::new(),
            values: Map::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            page: None,
            options: Map::new(),
        }
    }
}

/// Raw outcome of a transport call.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportResult {
    /// Rows of a read, with the total number of matches when known
    Rows {
        rows: Vec<Map<String, Value>>,
        total: Option<u64>,
    },
    /// A fully hydrated record echoed by the backend
    Resource(Record),
    /// Number of rows affected by a write
    Affected(u64),
}

/// A pluggable backend executor.
pub trait Transport: Send + Sync {
    /// Describe the columns and primary key of a collection.
    fn describe(&self, collection: &str) -> Result<Schema>;

    /// Execute one request.
    fn execute(&self, request: &RequestDescriptor) -> Result<TransportResult>;
}

/// Named transports that repositories resolve lazily by connection name.
///
/// Thread-safe and can be shared across repositories via `Arc`.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<dyn Transport>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Create an empty registry wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a transport under a connection name, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, transport: Arc<dyn Transport>) {
        let name = name.into();
        tracing::debug!(connection = %name, "connection registered");
        self.connections.insert(name, transport);
    }

    /// Remove a connection.
    pub fn unregister(&self, name: &str) -> bool {
        self.connections.remove(name).is_some()
    }

    /// Look up a connection.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Transport>> {
        self.connections
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::MissingConnection(name.to_string()))
    }

    /// Names of all registered connections.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.connections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NullTransport;

    impl Transport for NullTransport {
        fn describe(&self, collection: &str) -> Result<Schema> {
            Ok(Schema::new(collection))
        }

        fn execute(&self, _request: &RequestDescriptor) -> Result<TransportResult> {
            Ok(TransportResult::Affected(0))
        }
    }

    #[test]
    fn parse_order_forms() {
        assert_eq!(
            OrderBy::parse_value(&json!("title")).unwrap(),
            vec![OrderBy::asc("title")]
        );
        assert_eq!(
            OrderBy::parse_value(&json!(["title DESC", "id"])).unwrap(),
            vec![OrderBy::desc("title"), OrderBy::asc("id")]
        );
        assert_eq!(
            OrderBy::parse_value(&json!({"created": "desc", "id": "ASC"})).unwrap(),
            vec![OrderBy::desc("created"), OrderBy::asc("id")]
        );
        assert!(OrderBy::parse_value(&json!("title sideways")).is_err());
        assert!(OrderBy::parse_value(&json!(3)).is_err());
    }

    #[test]
    fn descriptor_serialization_skips_empty_parts() {
        let mut request = RequestDescriptor::new(OperationKind::Read, "articles");
        request.conditions = Some(Condition::eq("id", 1));
        request.limit = Some(10);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({"kind": "read", "collection": "articles", "conditions": {"id": 1}, "limit": 10})
        );

        let parsed: RequestDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn registry_lookup() {
        let registry = ConnectionRegistry::new_shared();
        registry.register("default", Arc::new(NullTransport));

        assert!(registry.get("default").is_ok());
        assert!(matches!(
            registry.get("other"),
            Err(Error::MissingConnection(name)) if name == "other"
        ));

        assert!(registry.unregister("default"));
        assert!(registry.names().is_empty());
    }
}
