//! Schema description of a remote collection.
//!
//! A schema names the columns a collection exposes and which of them form the
//! primary key. Repositories fetch it lazily from their transport and keep it
//! immutable afterwards.

use crate::{error::Result, CollectionName, Error, FieldName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Datetime,
    Uuid,
    /// Arbitrary nested JSON
    Json,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::String => write!(f, "String"),
            ColumnType::Text => write!(f, "Text"),
            ColumnType::Integer => write!(f, "Integer"),
            ColumnType::Float => write!(f, "Float"),
            ColumnType::Boolean => write!(f, "Boolean"),
            ColumnType::Datetime => write!(f, "Datetime"),
            ColumnType::Uuid => write!(f, "Uuid"),
            ColumnType::Json => write!(f, "Json"),
        }
    }
}

/// Description of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column name
    pub name: FieldName,
    /// Column type
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether null is an acceptable value
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Default value applied by the backend when the column is omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// Create a nullable column without a default.
    pub fn new(name: impl Into<FieldName>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
        }
    }

    /// Create a column that rejects null.
    pub fn required(name: impl Into<FieldName>, column_type: ColumnType) -> Self {
        Self {
            nullable: false,
            ..Self::new(name, column_type)
        }
    }

    /// Builder-style method to attach a default value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Check a value against this column's nullability and type.
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        if value.is_null() {
            return if self.nullable {
                Ok(())
            } else {
                Err(format!("column '{}' cannot be null", self.name))
            };
        }

        let valid = match self.column_type {
            ColumnType::String | ColumnType::Text | ColumnType::Uuid => value.is_string(),
            ColumnType::Integer => value.is_i64() || value.is_u64(),
            ColumnType::Float => value.is_number(),
            ColumnType::Boolean => value.is_boolean(),
            ColumnType::Datetime => value.is_string() || value.is_i64() || value.is_u64(),
            ColumnType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(format!(
                "type mismatch for column '{}': expected {}, got {}",
                self.name,
                self.column_type,
                json_type_name(value)
            ))
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        Value::Number(_) => "Float",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Schema of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Collection name
    pub name: CollectionName,
    /// Column definitions, in declaration order
    #[serde(default)]
    columns: Vec<Column>,
    /// Primary key fields, in key order
    #[serde(default)]
    primary_key: Vec<FieldName>,
}

impl Schema {
    /// Create an empty schema for a collection.
    pub fn new(name: impl Into<CollectionName>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Add a column, replacing any column with the same name.
    pub fn add_column(&mut self, column: Column) -> &mut Self {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        self
    }

    /// Builder-style method to add a column.
    pub fn with_column(mut self, column: Column) -> Self {
        self.add_column(column);
        self
    }

    /// Set the primary key fields.
    pub fn set_primary_key<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        self.primary_key = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style method to set the primary key fields.
    pub fn with_primary_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        self.set_primary_key(fields);
        self
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Get the type of a column.
    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column(name).map(|c| c.column_type)
    }

    /// Column names in declaration order.
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary key fields in key order.
    pub fn primary_key(&self) -> &[FieldName] {
        &self.primary_key
    }

    /// Default values of the columns that declare one.
    pub fn default_values(&self) -> Map<String, Value> {
        self.columns
            .iter()
            .filter_map(|c| c.default.clone().map(|d| (c.name.clone(), d)))
            .collect()
    }

    /// Verify that every primary key field is a declared column.
    pub fn validate(&self) -> Result<()> {
        match self.primary_key.iter().find(|f| !self.has_column(f)) {
            Some(field) => Err(Error::InvalidSchema {
                collection: self.name.clone(),
                reason: format!("primary key field '{field}' is not a column"),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_schema() -> Schema {
        Schema::new("articles")
            .with_column(Column::required("id", ColumnType::Integer))
            .with_column(Column::new("title", ColumnType::String))
            .with_column(Column::new("status", ColumnType::String).with_default(json!("draft")))
            .with_primary_key(["id"])
    }

    #[test]
    fn columns_keep_declaration_order() {
        let schema = test_schema();
        assert_eq!(schema.columns(), vec!["id", "title", "status"]);
        assert_eq!(schema.primary_key(), ["id".to_string()]);
    }

    #[test]
    fn add_column_replaces_existing() {
        let mut schema = test_schema();
        schema.add_column(Column::new("title", ColumnType::Text));

        assert_eq!(schema.columns().len(), 3);
        assert_eq!(schema.column_type("title"), Some(ColumnType::Text));
    }

    #[test]
    fn default_values_only_lists_declared_defaults() {
        let schema = test_schema();
        assert_eq!(schema.default_values(), json!({"status": "draft"}).as_object().cloned().unwrap());
    }

    #[test]
    fn validate_rejects_unknown_primary_key() {
        let schema = test_schema().with_primary_key(["id", "slug"]);
        let result = schema.validate();

        assert!(matches!(result, Err(Error::InvalidSchema { reason, .. }) if reason.contains("slug")));
        assert!(test_schema().validate().is_ok());
    }

    #[test]
    fn column_check() {
        let id = Column::required("id", ColumnType::Integer);
        assert!(id.check(&json!(1)).is_ok());
        assert!(id.check(&Value::Null).is_err());

        let err = id.check(&json!("one")).unwrap_err();
        assert_eq!(err, "type mismatch for column 'id': expected Integer, got String");

        let data = Column::new("data", ColumnType::Json);
        assert!(data.check(&json!({"nested": [1, 2]})).is_ok());
        assert!(data.check(&Value::Null).is_ok());
    }

    #[test]
    fn schema_serialization() {
        let schema = test_schema();
        let json = serde_json::to_string(&schema).unwrap();
        let parsed: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, parsed);
    }

    #[test]
    fn column_type_display() {
        assert_eq!(ColumnType::Integer.to_string(), "Integer");
        assert_eq!(ColumnType::Json.to_string(), "Json");
    }
}
