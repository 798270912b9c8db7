//! Option bags accepted by repository and query operations.

use crate::{
    cache::CacheDirective, condition::Condition, error::Result, transport::OrderBy, Error,
    FieldName,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Options understood by finders.
///
/// The recognized keys are typed; every other key lands in `extra` and is
/// handed to the finder untouched (`keyField`, `valueField`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinderOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldName>,
    #[serde(
        default,
        deserialize_with = "deserialize_order",
        serialize_with = "serialize_order",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub order: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheDirective>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn deserialize_order<'de, D>(deserializer: D) -> std::result::Result<Vec<OrderBy>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    OrderBy::parse_value(&value).map_err(serde::de::Error::custom)
}

fn serialize_order<S>(order: &[OrderBy], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(
        order
            .iter()
            .map(|o| format!("{} {}", o.field, o.direction.as_str())),
    )
}

impl FinderOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::InvalidOptions(e.to_string()))
    }

    /// Builder-style method to set conditions.
    pub fn conditions(mut self, conditions: Condition) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Builder-style method to set projected fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style method to append an ordering clause.
    pub fn order(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    /// Builder-style method to route the read through a cache.
    pub fn cache(mut self, key: impl Into<String>, config: impl Into<String>) -> Self {
        self.cache = Some(CacheDirective::new(key, config));
        self
    }

    /// Builder-style method to set a finder-specific option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Get a finder-specific option.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Options for [`Repository::get`](crate::Repository::get).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetOptions {
    /// Finder to run, `all` when unset
    pub finder: Option<String>,
    /// Cache config to read through
    pub cache: Option<String>,
    /// Explicit cache key, derived from the primary key when unset
    pub key: Option<String>,
    /// Options handed to the finder
    pub options: FinderOptions,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finder(mut self, finder: impl Into<String>) -> Self {
        self.finder = Some(finder.into());
        self
    }

    pub fn cache(mut self, config: impl Into<String>) -> Self {
        self.cache = Some(config.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn options(mut self, options: FinderOptions) -> Self {
        self.options = options;
        self
    }
}

/// Options for [`Repository::save`](crate::Repository::save).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOptions {
    /// Run the rule checker before writing
    #[serde(default = "default_true")]
    pub check_rules: bool,
    /// Probe the backend to classify new records that carry a full key
    #[serde(default)]
    pub check_existing: bool,
    /// Options passed through to observers and rules
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            check_rules: true,
            check_existing: false,
            extra: Map::new(),
        }
    }
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_rules(mut self, check: bool) -> Self {
        self.check_rules = check;
        self
    }

    pub fn check_existing(mut self, check: bool) -> Self {
        self.check_existing = check;
        self
    }
}

/// Options for [`Repository::delete`](crate::Repository::delete).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOptions {
    /// Options passed through to observers
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Options for marshalling raw data into records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarshalOptions {
    /// Drop fields the record does not allow to be mass-assigned
    #[serde(default = "default_true")]
    pub guard: bool,
    /// Only accept these fields when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldName>>,
    /// Accessibility overrides applied to the record before assignment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub accessible: BTreeMap<FieldName, bool>,
}

impl Default for MarshalOptions {
    fn default() -> Self {
        Self {
            guard: true,
            fields: None,
            accessible: BTreeMap::new(),
        }
    }
}

impl MarshalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable or enable the accessibility guard.
    pub fn guard(mut self, guard: bool) -> Self {
        self.guard = guard;
        self
    }

    /// Restrict marshalling to a whitelist of fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Override the accessibility of one field.
    pub fn accessible(mut self, field: impl Into<FieldName>, accessible: bool) -> Self {
        self.accessible.insert(field.into(), accessible);
        self
    }

    pub(crate) fn allows(&self, field: &str) -> bool {
        self.fields
            .as_ref()
            .is_none_or(|fields| fields.iter().any(|f| f == field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finder_options_from_value() {
        let options = FinderOptions::from_value(json!({
            "conditions": {"status": "active"},
            "fields": ["id", "title"],
            "order": "title DESC",
            "limit": 10,
            "page": 2,
            "cache": {"key": "recent", "config": "default"},
            "keyField": "slug",
        }))
        .unwrap();

        assert_eq!(options.conditions, Some(Condition::eq("status", "active")));
        assert_eq!(options.fields, vec!["id", "title"]);
        assert_eq!(options.order, vec![OrderBy::desc("title")]);
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.page, Some(2));
        assert_eq!(options.cache, Some(CacheDirective::new("recent", "default")));
        assert_eq!(options.get("keyField"), Some(&json!("slug")));
        assert_eq!(options.extra.len(), 1);
    }

    #[test]
    fn finder_options_roundtrip() {
        let options = FinderOptions::new()
            .conditions(Condition::eq("id", 1))
            .order(OrderBy::desc("created"))
            .limit(5)
            .option("groupField", "status");

        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["order"], json!(["created desc"]));

        let parsed = FinderOptions::from_value(value).unwrap();
        assert_eq!(parsed, options);
    }

    #[test]
    fn invalid_finder_options() {
        let result = FinderOptions::from_value(json!({"limit": "ten"}));
        assert!(matches!(result, Err(Error::InvalidOptions(_))));
    }

    #[test]
    fn save_options_defaults() {
        let options: SaveOptions = serde_json::from_value(json!({})).unwrap();
        assert!(options.check_rules);
        assert!(!options.check_existing);
        assert_eq!(options, SaveOptions::default());
    }

    #[test]
    fn marshal_options_whitelist() {
        let options = MarshalOptions::new().fields(["title"]);
        assert!(options.allows("title"));
        assert!(!options.allows("body"));
        assert!(MarshalOptions::new().allows("body"));
    }
}
