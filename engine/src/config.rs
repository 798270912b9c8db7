//! Repository configuration.

use crate::{error::Result, inflect::Inflection, CollectionName, Error, FieldName, Schema};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Static configuration of one repository. Every field is optional; unset
/// fields are derived lazily on first use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Name callers use for the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Connection to resolve the transport from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    /// Backend collection name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<CollectionName>,
    /// Primary-key override, a single field or a list
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub primary_key: Option<Vec<FieldName>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_field: Option<FieldName>,
    /// How the alias becomes a collection name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflect: Option<Inflection>,
    /// Schema override, skips `describe`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// Alias the repository was registered under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_class: Option<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<FieldName>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(field) => Ok(Some(vec![field])),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(field) => Ok(field),
                other => Err(serde::de::Error::custom(format!(
                    "primary key fields must be strings, got {other}"
                ))),
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Some),
        other => Err(serde::de::Error::custom(format!(
            "primary key must be a string or a list, got {other}"
        ))),
    }
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Parse configuration from a JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<CollectionName>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_primary_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        self.primary_key = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_display_field(mut self, field: impl Into<FieldName>) -> Self {
        self.display_field = Some(field.into());
        self
    }

    pub fn with_inflect(mut self, inflection: Inflection) -> Self {
        self.inflect = Some(inflection);
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_registry_alias(mut self, alias: impl Into<String>) -> Self {
        self.registry_alias = Some(alias.into());
        self
    }

    pub fn with_resource_class(mut self, class: impl Into<String>) -> Self {
        self.resource_class = Some(class.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = RepositoryConfig::from_json(
            r#"{
                "alias": "Posts",
                "connection": "api",
                "name": "blog_posts",
                "primaryKey": "slug",
                "displayField": "headline",
                "inflect": "dasherize",
                "registryAlias": "Blog.Posts",
                "resourceClass": "Post"
            }"#,
        )
        .unwrap();

        assert_eq!(config.alias.as_deref(), Some("Posts"));
        assert_eq!(config.connection.as_deref(), Some("api"));
        assert_eq!(config.primary_key, Some(vec!["slug".to_string()]));
        assert_eq!(config.inflect, Some(Inflection::Dasherize));
        assert_eq!(config.resource_class.as_deref(), Some("Post"));
    }

    #[test]
    fn composite_primary_key() {
        let config = RepositoryConfig::from_json(r#"{"primaryKey": ["site", "id"]}"#).unwrap();
        assert_eq!(config.primary_key, Some(vec!["site".into(), "id".into()]));
    }

    #[test]
    fn invalid_config() {
        assert!(matches!(
            RepositoryConfig::from_json(r#"{"primaryKey": 3}"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            RepositoryConfig::from_json(r#"{"unknown": true}"#),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn builder_methods() {
        let config = RepositoryConfig::new()
            .with_alias("Articles")
            .with_primary_key(["id"])
            .with_connection("api");
        assert_eq!(config.alias.as_deref(), Some("Articles"));
        assert_eq!(config.primary_key, Some(vec!["id".to_string()]));
        assert_eq!(config.connection.as_deref(), Some("api"));
    }
}
