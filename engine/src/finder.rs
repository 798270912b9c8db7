//! Named finders and dynamic finder names.
//!
//! A finder takes a query and the caller's options and returns the query to
//! run. `all` and `list` are always available; repositories can register
//! their own.

use crate::{
    condition::{key_text, Condition},
    error::Result,
    inflect,
    query::{Query, Results},
    Error, FieldName, FinderOptions, Record,
};
use convert_case::{Case, Casing};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A finder strategy.
pub type Finder = Arc<dyn for<'a> Fn(Query<'a>, &FinderOptions) -> Result<Query<'a>> + Send + Sync>;

/// Finders known to a repository.
#[derive(Clone)]
pub struct FinderRegistry {
    finders: HashMap<String, Finder>,
}

impl Default for FinderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FinderRegistry {
    /// Registry holding the built-in `all` and `list` finders.
    pub fn new() -> Self {
        let mut registry = Self {
            finders: HashMap::new(),
        };
        registry.register("all", find_all);
        registry.register("list", find_list);
        registry
    }

    /// Register a finder, replacing any finder with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, finder: F) -> &mut Self
    where
        F: for<'a> Fn(Query<'a>, &FinderOptions) -> Result<Query<'a>> + Send + Sync + 'static,
    {
        self.finders.insert(name.into(), Arc::new(finder));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.finders.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Finder> {
        self.finders.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.finders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for FinderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderRegistry")
            .field("finders", &self.names())
            .finish()
    }
}

fn find_all<'a>(query: Query<'a>, _options: &FinderOptions) -> Result<Query<'a>> {
    Ok(query)
}

/// Key/value listing.
///
/// Options: `keyField` (default: primary key), `valueField` (default: display
/// field) and `groupField`. Each accepts a field or a list of fields; a list
/// renders as its values joined with `;`.
fn find_list<'a>(query: Query<'a>, options: &FinderOptions) -> Result<Query<'a>> {
    let repository = query.repository();

    let key = match list_option(options, "keyField")? {
        Some(field) => field,
        None => ListField::from_fields(repository.primary_key()?.to_vec())?,
    };
    let value = match list_option(options, "valueField")? {
        Some(field) => field,
        None => ListField::Single(repository.display_field()?.to_string()),
    };
    let group = list_option(options, "groupField")?;

    Ok(query.format_results(move |results| match results {
        Results::Records(records) => Results::Map(combine(&records, &key, &value, group.as_ref())),
        other => other,
    }))
}

/// A `list` option; absent and null both mean the default.
fn list_option(options: &FinderOptions, name: &str) -> Result<Option<ListField>> {
    options
        .get(name)
        .filter(|v| !v.is_null())
        .map(ListField::parse)
        .transpose()
}

/// A field selector for the `list` finder.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListField {
    Single(FieldName),
    Composite(Vec<FieldName>),
}

impl ListField {
    fn from_fields(mut fields: Vec<FieldName>) -> Result<Self> {
        match fields.len() {
            0 => Err(Error::InvalidOptions("list fields cannot be empty".into())),
            1 => Ok(ListField::Single(fields.remove(0))),
            _ => Ok(ListField::Composite(fields)),
        }
    }

    fn parse(value: &Value) -> Result<Self> {
        match value {
            Value::String(field) => Ok(ListField::Single(field.clone())),
            Value::Array(items) => Self::from_fields(
                items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            Error::InvalidOptions(format!("list field must be a string, got {item}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            other => Err(Error::InvalidOptions(format!(
                "list field must be a string or a list, got {other}"
            ))),
        }
    }

    fn extract(&self, record: &Record) -> Value {
        match self {
            ListField::Single(field) => record.get(field).cloned().unwrap_or(Value::Null),
            ListField::Composite(fields) => Value::String(
                fields
                    .iter()
                    .map(|f| key_text(record.get(f)))
                    .collect::<Vec<_>>()
                    .join(";"),
            ),
        }
    }
}

fn combine(
    records: &[Record],
    key: &ListField,
    value: &ListField,
    group: Option<&ListField>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for record in records {
        let k = key_text(Some(&key.extract(record)));
        let v = value.extract(record);
        match group {
            None => {
                out.insert(k, v);
            }
            Some(group) => {
                let g = key_text(Some(&group.extract(record)));
                if let Value::Object(bucket) = out.entry(g).or_insert_with(|| Value::Object(Map::new())) {
                    bucket.insert(k, v);
                }
            }
        }
    }
    out
}

/// How the fields of a dynamic finder are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

/// A parsed dynamic finder name such as `findAllByTitleAndStatus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicFinder {
    /// The name as called
    pub name: String,
    /// Finder to run
    pub finder: String,
    pub fields: Vec<FieldName>,
    pub combinator: Combinator,
}

impl DynamicFinder {
    /// Parse `find[<Type>]By<Field>[(And|Or)<Field>...]`, in camel or snake case.
    pub fn parse(name: &str) -> Result<Self> {
        let method = inflect::underscore(name);
        let unknown = || Error::UnknownMethod(name.to_string());

        let rest = method.strip_prefix("find_").ok_or_else(unknown)?;
        let (finder, fields) = match rest.strip_prefix("by_") {
            Some(fields) => ("all".to_string(), fields),
            None => {
                let at = rest.find("_by_").ok_or_else(unknown)?;
                ((&rest[..at]).to_case(Case::Camel), &rest[at + 4..])
            }
        };

        let has_and = fields.contains("_and_");
        let has_or = fields.contains("_or_");
        let (separator, combinator) = match (has_and, has_or) {
            (true, true) => return Err(Error::MagicFinderAmbiguous(name.to_string())),
            (false, true) => ("_or_", Combinator::Or),
            _ => ("_and_", Combinator::And),
        };

        let fields: Vec<FieldName> = fields.split(separator).map(str::to_string).collect();
        if fields.iter().any(|f| f.is_empty()) {
            return Err(unknown());
        }

        Ok(Self {
            name: name.to_string(),
            finder,
            fields,
            combinator,
        })
    }

    /// Conditions for the given arguments; extra arguments are ignored.
    pub fn conditions(&self, args: &[Value]) -> Result<Condition> {
        if args.len() < self.fields.len() {
            return Err(Error::MagicFinderArgumentMismatch {
                name: self.name.clone(),
                got: args.len(),
                required: self.fields.len(),
            });
        }

        let comparisons = self
            .fields
            .iter()
            .zip(args)
            .map(|(field, value)| Condition::eq(field.clone(), value.clone()))
            .collect();

        Ok(match self.combinator {
            Combinator::And => Condition::and(comparisons),
            Combinator::Or => Condition::or(comparisons),
        })
    }
}
