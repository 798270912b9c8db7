//! Resource classes decide how rows become records.

use crate::{error::Result, inflect, Error, FieldName, Record};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A named record shape with default mass-assignment rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceClass {
    name: String,
    accessible: BTreeMap<FieldName, bool>,
}

impl ResourceClass {
    /// Name of the fallback class.
    pub const GENERIC: &'static str = "Resource";

    /// A class where every field is accessible.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accessible: BTreeMap::from([(crate::record::WILDCARD.to_string(), true)]),
        }
    }

    pub fn generic() -> Self {
        Self::new(Self::GENERIC)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builder-style method to set a mass-assignment rule.
    pub fn accessible(mut self, field: impl Into<FieldName>, accessible: bool) -> Self {
        self.accessible.insert(field.into(), accessible);
        self
    }

    /// An empty, new record of this class.
    pub fn instantiate(&self, source: &str) -> Record {
        let mut record = Record::new().with_source(source);
        record.set_accessibility(self.accessible.clone());
        record
    }

    /// A persisted, clean record built from a backend row.
    pub fn hydrate(&self, source: &str, fields: Map<String, Value>) -> Record {
        let mut record = Record::persisted(fields).with_source(source);
        record.set_accessibility(self.accessible.clone());
        record
    }
}

impl Default for ResourceClass {
    fn default() -> Self {
        Self::generic()
    }
}

/// Resource classes known to a repository, by name.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    classes: HashMap<String, Arc<ResourceClass>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: ResourceClass) -> &mut Self {
        self.classes
            .insert(class.name().to_string(), Arc::new(class));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceClass>> {
        self.classes.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Resolve the class for a repository.
    ///
    /// An explicitly configured class must be registered. Otherwise the
    /// singular, classified alias is tried before falling back to the
    /// generic class.
    pub fn resolve(&self, explicit: Option<&str>, alias: &str) -> Result<Arc<ResourceClass>> {
        if let Some(name) = explicit {
            return self
                .get(name)
                .ok_or_else(|| Error::MissingResourceClass(name.to_string()));
        }

        let conventional = inflect::classify(alias);
        Ok(self
            .get(&conventional)
            .unwrap_or_else(|| Arc::new(ResourceClass::generic())))
    }
}
