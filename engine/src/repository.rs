//! Repository facade over one remote collection.
//!
//! A [`Repository`] owns the metadata of a collection (alias, name, schema,
//! primary key, display field, resource class), resolves each piece lazily on
//! first use and memoizes it, and exposes the finder, save and delete
//! lifecycles on top of a [`Transport`].

use crate::{
    cache::{get_cache_key, Cache},
    condition::Condition,
    config::RepositoryConfig,
    error::Result,
    events::{Event, EventManager, Listener},
    finder::{DynamicFinder, FinderRegistry},
    marshaller::Marshaller,
    query::{Query, QueryOutcome},
    resource::{ResourceClass, ResourceRegistry},
    rules::{RuleChecker, RuleMode},
    transport::{ConnectionRegistry, RequestDescriptor, Transport, TransportResult},
    DeleteOptions, Error, FieldName, FinderOptions, GetOptions, MarshalOptions, Record,
    SaveOptions, Schema,
};
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Connection used when none is configured.
pub const DEFAULT_CONNECTION: &str = "default";

type SchemaHook = Box<dyn Fn(Schema) -> Schema + Send + Sync>;

/// Builder for [`Repository`].
pub struct RepositoryBuilder {
    type_name: String,
    config: RepositoryConfig,
    transport: Option<Arc<dyn Transport>>,
    connections: Option<Arc<ConnectionRegistry>>,
    events: Option<Arc<EventManager>>,
    listeners: Vec<Arc<dyn Listener>>,
    rules: Option<Arc<dyn RuleChecker>>,
    caches: HashMap<String, Arc<dyn Cache>>,
    resources: ResourceRegistry,
    finders: FinderRegistry,
    schema_hook: Option<SchemaHook>,
}

impl RepositoryBuilder {
    /// Start a builder. `type_name` is the alias used when none is configured.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            config: RepositoryConfig::default(),
            transport: None,
            connections: None,
            events: None,
            listeners: Vec::new(),
            rules: None,
            caches: HashMap::new(),
            resources: ResourceRegistry::new(),
            finders: FinderRegistry::new(),
            schema_hook: None,
        }
    }

    pub fn config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this transport instead of resolving one by connection name.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Registry the transport is resolved from on first use.
    pub fn connections(mut self, connections: Arc<ConnectionRegistry>) -> Self {
        self.connections = Some(connections);
        self
    }

    /// Share an event manager with other repositories.
    pub fn event_manager(mut self, events: Arc<EventManager>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn rules(mut self, rules: Arc<dyn RuleChecker>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Register a named cache for read-through queries.
    pub fn cache(mut self, name: impl Into<String>, cache: Arc<dyn Cache>) -> Self {
        self.caches.insert(name.into(), cache);
        self
    }

    pub fn resource(mut self, class: ResourceClass) -> Self {
        self.resources.register(class);
        self
    }

    /// Register a custom finder.
    pub fn finder<F>(mut self, name: impl Into<String>, finder: F) -> Self
    where
        F: for<'a> Fn(Query<'a>, &FinderOptions) -> Result<Query<'a>> + Send + Sync + 'static,
    {
        self.finders.register(name, finder);
        self
    }

    /// Adjust a described schema before it is memoized.
    pub fn initialize_schema<F>(mut self, hook: F) -> Self
    where
        F: Fn(Schema) -> Schema + Send + Sync + 'static,
    {
        self.schema_hook = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Result<Repository> {
        let schema = OnceCell::new();
        if let Some(configured) = self.config.schema.clone() {
            configured.validate()?;
            let _ = schema.set(configured);
        }

        let transport = OnceCell::new();
        if let Some(configured) = self.transport {
            let _ = transport.set(configured);
        }

        let events = self.events.unwrap_or_default();
        for listener in self.listeners {
            events.register(listener);
        }

        Ok(Repository {
            type_name: self.type_name,
            config: self.config,
            connections: self.connections,
            events,
            rules: self.rules,
            caches: self.caches,
            resources: self.resources,
            finders: self.finders,
            schema_hook: self.schema_hook,
            transport,
            schema,
            alias: OnceCell::new(),
            name: OnceCell::new(),
            primary_key: OnceCell::new(),
            display_field: OnceCell::new(),
            resource_class: OnceCell::new(),
        })
    }
}

/// Facade over one remote collection.
///
/// Thread-safe; metadata is resolved at most once even under concurrent use.
pub struct Repository {
    type_name: String,
    config: RepositoryConfig,
    connections: Option<Arc<ConnectionRegistry>>,
    events: Arc<EventManager>,
    rules: Option<Arc<dyn RuleChecker>>,
    caches: HashMap<String, Arc<dyn Cache>>,
    resources: ResourceRegistry,
    finders: FinderRegistry,
    schema_hook: Option<SchemaHook>,
    transport: OnceCell<Arc<dyn Transport>>,
    schema: OnceCell<Schema>,
    alias: OnceCell<String>,
    name: OnceCell<String>,
    primary_key: OnceCell<Vec<FieldName>>,
    display_field: OnceCell<FieldName>,
    resource_class: OnceCell<Arc<ResourceClass>>,
}

impl Repository {
    pub fn builder(type_name: impl Into<String>) -> RepositoryBuilder {
        RepositoryBuilder::new(type_name)
    }

    // ---- metadata ----

    /// Name callers use for this repository.
    pub fn alias(&self) -> &str {
        self.alias.get_or_init(|| {
            self.config
                .alias
                .clone()
                .or_else(|| self.config.registry_alias.clone())
                .unwrap_or_else(|| self.type_name.clone())
        })
    }

    pub fn registry_alias(&self) -> &str {
        self.config
            .registry_alias
            .as_deref()
            .unwrap_or_else(|| self.alias())
    }

    /// Backend collection name.
    pub fn name(&self) -> &str {
        self.name.get_or_init(|| {
            self.config.name.clone().unwrap_or_else(|| {
                self.config
                    .inflect
                    .unwrap_or_default()
                    .apply(self.alias())
            })
        })
    }

    pub fn connection_name(&self) -> &str {
        self.config.connection.as_deref().unwrap_or(DEFAULT_CONNECTION)
    }

    /// Transport, resolved from the connection registry on first use.
    pub fn transport(&self) -> Result<&Arc<dyn Transport>> {
        self.transport.get_or_try_init(|| {
            let name = self.connection_name();
            let registry = self
                .connections
                .as_ref()
                .ok_or_else(|| Error::MissingConnection(name.to_string()))?;
            registry.get(name)
        })
    }

    /// Schema, described by the transport on first use.
    pub fn schema(&self) -> Result<&Schema> {
        self.schema.get_or_try_init(|| {
            let name = self.name();
            let described = self.transport()?.describe(name)?;
            let schema = match &self.schema_hook {
                Some(hook) => hook(described),
                None => described,
            };
            schema.validate()?;
            tracing::debug!(
                collection = %name,
                columns = schema.columns().len(),
                "schema described"
            );
            Ok(schema)
        })
    }

    pub fn has_field(&self, field: &str) -> Result<bool> {
        Ok(self.schema()?.has_column(field))
    }

    /// Qualify a field with the alias; qualified fields are left untouched.
    pub fn alias_field(&self, field: &str) -> String {
        if field.contains('.') {
            field.to_string()
        } else {
            format!("{}.{field}", self.alias())
        }
    }

    pub fn primary_key(&self) -> Result<&[FieldName]> {
        self.primary_key
            .get_or_try_init(|| match &self.config.primary_key {
                Some(key) => Ok(key.clone()),
                None => Ok(self.schema()?.primary_key().to_vec()),
            })
            .map(Vec::as_slice)
    }

    /// Field used as the label of a record: configured, else `title`, else
    /// `name`, else the first primary-key field.
    pub fn display_field(&self) -> Result<&str> {
        self.display_field
            .get_or_try_init(|| {
                if let Some(field) = &self.config.display_field {
                    return Ok(field.clone());
                }
                let schema = self.schema()?;
                if let Some(field) = ["title", "name"].into_iter().find(|f| schema.has_column(f)) {
                    return Ok(field.to_string());
                }
                self.primary_key()?
                    .first()
                    .cloned()
                    .ok_or_else(|| Error::InvalidSchema {
                        collection: self.name().to_string(),
                        reason: "no display field can be derived".into(),
                    })
            })
            .map(String::as_str)
    }

    pub fn resource_class(&self) -> Result<&Arc<ResourceClass>> {
        self.resource_class.get_or_try_init(|| {
            self.resources
                .resolve(self.config.resource_class.as_deref(), self.alias())
        })
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    /// Named cache.
    pub fn cache(&self, name: &str) -> Result<Arc<dyn Cache>> {
        self.caches
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MissingCache(name.to_string()))
    }

    pub(crate) fn send(&self, request: &RequestDescriptor) -> Result<TransportResult> {
        let transport = self.transport()?;
        tracing::debug!(
            kind = %request.kind,
            collection = %request.collection,
            connection = %self.connection_name(),
            "sending request"
        );
        transport.execute(request)
    }

    // ---- records ----

    /// An unexecuted query with no kind set.
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    pub fn new_empty_record(&self) -> Result<Record> {
        Ok(self.resource_class()?.instantiate(self.alias()))
    }

    /// A persisted record for a backend row.
    pub fn hydrate(&self, row: Map<String, Value>) -> Result<Record> {
        Ok(self.resource_class()?.hydrate(self.alias(), row))
    }

    pub fn marshaller(&self) -> Marshaller<'_> {
        Marshaller::new(self)
    }

    pub fn new_record(&self, data: Map<String, Value>, options: &MarshalOptions) -> Result<Record> {
        self.marshaller().one(data, options)
    }

    pub fn new_records(&self, data: Vec<Map<String, Value>>, options: &MarshalOptions) -> Result<Vec<Record>> {
        self.marshaller().many(data, options)
    }

    pub fn patch_record(&self, record: &mut Record, data: Map<String, Value>, options: &MarshalOptions) -> Result<()> {
        self.marshaller().merge(record, data, options)
    }

    pub fn patch_records(
        &self,
        records: Vec<Record>,
        data: Vec<Map<String, Value>>,
        options: &MarshalOptions,
    ) -> Result<Vec<Record>> {
        self.marshaller().merge_many(records, data, options)
    }

    // ---- finders ----

    pub fn has_finder(&self, name: &str) -> bool {
        self.finders.contains(name)
    }

    /// Fold `options` into `query` and hand it to the named finder.
    pub fn call_finder<'a>(&'a self, finder: &str, query: Query<'a>, options: FinderOptions) -> Result<Query<'a>> {
        let strategy = self
            .finders
            .get(finder)
            .ok_or_else(|| Error::UnknownFinder(finder.to_string()))?;
        let query = query.apply_options(&options);
        let options = query.options();
        tracing::debug!(collection = %self.name(), finder = %finder, "calling finder");
        strategy(query, &options)
    }

    /// A read query shaped by the named finder.
    pub fn find(&self, finder: &str, options: FinderOptions) -> Result<Query<'_>> {
        let query = self.query().read()?;
        let mut query = self.call_finder(finder, query, options)?;
        let options = query.options();
        self.events
            .notify(Event::BeforeFind, |l| l.before_find(&mut query, &options));
        Ok(query)
    }

    /// Resolve a finder name such as `findAllByTitleAndStatus`.
    pub fn dynamic_finder(&self, name: &str, args: &[Value]) -> Result<Query<'_>> {
        let parsed = DynamicFinder::parse(name)?;
        let conditions = parsed.conditions(args)?;
        self.find(&parsed.finder, FinderOptions::new().conditions(conditions))
    }

    /// Fetch one record by primary key.
    ///
    /// `primary_key` is a scalar for single keys or an array for composite
    /// keys, and must match the key's arity.
    pub fn get(&self, primary_key: impl Into<Value>, options: GetOptions) -> Result<Record> {
        let primary_key = primary_key.into();
        let key_fields = self.primary_key()?;
        let values = match &primary_key {
            Value::Array(items) => items.clone(),
            scalar => vec![scalar.clone()],
        };

        if values.len() != key_fields.len() || values.iter().any(Value::is_null) {
            return Err(Error::InvalidPrimaryKey {
                collection: self.name().to_string(),
                expected: key_fields.len(),
                values: render_values(&values),
            });
        }

        let finder = options.finder.as_deref().unwrap_or("all");
        let mut query = self
            .find(finder, options.options)?
            .filter(Condition::all_eq(key_fields.iter().cloned().zip(values)));
        if let Some(config) = options.cache {
            let key = options.key.unwrap_or_else(|| {
                get_cache_key(self.connection_name(), self.name(), &primary_key)
            });
            query = query.cache(key, config);
        }
        query.first_or_fail()
    }

    /// Return the first record matching `search`, or create one from it.
    pub fn find_or_create(&self, search: Map<String, Value>) -> Result<Record> {
        self.find_or_create_with(search, |_| {})
    }

    /// Like [`find_or_create`](Self::find_or_create), letting `initialize`
    /// fill in the new record before it is saved.
    pub fn find_or_create_with<F>(&self, search: Map<String, Value>, initialize: F) -> Result<Record>
    where
        F: FnOnce(&mut Record),
    {
        let conditions = Condition::from_map(search.clone())?;
        if let Some(existing) = self.find("all", FinderOptions::new())?.filter(conditions).first()? {
            return Ok(existing);
        }

        let mut record = self.new_empty_record()?;
        for (field, value) in search {
            record.set(field, value);
        }
        initialize(&mut record);

        match self.save(&mut record, SaveOptions::default())? {
            Some(saved) => Ok(saved),
            None => Err(Error::PersistenceFailed {
                collection: self.name().to_string(),
                reason: failure_reason(&record),
            }),
        }
    }

    pub fn exists(&self, conditions: Condition) -> Result<bool> {
        Ok(self.find("all", FinderOptions::new())?.filter(conditions).count()? > 0)
    }

    /// Bulk update. No lifecycle events are dispatched.
    pub fn update_all(&self, fields: Map<String, Value>, conditions: Condition) -> Result<u64> {
        self.query().update()?.set(fields).filter(conditions).affected_rows()
    }

    /// Bulk delete. No lifecycle events are dispatched.
    pub fn delete_all(&self, conditions: Condition) -> Result<u64> {
        self.query().delete()?.filter(conditions).affected_rows()
    }

    // ---- lifecycle ----

    /// Persist a record.
    ///
    /// Returns the saved record, or `None` when the save was refused or
    /// failed: the record carries errors, rules rejected it, a listener
    /// stopped it, or the transport reported a failure. Clean persisted
    /// records are returned without a request.
    pub fn save(&self, record: &mut Record, options: SaveOptions) -> Result<Option<Record>> {
        if record.has_errors() {
            tracing::debug!(collection = %self.name(), "save refused, record has errors");
            return Ok(None);
        }
        if !record.is_new() && !record.has_dirty() {
            return Ok(Some(record.clone()));
        }

        match self.write(record, &options) {
            Err(err) if err.is_transport() => {
                tracing::warn!(collection = %self.name(), error = %err, "save failed");
                Ok(None)
            }
            other => other,
        }
    }

    fn write(&self, record: &mut Record, options: &SaveOptions) -> Result<Option<Record>> {
        let key_fields = self.primary_key()?;

        if options.check_existing && record.is_new() && !key_fields.is_empty() {
            if let Some(values) = record.key_values(key_fields) {
                let exists = self.exists(Condition::all_eq(key_fields.iter().cloned().zip(values)))?;
                record.set_new(!exists);
            }
        }

        let mode = if record.is_new() { RuleMode::Create } else { RuleMode::Update };
        if options.check_rules && !self.check_rules(record, mode, options) {
            return Ok(None);
        }

        let snapshot: &Record = record;
        let before = self
            .events
            .dispatch(Event::BeforeSave, |l| l.before_save(snapshot, options));
        if before.stopped {
            return Ok(before.result.flatten());
        }

        let values = record.extract(&self.schema()?.columns());
        let query = match mode {
            RuleMode::Create => self.query().create()?.set(values),
            RuleMode::Update => {
                let Some(key) = record.key_values(key_fields).filter(|_| !key_fields.is_empty()) else {
                    tracing::warn!(collection = %self.name(), "update refused, record has no key");
                    return Ok(None);
                };
                self.query()
                    .update()?
                    .set(values)
                    .filter(Condition::all_eq(key_fields.iter().cloned().zip(key)))
            }
        };

        let saved = match query.execute()? {
            QueryOutcome::Saved(echoed) => echoed.clone(),
            QueryOutcome::Affected(0) => return Ok(None),
            QueryOutcome::Affected(_) => {
                let mut saved = record.clone();
                saved.set_new(false);
                saved.clean();
                saved
            }
            QueryOutcome::Read(_) => {
                return Err(Error::UnexpectedResult {
                    expected: "a write result".into(),
                })
            }
        };

        self.events
            .notify(Event::AfterSave, |l| l.after_save(&saved, options));
        self.events
            .notify(Event::AfterSaveCommit, |l| l.after_save_commit(&saved, options));
        tracing::debug!(collection = %self.name(), mode = %mode, "record saved");
        Ok(Some(saved))
    }

    fn check_rules(&self, record: &mut Record, mode: RuleMode, options: &SaveOptions) -> bool {
        let before = self
            .events
            .dispatch(Event::BeforeRules, |l| l.before_rules(record, mode, options));
        if before.stopped {
            return before.result.unwrap_or(false);
        }

        let passed = self
            .rules
            .as_ref()
            .is_none_or(|rules| rules.check(record, mode, options));

        let after = self
            .events
            .dispatch(Event::AfterRules, |l| l.after_rules(record, mode, passed, options));
        if after.stopped {
            after.result.unwrap_or(false)
        } else {
            passed
        }
    }

    /// Delete one record by its primary key. Returns whether a row was removed.
    pub fn delete(&self, record: &Record, options: DeleteOptions) -> Result<bool> {
        let before = self
            .events
            .dispatch(Event::BeforeDelete, |l| l.before_delete(record, &options));
        if before.stopped {
            return Ok(before.result.unwrap_or(false));
        }

        let key_fields = self.primary_key()?;
        let key = record
            .key_values(key_fields)
            .filter(|_| !key_fields.is_empty())
            .ok_or_else(|| Error::InvalidPrimaryKey {
                collection: self.name().to_string(),
                expected: key_fields.len(),
                values: render_values(&record.extract(key_fields).into_iter().map(|(_, v)| v).collect::<Vec<_>>()),
            })?;

        let affected = self
            .query()
            .delete()?
            .filter(Condition::all_eq(key_fields.iter().cloned().zip(key)))
            .affected_rows()?;
        if affected == 0 {
            return Ok(false);
        }

        self.events
            .notify(Event::AfterDelete, |l| l.after_delete(record, &options));
        self.events
            .notify(Event::AfterDeleteCommit, |l| l.after_delete_commit(record, &options));
        Ok(true)
    }
}

fn render_values(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn failure_reason(record: &Record) -> String {
    if !record.has_errors() {
        return "save was refused".into();
    }
    record
        .errors()
        .iter()
        .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{field}: {m}")))
        .collect::<Vec<_>>()
        .join("; ")
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("alias", &self.alias())
            .field("name", &self.name())
            .field("connection", &self.connection_name())
            .field("finders", &self.finders)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{inflect::Inflection, Column, ColumnType, MemoryTransport};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new("blog_posts")
            .with_column(Column::new("id", ColumnType::Integer))
            .with_column(Column::new("headline", ColumnType::String))
            .with_column(Column::new("name", ColumnType::String))
            .with_primary_key(["id"])
    }

    #[test]
    fn derived_names() {
        let repository = RepositoryBuilder::new("BlogPosts").build().unwrap();
        assert_eq!(repository.alias(), "BlogPosts");
        assert_eq!(repository.name(), "blog_posts");
        assert_eq!(repository.connection_name(), DEFAULT_CONNECTION);
        assert_eq!(repository.alias_field("id"), "BlogPosts.id");
        assert_eq!(repository.alias_field("Tags.id"), "Tags.id");

        let dashed = RepositoryBuilder::new("BlogPosts")
            .config(RepositoryConfig::new().with_inflect(Inflection::Dasherize))
            .build()
            .unwrap();
        assert_eq!(dashed.name(), "blog-posts");

        let registered = RepositoryBuilder::new("Posts")
            .config(RepositoryConfig::new().with_registry_alias("Blog"))
            .build()
            .unwrap();
        assert_eq!(registered.alias(), "Blog");
        assert_eq!(registered.registry_alias(), "Blog");
    }

    #[test]
    fn missing_transport() {
        let repository = RepositoryBuilder::new("Posts").build().unwrap();
        assert!(matches!(
            repository.schema(),
            Err(Error::MissingConnection(name)) if name == "default"
        ));

        let connections = ConnectionRegistry::new_shared();
        let repository = RepositoryBuilder::new("Posts")
            .config(RepositoryConfig::new().with_connection("api"))
            .connections(Arc::clone(&connections))
            .build()
            .unwrap();
        assert!(matches!(repository.transport(), Err(Error::MissingConnection(name)) if name == "api"));

        connections.register("api", Arc::new(MemoryTransport::new()));
        assert!(repository.transport().is_ok());
    }

    #[test]
    fn display_field_fallbacks() {
        let repository = RepositoryBuilder::new("BlogPosts")
            .config(RepositoryConfig::new().with_schema(schema()))
            .build()
            .unwrap();
        assert_eq!(repository.display_field().unwrap(), "name");

        let keyed = RepositoryBuilder::new("BlogPosts")
            .config(RepositoryConfig::new().with_schema(
                Schema::new("blog_posts")
                    .with_column(Column::new("id", ColumnType::Integer))
                    .with_primary_key(["id"]),
            ))
            .build()
            .unwrap();
        assert_eq!(keyed.display_field().unwrap(), "id");

        let configured = RepositoryBuilder::new("BlogPosts")
            .config(
                RepositoryConfig::new()
                    .with_schema(schema())
                    .with_display_field("headline"),
            )
            .build()
            .unwrap();
        assert_eq!(configured.display_field().unwrap(), "headline");
    }

    #[test]
    fn schema_hook_runs_once() {
        let transport = Arc::new(MemoryTransport::new().with_collection(schema()));
        let repository = RepositoryBuilder::new("BlogPosts")
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .initialize_schema(|schema| schema.with_column(Column::new("title", ColumnType::String)))
            .build()
            .unwrap();

        assert!(repository.has_field("title").unwrap());
        assert_eq!(repository.display_field().unwrap(), "title");
        assert_eq!(repository.primary_key().unwrap(), ["id".to_string()]);
        assert_eq!(transport.describe_count(), 1);
    }

    #[test]
    fn invalid_configured_schema() {
        let broken = Schema::new("posts").with_primary_key(["id"]);
        let result = RepositoryBuilder::new("Posts")
            .config(RepositoryConfig::new().with_schema(broken))
            .build();
        assert!(matches!(result, Err(Error::InvalidSchema { .. })));
    }

    #[test]
    fn get_checks_key_arity() {
        let transport = Arc::new(MemoryTransport::new().with_collection(schema()));
        let repository = RepositoryBuilder::new("BlogPosts")
            .transport(transport)
            .build()
            .unwrap();

        let err = repository.get(json!([1, 2]), GetOptions::new()).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidPrimaryKey {
                collection: "blog_posts".into(),
                expected: 1,
                values: "1, 2".into(),
            }
        );
        assert!(matches!(
            repository.get(Value::Null, GetOptions::new()),
            Err(Error::InvalidPrimaryKey { .. })
        ));
    }

    #[test]
    fn unknown_finder() {
        let repository = RepositoryBuilder::new("BlogPosts")
            .config(RepositoryConfig::new().with_schema(schema()))
            .build()
            .unwrap();
        assert!(!repository.has_finder("threaded"));
        assert!(matches!(
            repository.find("threaded", FinderOptions::new()),
            Err(Error::UnknownFinder(name)) if name == "threaded"
        ));
    }
}
