//! Lazily executed queries.
//!
//! A [`Query`] accumulates conditions, projection, ordering and paging, and is
//! turned into exactly one [`RequestDescriptor`] the first time a result is
//! asked for. The outcome is memoized; changing the query afterwards drops it.

use crate::{
    cache::CacheDirective,
    condition::Condition,
    error::Result,
    transport::{OperationKind, OrderBy, RequestDescriptor, TransportResult},
    Error, FieldName, FinderOptions, Record, Repository,
};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Transformation applied to read results after hydration.
pub type ResultFormatter = Arc<dyn Fn(Results) -> Results + Send + Sync>;

/// Materialized read results.
#[derive(Debug, Clone, PartialEq)]
pub enum Results {
    /// Hydrated records, in backend order
    Records(Vec<Record>),
    /// A keyed shape produced by a formatter such as the `list` finder
    Map(Map<String, Value>),
}

impl Results {
    pub fn len(&self) -> usize {
        match self {
            Results::Records(records) => records.len(),
            Results::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_records(&self) -> Option<&[Record]> {
        match self {
            Results::Records(records) => Some(records),
            Results::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map<String, Value>> {
        match self {
            Results::Map(map) => Some(map),
            Results::Records(_) => None,
        }
    }
}

/// Results of a read together with the total number of matches.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    results: Results,
    total: u64,
}

impl ResultSet {
    pub fn new(results: Results, total: u64) -> Self {
        Self { results, total }
    }

    pub fn results(&self) -> &Results {
        &self.results
    }

    pub fn into_results(self) -> Results {
        self.results
    }

    /// Matches before paging was applied.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn first(&self) -> Option<&Record> {
        self.results.as_records().and_then(|records| records.first())
    }

    pub fn into_records(self) -> Result<Vec<Record>> {
        match self.results {
            Results::Records(records) => Ok(records),
            Results::Map(_) => Err(Error::UnexpectedResult {
                expected: "records".into(),
            }),
        }
    }

    pub fn into_map(self) -> Result<Map<String, Value>> {
        match self.results {
            Results::Map(map) => Ok(map),
            Results::Records(_) => Err(Error::UnexpectedResult {
                expected: "a keyed map".into(),
            }),
        }
    }
}

/// What running a query produced.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Read(ResultSet),
    /// A record echoed back by the backend
    Saved(Record),
    Affected(u64),
}

#[derive(Serialize, Deserialize)]
struct CachedRows {
    rows: Vec<Map<String, Value>>,
    #[serde(default)]
    total: Option<u64>,
}

/// Query bound to a repository.
#[derive(Clone)]
pub struct Query<'a> {
    repository: &'a Repository,
    kind: Option<OperationKind>,
    conditions: Vec<Condition>,
    fields: Vec<FieldName>,
    values: Map<String, Value>,
    order: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    page: Option<u64>,
    cache: Option<CacheDirective>,
    options: Map<String, Value>,
    formatters: Vec<ResultFormatter>,
    outcome: OnceCell<QueryOutcome>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(repository: &'a Repository) -> Self {
        Self {
            repository,
            kind: None,
            conditions: Vec::new(),
            fields: Vec::new(),
            values: Map::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            page: None,
            cache: None,
            options: Map::new(),
            formatters: Vec::new(),
            outcome: OnceCell::new(),
        }
    }

    pub fn repository(&self) -> &'a Repository {
        self.repository
    }

    /// Operation kind; unset queries run as reads.
    pub fn kind(&self) -> OperationKind {
        self.kind.unwrap_or(OperationKind::Read)
    }

    fn with_kind(mut self, kind: OperationKind) -> Result<Self> {
        match self.kind {
            Some(current) if current != kind => Err(Error::QueryKindConflict {
                current,
                requested: kind,
            }),
            _ => {
                self.kind = Some(kind);
                Ok(self.reset())
            }
        }
    }

    pub fn read(self) -> Result<Self> {
        self.with_kind(OperationKind::Read)
    }

    pub fn create(self) -> Result<Self> {
        self.with_kind(OperationKind::Create)
    }

    pub fn update(self) -> Result<Self> {
        self.with_kind(OperationKind::Update)
    }

    pub fn delete(self) -> Result<Self> {
        self.with_kind(OperationKind::Delete)
    }

    fn reset(mut self) -> Self {
        self.outcome.take();
        self
    }

    /// Add a condition, AND-ed with the existing ones.
    pub fn filter(mut self, condition: Condition) -> Self {
        if !self.conditions.contains(&condition) {
            self.conditions.push(condition);
        }
        self.reset()
    }

    /// Add fields to the projection.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        for field in fields {
            let field = field.into();
            if !self.fields.contains(&field) {
                self.fields.push(field);
            }
        }
        self.reset()
    }

    /// Add written values.
    pub fn set(mut self, values: Map<String, Value>) -> Self {
        self.values.extend(values);
        self.reset()
    }

    /// Add an ordering clause, replacing any clause on the same field.
    pub fn order(mut self, order: OrderBy) -> Self {
        match self.order.iter_mut().find(|o| o.field == order.field) {
            Some(existing) => *existing = order,
            None => self.order.push(order),
        }
        self.reset()
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self.reset()
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self.reset()
    }

    /// 1-based page; needs a limit to have an effect.
    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page.max(1));
        self.reset()
    }

    /// Read through the named cache under `key`.
    pub fn cache(mut self, key: impl Into<String>, config: impl Into<String>) -> Self {
        self.cache = Some(CacheDirective::new(key, config));
        self.reset()
    }

    /// Set a finder-specific option forwarded to the transport.
    pub fn option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self.reset()
    }

    /// Fold finder options into the query. Applying the same options twice
    /// leaves the query unchanged.
    pub fn apply_options(mut self, options: &FinderOptions) -> Self {
        if let Some(conditions) = &options.conditions {
            self = self.filter(conditions.clone());
        }
        if !options.fields.is_empty() {
            self = self.select(options.fields.iter().cloned());
        }
        for order in &options.order {
            self = self.order(order.clone());
        }
        if let Some(limit) = options.limit {
            self = self.limit(limit);
        }
        if let Some(page) = options.page {
            self = self.page(page);
        }
        if let Some(cache) = &options.cache {
            self = self.cache(cache.key.clone(), cache.config.clone());
        }
        self.options
            .extend(options.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.reset()
    }

    /// Canonical finder options describing the query.
    pub fn options(&self) -> FinderOptions {
        FinderOptions {
            conditions: self.conditions(),
            fields: self.fields.clone(),
            order: self.order.clone(),
            limit: self.limit,
            page: self.page,
            cache: self.cache.clone(),
            extra: self.options.clone(),
        }
    }

    /// Combined condition tree, `None` when unconstrained.
    pub fn conditions(&self) -> Option<Condition> {
        match self.conditions.len() {
            0 => None,
            _ => Some(Condition::and(self.conditions.clone())),
        }
    }

    /// Queue a transformation of the read results.
    pub fn format_results<F>(mut self, formatter: F) -> Self
    where
        F: Fn(Results) -> Results + Send + Sync + 'static,
    {
        self.formatters.push(Arc::new(formatter));
        self.reset()
    }

    /// Apply another finder on top of this query.
    pub fn find(self, finder: &str, options: FinderOptions) -> Result<Self> {
        let repository = self.repository;
        repository.call_finder(finder, self, options)
    }

    /// The request this query sends.
    pub fn descriptor(&self) -> RequestDescriptor {
        let mut request = RequestDescriptor::new(self.kind(), self.repository.name());
        request.conditions = self.conditions();
        request.fields = self.fields.clone();
        request.values = self.values.clone();
        request.order = self.order.clone();
        request.limit = self.limit;
        request.page = self.page;
        request.offset = self.offset.or_else(|| {
            let limit = self.limit?;
            self.page.map(|page| (page - 1).saturating_mul(limit))
        });
        request.options = self.options.clone();
        request
    }

    pub fn is_executed(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Run the query once and return the memoized outcome.
    pub fn execute(&self) -> Result<&QueryOutcome> {
        self.outcome.get_or_try_init(|| self.run())
    }

    fn run(&self) -> Result<QueryOutcome> {
        let request = self.descriptor();
        if request.kind == OperationKind::Read {
            if let Some(directive) = &self.cache {
                return self.read_cached(directive, &request);
            }
        }
        let result = self.repository.send(&request)?;
        self.outcome(request.kind, result)
    }

    fn read_cached(&self, directive: &CacheDirective, request: &RequestDescriptor) -> Result<QueryOutcome> {
        let cache = self.repository.cache(&directive.config)?;

        let cached = cache
            .read(&directive.key)
            .and_then(|value| serde_json::from_value::<CachedRows>(value).ok());
        let rows = match cached {
            Some(rows) => {
                tracing::debug!(key = %directive.key, "cache hit");
                rows
            }
            None => match self.repository.send(request)? {
                TransportResult::Rows { rows, total } => {
                    let fresh = CachedRows { rows, total };
                    match serde_json::to_value(&fresh) {
                        Ok(value) => cache.write(&directive.key, value),
                        Err(e) => tracing::warn!(key = %directive.key, error = %e, "rows not cacheable"),
                    }
                    fresh
                }
                other => return self.outcome(OperationKind::Read, other),
            },
        };

        self.outcome(
            OperationKind::Read,
            TransportResult::Rows {
                rows: rows.rows,
                total: rows.total,
            },
        )
    }

    fn outcome(&self, kind: OperationKind, result: TransportResult) -> Result<QueryOutcome> {
        match (kind, result) {
            (OperationKind::Read, TransportResult::Rows { rows, total }) => {
                let total = total.unwrap_or(rows.len() as u64);
                let records = rows
                    .into_iter()
                    .map(|row| self.repository.hydrate(row))
                    .collect::<Result<Vec<_>>>()?;
                Ok(QueryOutcome::Read(ResultSet::new(self.formatted(records), total)))
            }
            (OperationKind::Read, TransportResult::Resource(record)) => {
                Ok(QueryOutcome::Read(ResultSet::new(self.formatted(vec![record]), 1)))
            }
            (OperationKind::Read, TransportResult::Affected(_)) => Err(Error::UnexpectedResult {
                expected: "rows for a read".into(),
            }),
            (_, TransportResult::Resource(record)) => Ok(QueryOutcome::Saved(record)),
            (_, TransportResult::Affected(count)) => Ok(QueryOutcome::Affected(count)),
            (_, TransportResult::Rows { rows, .. }) => Ok(QueryOutcome::Affected(rows.len() as u64)),
        }
    }

    fn formatted(&self, records: Vec<Record>) -> Results {
        self.formatters
            .iter()
            .fold(Results::Records(records), |results, formatter| formatter(results))
    }

    /// Full result set of a read.
    pub fn all(&self) -> Result<ResultSet> {
        match self.execute()? {
            QueryOutcome::Read(set) => Ok(set.clone()),
            _ => Err(Error::UnexpectedResult {
                expected: "a read result".into(),
            }),
        }
    }

    pub fn records(&self) -> Result<Vec<Record>> {
        self.all()?.into_records()
    }

    /// Keyed results, as produced by the `list` finder.
    pub fn to_map(&self) -> Result<Map<String, Value>> {
        self.all()?.into_map()
    }

    /// Number of matches, ignoring paging.
    pub fn count(&self) -> Result<u64> {
        self.all().map(|set| set.total())
    }

    pub fn first(&self) -> Result<Option<Record>> {
        Ok(self.all()?.first().cloned())
    }

    pub fn first_or_fail(&self) -> Result<Record> {
        self.first()?
            .ok_or_else(|| Error::RecordNotFound(self.repository.name().to_string()))
    }

    /// Rows touched by a write.
    pub fn affected_rows(&self) -> Result<u64> {
        match self.execute()? {
            QueryOutcome::Affected(count) => Ok(*count),
            QueryOutcome::Saved(_) => Ok(1),
            QueryOutcome::Read(_) => Err(Error::UnexpectedResult {
                expected: "a write result".into(),
            }),
        }
    }
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("request", &self.descriptor())
            .field("formatters", &self.formatters.len())
            .field("executed", &self.is_executed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::MemoryTransport, Column, ColumnType, MemoryCache, RepositoryBuilder, Schema,
    };
    use serde_json::json;

    fn repository(transport: Arc<MemoryTransport>) -> Repository {
        RepositoryBuilder::new("Articles")
            .transport(transport)
            .cache("default", Arc::new(MemoryCache::new()))
            .build()
            .unwrap()
    }

    fn transport() -> Arc<MemoryTransport> {
        let schema = Schema::new("articles")
            .with_column(Column::new("id", ColumnType::Integer))
            .with_column(Column::new("title", ColumnType::String))
            .with_primary_key(["id"]);
        let transport = MemoryTransport::new().with_collection(schema);
        for (id, title) in [(1, "First"), (2, "Second"), (3, "Third")] {
            transport
                .insert("articles", json!({"id": id, "title": title}).as_object().cloned().unwrap())
                .unwrap();
        }
        Arc::new(transport)
    }

    #[test]
    fn descriptor_reflects_query() {
        let transport = transport();
        let articles = repository(transport);

        let query = articles
            .query()
            .filter(Condition::eq("title", "First"))
            .select(["id"])
            .order(OrderBy::asc("title"))
            .order(OrderBy::desc("title"))
            .limit(10)
            .page(3);

        let request = query.descriptor();
        assert_eq!(request.kind, OperationKind::Read);
        assert_eq!(request.collection, "articles");
        assert_eq!(request.conditions, Some(Condition::eq("title", "First")));
        assert_eq!(request.order, vec![OrderBy::desc("title")]);
        assert_eq!(request.offset, Some(20));
    }

    #[test]
    fn huge_page_saturates_offset() {
        let transport = transport();
        let articles = repository(Arc::clone(&transport));

        let query = articles.query().limit(10).page(u64::MAX);
        assert_eq!(query.descriptor().offset, Some(u64::MAX));
        assert!(query.records().unwrap().is_empty());
        assert_eq!(query.count().unwrap(), 3);
    }

    #[test]
    fn kind_conflicts() {
        let transport = transport();
        let articles = repository(transport);

        let query = articles.query().update().unwrap();
        assert!(matches!(
            query.delete(),
            Err(Error::QueryKindConflict {
                current: OperationKind::Update,
                requested: OperationKind::Delete
            })
        ));
        assert!(articles.query().read().unwrap().read().is_ok());
    }

    #[test]
    fn executes_once() {
        let transport = transport();
        let articles = repository(Arc::clone(&transport));

        let query = articles.query().limit(2);
        assert_eq!(query.records().unwrap().len(), 2);
        assert_eq!(query.count().unwrap(), 3);
        assert!(query.first().unwrap().is_some());
        assert_eq!(transport.request_count(OperationKind::Read), 1);

        let query = query.limit(1);
        assert!(!query.is_executed());
        assert_eq!(query.records().unwrap().len(), 1);
        assert_eq!(transport.request_count(OperationKind::Read), 2);
    }

    #[test]
    fn apply_options_is_idempotent() {
        let transport = transport();
        let articles = repository(transport);

        let options = FinderOptions::new()
            .conditions(Condition::eq("id", 1))
            .fields(["id", "title"])
            .order(OrderBy::desc("id"))
            .option("keyField", "id");

        let once = articles.query().apply_options(&options);
        let twice = articles.query().apply_options(&options).apply_options(&options);
        assert_eq!(once.descriptor(), twice.descriptor());
        assert_eq!(once.options(), twice.options());
    }

    #[test]
    fn formatters_run_in_order() {
        let transport = transport();
        let articles = repository(transport);

        let query = articles
            .query()
            .format_results(|results| match results {
                Results::Records(mut records) => {
                    records.reverse();
                    Results::Records(records)
                }
                other => other,
            })
            .format_results(|results| match results {
                Results::Records(mut records) => {
                    records.truncate(1);
                    Results::Records(records)
                }
                other => other,
            });

        let records = query.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("id"), Some(&json!(3)));
    }

    #[test]
    fn cache_read_through() {
        let transport = transport();
        let articles = repository(Arc::clone(&transport));

        let first = articles.query().cache("all-articles", "default").records().unwrap();
        let second = articles.query().cache("all-articles", "default").records().unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.request_count(OperationKind::Read), 1);

        let missing = articles.query().cache("k", "nowhere");
        assert!(matches!(missing.records(), Err(Error::MissingCache(name)) if name == "nowhere"));
    }

    #[test]
    fn first_or_fail_reports_collection() {
        let transport = transport();
        let articles = repository(transport);

        let query = articles.query().filter(Condition::eq("id", 99));
        assert!(matches!(
            query.first_or_fail(),
            Err(Error::RecordNotFound(name)) if name == "articles"
        ));
    }
}
