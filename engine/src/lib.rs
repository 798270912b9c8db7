//! # Conduit Engine
//!
//! A backend-agnostic repository facade for remote collections.
//!
//! This crate lets callers read and write records in collections that live
//! behind some service (a REST API, a search index, a remote store) through a
//! uniform repository interface. The engine never speaks a wire protocol; it
//! builds normalized requests and hands them to a pluggable [`Transport`].
//!
//! ## Design Principles
//!
//! - **Lazy**: Metadata is resolved on first use and memoized
//! - **Backend-agnostic**: Everything backend specific lives behind [`Transport`]
//! - **Observable**: Lifecycle events let listeners veto or adjust writes
//! - **Testable**: [`MemoryTransport`] answers requests in process and logs them
//!
//! ## Core Concepts
//!
//! ### Repositories
//!
//! A [`Repository`] wraps one collection. It derives the collection name,
//! schema, primary key and display field from configuration or from the
//! transport, and exposes finders, `get`, `save`, `delete` and bulk writes.
//!
//! ### Queries
//!
//! A [`Query`] is built by finders and executed lazily. It sends exactly one
//! [`RequestDescriptor`] no matter how many times its results are read.
//!
//! ### Finders
//!
//! Finders are named query strategies. `all` and `list` are built in;
//! dynamic names such as `findByTitleAndStatus` are resolved with
//! [`Repository::dynamic_finder`].
//!
//! ## Quick Start
//!
//! ```rust
//! use conduit_engine::{
//!     Column, ColumnType, Condition, FinderOptions, MemoryTransport, RepositoryBuilder,
//!     SaveOptions, Schema,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! // 1. A backend holding an `articles` collection
//! let schema = Schema::new("articles")
//!     .with_column(Column::new("id", ColumnType::Integer))
//!     .with_column(Column::new("title", ColumnType::String))
//!     .with_primary_key(["id"]);
//! let transport = Arc::new(MemoryTransport::new().with_collection(schema));
//!
//! // 2. A repository over it
//! let articles = RepositoryBuilder::new("Articles")
//!     .transport(transport)
//!     .build()
//!     .unwrap();
//!
//! // 3. Save a record
//! let mut article = articles.new_empty_record().unwrap();
//! article.set("title", json!("Hello"));
//! let saved = articles.save(&mut article, SaveOptions::default()).unwrap();
//! assert!(saved.is_some());
//!
//! // 4. Find it again
//! let found = articles
//!     .find("all", FinderOptions::new().conditions(Condition::eq("title", "Hello")))
//!     .unwrap()
//!     .first()
//!     .unwrap();
//! assert!(found.is_some());
//! ```

pub mod cache;
pub mod condition;
pub mod config;
pub mod error;
pub mod events;
pub mod finder;
pub mod inflect;
pub mod marshaller;
pub mod memory;
pub mod options;
pub mod query;
pub mod record;
pub mod repository;
pub mod resource;
pub mod rules;
pub mod schema;
pub mod transport;

// Re-export main types at crate root
pub use cache::{get_cache_key, Cache, CacheDirective, MemoryCache};
pub use condition::{Condition, Matcher, Operator};
pub use config::RepositoryConfig;
pub use error::{Error, Result};
pub use events::{Event, EventManager, EventResult, Flow, Listener};
pub use finder::{Combinator, DynamicFinder, FinderRegistry};
pub use inflect::Inflection;
pub use marshaller::Marshaller;
pub use memory::MemoryTransport;
pub use options::{DeleteOptions, FinderOptions, GetOptions, MarshalOptions, SaveOptions};
pub use query::{Query, QueryOutcome, ResultSet, Results};
pub use record::Record;
pub use repository::{Repository, RepositoryBuilder, DEFAULT_CONNECTION};
pub use resource::{ResourceClass, ResourceRegistry};
pub use rules::{RuleChecker, RuleMode, RuleSet};
pub use schema::{Column, ColumnType, Schema};
pub use transport::{
    ConnectionRegistry, Direction, OperationKind, OrderBy, RequestDescriptor, Transport,
    TransportResult,
};

/// Type aliases for clarity
pub type CollectionName = String;
pub type FieldName = String;
