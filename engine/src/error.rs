//! Error types for the Conduit engine.

use crate::{CollectionName, OperationKind};
use thiserror::Error;

/// All possible errors from the Conduit engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Lookup errors
    #[error("record not found in collection '{0}'")]
    RecordNotFound(CollectionName),

    #[error("invalid primary key for '{collection}': expected {expected} value(s), got [{values}]")]
    InvalidPrimaryKey {
        collection: CollectionName,
        expected: usize,
        values: String,
    },

    #[error("unknown finder '{0}'")]
    UnknownFinder(String),

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    // Dynamic finder errors
    #[error("not enough arguments for dynamic finder '{name}': got {got}, required {required}")]
    MagicFinderArgumentMismatch {
        name: String,
        got: usize,
        required: usize,
    },

    #[error("cannot mix \"and\" and \"or\" in dynamic finder '{0}'")]
    MagicFinderAmbiguous(String),

    // Persistence errors
    #[error("failed to persist record in '{collection}': {reason}")]
    PersistenceFailed {
        collection: CollectionName,
        reason: String,
    },

    // Resolution errors
    #[error("resource class '{0}' is not registered")]
    MissingResourceClass(String),

    #[error("connection '{0}' is not configured")]
    MissingConnection(String),

    #[error("cache config '{0}' is not configured")]
    MissingCache(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionName),

    // Shape errors
    #[error("invalid schema for '{collection}': {reason}")]
    InvalidSchema {
        collection: CollectionName,
        reason: String,
    },

    #[error("invalid conditions: {0}")]
    InvalidConditions(String),

    #[error("invalid finder options: {0}")]
    InvalidOptions(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("query is already a {current} query, cannot turn it into {requested}")]
    QueryKindConflict {
        current: OperationKind,
        requested: OperationKind,
    },

    #[error("unexpected result: expected {expected}")]
    UnexpectedResult { expected: String },

    // Backend errors
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Whether the error originates from the backend rather than from the caller.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::CollectionNotFound(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
