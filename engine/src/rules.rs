//! Rule checking before records are written.

use crate::{FieldName, Record, SaveOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which kind of write a rule check guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    Create,
    Update,
}

impl std::fmt::Display for RuleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleMode::Create => write!(f, "create"),
            RuleMode::Update => write!(f, "update"),
        }
    }
}

/// Decides whether a record may be written.
///
/// Checkers may attach errors to the record to explain a refusal.
pub trait RuleChecker: Send + Sync {
    fn check(&self, record: &mut Record, mode: RuleMode, options: &SaveOptions) -> bool;
}

/// A single rule. `Err` carries the message attached to the rule's field.
pub type Rule = Arc<dyn Fn(&Record, &SaveOptions) -> Result<(), String> + Send + Sync>;

#[derive(Clone)]
struct Registered {
    field: FieldName,
    modes: &'static [RuleMode],
    rule: Rule,
}

/// Closure-backed rule checker.
#[derive(Clone, Default)]
pub struct RuleSet {
    rules: Vec<Registered>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule checked on both creates and updates.
    pub fn add<F>(&mut self, field: impl Into<FieldName>, rule: F) -> &mut Self
    where
        F: Fn(&Record, &SaveOptions) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(field, &[RuleMode::Create, RuleMode::Update], rule)
    }

    /// Add a rule checked on creates only.
    pub fn add_create<F>(&mut self, field: impl Into<FieldName>, rule: F) -> &mut Self
    where
        F: Fn(&Record, &SaveOptions) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(field, &[RuleMode::Create], rule)
    }

    /// Add a rule checked on updates only.
    pub fn add_update<F>(&mut self, field: impl Into<FieldName>, rule: F) -> &mut Self
    where
        F: Fn(&Record, &SaveOptions) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(field, &[RuleMode::Update], rule)
    }

    fn push<F>(&mut self, field: impl Into<FieldName>, modes: &'static [RuleMode], rule: F) -> &mut Self
    where
        F: Fn(&Record, &SaveOptions) -> Result<(), String> + Send + Sync + 'static,
    {
        self.rules.push(Registered {
            field: field.into(),
            modes,
            rule: Arc::new(rule),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RuleChecker for RuleSet {
    fn check(&self, record: &mut Record, mode: RuleMode, options: &SaveOptions) -> bool {
        let failures: Vec<(FieldName, String)> = self
            .rules
            .iter()
            .filter(|r| r.modes.contains(&mode))
            .filter_map(|r| (r.rule)(record, options).err().map(|m| (r.field.clone(), m)))
            .collect();

        let passed = failures.is_empty();
        for (field, message) in failures {
            record.add_error(field, message);
        }
        passed
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.rules.len())
            .finish()
    }
}
