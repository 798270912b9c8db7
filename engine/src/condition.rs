//! Condition trees.
//!
//! Conditions are written as JSON maps:
//!
//! ```text
//! {"status": "active", "age >=": 18, "OR": {"role": "admin", "role IN": ["owner"]}}
//! ```
//!
//! Plain keys compare for equality, `"<field> <op>"` keys pick an operator,
//! and `AND`/`OR`/`NOT` keys nest groups. Entries of one map are ANDed, as are
//! the elements of an array. The tree serializes back into the same syntax, so
//! it can travel inside request descriptors and finder options unchanged.

use crate::{error::Result, Error, FieldName};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Like,
}

/// Operator suffixes, longest match first.
const SUFFIXES: &[(&str, Operator)] = &[
    (" NOT IN", Operator::NotIn),
    (" IN", Operator::In),
    (" LIKE", Operator::Like),
    (" !=", Operator::NotEq),
    (" <>", Operator::NotEq),
    (" >=", Operator::Gte),
    (" <=", Operator::Lte),
    (" >", Operator::Gt),
    (" <", Operator::Lt),
    (" =", Operator::Eq),
];

impl Operator {
    /// Symbol used in the map syntax.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like => "LIKE",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A boolean condition over record fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Condition {
    Comparison {
        field: FieldName,
        operator: Operator,
        value: Value,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Equality comparison.
    pub fn eq(field: impl Into<FieldName>, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Eq, value)
    }

    /// Comparison with an explicit operator.
    pub fn compare(field: impl Into<FieldName>, operator: Operator, value: impl Into<Value>) -> Self {
        Condition::Comparison {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Conjunction; a single condition is returned as is.
    pub fn and(mut conditions: Vec<Condition>) -> Self {
        if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Condition::And(conditions)
        }
    }

    /// Disjunction; a single condition is returned as is.
    pub fn or(mut conditions: Vec<Condition>) -> Self {
        if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Condition::Or(conditions)
        }
    }

    /// Negation.
    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    /// Conjunction of equality comparisons.
    pub fn all_eq<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<FieldName>,
    {
        Self::and(pairs.into_iter().map(|(k, v)| Self::eq(k, v)).collect())
    }

    /// Parse the map syntax.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => parse_group(map_entries(map), false),
            Value::Array(items) => Ok(Self::and(
                items
                    .into_iter()
                    .map(Self::from_value)
                    .collect::<Result<Vec<_>>>()?,
            )),
            other => Err(Error::InvalidConditions(format!(
                "expected an object or an array, got {other}"
            ))),
        }
    }

    /// Parse a map of conditions.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        Self::from_value(Value::Object(map))
    }

    /// Render into the map syntax.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            Condition::Comparison {
                field,
                operator: Operator::Eq,
                value,
            } => {
                map.insert(field.clone(), value.clone());
            }
            Condition::Comparison {
                field,
                operator,
                value,
            } => {
                map.insert(format!("{field} {operator}"), value.clone());
            }
            Condition::And(items) => {
                map.insert("AND".into(), items.iter().map(Self::to_value).collect());
            }
            Condition::Or(items) => {
                map.insert("OR".into(), items.iter().map(Self::to_value).collect());
            }
            Condition::Not(inner) => {
                map.insert("NOT".into(), inner.to_value());
            }
        }
        Value::Object(map)
    }

    /// Compile the condition for evaluation against many rows.
    ///
    /// LIKE patterns are compiled here once; a pattern that is not a string
    /// or does not compile is rejected.
    pub fn matcher(&self) -> Result<Matcher<'_>> {
        Ok(Matcher {
            node: Node::compile(self)?,
        })
    }

    /// Evaluate the condition against a single row. Missing fields read as null.
    pub fn matches(&self, row: &Map<String, Value>) -> Result<bool> {
        Ok(self.matcher()?.matches(row))
    }
}

/// A compiled [`Condition`].
#[derive(Debug)]
pub struct Matcher<'a> {
    node: Node<'a>,
}

impl Matcher<'_> {
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        self.node.matches(row)
    }
}

#[derive(Debug)]
enum Node<'a> {
    Comparison {
        field: &'a str,
        operator: Operator,
        value: &'a Value,
        pattern: Option<Regex>,
    },
    And(Vec<Node<'a>>),
    Or(Vec<Node<'a>>),
    Not(Box<Node<'a>>),
}

impl<'a> Node<'a> {
    fn compile(condition: &'a Condition) -> Result<Self> {
        Ok(match condition {
            Condition::Comparison {
                field,
                operator,
                value,
            } => Node::Comparison {
                field: field.as_str(),
                operator: *operator,
                value,
                pattern: match operator {
                    Operator::Like => Some(like_regex(field, value)?),
                    _ => None,
                },
            },
            Condition::And(items) => Node::And(Self::compile_all(items)?),
            Condition::Or(items) => Node::Or(Self::compile_all(items)?),
            Condition::Not(inner) => Node::Not(Box::new(Node::compile(inner)?)),
        })
    }

    fn compile_all(items: &'a [Condition]) -> Result<Vec<Self>> {
        items.iter().map(Node::compile).collect()
    }

    fn matches(&self, row: &Map<String, Value>) -> bool {
        match self {
            Node::Comparison {
                field,
                operator,
                value,
                pattern,
            } => {
                let actual = row.get(*field).unwrap_or(&Value::Null);
                compare(actual, *operator, value, pattern.as_ref())
            }
            Node::And(items) => items.iter().all(|n| n.matches(row)),
            Node::Or(items) => items.iter().any(|n| n.matches(row)),
            Node::Not(inner) => !inner.matches(row),
        }
    }
}

impl TryFrom<Value> for Condition {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        condition.to_value()
    }
}

/// Entries of a group, either the keys of an object or the items of an array.
enum Entry {
    Keyed(String, Value),
    Nested(Value),
}

fn map_entries(map: Map<String, Value>) -> Vec<Entry> {
    map.into_iter().map(|(k, v)| Entry::Keyed(k, v)).collect()
}

fn group_entries(value: Value) -> Result<Vec<Entry>> {
    match value {
        Value::Object(map) => Ok(map_entries(map)),
        Value::Array(items) => Ok(items.into_iter().map(Entry::Nested).collect()),
        other => Err(Error::InvalidConditions(format!(
            "group must be an object or an array, got {other}"
        ))),
    }
}

fn parse_group(entries: Vec<Entry>, or: bool) -> Result<Condition> {
    let parts = entries
        .into_iter()
        .map(|entry| match entry {
            Entry::Keyed(key, value) => parse_entry(&key, value),
            Entry::Nested(value) => Condition::from_value(value),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(if or {
        Condition::or(parts)
    } else {
        Condition::and(parts)
    })
}

fn parse_entry(key: &str, value: Value) -> Result<Condition> {
    match key.trim().to_ascii_uppercase().as_str() {
        "AND" => parse_group(group_entries(value)?, false),
        "OR" => parse_group(group_entries(value)?, true),
        "NOT" => Ok(Condition::not(Condition::from_value(value)?)),
        _ => parse_comparison(key, value),
    }
}

fn parse_comparison(key: &str, value: Value) -> Result<Condition> {
    let key = key.trim();
    let upper = key.to_ascii_uppercase();

    let (field, operator) = SUFFIXES
        .iter()
        .find(|(suffix, _)| upper.ends_with(suffix))
        .map(|(suffix, op)| (key[..key.len() - suffix.len()].trim(), *op))
        .unwrap_or((key, Operator::Eq));

    if field.is_empty() {
        return Err(Error::InvalidConditions(format!(
            "missing field name in '{key}'"
        )));
    }

    if matches!(operator, Operator::In | Operator::NotIn) && !value.is_array() {
        return Err(Error::InvalidConditions(format!(
            "'{key}' expects an array value"
        )));
    }

    if operator == Operator::Like {
        like_regex(field, &value)?;
    }

    Ok(Condition::compare(field, operator, value))
}

fn compare(actual: &Value, operator: Operator, expected: &Value, pattern: Option<&Regex>) -> bool {
    match operator {
        Operator::Eq => values_equal(actual, expected),
        Operator::NotEq => !values_equal(actual, expected),
        Operator::Gt => order(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => order(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::In => in_list(actual, expected),
        Operator::NotIn => !in_list(actual, expected),
        Operator::Like => pattern
            .zip(actual.as_str())
            .is_some_and(|(re, text)| re.is_match(text)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Text form of a key value. Integral numbers render without a fraction, so
/// `1`, `1.0` and `"1"` share one text form; null renders empty.
pub(crate) fn key_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

/// Largest float that still holds every integer below it exactly.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Ordering between two values; numbers and strings only.
pub(crate) fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn in_list(actual: &Value, list: &Value) -> bool {
    list.as_array()
        .is_some_and(|items| items.iter().any(|item| values_equal(actual, item)))
}

/// Compiled LIKE patterns larger than this are rejected.
const LIKE_SIZE_LIMIT: usize = 1 << 20;

/// Anchored regex for a LIKE pattern: `%` is any run, `_` any one character.
fn like_regex(field: &str, pattern: &Value) -> Result<Regex> {
    let pattern = pattern.as_str().ok_or_else(|| {
        Error::InvalidConditions(format!("'{field} LIKE' expects a string pattern, got {pattern}"))
    })?;

    let mut expr = String::with_capacity(pattern.len() + 2);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');

    RegexBuilder::new(&expr)
        .size_limit(LIKE_SIZE_LIMIT)
        .build()
        .map_err(|e| Error::InvalidConditions(format!("bad LIKE pattern for '{field}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn parse_plain_map() {
        let condition = Condition::from_value(json!({"name": "a", "status": "active"})).unwrap();

        assert_eq!(
            condition,
            Condition::And(vec![
                Condition::eq("name", "a"),
                Condition::eq("status", "active"),
            ])
        );
    }

    #[test]
    fn parse_operators() {
        let condition = Condition::from_value(json!({
            "age >=": 18,
            "role NOT IN": ["guest"],
            "name like": "Al%",
            "score <>": 0,
        }))
        .unwrap();

        assert_eq!(
            condition,
            Condition::And(vec![
                Condition::compare("age", Operator::Gte, 18),
                Condition::compare("role", Operator::NotIn, json!(["guest"])),
                Condition::compare("name", Operator::Like, "Al%"),
                Condition::compare("score", Operator::NotEq, 0),
            ])
        );
    }

    #[test]
    fn parse_groups() {
        let condition = Condition::from_value(json!({
            "OR": {"name": "a", "title": "b"},
            "not": [{"deleted": true}],
        }))
        .unwrap();

        assert_eq!(
            condition,
            Condition::And(vec![
                Condition::Or(vec![Condition::eq("name", "a"), Condition::eq("title", "b")]),
                Condition::not(Condition::eq("deleted", true)),
            ])
        );
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            Condition::from_value(json!("name = 1")),
            Err(Error::InvalidConditions(_))
        ));
        assert!(matches!(
            Condition::from_value(json!({"id IN": 3})),
            Err(Error::InvalidConditions(_))
        ));
        assert!(matches!(
            Condition::from_value(json!({"  ": 3})),
            Err(Error::InvalidConditions(_))
        ));
    }

    #[test]
    fn render_and_reparse() {
        let condition = Condition::And(vec![
            Condition::compare("age", Operator::Gt, 3),
            Condition::Or(vec![Condition::eq("a", 1), Condition::eq("b", 2)]),
        ]);
        let rendered = condition.to_value();
        let reparsed = Condition::from_value(rendered).unwrap();

        let sample = row(json!({"age": 4, "a": 0, "b": 2}));
        assert_eq!(condition.matches(&sample).unwrap(), reparsed.matches(&sample).unwrap());
        assert_eq!(reparsed, condition);
    }

    #[test]
    fn evaluate() {
        let sample = row(json!({"name": "Alice", "age": 30, "score": 1.0}));

        assert!(Condition::eq("name", "Alice").matches(&sample).unwrap());
        assert!(Condition::eq("score", 1).matches(&sample).unwrap());
        assert!(Condition::compare("age", Operator::Gt, 18).matches(&sample).unwrap());
        assert!(!Condition::compare("age", Operator::Lt, 18).matches(&sample).unwrap());
        assert!(Condition::compare("name", Operator::In, json!(["Bob", "Alice"])).matches(&sample).unwrap());
        assert!(Condition::compare("name", Operator::Like, "A_i%").matches(&sample).unwrap());
        assert!(!Condition::compare("name", Operator::Like, "a%").matches(&sample).unwrap());
        assert!(Condition::eq("missing", Value::Null).matches(&sample).unwrap());
        assert!(Condition::And(vec![]).matches(&sample).unwrap());
        assert!(!Condition::Or(vec![]).matches(&sample).unwrap());
    }

    #[test]
    fn like_escapes_regex_syntax() {
        let sample = row(json!({"path": "a.b(c)"}));
        assert!(Condition::compare("path", Operator::Like, "a.b(%").matches(&sample).unwrap());
        assert!(!Condition::compare("path", Operator::Like, "a?b%").matches(&sample).unwrap());
    }

    #[test]
    fn bad_like_patterns_are_rejected() {
        let oversized = "_".repeat(200_000);

        assert!(matches!(
            Condition::from_value(json!({"name LIKE": oversized.clone()})),
            Err(Error::InvalidConditions(_))
        ));
        assert!(matches!(
            Condition::from_value(json!({"name LIKE": 5})),
            Err(Error::InvalidConditions(_))
        ));

        let built = Condition::compare("name", Operator::Like, oversized.as_str());
        assert!(matches!(built.matcher(), Err(Error::InvalidConditions(_))));
        assert!(matches!(
            built.matches(&row(json!({"name": "x"}))),
            Err(Error::InvalidConditions(_))
        ));
    }

    #[test]
    fn matcher_reuses_compiled_patterns() {
        let condition = Condition::Or(vec![
            Condition::compare("name", Operator::Like, "A%"),
            Condition::not(Condition::eq("age", 30)),
        ]);
        let matcher = condition.matcher().unwrap();

        assert!(matcher.matches(&row(json!({"name": "Alice", "age": 30}))));
        assert!(matcher.matches(&row(json!({"name": "Bob", "age": 31}))));
        assert!(!matcher.matches(&row(json!({"name": "Bob", "age": 30}))));
        assert!(!matcher.matches(&row(json!({"name": 7, "age": 30}))));
    }

    #[test]
    fn key_text_normalizes_numbers() {
        assert_eq!(key_text(Some(&json!(1))), "1");
        assert_eq!(key_text(Some(&json!(1.0))), "1");
        assert_eq!(key_text(Some(&json!("1"))), "1");
        assert_eq!(key_text(Some(&json!(-4.0))), "-4");
        assert_eq!(key_text(Some(&json!(2.5))), "2.5");
        assert_eq!(key_text(Some(&json!(true))), "true");
        assert_eq!(key_text(Some(&Value::Null)), "");
        assert_eq!(key_text(None), "");
    }

    #[test]
    fn serde_uses_map_syntax() {
        let condition: Condition = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(condition, Condition::eq("id", 1));
        assert_eq!(serde_json::to_value(&condition).unwrap(), json!({"id": 1}));
    }
}
