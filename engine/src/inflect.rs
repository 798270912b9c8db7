//! Naming conventions used to derive collection names and resource classes.

use convert_case::{Boundary, Case, Casing};
use serde::{Deserialize, Serialize};

/// How a repository alias is turned into a collection name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Inflection {
    /// `BlogPosts` → `blog_posts`
    #[default]
    Underscore,
    /// `BlogPosts` → `blog-posts`
    Dasherize,
    /// `blog_posts` → `BlogPosts`
    Camelize,
    /// `blog_posts` → `blogPosts`
    Variable,
    /// Leave the alias untouched
    None,
}

impl Inflection {
    pub fn apply(&self, name: &str) -> String {
        match self {
            Inflection::Underscore => name.to_case(Case::Snake),
            Inflection::Dasherize => name.to_case(Case::Kebab),
            Inflection::Camelize => name.to_case(Case::Pascal),
            Inflection::Variable => name.to_case(Case::Camel),
            Inflection::None => name.to_string(),
        }
    }
}

/// Singular form of an English plural, for the common regular cases.
pub fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();

    if lower.len() > 3 && lower.ends_with("ies") {
        return format!("{}y", &word[..word.len() - 3]);
    }
    if ["sses", "shes", "ches", "xes", "zes"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        return word[..word.len() - 2].to_string();
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && lower.len() > 1 {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Conventional resource class name for an alias: `blog_posts` → `BlogPost`.
pub fn classify(alias: &str) -> String {
    let snake = alias.to_case(Case::Snake);
    let singular = match snake.rsplit_once('_') {
        Some((head, last)) => format!("{head}_{}", singularize(last)),
        None => singularize(&snake),
    };
    singular.to_case(Case::Pascal)
}

/// Split a camelCase identifier into snake_case words.
///
/// Acronyms stay together (`findByID` → `find_by_id`) and digits stay
/// attached to the word they follow (`findByField1` → `find_by_field1`).
pub(crate) fn underscore(name: &str) -> String {
    name.remove_boundaries(&[
        Boundary::LowerDigit,
        Boundary::UpperDigit,
        Boundary::DigitLower,
    ])
    .to_case(Case::Snake)
}
