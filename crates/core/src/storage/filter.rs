//! Query filter grammar.
//!
//! A filter is a single `{attribute, predicate}` term or an OR-group of terms.
//! AND is expressed by passing several filters. Filters run store-side after
//! index retrieval, so a scan can return fewer matches than it evaluated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{AttributeValue, Item};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// The attribute's string value is one of the listed values.
    InSet(Vec<String>),
    /// Substring of a string attribute, or member of a set attribute.
    Contains(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterTerm {
    pub attribute: String,
    pub predicate: Predicate,
}

impl FilterTerm {
    pub fn matches(&self, item: &Item) -> bool {
        let Some(value) = item.get(&self.attribute) else {
            return false;
        };
        match &self.predicate {
            Predicate::InSet(values) => value
                .as_s()
                .is_some_and(|s| values.iter().any(|v| v == s)),
            Predicate::Contains(needle) => match value {
                AttributeValue::S(s) => s.contains(needle.as_str()),
                AttributeValue::Ss(set) => set.contains(needle),
                AttributeValue::L(list) => list.iter().any(|v| v.as_s() == Some(needle.as_str())),
                _ => false,
            },
        }
    }

    fn is_unsatisfiable(&self) -> bool {
        matches!(&self.predicate, Predicate::InSet(values) if values.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    Term(FilterTerm),
    AnyOf(Vec<FilterTerm>),
}

impl Filter {
    pub fn in_set<I, S>(attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Term(FilterTerm {
            attribute: attribute.into(),
            predicate: Predicate::InSet(values.into_iter().map(Into::into).collect()),
        })
    }

    pub fn contains(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Term(FilterTerm {
            attribute: attribute.into(),
            predicate: Predicate::Contains(value.into()),
        })
    }

    /// Free-text search: upper-cases the needle and matches it against any of
    /// the given denormalized upper-case search attributes.
    pub fn search(attributes: &[&str], text: &str) -> Self {
        let needle = text.trim().to_uppercase();
        Filter::AnyOf(
            attributes
                .iter()
                .map(|attribute| FilterTerm {
                    attribute: attribute.to_string(),
                    predicate: Predicate::Contains(needle.clone()),
                })
                .collect(),
        )
    }

    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Filter::Term(term) => term.matches(item),
            Filter::AnyOf(terms) => terms.iter().any(|t| t.matches(item)),
        }
    }

    /// True when no item can ever match, e.g. membership in an empty set.
    pub fn is_unsatisfiable(&self) -> bool {
        match self {
            Filter::Term(term) => term.is_unsatisfiable(),
            Filter::AnyOf(terms) => terms.iter().all(FilterTerm::is_unsatisfiable),
        }
    }
}

/// True when the item satisfies every filter.
pub fn matches_all(filters: &[Filter], item: &Item) -> bool {
    filters.iter().all(|f| f.matches(item))
}

/// A store-side filter expression with its placeholder bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpression {
    pub expression: String,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, AttributeValue>,
}

/// Renders filters as a condition expression.
///
/// Placeholders are `#fN` for attribute names and `:fN_M` for values, so they
/// never collide with the `#pk`/`:pk` style key-condition placeholders.
/// Returns `None` when there is nothing to filter.
pub fn build_filter_expression(filters: &[Filter]) -> Option<FilterExpression> {
    if filters.is_empty() {
        return None;
    }

    let mut out = FilterExpression::default();
    let mut counter = 0usize;
    let mut clauses = Vec::with_capacity(filters.len());

    for filter in filters {
        let clause = match filter {
            Filter::Term(term) => render_term(term, &mut counter, &mut out),
            Filter::AnyOf(terms) => {
                let parts: Vec<String> = terms
                    .iter()
                    .filter(|t| !t.is_unsatisfiable())
                    .map(|t| render_term(t, &mut counter, &mut out))
                    .collect();
                match parts.len() {
                    0 => continue,
                    1 => parts.into_iter().next().unwrap_or_default(),
                    _ => format!("({})", parts.join(" OR ")),
                }
            }
        };
        clauses.push(clause);
    }

    if clauses.is_empty() {
        return None;
    }
    out.expression = clauses.join(" AND ");
    Some(out)
}

fn render_term(term: &FilterTerm, counter: &mut usize, out: &mut FilterExpression) -> String {
    let n = *counter;
    *counter += 1;

    let name = format!("#f{n}");
    out.names.insert(name.clone(), term.attribute.clone());

    match &term.predicate {
        Predicate::InSet(values) => {
            let placeholders: Vec<String> = values
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    let placeholder = format!(":f{n}_{i}");
                    out.values
                        .insert(placeholder.clone(), AttributeValue::string(value));
                    placeholder
                })
                .collect();
            format!("{name} IN ({})", placeholders.join(", "))
        }
        Predicate::Contains(value) => {
            let placeholder = format!(":f{n}_0");
            out.values
                .insert(placeholder.clone(), AttributeValue::string(value));
            format!("contains({name}, {placeholder})")
        }
    }
}
