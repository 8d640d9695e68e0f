//! Metadata filter types for retrieval queries.
//!
//! Filters are built by callers and routed to the retrieval collaborator
//! unchanged. Backends that hold chunks locally can evaluate them with
//! [`Filter::matches`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Filter operator for metadata queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to.
    Eq(serde_json::Value),
    /// Not equal to.
    Ne(serde_json::Value),
    /// Greater than.
    Gt(serde_json::Value),
    /// Greater than or equal to.
    Gte(serde_json::Value),
    /// Less than.
    Lt(serde_json::Value),
    /// Less than or equal to.
    Lte(serde_json::Value),
    /// In list.
    In(Vec<serde_json::Value>),
    /// Contains substring.
    Contains(String),
}

/// A single filter condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Field name to filter on.
    pub field: String,
    /// Operator to apply.
    pub operator: FilterOperator,
}

impl FilterCondition {
    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::Eq(value.into()),
        }
    }

    /// Create an inequality filter.
    pub fn ne(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::Ne(value.into()),
        }
    }

    /// Create a greater than filter.
    pub fn gt(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::Gt(value.into()),
        }
    }

    /// Create a greater than or equal filter.
    pub fn gte(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::Gte(value.into()),
        }
    }

    /// Create a less than filter.
    pub fn lt(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::Lt(value.into()),
        }
    }

    /// Create a less than or equal filter.
    pub fn lte(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::Lte(value.into()),
        }
    }

    /// Create an in-list filter.
    pub fn in_list(field: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::In(values),
        }
    }

    /// Create a contains filter.
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::Contains(value.into()),
        }
    }

    fn matches(&self, metadata: &HashMap<String, serde_json::Value>) -> bool {
        let value = metadata.get(&self.field);

        match &self.operator {
            FilterOperator::Eq(expected) => value == Some(expected),
            FilterOperator::Ne(expected) => value != Some(expected),
            FilterOperator::Gt(bound) => compare(value, bound).is_some_and(|o| o.is_gt()),
            FilterOperator::Gte(bound) => compare(value, bound).is_some_and(|o| o.is_ge()),
            FilterOperator::Lt(bound) => compare(value, bound).is_some_and(|o| o.is_lt()),
            FilterOperator::Lte(bound) => compare(value, bound).is_some_and(|o| o.is_le()),
            FilterOperator::In(list) => value.is_some_and(|v| list.contains(v)),
            FilterOperator::Contains(needle) => value
                .and_then(|v| v.as_str())
                .is_some_and(|s| s.contains(needle.as_str())),
        }
    }
}

/// Numbers compare as f64, strings lexicographically; other shapes never match.
fn compare(value: Option<&serde_json::Value>, bound: &serde_json::Value) -> Option<std::cmp::Ordering> {
    let value = value?;
    if let (Some(a), Some(b)) = (value.as_f64(), bound.as_f64()) {
        return a.partial_cmp(&b);
    }
    if let (Some(a), Some(b)) = (value.as_str(), bound.as_str()) {
        return Some(a.cmp(b));
    }
    None
}

/// Composite filter with AND/OR/NOT logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Filter {
    /// Single condition.
    Condition(FilterCondition),
    /// AND of multiple filters.
    And(Vec<Filter>),
    /// OR of multiple filters.
    Or(Vec<Filter>),
    /// NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Filter::Condition(FilterCondition::eq(field, value))
    }

    /// Create an inequality filter.
    pub fn ne(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Filter::Condition(FilterCondition::ne(field, value))
    }

    /// Create a greater than filter.
    pub fn gt(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Filter::Condition(FilterCondition::gt(field, value))
    }

    /// Create a greater than or equal filter.
    pub fn gte(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Filter::Condition(FilterCondition::gte(field, value))
    }

    /// Create a less than filter.
    pub fn lt(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Filter::Condition(FilterCondition::lt(field, value))
    }

    /// Create a less than or equal filter.
    pub fn lte(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Filter::Condition(FilterCondition::lte(field, value))
    }

    /// Create an in-list filter.
    pub fn in_list(field: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        Filter::Condition(FilterCondition::in_list(field, values))
    }

    /// Create a contains filter.
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Condition(FilterCondition::contains(field, value))
    }

    /// Create an AND filter.
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    /// Create an OR filter.
    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    /// Create a NOT filter.
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Evaluate this filter against a chunk's metadata.
    pub fn matches(&self, metadata: &HashMap<String, serde_json::Value>) -> bool {
        match self {
            Filter::Condition(condition) => condition.matches(metadata),
            Filter::And(filters) => filters.iter().all(|f| f.matches(metadata)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(metadata)),
            Filter::Not(filter) => !filter.matches(metadata),
        }
    }
}

/// Convert a simple key-value map to an equality filter.
pub fn from_simple_filters(filters: &HashMap<String, serde_json::Value>) -> Filter {
    let mut conditions: Vec<(String, serde_json::Value)> = filters
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    conditions.sort_by(|a, b| a.0.cmp(&b.0));

    let mut conditions: Vec<Filter> = conditions
        .into_iter()
        .map(|(k, v)| Filter::eq(k, v))
        .collect();

    if conditions.len() == 1 {
        conditions.remove(0)
    } else {
        Filter::And(conditions)
    }
}
