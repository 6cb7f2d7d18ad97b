//! The flat query-parameter map that externalizes table state.
//!
//! [`QueryParams`] is the *only* channel through which the engine's full
//! state (search text, sort, page, filters, hidden columns) is exported and
//! re-hydrated. It deliberately mirrors a URL query string: string keys
//! mapping to scalars or lists of scalars, nothing nested.
//!
//! Parsing is tolerant by contract: a missing, ill-typed, or otherwise
//! malformed value reads back as `None` and the consumer falls back to its
//! default state. Bad external state is never an error.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A single scalar value in a query-parameter map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamScalar {
    /// A boolean flag, e.g. a filter-negation marker.
    Bool(bool),
    /// An integer, e.g. a page number or a numeric filter value.
    Num(i64),
    /// A string. This is the common case for state restored from a URL,
    /// where *everything* arrives as text.
    Str(String),
}

impl ParamScalar {
    /// Coerces this scalar to an integer.
    ///
    /// Strings are parsed, so state restored from a URL (`page=2`) behaves
    /// the same as state set programmatically.
    #[must_use]
    pub fn as_num(&self) -> Option<i64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.parse().ok(),
            Self::Bool(_) => None,
        }
    }

    /// Coerces this scalar to a boolean.
    ///
    /// Only the literal strings `"true"` and `"false"` parse; anything else
    /// is treated as malformed.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Str(s) => s.parse().ok(),
            Self::Num(_) => None,
        }
    }
}

impl fmt::Display for ParamScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => b.fmt(f),
            Self::Num(n) => n.fmt(f),
            Self::Str(s) => s.fmt(f),
        }
    }
}

impl From<&str> for ParamScalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamScalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ParamScalar {
    fn from(value: i64) -> Self {
        Self::Num(value)
    }
}

impl From<bool> for ParamScalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A query-parameter value: a single scalar or a list of scalars.
///
/// Lists appear for multi-value filters and for `_hidden_columns`. A bare
/// scalar where a list is expected reads as a one-element list, matching
/// how URL layers collapse single-element arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A single scalar value.
    Scalar(ParamScalar),
    /// An ordered list of scalar values.
    List(Vec<ParamScalar>),
}

impl From<ParamScalar> for ParamValue {
    fn from(value: ParamScalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<Vec<ParamScalar>> for ParamValue {
    fn from(value: Vec<ParamScalar>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value.into_iter().map(ParamScalar::Str).collect())
    }
}

/// A flat, string-keyed map of scalar (or scalar-list) values.
///
/// Keyed on a `BTreeMap` so that equality, iteration order, and serialized
/// form are deterministic — two maps built from the same state always
/// compare equal, which the engine relies on to suppress redundant
/// downstream emissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns `true` if no parameters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of parameters set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sets a parameter, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Removes a parameter, returning its previous value if it was set.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    /// Returns the raw value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Returns `true` if the key is present.
    ///
    /// Key *presence* is load-bearing throughout the engine: an absent key
    /// means "inactive", and downstream consumers treat "key appeared or
    /// changed" as the signal to react (e.g. resetting pagination).
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Merges `other` into `self`; on key collision, `other` wins.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Returns a new map that is `self` overlaid with `other`.
    #[must_use]
    pub fn merged(mut self, other: &Self) -> Self {
        self.merge(other);
        self
    }

    /// Reads a string-typed parameter.
    ///
    /// Returns `None` if the key is absent or holds a non-string value.
    #[must_use]
    pub fn str_value(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            ParamValue::Scalar(ParamScalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Reads an integer-typed parameter, coercing numeric strings.
    ///
    /// Returns `None` if the key is absent or the value is malformed.
    #[must_use]
    pub fn num_value(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            ParamValue::Scalar(scalar) => scalar.as_num(),
            ParamValue::List(_) => None,
        }
    }

    /// Reads a boolean-typed parameter, coercing `"true"`/`"false"`.
    ///
    /// Returns `None` if the key is absent or the value is malformed.
    #[must_use]
    pub fn bool_value(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            ParamValue::Scalar(scalar) => scalar.as_bool(),
            ParamValue::List(_) => None,
        }
    }

    /// Reads a list-typed parameter.
    ///
    /// A bare scalar reads as a one-element list. An absent key reads as an
    /// empty list.
    #[must_use]
    pub fn list_value(&self, key: &str) -> Vec<ParamScalar> {
        match self.0.get(key) {
            Some(ParamValue::List(values)) => values.clone(),
            Some(ParamValue::Scalar(scalar)) => vec![scalar.clone()],
            None => Vec::new(),
        }
    }

    /// Iterates over all `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_keys_read_as_none() {
        let params = QueryParams::new();
        assert_eq!(params.str_value("search"), None);
        assert_eq!(params.num_value("page"), None);
        assert_eq!(params.bool_value("neg_status"), None);
        assert!(params.list_value("status").is_empty());
    }

    #[test]
    fn numeric_strings_coerce_to_numbers() {
        let params: QueryParams = [("page", "2")].into_iter().collect();
        assert_eq!(params.num_value("page"), Some(2));
    }

    #[test]
    fn malformed_values_read_as_none() {
        let params: QueryParams = [("page", "two"), ("neg_x", "yes")].into_iter().collect();
        assert_eq!(params.num_value("page"), None);
        assert_eq!(params.bool_value("neg_x"), None);
    }

    #[test]
    fn bare_scalar_reads_as_single_element_list() {
        let params: QueryParams = [("_hidden_columns", "notes")].into_iter().collect();
        assert_eq!(
            params.list_value("_hidden_columns"),
            vec![ParamScalar::Str("notes".to_string())]
        );
    }

    #[test]
    fn merge_later_wins() {
        let mut base: QueryParams = [("a", 1i64), ("b", 2)].into_iter().collect();
        let overlay: QueryParams = [("b", 3i64), ("c", 4)].into_iter().collect();
        base.merge(&overlay);

        assert_eq!(base.num_value("a"), Some(1));
        assert_eq!(base.num_value("b"), Some(3));
        assert_eq!(base.num_value("c"), Some(4));
    }

    #[test]
    fn serde_round_trip_preserves_equality() {
        let mut params = QueryParams::new();
        params.insert("search", "acme");
        params.insert("page", 2i64);
        params.insert("neg_status", true);
        params.insert(
            "status",
            vec!["open".to_string(), "in progress".to_string()],
        );

        let json = serde_json::to_string(&params).unwrap();
        let restored: QueryParams = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, params);
    }

    #[test]
    fn deterministic_order_gives_equality() {
        let forward: QueryParams = [("a", 1i64), ("b", 2)].into_iter().collect();
        let backward: QueryParams = [("b", 2i64), ("a", 1)].into_iter().collect();
        assert_eq!(forward, backward);
    }
}
