//! Request parameter sets.
//!
//! A [`ParameterSet`] carries both the request fields (`status`, `track`, ...)
//! and the `oauth_*` fields of one call. Builder methods consume the set and
//! return a new one, so a stage never mutates a set another stage still holds.

use std::collections::BTreeMap;

/// Prefix shared by every OAuth protocol parameter.
pub const OAUTH_PREFIX: &str = "oauth_";

/// Mapping from parameter name to value with unique keys.
///
/// Iteration order is by key, but nothing relies on it: signing and header
/// rendering always re-sort by the encoded `key=value` string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    entries: BTreeMap<String, String>,
}

impl ParameterSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a set with `key` bound to `value`, replacing any previous value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Return a set extended with every pair of `pairs`.
    pub fn with_all<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .fold(self, |set, (key, value)| set.with(key, value))
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The `oauth_*` pairs, which travel in the Authorization header.
    pub fn oauth_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| is_oauth_key(k))
    }

    /// The non-oauth pairs, which travel in the form body.
    pub fn body_fields(&self) -> Vec<(&str, &str)> {
        self.iter().filter(|(k, _)| !is_oauth_key(k)).collect()
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new().with_all(iter)
    }
}

/// Whether a parameter name belongs to the OAuth protocol.
pub fn is_oauth_key(key: &str) -> bool {
    key.starts_with(OAUTH_PREFIX)
}
