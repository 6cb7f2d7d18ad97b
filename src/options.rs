//! Selectable options and the capability that supplies them.
//!
//! An [`OptionValue`] is an atomic value/label pair used by value-based
//! filters and autocomplete-style inputs. The [`Options`] trait is the
//! abstract capability behind them: produce a filtered window of options
//! asynchronously, and resolve explicit raw values back into full options —
//! the latter is needed because a previously selected value may not be in
//! the currently filtered window.
//!
//! [`StaticOptions`] is the in-memory implementation used for small fixed
//! sets; it short-circuits both operations with synchronous filtering.

use async_trait::async_trait;

use crate::{error::FetchError, params::ParamScalar};

/// A value/label pair offered for selection.
///
/// Equality of *selections* is defined on [`value`](Self::value), not on
/// the whole pair: two options with the same value are the same logical
/// choice even if their display labels differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionValue {
    /// The underlying value, as it appears in query parameters.
    pub value: ParamScalar,
    /// The human-readable label.
    pub label: String,
}

impl OptionValue {
    /// Creates an option from a value and a label.
    pub fn new(value: impl Into<ParamScalar>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Returns `true` if this option carries the given value.
    #[must_use]
    pub fn has_value(&self, value: &ParamScalar) -> bool {
        &self.value == value
    }
}

impl From<&str> for OptionValue {
    /// A bare string becomes an option whose value and label coincide.
    fn from(value: &str) -> Self {
        Self::new(value, value)
    }
}

/// A provider of selectable options.
///
/// Implementations back value filters and autocomplete inputs. A single
/// provider instance (together with its selection) may be shared between
/// several UI bindings; see [`Selection`](crate::Selection).
#[async_trait]
pub trait Options: Send + Sync {
    /// Produces options whose label matches `filter`, up to `limit`.
    ///
    /// An empty filter matches everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing source fails; callers treat this the
    /// same as any other fetch failure.
    async fn filter_options(
        &self,
        filter: &str,
        limit: Option<usize>,
    ) -> Result<Vec<OptionValue>, FetchError>;

    /// Resolves explicit raw values into full options.
    ///
    /// Values the provider does not know are silently omitted, in line with
    /// the crate-wide policy that malformed external state degrades rather
    /// than errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing source fails.
    async fn get_options(&self, values: &[ParamScalar]) -> Result<Vec<OptionValue>, FetchError>;
}

/// An in-memory, fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct StaticOptions {
    options: Vec<OptionValue>,
}

impl StaticOptions {
    /// Creates a provider over a fixed list of options.
    #[must_use]
    pub const fn new(options: Vec<OptionValue>) -> Self {
        Self { options }
    }

    /// All options, unfiltered.
    #[must_use]
    pub fn options(&self) -> &[OptionValue] {
        &self.options
    }

    fn filter_sync(&self, filter: &str, limit: Option<usize>) -> Vec<OptionValue> {
        let needle = filter.to_lowercase();
        let matches = self
            .options
            .iter()
            .filter(|option| option.label.to_lowercase().contains(&needle))
            .cloned();
        match limit {
            Some(limit) => matches.take(limit).collect(),
            None => matches.collect(),
        }
    }
}

impl From<Vec<OptionValue>> for StaticOptions {
    fn from(options: Vec<OptionValue>) -> Self {
        Self::new(options)
    }
}

impl From<&[&str]> for StaticOptions {
    fn from(values: &[&str]) -> Self {
        Self::new(values.iter().copied().map(OptionValue::from).collect())
    }
}

#[async_trait]
impl Options for StaticOptions {
    async fn filter_options(
        &self,
        filter: &str,
        limit: Option<usize>,
    ) -> Result<Vec<OptionValue>, FetchError> {
        Ok(self.filter_sync(filter, limit))
    }

    async fn get_options(&self, values: &[ParamScalar]) -> Result<Vec<OptionValue>, FetchError> {
        Ok(values
            .iter()
            .filter_map(|value| {
                self.options
                    .iter()
                    .find(|option| option.has_value(value))
                    .cloned()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> StaticOptions {
        StaticOptions::from(["Open", "In Progress", "Closed"].as_slice())
    }

    #[tokio::test]
    async fn filter_is_case_insensitive_substring() {
        let options = provider();

        let hits = options.filter_options("pro", None).await.unwrap();
        assert_eq!(hits, vec![OptionValue::from("In Progress")]);

        let all = options.filter_options("", None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn filter_respects_limit() {
        let options = provider();
        let hits = options.filter_options("", Some(2)).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn get_options_resolves_known_and_skips_unknown_values() {
        let options = provider();
        let resolved = options
            .get_options(&["Closed".into(), "Bogus".into()])
            .await
            .unwrap();
        assert_eq!(resolved, vec![OptionValue::from("Closed")]);
    }
}
