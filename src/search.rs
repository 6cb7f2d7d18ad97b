//! Free-text search over the whole frame.

use tokio::sync::watch;

use crate::params::QueryParams;

/// Query-parameter key for the search pattern.
pub const SEARCH_KEY: &str = "search";

/// A single free-text search pattern, global to a frame.
///
/// Like every control in this crate, `Search` is a cheap handle over shared
/// watch state: clones observe and mutate the same pattern, which is how a
/// search box can be shared between frames.
#[derive(Debug, Clone)]
pub struct Search {
    state: watch::Sender<String>,
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}

impl Search {
    /// Creates an inactive (empty-pattern) search.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(String::new());
        Self { state }
    }

    /// Restores a search from a query-parameter snapshot.
    ///
    /// A missing or non-string `search` value yields an inactive search.
    #[must_use]
    pub fn from_query_params(params: &QueryParams) -> Self {
        let search = Self::new();
        if let Some(pattern) = params.str_value(SEARCH_KEY) {
            search.set_pattern(pattern);
        }
        search
    }

    /// The current search pattern. Empty means inactive.
    #[must_use]
    pub fn pattern(&self) -> String {
        self.state.borrow().clone()
    }

    /// Sets the search pattern.
    pub fn set_pattern(&self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        self.state.send_if_modified(|current| {
            if *current == pattern {
                false
            } else {
                *current = pattern;
                true
            }
        });
    }

    /// Clears the pattern, deactivating the search.
    pub fn clear(&self) {
        self.set_pattern(String::new());
    }

    /// Projects the search into query parameters.
    ///
    /// The `search` key is present exactly when a pattern is set.
    #[must_use]
    pub fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        let pattern = self.state.borrow();
        if !pattern.is_empty() {
            params.insert(SEARCH_KEY, pattern.as_str());
        }
        params
    }

    /// Subscribes to pattern changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_pattern_from_params_and_clears() {
        let params: QueryParams = [(SEARCH_KEY, "acme")].into_iter().collect();
        let search = Search::from_query_params(&params);

        assert_eq!(search.pattern(), "acme");
        assert_eq!(search.query_params(), params);

        search.clear();
        assert_eq!(search.query_params(), QueryParams::new());
    }

    #[test]
    fn empty_pattern_emits_no_params() {
        let search = Search::new();
        assert!(search.query_params().is_empty());
    }

    #[test]
    fn clones_share_the_pattern() {
        let search = Search::new();
        let shared = search.clone();
        shared.set_pattern("audit");
        assert_eq!(search.pattern(), "audit");
    }
}
