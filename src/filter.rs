//! Per-column filter primitives and their bundle.
//!
//! Three independent filter kinds exist, each with its own query-parameter
//! encoding and "is set" status:
//!
//! - [`FilterByPattern`] — a text pattern, optionally negated;
//! - [`FilterByValues`] — a set of selected [`OptionValue`]s drawn from an
//!   injected [`Options`] provider, optionally negated;
//! - [`FilterForExistence`] — a tri-state non-null test.
//!
//! [`Filters`] combines at most one of each kind under a column's name.
//! Every kind follows the crate-wide parameter contract: keys are absent
//! when the filter is inactive, and malformed snapshot values degrade to
//! the inactive state.

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    options::{OptionValue, Options},
    params::{ParamScalar, ParamValue, QueryParams},
    reactive::changes_of,
    selection::{Selection, SelectionMode},
};

/// Prefix of the companion key negating a pattern or values filter.
pub const NEGATE_PREFIX: &str = "neg_";

fn negate_key(name: &str) -> String {
    format!("{NEGATE_PREFIX}{name}")
}

/// The state of a [`FilterByPattern`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternState {
    /// The filter pattern. Empty means inactive.
    pub pattern: String,
    /// Whether the pattern is negated.
    pub negated: bool,
}

/// A string-pattern filter for one column.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct FilterByPattern {
    name: String,
    state: watch::Sender<PatternState>,
}

impl FilterByPattern {
    /// Creates an inactive pattern filter with the given parameter name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let (state, _) = watch::channel(PatternState::default());
        Self {
            name: name.into(),
            state,
        }
    }

    /// The query-parameter name of this filter.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current pattern. Empty means inactive.
    #[must_use]
    pub fn pattern(&self) -> String {
        self.state.borrow().pattern.clone()
    }

    /// Returns `true` if the filter is negated.
    #[must_use]
    pub fn negated(&self) -> bool {
        self.state.borrow().negated
    }

    /// Sets the pattern.
    pub fn set_pattern(&self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        self.update(|state| state.pattern = pattern);
    }

    /// Sets or clears negation.
    pub fn set_negated(&self, negated: bool) {
        self.update(|state| state.negated = negated);
    }

    /// Clears pattern and negation, deactivating the filter.
    pub fn clear(&self) {
        self.update(|state| *state = PatternState::default());
    }

    /// Returns `true` if a pattern is set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.state.borrow().pattern.is_empty()
    }

    /// Restores the filter state from a query-parameter snapshot.
    pub fn apply_query_params(&self, params: &QueryParams) {
        let pattern = params.str_value(&self.name).unwrap_or_default().to_string();
        let negated = params.bool_value(&negate_key(&self.name)).unwrap_or(false);
        self.update(move |state| {
            state.pattern = pattern;
            state.negated = negated;
        });
    }

    /// Projects the filter into query parameters.
    ///
    /// Inactive filters contribute nothing; the negation key is present
    /// only when the filter is both set and negated.
    #[must_use]
    pub fn query_params(&self) -> QueryParams {
        let state = self.state.borrow();
        let mut params = QueryParams::new();
        if !state.pattern.is_empty() {
            params.insert(self.name.clone(), state.pattern.as_str());
            if state.negated {
                params.insert(negate_key(&self.name), true);
            }
        }
        params
    }

    /// Subscribes to filter changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PatternState> {
        self.state.subscribe()
    }

    fn update(&self, f: impl FnOnce(&mut PatternState)) {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
    }
}

/// A multi-value selection filter for one column.
///
/// Selected values come from an injected [`Options`] provider. The
/// underlying [`Selection`] may be shared with other UI bindings of the
/// same logical field; all of them observe one selection state.
///
/// Clones share state.
#[derive(Clone)]
pub struct FilterByValues {
    name: String,
    options: Arc<dyn Options>,
    selection: Selection,
    negated: watch::Sender<bool>,
}

impl std::fmt::Debug for FilterByValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterByValues")
            .field("name", &self.name)
            .field("selection", &self.selection)
            .field("negated", &*self.negated.borrow())
            .finish_non_exhaustive()
    }
}

impl FilterByValues {
    /// Creates an inactive values filter with its own selection.
    #[must_use]
    pub fn new(name: impl Into<String>, options: Arc<dyn Options>, mode: SelectionMode) -> Self {
        Self::with_selection(name, options, Selection::new(mode))
    }

    /// Creates a values filter over an existing, possibly shared selection.
    #[must_use]
    pub fn with_selection(
        name: impl Into<String>,
        options: Arc<dyn Options>,
        selection: Selection,
    ) -> Self {
        let (negated, _) = watch::channel(false);
        Self {
            name: name.into(),
            options,
            selection,
            negated,
        }
    }

    /// The query-parameter name of this filter.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared selection behind this filter.
    #[must_use]
    pub const fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The options provider behind this filter.
    #[must_use]
    pub fn options(&self) -> Arc<dyn Options> {
        Arc::clone(&self.options)
    }

    /// Selects an option. See [`Selection::select_option`].
    pub fn select_option(&self, option: OptionValue) {
        self.selection.select_option(option);
    }

    /// Returns `true` if the filter is negated.
    #[must_use]
    pub fn negated(&self) -> bool {
        *self.negated.borrow()
    }

    /// Sets or clears negation.
    pub fn set_negated(&self, negated: bool) {
        self.negated.send_if_modified(|current| {
            if *current == negated {
                false
            } else {
                *current = negated;
                true
            }
        });
    }

    /// Clears selection and negation, deactivating the filter.
    pub fn clear(&self) {
        self.selection.clear();
        self.set_negated(false);
    }

    /// Returns `true` if any option is selected.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Restores the filter state from a query-parameter snapshot.
    ///
    /// Raw values are resolved into full options through the provider
    /// asynchronously. If the selection changes through another binding
    /// before the resolution completes, the stale resolution is discarded
    /// (last writer wins).
    ///
    /// Must be called within a Tokio runtime when the snapshot contains
    /// values for this filter.
    pub fn apply_query_params(&self, params: &QueryParams) {
        self.set_negated(params.bool_value(&negate_key(&self.name)).unwrap_or(false));
        let raw = params.list_value(&self.name);
        if raw.is_empty() {
            self.selection.clear();
        } else {
            // The version must be read before the task is handed to the
            // runtime: a selection change between this call and the task's
            // first poll already supersedes the resolution.
            let version = self.selection.version();
            let filter = self.clone();
            tokio::spawn(async move { filter.resolve_at(version, raw).await });
        }
    }

    /// Resolves raw scalar values into options and applies them.
    ///
    /// Applies nothing if the selection was mutated while the resolution
    /// was in flight, or if the provider fails.
    pub async fn resolve(&self, raw: Vec<ParamScalar>) {
        self.resolve_at(self.selection.version(), raw).await;
    }

    async fn resolve_at(&self, version: u64, raw: Vec<ParamScalar>) {
        match self.options.get_options(&raw).await {
            Ok(options) => {
                if self.selection.version() == version {
                    self.selection.set_selected(options);
                } else {
                    debug!(filter = %self.name, "discarding stale option resolution");
                }
            }
            Err(error) => {
                warn!(filter = %self.name, %error, "failed to resolve filter values");
            }
        }
    }

    /// Projects the filter into query parameters.
    #[must_use]
    pub fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        let selected = self.selection.selected();
        if !selected.is_empty() {
            let values: Vec<ParamScalar> =
                selected.into_iter().map(|option| option.value).collect();
            params.insert(self.name.clone(), ParamValue::List(values));
            if self.negated() {
                params.insert(negate_key(&self.name), true);
            }
        }
        params
    }

    pub(crate) fn change_streams(&self) -> Vec<BoxStream<'static, ()>> {
        vec![
            changes_of(self.selection.subscribe()),
            changes_of(self.negated.subscribe()),
        ]
    }
}

/// A tri-state existence filter for one column.
///
/// `Some(true)` keeps rows where the field is present, `Some(false)` rows
/// where it is absent, and `None` deactivates the filter.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct FilterForExistence {
    name: String,
    state: watch::Sender<Option<bool>>,
}

impl FilterForExistence {
    /// Creates an inactive existence filter with the given parameter name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            name: name.into(),
            state,
        }
    }

    /// The query-parameter name of this filter.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current tri-state value.
    #[must_use]
    pub fn value(&self) -> Option<bool> {
        *self.state.borrow()
    }

    /// Sets the tri-state value; `None` deactivates the filter.
    pub fn set_value(&self, value: Option<bool>) {
        self.state.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Deactivates the filter.
    pub fn clear(&self) {
        self.set_value(None);
    }

    /// Returns `true` if the filter is active.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Restores the filter state from a query-parameter snapshot.
    pub fn apply_query_params(&self, params: &QueryParams) {
        self.set_value(params.bool_value(&self.name));
    }

    /// Projects the filter into query parameters.
    #[must_use]
    pub fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        if let Some(value) = *self.state.borrow() {
            params.insert(self.name.clone(), value);
        }
        params
    }

    /// Subscribes to filter changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<bool>> {
        self.state.subscribe()
    }
}

/// The filters attached to one column: at most one of each kind.
///
/// Clones share state with their source.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pattern: Option<FilterByPattern>,
    values: Option<FilterByValues>,
    existence: Option<FilterForExistence>,
}

impl Filters {
    /// Creates an empty bundle with no filters.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            pattern: None,
            values: None,
            existence: None,
        }
    }

    /// Adds a pattern filter under the given parameter name.
    #[must_use]
    pub fn with_pattern(mut self, name: impl Into<String>) -> Self {
        self.pattern = Some(FilterByPattern::new(name));
        self
    }

    /// Adds a values filter under the given parameter name.
    #[must_use]
    pub fn with_values(
        mut self,
        name: impl Into<String>,
        options: Arc<dyn Options>,
        mode: SelectionMode,
    ) -> Self {
        self.values = Some(FilterByValues::new(name, options, mode));
        self
    }

    /// Adds a values filter over an existing, possibly shared selection.
    #[must_use]
    pub fn with_values_selection(
        mut self,
        name: impl Into<String>,
        options: Arc<dyn Options>,
        selection: Selection,
    ) -> Self {
        self.values = Some(FilterByValues::with_selection(name, options, selection));
        self
    }

    /// Adds an existence filter under the given parameter name.
    #[must_use]
    pub fn with_existence(mut self, name: impl Into<String>) -> Self {
        self.existence = Some(FilterForExistence::new(name));
        self
    }

    /// The pattern filter, if present.
    #[must_use]
    pub const fn pattern(&self) -> Option<&FilterByPattern> {
        self.pattern.as_ref()
    }

    /// The values filter, if present.
    #[must_use]
    pub const fn values(&self) -> Option<&FilterByValues> {
        self.values.as_ref()
    }

    /// The existence filter, if present.
    #[must_use]
    pub const fn existence(&self) -> Option<&FilterForExistence> {
        self.existence.as_ref()
    }

    /// Returns `true` if any member filter is set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.pattern.as_ref().is_some_and(FilterByPattern::is_set)
            || self.values.as_ref().is_some_and(FilterByValues::is_set)
            || self
                .existence
                .as_ref()
                .is_some_and(FilterForExistence::is_set)
    }

    /// Clears every member filter.
    pub fn clear(&self) {
        if let Some(pattern) = &self.pattern {
            pattern.clear();
        }
        if let Some(values) = &self.values {
            values.clear();
        }
        if let Some(existence) = &self.existence {
            existence.clear();
        }
    }

    /// Restores every member filter from a query-parameter snapshot.
    pub fn apply_query_params(&self, params: &QueryParams) {
        if let Some(pattern) = &self.pattern {
            pattern.apply_query_params(params);
        }
        if let Some(values) = &self.values {
            values.apply_query_params(params);
        }
        if let Some(existence) = &self.existence {
            existence.apply_query_params(params);
        }
    }

    /// Merges the member filters' query parameters.
    #[must_use]
    pub fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        if let Some(pattern) = &self.pattern {
            params.merge(&pattern.query_params());
        }
        if let Some(values) = &self.values {
            params.merge(&values.query_params());
        }
        if let Some(existence) = &self.existence {
            params.merge(&existence.query_params());
        }
        params
    }

    pub(crate) fn change_streams(&self) -> Vec<BoxStream<'static, ()>> {
        let mut streams = Vec::new();
        if let Some(pattern) = &self.pattern {
            streams.push(changes_of(pattern.subscribe()));
        }
        if let Some(values) = &self.values {
            streams.extend(values.change_streams());
        }
        if let Some(existence) = &self.existence {
            streams.push(changes_of(existence.subscribe()));
        }
        streams
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::{error::FetchError, options::StaticOptions};

    fn status_options() -> Arc<StaticOptions> {
        Arc::new(StaticOptions::from(["a", "b", "c"].as_slice()))
    }

    #[test]
    fn pattern_filter_inactive_when_empty() {
        let filter = FilterByPattern::new("title");
        assert!(!filter.is_set());
        assert!(filter.query_params().is_empty());

        // Negation without a pattern contributes nothing.
        filter.set_negated(true);
        assert!(filter.query_params().is_empty());
    }

    #[test]
    fn pattern_filter_emits_value_and_negation() {
        let filter = FilterByPattern::new("title");
        filter.set_pattern("acme");
        filter.set_negated(true);

        let expected: QueryParams = [
            ("title", ParamValue::from("acme")),
            ("neg_title", ParamValue::from(true)),
        ]
        .into_iter()
        .collect();
        assert_eq!(filter.query_params(), expected);

        filter.clear();
        assert!(filter.query_params().is_empty());
    }

    #[test]
    fn pattern_filter_round_trips_through_params() {
        let filter = FilterByPattern::new("title");
        filter.set_pattern("acme");
        filter.set_negated(true);

        let restored = FilterByPattern::new("title");
        restored.apply_query_params(&filter.query_params());
        assert_eq!(restored.pattern(), "acme");
        assert!(restored.negated());
    }

    #[tokio::test]
    async fn values_filter_emits_selected_values() {
        let filter = FilterByValues::new("status", status_options(), SelectionMode::Multiple);
        filter.select_option(OptionValue::from("a"));
        filter.select_option(OptionValue::from("b"));
        filter.select_option(OptionValue::from("c"));

        assert!(filter.is_set());
        let expected: QueryParams = [(
            "status",
            ParamValue::List(vec!["a".into(), "b".into(), "c".into()]),
        )]
        .into_iter()
        .collect();
        assert_eq!(filter.query_params(), expected);
    }

    #[tokio::test]
    async fn values_filter_hydrates_from_params() {
        let filter = FilterByValues::new("status", status_options(), SelectionMode::Multiple);
        let params: QueryParams = [(
            "status",
            ParamValue::List(vec!["a".into(), "b".into()]),
        )]
        .into_iter()
        .collect();

        filter.resolve(params.list_value("status")).await;
        assert_eq!(
            filter.selection().selected(),
            vec![OptionValue::from("a"), OptionValue::from("b")]
        );
        assert_eq!(filter.query_params(), params);
    }

    /// An options provider whose resolution takes simulated time.
    struct SlowOptions(StaticOptions);

    #[async_trait]
    impl Options for SlowOptions {
        async fn filter_options(
            &self,
            filter: &str,
            limit: Option<usize>,
        ) -> Result<Vec<OptionValue>, FetchError> {
            self.0.filter_options(filter, limit).await
        }

        async fn get_options(
            &self,
            values: &[ParamScalar],
        ) -> Result<Vec<OptionValue>, FetchError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.get_options(values).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stale_resolution_is_discarded() {
        let slow = Arc::new(SlowOptions(StaticOptions::from(["a", "b", "c"].as_slice())));
        let filter = FilterByValues::new("status", slow, SelectionMode::Multiple);

        let params: QueryParams = [(
            "status",
            ParamValue::List(vec!["a".into(), "b".into()]),
        )]
        .into_iter()
        .collect();
        filter.apply_query_params(&params);

        // The user selects through another binding before the resolution
        // lands; the resolution must lose.
        filter.select_option(OptionValue::from("c"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(filter.selection().selected(), vec![OptionValue::from("c")]);
    }

    #[tokio::test(start_paused = true)]
    async fn selection_change_before_resolution_starts_wins() {
        // Even a provider that answers instantly resolves on a task that
        // first polls after the caller yields; a selection made in that
        // window must not be clobbered.
        let filter = FilterByValues::new("status", status_options(), SelectionMode::Multiple);

        let params: QueryParams = [(
            "status",
            ParamValue::List(vec!["a".into(), "b".into()]),
        )]
        .into_iter()
        .collect();
        filter.apply_query_params(&params);
        filter.select_option(OptionValue::from("c"));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(filter.selection().selected(), vec![OptionValue::from("c")]);
    }

    #[tokio::test(start_paused = true)]
    async fn unchallenged_resolution_is_applied() {
        let slow = Arc::new(SlowOptions(StaticOptions::from(["a", "b", "c"].as_slice())));
        let filter = FilterByValues::new("status", slow, SelectionMode::Multiple);

        let params: QueryParams =
            [("status", ParamValue::List(vec!["b".into()]))].into_iter().collect();
        filter.apply_query_params(&params);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(filter.selection().selected(), vec![OptionValue::from("b")]);
    }

    #[test]
    fn existence_filter_is_tri_state() {
        let filter = FilterForExistence::new("has_comments");
        assert!(!filter.is_set());
        assert!(filter.query_params().is_empty());

        filter.set_value(Some(false));
        let expected: QueryParams = [("has_comments", false)].into_iter().collect();
        assert_eq!(filter.query_params(), expected);

        filter.clear();
        assert!(filter.query_params().is_empty());
    }

    #[tokio::test]
    async fn bundle_aggregates_membership_and_params() {
        let filters = Filters::none()
            .with_pattern("title")
            .with_values("status", status_options(), SelectionMode::Multiple)
            .with_existence("has_comments");

        assert!(!filters.is_set());

        filters.pattern().unwrap().set_pattern("acme");
        filters.existence().unwrap().set_value(Some(true));
        assert!(filters.is_set());

        let params = filters.query_params();
        assert_eq!(params.str_value("title"), Some("acme"));
        assert_eq!(params.bool_value("has_comments"), Some(true));

        filters.clear();
        assert!(!filters.is_set());
        assert!(filters.query_params().is_empty());
    }
}
