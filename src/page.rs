//! Pagination state with bounds-checked navigation.

use tokio::sync::watch;

use crate::params::QueryParams;

/// Query-parameter key for the 1-based page number.
pub const PAGE_KEY: &str = "page";

/// Query-parameter key for the page size.
pub const PAGE_SIZE_KEY: &str = "page_size";

/// The fixed set of allowed page sizes.
///
/// A `page_size` query parameter outside this set is malformed and falls
/// back to the default page state.
pub const PAGE_SIZE_OPTIONS: [usize; 4] = [10, 25, 50, 100];

/// A pagination snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    /// The 0-based page index.
    pub page_index: usize,
    /// The number of rows per page; one of [`PAGE_SIZE_OPTIONS`].
    pub page_size: usize,
    /// The total number of rows on the server, when known.
    ///
    /// `None` until the first load reports a count; navigation towards the
    /// end is unrestricted while the length is unknown.
    pub length: Option<usize>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: PAGE_SIZE_OPTIONS[0],
            length: None,
        }
    }
}

impl PageState {
    /// Returns `true` if a page precedes the current one.
    #[must_use]
    pub const fn has_previous_page(&self) -> bool {
        self.page_index > 0
    }

    /// Returns `true` if a page follows the current one.
    ///
    /// Always `true` while the total length is unknown.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        self.length
            .is_none_or(|length| (self.page_index + 1) * self.page_size < length)
    }
}

/// Observable pagination for a frame.
///
/// Clones share state. Pagination can be globally disabled at
/// construction, in which case no `page`/`page_size` parameters are ever
/// emitted and the frame renders all rows the server returns.
#[derive(Debug, Clone)]
pub struct Paginator {
    state: watch::Sender<PageState>,
    enabled: bool,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new()
    }
}

impl Paginator {
    /// Creates an enabled paginator on the first page with the default size.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(PageState::default());
        Self {
            state,
            enabled: true,
        }
    }

    /// Creates a disabled paginator.
    #[must_use]
    pub fn disabled() -> Self {
        let mut paginator = Self::new();
        paginator.enabled = false;
        paginator
    }

    /// Restores pagination from a query-parameter snapshot.
    ///
    /// Requires `page` to be a positive integer and `page_size` to be one
    /// of [`PAGE_SIZE_OPTIONS`]; any other combination falls back to the
    /// default page state.
    #[must_use]
    pub fn from_query_params(params: &QueryParams) -> Self {
        let paginator = Self::new();
        let page = params.num_value(PAGE_KEY);
        let page_size = params.num_value(PAGE_SIZE_KEY);
        if let (Some(page), Some(page_size)) = (page, page_size) {
            let page = usize::try_from(page).unwrap_or(0);
            let page_size = usize::try_from(page_size).unwrap_or(0);
            if page > 0 && PAGE_SIZE_OPTIONS.contains(&page_size) {
                paginator.update(|state| {
                    state.page_index = page - 1;
                    state.page_size = page_size;
                });
            }
        }
        paginator
    }

    /// Returns `true` unless pagination was disabled at construction.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The current pagination snapshot.
    #[must_use]
    pub fn page(&self) -> PageState {
        self.state.borrow().clone()
    }

    /// The 0-based page index.
    #[must_use]
    pub fn page_index(&self) -> usize {
        self.state.borrow().page_index
    }

    /// The current page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.state.borrow().page_size
    }

    /// Records the server-reported total row count.
    ///
    /// This only informs bounds checking; it does not move the page.
    pub fn set_length(&self, length: usize) {
        self.update(|state| state.length = Some(length));
    }

    /// Moves to the next page.
    ///
    /// Returns `true` if the page changed; refuses to move past the last
    /// known page.
    pub fn to_next_page(&self) -> bool {
        if !self.enabled || !self.state.borrow().has_next_page() {
            return false;
        }
        self.update(|state| state.page_index += 1)
    }

    /// Moves to the previous page.
    ///
    /// Returns `true` if the page changed.
    pub fn to_previous_page(&self) -> bool {
        if !self.enabled || !self.state.borrow().has_previous_page() {
            return false;
        }
        self.update(|state| state.page_index -= 1)
    }

    /// Jumps back to the first page.
    ///
    /// Returns `true` if the page changed.
    pub fn to_first_page(&self) -> bool {
        self.update(|state| state.page_index = 0)
    }

    /// Changes the page size and returns to the first page.
    ///
    /// A size outside [`PAGE_SIZE_OPTIONS`] is ignored.
    ///
    /// Returns `true` if the state changed.
    pub fn set_page_size(&self, page_size: usize) -> bool {
        if !PAGE_SIZE_OPTIONS.contains(&page_size) {
            return false;
        }
        self.update(|state| {
            state.page_size = page_size;
            state.page_index = 0;
        })
    }

    /// Projects pagination into query parameters.
    ///
    /// Emits a 1-based `page` plus `page_size` when enabled, nothing when
    /// disabled.
    #[must_use]
    pub fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        if self.enabled {
            let state = self.state.borrow();
            params.insert(PAGE_KEY, i64::try_from(state.page_index + 1).unwrap_or(i64::MAX));
            params.insert(
                PAGE_SIZE_KEY,
                i64::try_from(state.page_size).unwrap_or(i64::MAX),
            );
        }
        params
    }

    /// Subscribes to pagination changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PageState> {
        self.state.subscribe()
    }

    fn update(&self, f: impl FnOnce(&mut PageState)) -> bool {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_valid_page_from_params_and_navigates() {
        let params: QueryParams = [(PAGE_KEY, 2i64), (PAGE_SIZE_KEY, 25)].into_iter().collect();
        let paginator = Paginator::from_query_params(&params);

        assert_eq!(paginator.page_index(), 1);
        assert_eq!(paginator.page_size(), 25);

        assert!(paginator.to_next_page());
        let expected: QueryParams = [(PAGE_KEY, 3i64), (PAGE_SIZE_KEY, 25)].into_iter().collect();
        assert_eq!(paginator.query_params(), expected);
    }

    #[test]
    fn malformed_params_fall_back_to_defaults() {
        for params in [
            [(PAGE_KEY, "0"), (PAGE_SIZE_KEY, "25")],
            [(PAGE_KEY, "2"), (PAGE_SIZE_KEY, "26")],
            [(PAGE_KEY, "two"), (PAGE_SIZE_KEY, "25")],
        ] {
            let params: QueryParams = params.into_iter().collect();
            let paginator = Paginator::from_query_params(&params);
            assert_eq!(paginator.page_index(), 0);
            assert_eq!(paginator.page_size(), PAGE_SIZE_OPTIONS[0]);
        }

        // Both keys are required together.
        let params: QueryParams = [(PAGE_KEY, 2i64)].into_iter().collect();
        assert_eq!(Paginator::from_query_params(&params).page_index(), 0);
    }

    #[test]
    fn bounds_checked_navigation() {
        let paginator = Paginator::new();
        assert!(!paginator.to_previous_page());

        // Unknown length: forward navigation is unrestricted.
        assert!(paginator.to_next_page());

        // 15 rows at size 10 means exactly two pages.
        paginator.set_length(15);
        assert!(!paginator.to_next_page());
        assert!(paginator.to_previous_page());
        assert!(paginator.to_next_page());
    }

    #[test]
    fn disabled_paginator_emits_nothing_and_stays_put() {
        let paginator = Paginator::disabled();
        assert!(paginator.query_params().is_empty());
        assert!(!paginator.to_next_page());
    }

    #[test]
    fn page_size_change_returns_to_first_page() {
        let paginator = Paginator::new();
        paginator.to_next_page();

        assert!(paginator.set_page_size(50));
        assert_eq!(paginator.page_index(), 0);
        assert_eq!(paginator.page_size(), 50);

        assert!(!paginator.set_page_size(26));
    }
}
