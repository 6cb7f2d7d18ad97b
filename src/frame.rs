//! The frame: binds search, sort, pagination, and filters to a remote
//! data source.
//!
//! A [`DataFrame`] owns one [`DataColumns`], one [`Search`], one
//! [`Sorting`], and one [`Paginator`], combines their query parameters into
//! the query sent to the injected [`DataSource`], and coordinates reloads:
//! any change to the server-relevant parameters resets pagination (except
//! the frame's own initial emission) and triggers a debounced fetch, while
//! client-only state (hidden columns) republishes the external parameters
//! without fetching.
//!
//! Reload coordination runs on a background driver task spawned at
//! construction and aborted when the frame is dropped. A fetch that is
//! superseded by a newer parameter change is cancelled by dropping its
//! future; its result is never observed.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::{
    sync::{Notify, watch},
    task::JoinHandle,
};
use tracing::{debug, instrument, warn};

use crate::{
    column::DataColumns,
    error::FetchError,
    field::{Item, ItemId},
    filter::NEGATE_PREFIX,
    page::Paginator,
    params::{ParamValue, QueryParams},
    reactive::{ChangeStream, changes_of, merge_changes},
    search::Search,
    sort::Sorting,
};

/// How long a parameter change is debounced before the data fetch fires.
///
/// The first fetch after construction and explicit
/// [`DataFrame::reload`] calls are not debounced.
pub const RELOAD_DEBOUNCE: Duration = Duration::from_millis(200);

/// The rows returned by a data source for one query.
#[derive(Debug, Clone)]
pub enum RowSet<T> {
    /// A plain, unpaginated row list; the total count is its length.
    Rows(Vec<T>),
    /// One page of a larger result.
    Page {
        /// The rows of the requested page.
        items: Vec<T>,
        /// The total number of rows matching the query on the server.
        total_count: usize,
    },
}

impl<T> RowSet<T> {
    fn into_parts(self) -> (Vec<T>, usize) {
        match self {
            Self::Rows(rows) => {
                let total = rows.len();
                (rows, total)
            }
            Self::Page { items, total_count } => (items, total_count),
        }
    }
}

/// The remote collaborator a frame fetches through.
///
/// This is the engine's only network-shaped dependency. Both operations
/// default to empty results, so a frame is usable in a "no data source
/// yet" state without crashing.
#[async_trait]
pub trait DataSource<T: Item>: Send + Sync + 'static {
    /// Fetches the rows matching the given query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing source fails; the frame never
    /// retries on its own.
    async fn fetch_rows(&self, params: &QueryParams) -> Result<RowSet<T>, FetchError> {
        let _ = params;
        Ok(RowSet::Rows(Vec::new()))
    }

    /// Fetches the names of the fields that are actually populated for the
    /// dataset matching the given query parameters.
    ///
    /// The result drives the runtime optionality of each column's field
    /// and, through it, column visibility.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing source fails.
    async fn fetch_field_names(&self, params: &QueryParams) -> Result<Vec<String>, FetchError> {
        let _ = params;
        Ok(Vec::new())
    }
}

/// The always-empty data source used by unconfigured frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDataSource;

#[async_trait]
impl<T: Item> DataSource<T> for EmptyDataSource {}

/// A snapshot of a frame's row buffer and load status.
#[derive(Debug, Clone)]
pub struct FrameState<T> {
    /// The currently loaded rows.
    pub rows: Vec<T>,
    /// The server-reported total row count; under pagination this can
    /// exceed `rows.len()`.
    pub total_count: usize,
    /// Whether the column-names phase of a reload is in flight.
    pub loading_columns: bool,
    /// Whether the data phase of a reload is in flight.
    pub loading_data: bool,
    /// The names of the columns that should currently render, in column
    /// order.
    pub shown_columns: Vec<String>,
}

impl<T> Default for FrameState<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            total_count: 0,
            loading_columns: false,
            loading_data: false,
            shown_columns: Vec::new(),
        }
    }
}

impl<T> FrameState<T> {
    /// Returns `true` if either reload phase is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading_columns || self.loading_data
    }
}

struct Shared<T: Item, S> {
    source: S,
    columns: DataColumns<T>,
    search: Search,
    sorting: Sorting,
    paginator: Paginator,
    state: watch::Sender<FrameState<T>>,
    params: watch::Sender<QueryParams>,
    reload_requests: Notify,
}

impl<T: Item, S: DataSource<T>> Shared<T, S> {
    /// The parameters whose change resets pagination to the first page.
    fn reset_params(&self) -> QueryParams {
        self.search
            .query_params()
            .merged(&self.sorting.query_params())
            .merged(&self.columns.filter_query_params())
    }

    /// The parameters sent to the data source.
    fn server_params(&self) -> QueryParams {
        self.reset_params().merged(&self.paginator.query_params())
    }

    /// The full externally visible parameters, including client-only state.
    fn full_params(&self) -> QueryParams {
        self.server_params()
            .merged(&self.columns.hidden_query_params())
    }

    fn publish_params(&self) {
        let next = self.full_params();
        self.params.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Recomputes the shown-column list from the current row sample.
    ///
    /// Deduplicated structurally so unchanged lists do not wake
    /// subscribers.
    fn refresh_shown(&self) {
        self.state.send_if_modified(|state| {
            let shown = self.columns.shown_columns(&state.rows);
            if state.shown_columns == shown {
                false
            } else {
                state.shown_columns = shown;
                true
            }
        });
    }

    /// Reacts to one source change: applies the pagination-reset rule,
    /// republishes the external parameters, and refreshes visibility.
    ///
    /// Returns `true` if the *server* parameters changed, i.e. a fetch is
    /// warranted. The reset compares only search/sort/filter parameters,
    /// so the page move it performs can never re-trigger itself.
    fn absorb_change(
        &self,
        reset_baseline: &mut QueryParams,
        server_baseline: &mut QueryParams,
    ) -> bool {
        let reset = self.reset_params();
        if reset != *reset_baseline {
            *reset_baseline = reset;
            self.paginator.to_first_page();
        }
        self.publish_params();
        self.refresh_shown();

        let server = self.server_params();
        if server == *server_baseline {
            false
        } else {
            *server_baseline = server;
            true
        }
    }

    #[instrument(skip_all)]
    async fn reload(&self) -> Result<(), FetchError> {
        let params = self.server_params();
        debug!(?params, "loading frame data");
        self.state.send_modify(|state| {
            state.loading_columns = true;
            state.loading_data = true;
        });

        // Column optionality is computed once per reload cycle, in
        // parallel with the data load.
        let (names, rows) = futures::join!(
            self.source.fetch_field_names(&params),
            self.source.fetch_rows(&params),
        );

        self.state.send_modify(|state| {
            state.loading_columns = false;
        });
        let names = match names {
            Ok(names) => names,
            Err(error) => {
                self.state.send_modify(|state| state.loading_data = false);
                return Err(error);
            }
        };
        self.columns.set_runtime_optionality(&names);

        match rows {
            Ok(row_set) => {
                let (rows, total_count) = row_set.into_parts();
                self.paginator.set_length(total_count);
                self.state.send_modify(|state| {
                    state.rows = rows;
                    state.total_count = total_count;
                    state.loading_data = false;
                });
                self.refresh_shown();
                Ok(())
            }
            Err(error) => {
                // Keep the previous row buffer; the view decides how to
                // present the failure.
                self.state.send_modify(|state| state.loading_data = false);
                Err(error)
            }
        }
    }
}

/// The driver loop: trigger, debounce, fetch, switching to the latest
/// query whenever the server parameters move under an in-flight fetch.
async fn drive<T: Item, S: DataSource<T>>(
    shared: Arc<Shared<T, S>>,
    mut changes: ChangeStream,
    reset_seed: QueryParams,
) {
    // Baselines are seeded from the construction-time state, so the
    // frame's own initial emission neither resets pagination nor counts
    // as a change. The reset seed additionally carries the expected
    // post-resolution parameters of values filters restored from a
    // snapshot, so the restored page survives the asynchronous option
    // resolution landing. The fetch baseline is not seeded that way: the
    // resolved values still warrant a reload.
    let mut reset_baseline = reset_seed;
    let mut server_baseline = shared.server_params();
    shared.publish_params();
    shared.refresh_shown();

    // `Some(immediate)` when a fetch is owed.
    let mut pending = Some(true);

    loop {
        let Some(mut immediate) = pending.take() else {
            tokio::select! {
                change = changes.next() => {
                    if change.is_none() {
                        return;
                    }
                    if !shared.absorb_change(&mut reset_baseline, &mut server_baseline) {
                        continue;
                    }
                    pending = Some(false);
                }
                () = shared.reload_requests.notified() => pending = Some(true),
            }
            continue;
        };

        'cycle: loop {
            if !immediate {
                loop {
                    tokio::select! {
                        () = tokio::time::sleep(RELOAD_DEBOUNCE) => break,
                        change = changes.next() => {
                            if change.is_none() {
                                return;
                            }
                            shared.absorb_change(&mut reset_baseline, &mut server_baseline);
                        }
                        () = shared.reload_requests.notified() => break,
                    }
                }
            }

            let reload = shared.reload();
            tokio::pin!(reload);
            loop {
                tokio::select! {
                    result = &mut reload => {
                        if let Err(error) = result {
                            warn!(%error, "background reload failed");
                        }
                        break 'cycle;
                    }
                    change = changes.next() => {
                        if change.is_none() {
                            return;
                        }
                        if shared.absorb_change(&mut reset_baseline, &mut server_baseline) {
                            // Supersede the in-flight fetch and debounce
                            // again; its result would be for a stale query.
                            immediate = false;
                            continue 'cycle;
                        }
                        // Client-only change: keep the fetch running.
                    }
                    () = shared.reload_requests.notified() => {
                        immediate = true;
                        continue 'cycle;
                    }
                }
            }
        }
    }
}

/// The orchestrator binding search, sort, pagination, and filters to a
/// remote data source.
///
/// Dropping the frame aborts its background driver task.
pub struct DataFrame<T: Item, S: DataSource<T>> {
    shared: Arc<Shared<T, S>>,
    driver: JoinHandle<()>,
}

impl<T: Item, S: DataSource<T>> std::fmt::Debug for DataFrame<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFrame")
            .field("columns", &self.shared.columns)
            .field("params", &*self.shared.params.borrow())
            .finish_non_exhaustive()
    }
}

impl<T: Item, S: DataSource<T>> DataFrame<T, S> {
    /// Creates a frame with its own controls, restored from the given
    /// query-parameter snapshot, and immediately issues the initial load.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn new(source: S, columns: DataColumns<T>, initial: &QueryParams) -> Self {
        Self::with_controls(
            source,
            columns,
            Search::from_query_params(initial),
            Sorting::from_query_params(initial),
            Paginator::from_query_params(initial),
            initial,
        )
    }

    /// Creates a frame over pre-built controls.
    ///
    /// The controls may be shared with other frames (clones of `Search`,
    /// `Sorting`, and `Paginator` alias the same state). Column hidden and
    /// filter state is restored from `initial`; the controls themselves
    /// are taken as-is.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn with_controls(
        source: S,
        columns: DataColumns<T>,
        search: Search,
        sorting: Sorting,
        paginator: Paginator,
        initial: &QueryParams,
    ) -> Self {
        columns.apply_query_params(initial);

        // What each restored values filter will emit once its raw values
        // resolve into full options.
        let mut hydration = QueryParams::new();
        for column in columns.iter() {
            let Some(values) = column.filters().values() else {
                continue;
            };
            let raw = initial.list_value(values.name());
            if raw.is_empty() {
                continue;
            }
            hydration.insert(values.name().to_string(), ParamValue::List(raw));
            let negate_key = format!("{NEGATE_PREFIX}{}", values.name());
            if initial.bool_value(&negate_key) == Some(true) {
                hydration.insert(negate_key, true);
            }
        }

        let mut streams = columns.change_streams();
        streams.push(changes_of(search.subscribe()));
        streams.push(changes_of(sorting.subscribe()));
        streams.push(changes_of(paginator.subscribe()));
        let changes = merge_changes(streams);

        let (state, _) = watch::channel(FrameState::default());
        let (params, _) = watch::channel(QueryParams::new());
        let shared = Arc::new(Shared {
            source,
            columns,
            search,
            sorting,
            paginator,
            state,
            params,
            reload_requests: Notify::new(),
        });
        shared.publish_params();

        let reset_seed = shared.reset_params().merged(&hydration);
        let driver = tokio::spawn(drive(Arc::clone(&shared), changes, reset_seed));
        Self { shared, driver }
    }

    /// The frame's search control.
    #[must_use]
    pub fn search(&self) -> &Search {
        &self.shared.search
    }

    /// The frame's sorting control.
    #[must_use]
    pub fn sorting(&self) -> &Sorting {
        &self.shared.sorting
    }

    /// The frame's paginator.
    #[must_use]
    pub fn paginator(&self) -> &Paginator {
        &self.shared.paginator
    }

    /// The frame's columns.
    #[must_use]
    pub fn columns(&self) -> &DataColumns<T> {
        &self.shared.columns
    }

    /// The current externally visible query parameters.
    #[must_use]
    pub fn query_params(&self) -> QueryParams {
        self.shared.params.borrow().clone()
    }

    /// Subscribes to the externally visible query parameters.
    ///
    /// This is the stream a view synchronizes the URL from.
    #[must_use]
    pub fn subscribe_query_params(&self) -> watch::Receiver<QueryParams> {
        self.shared.params.subscribe()
    }

    /// Subscribes to the frame's row buffer and load status.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<FrameState<T>> {
        self.shared.state.subscribe()
    }

    /// A snapshot of the currently loaded rows.
    #[must_use]
    pub fn rows(&self) -> Vec<T> {
        self.shared.state.borrow().rows.clone()
    }

    /// The server-reported total row count.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.shared.state.borrow().total_count
    }

    /// Returns `true` while either reload phase is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().is_loading()
    }

    /// Reloads columns and data immediately, without debouncing.
    ///
    /// # Errors
    ///
    /// Returns the data source's failure unchanged; the previous row
    /// buffer is retained.
    pub async fn reload(&self) -> Result<(), FetchError> {
        self.shared.reload().await
    }

    /// Appends an item locally after a successful create.
    ///
    /// The item is appended only if pagination is disabled or the current
    /// page is not yet full; the reported total count is incremented
    /// regardless, so a full page correctly advertises that the next page
    /// grew even though the new item is not rendered until the next
    /// reload.
    pub fn add_item(&self, item: T) {
        let page_size = self.shared.paginator.page_size();
        let paginated = self.shared.paginator.is_enabled();
        let mut total = 0;
        self.shared.state.send_modify(|state| {
            if !paginated || state.rows.len() < page_size {
                state.rows.push(item);
            }
            state.total_count += 1;
            total = state.total_count;
        });
        self.shared.paginator.set_length(total);
        self.shared.refresh_shown();
    }

    /// Replaces an item in place by identifier match.
    ///
    /// Returns `false` if no loaded row has the item's identifier.
    pub fn update_item(&self, item: T) -> bool {
        let id = item.id();
        let mut updated = false;
        self.shared.state.send_modify(|state| {
            if let Some(row) = state.rows.iter_mut().find(|row| row.id() == id) {
                *row = item;
                updated = true;
            }
        });
        if updated {
            self.shared.refresh_shown();
        }
        updated
    }

    /// Replaces an item by identifier match, or appends it if absent.
    pub fn add_or_update_item(&self, item: T) {
        if !self.update_item(item.clone()) {
            self.add_item(item);
        }
    }

    /// Removes an item locally after a successful delete.
    ///
    /// Returns `false` if no loaded row has the identifier. When
    /// pagination is enabled and rows exist beyond the current page, a
    /// full reload is triggered to refill the gap; when the removal
    /// empties the last page, pagination steps back exactly one page
    /// (which itself triggers the follow-up load).
    pub fn remove_item(&self, id: &ItemId) -> bool {
        let paginated = self.shared.paginator.is_enabled();
        let page = self.shared.paginator.page();
        let mut removed = false;
        let mut refill = false;
        let mut step_back = false;
        let mut total = 0;
        self.shared.state.send_modify(|state| {
            let Some(position) = state.rows.iter().position(|row| &row.id() == id) else {
                return;
            };
            state.rows.remove(position);
            state.total_count = state.total_count.saturating_sub(1);
            removed = true;
            total = state.total_count;

            if paginated {
                let page_end = (page.page_index + 1) * page.page_size;
                if state.total_count >= page_end {
                    refill = true;
                } else if state.rows.is_empty() && page.has_previous_page() {
                    step_back = true;
                }
            }
        });
        if !removed {
            return false;
        }
        self.shared.paginator.set_length(total);
        if refill {
            self.shared.reload_requests.notify_one();
        } else if step_back {
            self.shared.paginator.to_previous_page();
        }
        self.shared.refresh_shown();
        true
    }
}

impl<T: Item, S: DataSource<T>> Drop for DataFrame<T, S> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
