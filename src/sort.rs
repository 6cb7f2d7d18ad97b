//! Sort column and direction.

use std::fmt;

use tokio::sync::watch;

use crate::params::QueryParams;

/// Query-parameter key naming the sorted column.
pub const SORT_BY_KEY: &str = "sort_by";

/// Query-parameter key carrying the sort direction.
pub const SORT_ORDER_KEY: &str = "sort_order";

/// A sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Ascending,
    /// Descending order.
    Descending,
}

impl SortDirection {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Ascending),
            "desc" => Some(Self::Descending),
            _ => None,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => "asc".fmt(f),
            Self::Descending => "desc".fmt(f),
        }
    }
}

/// The active sort: a column name and a direction.
///
/// The two halves must be simultaneously present or absent. Any one-sided
/// or malformed combination, from a URL snapshot or otherwise, normalizes
/// to "unsorted".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    /// The sorted column name, or an empty string when unsorted.
    pub active: String,
    /// The direction, or `None` when unsorted.
    pub direction: Option<SortDirection>,
}

impl SortState {
    /// Returns `true` if a column is sorted.
    #[must_use]
    pub const fn is_sorted(&self) -> bool {
        !self.active.is_empty() && self.direction.is_some()
    }
}

/// Observable sort state for a frame.
///
/// Clones share state, so a sort header can be shared across frames.
#[derive(Debug, Clone)]
pub struct Sorting {
    state: watch::Sender<SortState>,
}

impl Default for Sorting {
    fn default() -> Self {
        Self::new()
    }
}

impl Sorting {
    /// Creates an unsorted instance.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(SortState::default());
        Self { state }
    }

    /// Restores sorting from a query-parameter snapshot.
    ///
    /// Requires both `sort_by` and a `sort_order` of `asc` or `desc`; any
    /// other combination yields the unsorted state.
    #[must_use]
    pub fn from_query_params(params: &QueryParams) -> Self {
        let sorting = Self::new();
        let active = params.str_value(SORT_BY_KEY).unwrap_or_default();
        let direction = params
            .str_value(SORT_ORDER_KEY)
            .and_then(SortDirection::parse);
        if let Some(direction) = direction {
            if !active.is_empty() {
                sorting.sort_by(active, direction);
            }
        }
        sorting
    }

    /// The currently sorted column name, or an empty string when unsorted.
    #[must_use]
    pub fn active(&self) -> String {
        self.state.borrow().active.clone()
    }

    /// The current direction, or `None` when unsorted.
    #[must_use]
    pub fn direction(&self) -> Option<SortDirection> {
        self.state.borrow().direction
    }

    /// Returns `true` if a column is sorted.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.state.borrow().is_sorted()
    }

    /// Sorts by the given column and direction.
    pub fn sort_by(&self, column: impl Into<String>, direction: SortDirection) {
        let next = SortState {
            active: column.into(),
            direction: Some(direction),
        };
        self.set(if next.active.is_empty() {
            SortState::default()
        } else {
            next
        });
    }

    /// Cycles the sort for a column header click:
    /// unsorted → ascending → descending → unsorted.
    ///
    /// Clicking a different column starts again at ascending.
    pub fn toggle(&self, column: &str) {
        let current = self.state.borrow().clone();
        if current.active == column {
            match current.direction {
                Some(SortDirection::Ascending) => self.sort_by(column, SortDirection::Descending),
                Some(SortDirection::Descending) | None => self.clear(),
            }
        } else {
            self.sort_by(column, SortDirection::Ascending);
        }
    }

    /// Clears the sort.
    pub fn clear(&self) {
        self.set(SortState::default());
    }

    /// Projects the sort into query parameters.
    ///
    /// Both keys are present when sorted, both absent otherwise.
    #[must_use]
    pub fn query_params(&self) -> QueryParams {
        let state = self.state.borrow();
        let mut params = QueryParams::new();
        if let (true, Some(direction)) = (state.is_sorted(), state.direction) {
            params.insert(SORT_BY_KEY, state.active.as_str());
            params.insert(SORT_ORDER_KEY, direction.to_string());
        }
        params
    }

    /// Subscribes to sort changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SortState> {
        self.state.subscribe()
    }

    fn set(&self, next: SortState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
