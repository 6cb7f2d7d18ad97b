//! Reactive tabular data binding
//!
//! A headless engine for data tables: search, per-column filters,
//! sorting, and pagination, all observable and all serializable to a
//! flat set of query parameters, bound to an injected asynchronous data
//! source with debounced automatic reloading and optimistic local
//! mutation.

pub mod column;
pub use column::{DataColumn, DataColumns, HIDDEN_COLUMNS_KEY};

pub mod error;
pub use error::FetchError;

pub mod field;
pub use field::{Field, Item, ItemId};

pub mod filter;
pub use filter::{
    FilterByPattern, FilterByValues, FilterForExistence, Filters, NEGATE_PREFIX, PatternState,
};

pub mod frame;
pub use frame::{
    DataFrame, DataSource, EmptyDataSource, FrameState, RELOAD_DEBOUNCE, RowSet,
};

pub mod options;
pub use options::{OptionValue, Options, StaticOptions};

pub mod page;
pub use page::{PAGE_KEY, PAGE_SIZE_KEY, PAGE_SIZE_OPTIONS, PageState, Paginator};

pub mod params;
pub use params::{ParamScalar, ParamValue, QueryParams};

mod reactive;

pub mod search;
pub use search::{SEARCH_KEY, Search};

pub mod selection;
pub use selection::{Selection, SelectionMode};

pub mod sort;
pub use sort::{SORT_BY_KEY, SORT_ORDER_KEY, SortDirection, SortState, Sorting};
