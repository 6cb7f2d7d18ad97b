//! Columns and the ordered column collection.

use futures::stream::BoxStream;
use tokio::sync::watch;

use crate::{
    field::Field,
    filter::Filters,
    params::{ParamScalar, ParamValue, QueryParams},
    reactive::changes_of,
};

/// Client-only query-parameter key listing user-hidden columns.
pub const HIDDEN_COLUMNS_KEY: &str = "_hidden_columns";

/// One table column: a field, its filters, and a hidden flag.
///
/// A required field's column can never be hidden, regardless of requested
/// state — the flag is simply not accepted.
///
/// Clones share state.
pub struct DataColumn<T> {
    field: Field<T>,
    filters: Filters,
    hidden: watch::Sender<bool>,
}

impl<T> Clone for DataColumn<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            filters: self.filters.clone(),
            hidden: self.hidden.clone(),
        }
    }
}

impl<T> std::fmt::Debug for DataColumn<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataColumn")
            .field("field", &self.field)
            .field("filters", &self.filters)
            .field("hidden", &*self.hidden.borrow())
            .finish()
    }
}

impl<T> DataColumn<T> {
    /// Creates an unfiltered column over a field.
    #[must_use]
    pub fn new(field: Field<T>) -> Self {
        Self::with_filters(field, Filters::none())
    }

    /// Creates a column over a field with the given filters.
    #[must_use]
    pub fn with_filters(field: Field<T>, filters: Filters) -> Self {
        let (hidden, _) = watch::channel(false);
        Self {
            field,
            filters,
            hidden,
        }
    }

    /// The column's name; identical to its field's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.field.name()
    }

    /// The field behind this column.
    #[must_use]
    pub const fn field(&self) -> &Field<T> {
        &self.field
    }

    /// The filters attached to this column.
    #[must_use]
    pub const fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Returns `true` if the column is hidden.
    ///
    /// Always `false` for a required field.
    #[must_use]
    pub fn hidden(&self) -> bool {
        !self.field.required() && *self.hidden.borrow()
    }

    /// Hides or shows the column.
    ///
    /// A no-op for required fields.
    pub fn set_hidden(&self, hidden: bool) {
        if self.field.required() {
            return;
        }
        self.hidden.send_if_modified(|current| {
            if *current == hidden {
                false
            } else {
                *current = hidden;
                true
            }
        });
    }

    /// Whether the column should currently render, given a sample of
    /// loaded rows.
    ///
    /// The policy, in order: a hidden column is not shown; a non-optional
    /// field is always shown; with an empty sample an optional column is
    /// not shown; otherwise the column is shown iff at least one sampled
    /// row has a non-empty value for the field.
    ///
    /// The sample is the currently loaded page, not the full dataset, so
    /// an optional column's visibility can differ between pages.
    #[must_use]
    pub fn is_shown(&self, sample: &[T]) -> bool {
        if self.hidden() {
            return false;
        }
        if !self.field.is_optional() {
            return true;
        }
        sample.iter().any(|item| self.field.has_value(item))
    }

    /// Restores hidden state and filter state from a snapshot.
    pub fn apply_query_params(&self, params: &QueryParams) {
        let hidden = params
            .list_value(HIDDEN_COLUMNS_KEY)
            .iter()
            .any(|value| matches!(value, ParamScalar::Str(name) if name == self.name()));
        self.set_hidden(hidden);
        self.filters.apply_query_params(params);
    }

    /// Subscribes to hidden-flag changes.
    #[must_use]
    pub fn subscribe_hidden(&self) -> watch::Receiver<bool> {
        self.hidden.subscribe()
    }

    pub(crate) fn change_streams(&self) -> Vec<BoxStream<'static, ()>>
    where
        T: Send + Sync + 'static,
    {
        let mut streams = self.filters.change_streams();
        streams.push(changes_of(self.hidden.subscribe()));
        streams.push(changes_of(self.field.subscribe_optional()));
        streams
    }
}

/// An ordered, name-unique collection of columns.
///
/// Clones share state with their source columns.
pub struct DataColumns<T> {
    columns: Vec<DataColumn<T>>,
}

impl<T> Clone for DataColumns<T> {
    fn clone(&self) -> Self {
        Self {
            columns: self.columns.clone(),
        }
    }
}

impl<T> std::fmt::Debug for DataColumns<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.columns).finish()
    }
}

impl<T> Default for DataColumns<T> {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
        }
    }
}

impl<T> DataColumns<T> {
    /// Creates a collection from an ordered list of columns.
    ///
    /// # Panics
    ///
    /// Panics if two columns share a name; this is a configuration mistake
    /// by the integrating view and is not recoverable.
    #[must_use]
    pub fn new(columns: Vec<DataColumn<T>>) -> Self {
        for (index, column) in columns.iter().enumerate() {
            let duplicate = columns[..index]
                .iter()
                .any(|other| other.name() == column.name());
            assert!(!duplicate, "Duplicate column name: {}", column.name());
        }
        Self { columns }
    }

    /// The number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if there are no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterates over the columns in order.
    pub fn iter(&self) -> impl Iterator<Item = &DataColumn<T>> {
        self.columns.iter()
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataColumn<T>> {
        self.columns.iter().find(|column| column.name() == name)
    }

    /// The client-only hidden-columns parameters.
    ///
    /// Folds the names of currently hidden (therefore non-required) columns
    /// into `_hidden_columns`, or an empty map if none are hidden.
    #[must_use]
    pub fn hidden_query_params(&self) -> QueryParams {
        let hidden: Vec<ParamScalar> = self
            .columns
            .iter()
            .filter(|column| column.hidden())
            .map(|column| column.name().into())
            .collect();
        let mut params = QueryParams::new();
        if !hidden.is_empty() {
            params.insert(HIDDEN_COLUMNS_KEY, ParamValue::List(hidden));
        }
        params
    }

    /// The merged filter parameters of all columns.
    ///
    /// Later columns win on key collision; collisions are not expected in
    /// practice since filter names are column-scoped.
    #[must_use]
    pub fn filter_query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        for column in &self.columns {
            params.merge(&column.filters().query_params());
        }
        params
    }

    /// Returns `true` if any column is hidden.
    #[must_use]
    pub fn are_columns_hidden(&self) -> bool {
        self.columns.iter().any(DataColumn::hidden)
    }

    /// Returns `true` if any column has a filter set.
    #[must_use]
    pub fn are_filters_set(&self) -> bool {
        self.columns.iter().any(|column| column.filters().is_set())
    }

    /// Shows every hidden column again.
    pub fn unhide_all_columns(&self) {
        for column in &self.columns {
            column.set_hidden(false);
        }
    }

    /// Clears every filter on every column.
    pub fn clear_filters(&self) {
        for column in &self.columns {
            column.filters().clear();
        }
    }

    /// The names of the columns that should currently render, in column
    /// order, given a sample of loaded rows.
    ///
    /// See [`DataColumn::is_shown`] for the policy.
    #[must_use]
    pub fn shown_columns(&self, sample: &[T]) -> Vec<String> {
        self.columns
            .iter()
            .filter(|column| column.is_shown(sample))
            .map(|column| column.name().to_string())
            .collect()
    }

    /// Restores every column's hidden and filter state from a snapshot.
    pub fn apply_query_params(&self, params: &QueryParams) {
        for column in &self.columns {
            column.apply_query_params(params);
        }
    }

    pub(crate) fn change_streams(&self) -> Vec<BoxStream<'static, ()>>
    where
        T: Send + Sync + 'static,
    {
        self.columns
            .iter()
            .flat_map(DataColumn::change_streams)
            .collect()
    }

    pub(crate) fn set_runtime_optionality(&self, populated_names: &[String]) {
        for column in &self.columns {
            let populated = populated_names
                .iter()
                .any(|name| name == column.name());
            column.field().set_optional(!populated);
        }
    }
}

impl<T> From<Vec<DataColumn<T>>> for DataColumns<T> {
    fn from(columns: Vec<DataColumn<T>>) -> Self {
        Self::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Item, ItemId};

    #[derive(Debug, Clone)]
    struct Row {
        id: i64,
        title: String,
        notes: Option<String>,
    }

    impl Item for Row {
        fn id(&self) -> ItemId {
            self.id.into()
        }
    }

    fn title_column() -> DataColumn<Row> {
        DataColumn::new(Field::new("title", "Title", true, |row: &Row| {
            Some(row.title.clone().into())
        }))
    }

    fn notes_column() -> DataColumn<Row> {
        DataColumn::with_filters(
            Field::new("notes", "Notes", false, |row: &Row| {
                row.notes.clone().map(ParamScalar::Str)
            }),
            Filters::none().with_pattern("notes"),
        )
    }

    fn row(id: i64, title: &str, notes: Option<&str>) -> Row {
        Row {
            id,
            title: title.to_string(),
            notes: notes.map(ToString::to_string),
        }
    }

    #[test]
    #[should_panic(expected = "Duplicate column name: title")]
    fn duplicate_column_names_are_fatal() {
        let _ = DataColumns::new(vec![title_column(), title_column()]);
    }

    #[test]
    fn hidden_columns_entry_applies_to_optional_columns_only() {
        let params: QueryParams = [(HIDDEN_COLUMNS_KEY, "notes")].into_iter().collect();
        let column = notes_column();
        column.apply_query_params(&params);
        assert!(column.hidden());

        // The same entry naming a required column is ignored.
        let params: QueryParams = [(HIDDEN_COLUMNS_KEY, "title")].into_iter().collect();
        let column = title_column();
        column.apply_query_params(&params);
        assert!(!column.hidden());
    }

    #[test]
    fn required_columns_can_never_be_hidden() {
        let column = title_column();
        column.set_hidden(true);
        assert!(!column.hidden());
    }

    #[test]
    fn hidden_params_fold_hidden_column_names() {
        let columns = DataColumns::new(vec![title_column(), notes_column()]);
        assert!(columns.hidden_query_params().is_empty());

        columns.get("notes").unwrap().set_hidden(true);
        let expected: QueryParams = [(HIDDEN_COLUMNS_KEY, ParamValue::List(vec!["notes".into()]))]
            .into_iter()
            .collect();
        assert_eq!(columns.hidden_query_params(), expected);
        assert!(columns.are_columns_hidden());

        columns.unhide_all_columns();
        assert!(!columns.are_columns_hidden());
    }

    #[test]
    fn filter_params_merge_across_columns() {
        let columns = DataColumns::new(vec![title_column(), notes_column()]);
        assert!(!columns.are_filters_set());

        columns
            .get("notes")
            .unwrap()
            .filters()
            .pattern()
            .unwrap()
            .set_pattern("overdue");

        assert!(columns.are_filters_set());
        assert_eq!(
            columns.filter_query_params().str_value("notes"),
            Some("overdue")
        );

        columns.clear_filters();
        assert!(!columns.are_filters_set());
    }

    #[test]
    fn visibility_policy() {
        let columns = DataColumns::new(vec![title_column(), notes_column()]);

        // Empty sample: required columns only.
        assert_eq!(columns.shown_columns(&[]), vec!["title"]);

        // A populated optional value justifies the column.
        let sample = [row(1, "a", Some("check")), row(2, "b", None)];
        assert_eq!(columns.shown_columns(&sample), vec!["title", "notes"]);

        // Empty strings do not.
        let sample = [row(1, "a", Some("")), row(2, "b", None)];
        assert_eq!(columns.shown_columns(&sample), vec!["title"]);

        // Hidden wins over data.
        let sample = [row(1, "a", Some("check"))];
        columns.get("notes").unwrap().set_hidden(true);
        assert_eq!(columns.shown_columns(&sample), vec!["title"]);
    }

    #[test]
    fn runtime_optionality_overrides_sample_inspection() {
        let columns = DataColumns::new(vec![title_column(), notes_column()]);

        // The server reported `notes` as populated for this dataset, so the
        // column shows even though the loaded page has no values for it.
        columns.set_runtime_optionality(&["title".to_string(), "notes".to_string()]);
        let sample = [row(1, "a", None)];
        assert_eq!(columns.shown_columns(&sample), vec!["title", "notes"]);

        columns.set_runtime_optionality(&["title".to_string()]);
        assert_eq!(columns.shown_columns(&sample), vec!["title"]);
    }

    #[test]
    fn visibility_follows_loaded_page_sample() {
        // Intentional boundary case: the sample is only the loaded page, so
        // an optional column can be visible on one page and not on another.
        let columns = DataColumns::new(vec![title_column(), notes_column()]);

        let page_one = [row(1, "a", Some("x"))];
        let page_two = [row(2, "b", None)];
        assert_eq!(columns.shown_columns(&page_one), vec!["title", "notes"]);
        assert_eq!(columns.shown_columns(&page_two), vec!["title"]);
    }
}
