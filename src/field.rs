//! Field descriptions and the row item contract.

use std::{fmt, sync::Arc};

use tokio::sync::watch;

use crate::params::ParamScalar;

/// The identifier of a row item: a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemId {
    /// A numeric identifier.
    Num(i64),
    /// A string identifier.
    Str(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => n.fmt(f),
            Self::Str(s) => s.fmt(f),
        }
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        Self::Num(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// A row entity with a stable, unique identifier.
///
/// Items are immutable from the engine's perspective; local mutation
/// replaces whole items by identifier match.
pub trait Item: Clone + Send + Sync + 'static {
    /// The item's unique identifier.
    fn id(&self) -> ItemId;
}

/// A named, pure projection of an item property.
///
/// A field carries a display label, a required flag fixed at construction,
/// and a runtime-observable *optionality*: a field the server reports as
/// populated for the current dataset is treated as non-optional even if it
/// is not required, which feeds the column-visibility policy. Required
/// fields are never optional.
///
/// Clones share the optionality cell.
pub struct Field<T> {
    name: String,
    label: String,
    required: bool,
    accessor: Arc<dyn Fn(&T) -> Option<ParamScalar> + Send + Sync>,
    optional: watch::Sender<bool>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            label: self.label.clone(),
            required: self.required,
            accessor: Arc::clone(&self.accessor),
            optional: self.optional.clone(),
        }
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("required", &self.required)
            .field("optional", &*self.optional.borrow())
            .finish_non_exhaustive()
    }
}

impl<T> Field<T> {
    /// Creates a field.
    ///
    /// The accessor must be a pure function of the item. An optional field
    /// starts out optional; a required one can never become optional.
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        required: bool,
        accessor: impl Fn(&T) -> Option<ParamScalar> + Send + Sync + 'static,
    ) -> Self {
        let (optional, _) = watch::channel(!required);
        Self {
            name: name.into(),
            label: label.into(),
            required,
            accessor: Arc::new(accessor),
            optional,
        }
    }

    /// The field's name, used as its column and parameter namespace.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns `true` if the field is required.
    #[must_use]
    pub const fn required(&self) -> bool {
        self.required
    }

    /// The current runtime optionality.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        *self.optional.borrow()
    }

    /// Updates the runtime optionality.
    ///
    /// A no-op for required fields, which are never optional.
    pub fn set_optional(&self, optional: bool) {
        if self.required {
            return;
        }
        self.optional.send_if_modified(|current| {
            if *current == optional {
                false
            } else {
                *current = optional;
                true
            }
        });
    }

    /// Subscribes to optionality changes.
    #[must_use]
    pub fn subscribe_optional(&self) -> watch::Receiver<bool> {
        self.optional.subscribe()
    }

    /// The raw value of this field on an item.
    #[must_use]
    pub fn value(&self, item: &T) -> Option<ParamScalar> {
        (self.accessor)(item)
    }

    /// The string projection of this field on an item.
    ///
    /// Absent values project to the empty string.
    #[must_use]
    pub fn value_string(&self, item: &T) -> String {
        self.value(item)
            .map(|scalar| scalar.to_string())
            .unwrap_or_default()
    }

    /// The boolean projection of this field on an item.
    ///
    /// Absent or non-boolean-coercible values project to `false`.
    #[must_use]
    pub fn value_bool(&self, item: &T) -> bool {
        self.value(item)
            .and_then(|scalar| scalar.as_bool())
            .unwrap_or(false)
    }

    /// Returns `true` if the item has a non-empty value for this field.
    ///
    /// Absent values and empty strings count as empty; `false` and `0` are
    /// values like any other.
    #[must_use]
    pub fn has_value(&self, item: &T) -> bool {
        match self.value(item) {
            None => false,
            Some(ParamScalar::Str(s)) => !s.is_empty(),
            Some(ParamScalar::Bool(_) | ParamScalar::Num(_)) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Row {
        id: i64,
        title: String,
        done: Option<bool>,
    }

    impl Item for Row {
        fn id(&self) -> ItemId {
            self.id.into()
        }
    }

    fn title_field() -> Field<Row> {
        Field::new("title", "Title", true, |row: &Row| {
            Some(row.title.clone().into())
        })
    }

    fn done_field() -> Field<Row> {
        Field::new("done", "Done", false, |row: &Row| {
            row.done.map(ParamScalar::Bool)
        })
    }

    fn row(title: &str, done: Option<bool>) -> Row {
        Row {
            id: 1,
            title: title.to_string(),
            done,
        }
    }

    #[test]
    fn projections() {
        let title = title_field();
        let done = done_field();
        let item = row("Audit trail", Some(false));

        assert_eq!(title.value_string(&item), "Audit trail");
        assert!(!done.value_bool(&item));
        assert_eq!(done.value_string(&item), "false");
        assert_eq!(done_field().value_string(&row("x", None)), "");
    }

    #[test]
    fn emptiness_counts_none_and_empty_strings_only() {
        let title = title_field();
        let done = done_field();

        assert!(!title.has_value(&row("", None)));
        assert!(title.has_value(&row("x", None)));
        assert!(!done.has_value(&row("x", None)));
        // `false` is a value, not an absence.
        assert!(done.has_value(&row("x", Some(false))));
    }

    #[test]
    fn required_fields_are_never_optional() {
        let title = title_field();
        assert!(!title.is_optional());
        title.set_optional(true);
        assert!(!title.is_optional());
    }

    #[test]
    fn optionality_is_runtime_mutable_and_shared() {
        let done = done_field();
        let shared = done.clone();
        assert!(done.is_optional());

        shared.set_optional(false);
        assert!(!done.is_optional());
    }
}
