//! Shared selection state over [`OptionValue`]s.
//!
//! A [`Selection`] is the single source of truth for "which options are
//! currently chosen" for one logical field. It is a cheap handle: cloning
//! it yields another view of the *same* state, which is how one selection
//! is shared between several UI bindings (say, an autocomplete chip input
//! and a filter dropdown) without any per-call-site synchronization.
//!
//! Membership is decided by value equality, never object identity, and
//! every mutation that actually changes the selection bumps an internal
//! version counter. The version is what lets an in-flight option
//! resolution detect that it has been superseded (see
//! [`FilterByValues`](crate::FilterByValues)).

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::watch;

use crate::{options::OptionValue, params::ParamScalar};

/// Whether a selection admits one option or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// At most one option may be selected; selecting replaces.
    Single,
    /// Any number of options may be selected.
    Multiple,
}

/// A shared, observable set of selected options.
#[derive(Debug, Clone)]
pub struct Selection {
    state: watch::Sender<Vec<OptionValue>>,
    version: Arc<AtomicU64>,
    mode: SelectionMode,
}

impl Selection {
    /// Creates an empty selection.
    #[must_use]
    pub fn new(mode: SelectionMode) -> Self {
        let (state, _) = watch::channel(Vec::new());
        Self {
            state,
            version: Arc::new(AtomicU64::new(0)),
            mode,
        }
    }

    /// The selection mode fixed at construction.
    #[must_use]
    pub const fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// A snapshot of the currently selected options, in selection order.
    #[must_use]
    pub fn selected(&self) -> Vec<OptionValue> {
        self.state.borrow().clone()
    }

    /// Returns `true` if nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// Returns `true` if an option with the given value is selected.
    #[must_use]
    pub fn is_selected(&self, value: &ParamScalar) -> bool {
        self.state
            .borrow()
            .iter()
            .any(|option| option.has_value(value))
    }

    /// The number of mutations that have changed this selection.
    ///
    /// No-op mutations (selecting an already-selected value, clearing an
    /// empty selection) do not advance the version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Subscribes to selection changes.
    ///
    /// The receiver replays the current value to late subscribers.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<OptionValue>> {
        self.state.subscribe()
    }

    /// Selects an option.
    ///
    /// In [`SelectionMode::Single`] this replaces any previous selection; in
    /// [`SelectionMode::Multiple`] it appends. Selecting a value that is
    /// already selected is a no-op.
    ///
    /// Returns `true` if the selection changed.
    pub fn select_option(&self, option: OptionValue) -> bool {
        let mode = self.mode;
        self.mutate(move |selected| {
            if selected.iter().any(|existing| existing.value == option.value) {
                return false;
            }
            match mode {
                SelectionMode::Single => *selected = vec![option],
                SelectionMode::Multiple => selected.push(option),
            }
            true
        })
    }

    /// Deselects the option with the given value, if selected.
    ///
    /// Returns `true` if the selection changed.
    pub fn deselect_value(&self, value: &ParamScalar) -> bool {
        self.mutate(|selected| {
            let before = selected.len();
            selected.retain(|option| !option.has_value(value));
            selected.len() != before
        })
    }

    /// Selects the option if its value is unselected, deselects otherwise.
    ///
    /// Returns `true` if the option ended up selected.
    pub fn toggle_option(&self, option: OptionValue) -> bool {
        if self.is_selected(&option.value) {
            self.deselect_value(&option.value);
            false
        } else {
            self.select_option(option);
            true
        }
    }

    /// Replaces the whole selection.
    ///
    /// Duplicate values are dropped (first occurrence wins) and a
    /// single-mode selection keeps only the first option.
    ///
    /// Returns `true` if the selection changed.
    pub fn set_selected(&self, options: Vec<OptionValue>) -> bool {
        let mut deduped: Vec<OptionValue> = Vec::with_capacity(options.len());
        for option in options {
            if !deduped.iter().any(|existing| existing.value == option.value) {
                deduped.push(option);
            }
        }
        if self.mode == SelectionMode::Single {
            deduped.truncate(1);
        }
        self.mutate(move |selected| {
            if *selected == deduped {
                false
            } else {
                *selected = deduped;
                true
            }
        })
    }

    /// Clears the selection.
    ///
    /// Returns `true` if the selection changed.
    pub fn clear(&self) -> bool {
        self.mutate(|selected| {
            if selected.is_empty() {
                false
            } else {
                selected.clear();
                true
            }
        })
    }

    fn mutate(&self, f: impl FnOnce(&mut Vec<OptionValue>) -> bool) -> bool {
        let changed = self.state.send_if_modified(f);
        if changed {
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(value: &str) -> OptionValue {
        OptionValue::from(value)
    }

    #[test]
    fn single_mode_replaces() {
        let selection = Selection::new(SelectionMode::Single);
        selection.select_option(option("a"));
        selection.select_option(option("b"));
        assert_eq!(selection.selected(), vec![option("b")]);
    }

    #[test]
    fn multiple_mode_appends_without_duplicates() {
        let selection = Selection::new(SelectionMode::Multiple);
        assert!(selection.select_option(option("a")));
        assert!(selection.select_option(option("b")));
        assert!(!selection.select_option(option("a")));
        assert_eq!(selection.selected(), vec![option("a"), option("b")]);
    }

    #[test]
    fn membership_is_by_value_not_label() {
        let selection = Selection::new(SelectionMode::Multiple);
        selection.select_option(OptionValue::new("a", "Label one"));
        assert!(!selection.select_option(OptionValue::new("a", "Different label")));
        assert!(selection.is_selected(&"a".into()));
    }

    #[test]
    fn version_advances_only_on_change() {
        let selection = Selection::new(SelectionMode::Multiple);
        let initial = selection.version();

        selection.select_option(option("a"));
        assert_eq!(selection.version(), initial + 1);

        selection.select_option(option("a"));
        assert_eq!(selection.version(), initial + 1);

        selection.clear();
        assert_eq!(selection.version(), initial + 2);

        selection.clear();
        assert_eq!(selection.version(), initial + 2);
    }

    #[test]
    fn clones_share_state() {
        let selection = Selection::new(SelectionMode::Multiple);
        let other_binding = selection.clone();

        selection.select_option(option("a"));
        assert!(other_binding.is_selected(&"a".into()));

        other_binding.clear();
        assert!(selection.is_empty());
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let selection = Selection::new(SelectionMode::Multiple);
        let mut receiver = selection.subscribe();

        selection.select_option(option("a"));
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow(), vec![option("a")]);
    }

    #[test]
    fn toggle_reports_resulting_state() {
        let selection = Selection::new(SelectionMode::Multiple);
        assert!(selection.toggle_option(option("a")));
        assert!(!selection.toggle_option(option("a")));
        assert!(selection.is_empty());
    }
}
