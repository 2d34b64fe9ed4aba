use crate::value::ScalarValue;
use std::collections::{BTreeMap, BTreeSet};

///
/// AttrState
///
/// Which side of a change to read: the row as it is now, or as it was
/// before the triggering mutation. Prior reads fall back to current values
/// for columns the mutation did not touch.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttrState {
    Current,
    Prior,
}

///
/// RowSnapshot
///
/// A dependent row as seen by one mutation event: current attribute values
/// plus the pre-change values of whatever columns changed. This is the
/// narrow change-tracking contract the host must satisfy; the engine never
/// asks for more history than one transition.
///

#[derive(Clone, Debug, Default)]
pub struct RowSnapshot {
    attrs: BTreeMap<String, ScalarValue>,
    prior: BTreeMap<String, ScalarValue>,
}

impl RowSnapshot {
    #[must_use]
    pub fn new(attrs: BTreeMap<String, ScalarValue>) -> Self {
        Self {
            attrs,
            prior: BTreeMap::new(),
        }
    }

    /// Builder-style attribute insertion for fixtures and hosts alike.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.attrs.insert(column.into(), value.into());
        self
    }

    /// Record the pre-change value of a changed column.
    #[must_use]
    pub fn with_prior(mut self, column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.prior.insert(column.into(), value.into());
        self
    }

    /// Current attribute values, in column order.
    #[must_use]
    pub const fn attrs(&self) -> &BTreeMap<String, ScalarValue> {
        &self.attrs
    }

    /// Read one attribute. Missing columns read as NULL.
    #[must_use]
    pub fn get(&self, column: &str, state: AttrState) -> ScalarValue {
        let current = || self.attrs.get(column).cloned().unwrap_or(ScalarValue::Null);
        match state {
            AttrState::Current => current(),
            AttrState::Prior => self.prior.get(column).cloned().unwrap_or_else(current),
        }
    }

    #[must_use]
    pub fn changed(&self, column: &str) -> bool {
        self.prior
            .get(column)
            .is_some_and(|prior| prior != &self.get(column, AttrState::Current))
    }

    /// Columns with a recorded pre-change value that actually differs.
    #[must_use]
    pub fn changed_columns(&self) -> BTreeSet<String> {
        self.prior
            .keys()
            .filter(|column| self.changed(column))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_falls_back_to_current_for_unchanged_columns() {
        let row = RowSnapshot::default()
            .with("status", "live")
            .with("post_id", 3)
            .with_prior("post_id", 2);

        assert_eq!(row.get("post_id", AttrState::Prior), ScalarValue::Int(2));
        assert_eq!(row.get("status", AttrState::Prior), "live".into());
        assert_eq!(row.get("missing", AttrState::Prior), ScalarValue::Null);
    }

    #[test]
    fn changed_requires_a_real_difference() {
        let row = RowSnapshot::default()
            .with("status", "live")
            .with_prior("status", "live")
            .with("score", 5)
            .with_prior("score", 4);

        assert!(!row.changed("status"));
        assert!(row.changed("score"));
        assert_eq!(
            row.changed_columns().into_iter().collect::<Vec<_>>(),
            vec!["score".to_string()]
        );
    }
}
