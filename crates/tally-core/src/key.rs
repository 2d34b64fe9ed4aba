use crate::{model::table::TableRef, value::ScalarValue};
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// OwnerKey
///
/// Primary-key identity of one owner row, as an ordered list of
/// `(column, value)` pairs. Composite keys stay one key: every downstream
/// lookup matches all components together, never as independent filters.
///

#[derive(Clone, Debug, Deref, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct OwnerKey(Vec<(String, ScalarValue)>);

impl OwnerKey {
    #[must_use]
    pub fn new(parts: Vec<(String, ScalarValue)>) -> Self {
        Self(parts)
    }

    /// Single-column convenience constructor.
    #[must_use]
    pub fn single(column: impl Into<String>, value: ScalarValue) -> Self {
        Self(vec![(column.into(), value)])
    }

    /// A key is resolvable only when every component is non-null.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|(_, v)| !v.is_null())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &ScalarValue> {
        self.0.iter().map(|(_, v)| v)
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (column, value) in &self.0 {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            write!(f, "{column}={}", value.to_sql_literal())?;
        }
        Ok(())
    }
}

///
/// OwnerRef
///
/// A fully resolved owner target: which table, which row.
///

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct OwnerRef {
    pub table: TableRef,
    pub key: OwnerKey,
}

impl OwnerRef {
    #[must_use]
    pub const fn new(table: TableRef, key: OwnerKey) -> Self {
        Self { table, key }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_component_makes_key_incomplete() {
        let key = OwnerKey::new(vec![
            ("tenant_id".into(), ScalarValue::Int(1)),
            ("id".into(), ScalarValue::Null),
        ]);
        assert!(!key.is_complete());
    }

    #[test]
    fn display_is_column_qualified() {
        let key = OwnerKey::single("id", ScalarValue::Int(9));
        assert_eq!(key.to_string(), "id=9");
    }
}
