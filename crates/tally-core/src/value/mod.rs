mod numeric;

pub use numeric::{DeltaValue, NumericKind};

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

///
/// ScalarValue
///
/// Attribute and key values exchanged with the host store.
///
/// Deliberately smaller than a full persistence value model: only the types
/// that appear as foreign keys, discriminators, aggregate columns, or
/// predicate operands. Floats are excluded so the type stays totally ordered
/// and usable as a map key.
///

#[derive(Clone, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ScalarValue {
    Bool(bool),
    Decimal(Decimal),
    Int(i64),
    Null,
    Text(String),
    Timestamp(DateTime<Utc>),
    Uint(u64),
}

impl ScalarValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Interpret this value as a signed numeric magnitude of the given kind.
    ///
    /// `Null` yields `None`; callers treat absent magnitudes as zero.
    /// Integer values are widened into decimals when the rule declares a
    /// decimal column, never the other way around.
    #[must_use]
    pub fn as_numeric(&self, kind: NumericKind) -> Option<DeltaValue> {
        let raw = match self {
            Self::Int(v) => DeltaValue::Int(i128::from(*v)),
            Self::Uint(v) => DeltaValue::Int(i128::from(*v)),
            Self::Decimal(d) => DeltaValue::Decimal(*d),
            _ => return None,
        };

        Some(raw.coerce(kind))
    }

    /// Render this value as a standalone SQL literal.
    #[must_use]
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::Decimal(d) => d.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Null => "NULL".to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Timestamp(ts) => {
                format!("TIMESTAMP '{}'", ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            Self::Uint(v) => v.to_string(),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}
