use crate::value::ScalarValue;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg};

///
/// NumericKind
///
/// Numeric type tag carried by every delta so zero elements and SQL casts
/// come out right for the target column. Monetary/decimal columns must not
/// be updated with bare integer arithmetic.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum NumericKind {
    Decimal,
    Integer,
}

impl NumericKind {
    /// The additive identity for this kind.
    #[must_use]
    pub const fn zero(self) -> DeltaValue {
        match self {
            Self::Decimal => DeltaValue::Decimal(Decimal::ZERO),
            Self::Integer => DeltaValue::Int(0),
        }
    }

    /// The zero element rendered for COALESCE on the target column.
    #[must_use]
    pub const fn sql_zero(self) -> &'static str {
        match self {
            Self::Decimal => "CAST(0 AS DECIMAL)",
            Self::Integer => "0",
        }
    }
}

///
/// DeltaValue
///
/// A signed numeric magnitude. Addition is total: mixing an integer delta
/// into a decimal accumulation widens to decimal, so accumulated sums are
/// associative and commutative regardless of arrival order.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DeltaValue {
    Decimal(Decimal),
    Int(i128),
}

impl DeltaValue {
    pub const ONE: Self = Self::Int(1);

    #[must_use]
    pub const fn kind(&self) -> NumericKind {
        match self {
            Self::Decimal(_) => NumericKind::Decimal,
            Self::Int(_) => NumericKind::Integer,
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Decimal(d) => d.is_zero(),
            Self::Int(v) => *v == 0,
        }
    }

    /// Widen to the requested kind. Narrowing a decimal is never performed.
    #[must_use]
    pub fn coerce(self, kind: NumericKind) -> Self {
        match (self, kind) {
            (Self::Int(v), NumericKind::Decimal) => {
                Self::Decimal(Decimal::from_i128_with_scale(v, 0))
            }
            (value, _) => value,
        }
    }

    /// Multiply by a row count during reconciliation (`COUNT(*) × magnitude`).
    #[must_use]
    pub fn scale_by(self, count: i128) -> Self {
        match self {
            Self::Decimal(d) => Self::Decimal(d * Decimal::from_i128_with_scale(count, 0)),
            Self::Int(v) => Self::Int(v * count),
        }
    }

    /// Render as a signed SQL literal, parenthesized when negative.
    #[must_use]
    pub fn to_sql_literal(&self) -> String {
        let rendered = match self {
            Self::Decimal(d) => d.to_string(),
            Self::Int(v) => v.to_string(),
        };
        if self.is_negative() {
            format!("({rendered})")
        } else {
            rendered
        }
    }

    /// Render the absolute value as a SQL literal; sign is rendered separately.
    #[must_use]
    pub fn abs_sql_literal(&self) -> String {
        match self {
            Self::Decimal(d) => d.abs().to_string(),
            Self::Int(v) => v.unsigned_abs().to_string(),
        }
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        match self {
            Self::Decimal(d) => d.is_sign_negative() && !d.is_zero(),
            Self::Int(v) => *v < 0,
        }
    }

    /// The stored-value form of this delta, for corrective assignments.
    #[must_use]
    pub fn to_scalar(self) -> ScalarValue {
        match self {
            Self::Decimal(d) => ScalarValue::Decimal(d),
            Self::Int(v) => {
                // Aggregates that overflow i64 are beyond any supported column.
                i64::try_from(v).map_or(ScalarValue::Decimal(Decimal::from_i128_with_scale(v, 0)), ScalarValue::Int)
            }
        }
    }

    /// Compare against a stored column value, treating NULL as zero.
    #[must_use]
    pub fn equals_stored(&self, stored: &ScalarValue) -> bool {
        match stored {
            ScalarValue::Null => self.is_zero(),
            other => other
                .as_numeric(self.kind())
                .is_some_and(|stored| stored == self.coerce(stored.kind())),
        }
    }
}

impl Add for DeltaValue {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => Self::Int(a + b),
            (Self::Decimal(a), Self::Decimal(b)) => Self::Decimal(a + b),
            (Self::Int(a), Self::Decimal(b)) => {
                Self::Decimal(Decimal::from_i128_with_scale(a, 0) + b)
            }
            (Self::Decimal(a), Self::Int(b)) => {
                Self::Decimal(a + Decimal::from_i128_with_scale(b, 0))
            }
        }
    }
}

impl AddAssign for DeltaValue {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Neg for DeltaValue {
    type Output = Self;

    fn neg(self) -> Self {
        match self {
            Self::Decimal(d) => Self::Decimal(-d),
            Self::Int(v) => Self::Int(-v),
        }
    }
}
