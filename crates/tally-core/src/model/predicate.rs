use crate::{sql::ident::qualify, value::ScalarValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    const fn sql_symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

///
/// ComparePredicate
///
/// One comparison against a column of the counted (dependent) table.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ComparePredicate {
    pub column: String,
    pub op: CompareOp,
    pub value: ScalarValue,
}

///
/// Predicate
///
/// Runtime condition attached to a counter rule. Evaluated two ways that
/// must agree: in memory against a row snapshot (incremental path) and as a
/// SQL fragment on the counting join (reconciliation path).
///
/// NULL operands follow SQL comparison semantics: every comparison against
/// NULL is false; only `IsNull` / `IsNotNull` observe nullness.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Predicate {
    True,
    False,
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare(ComparePredicate),
    InSet {
        column: String,
        values: Vec<ScalarValue>,
        negated: bool,
    },
    IsNull {
        column: String,
    },
    IsNotNull {
        column: String,
    },
}

impl Predicate {
    /// Shorthand for the common equality condition.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::Compare(ComparePredicate {
            column: column.into(),
            op: CompareOp::Eq,
            value: value.into(),
        })
    }

    /// Evaluate against a row, with `lookup` supplying column values.
    /// Missing columns read as NULL.
    pub fn matches(&self, lookup: &dyn Fn(&str) -> ScalarValue) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::And(parts) => parts.iter().all(|p| p.matches(lookup)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(lookup)),
            Self::Not(inner) => !inner.matches(lookup),
            Self::Compare(cmp) => {
                let lhs = lookup(&cmp.column);
                if lhs.is_null() || cmp.value.is_null() {
                    return false;
                }
                match cmp.op {
                    CompareOp::Eq => lhs == cmp.value,
                    CompareOp::Ne => lhs != cmp.value,
                    CompareOp::Lt => lhs < cmp.value,
                    CompareOp::Lte => lhs <= cmp.value,
                    CompareOp::Gt => lhs > cmp.value,
                    CompareOp::Gte => lhs >= cmp.value,
                }
            }
            Self::InSet {
                column,
                values,
                negated,
            } => {
                let lhs = lookup(column);
                if lhs.is_null() {
                    return false;
                }
                values.contains(&lhs) != *negated
            }
            Self::IsNull { column } => lookup(column).is_null(),
            Self::IsNotNull { column } => !lookup(column).is_null(),
        }
    }

    /// Render as a SQL condition with columns qualified by `alias`.
    #[must_use]
    pub fn to_sql(&self, alias: &str) -> String {
        match self {
            Self::True => "TRUE".to_string(),
            Self::False => "FALSE".to_string(),
            Self::And(parts) => Self::join_sql(parts, alias, " AND "),
            Self::Or(parts) => Self::join_sql(parts, alias, " OR "),
            Self::Not(inner) => format!("NOT ({})", inner.to_sql(alias)),
            Self::Compare(cmp) => format!(
                "{} {} {}",
                qualify(alias, &cmp.column),
                cmp.op.sql_symbol(),
                cmp.value.to_sql_literal()
            ),
            Self::InSet {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // `IN ()` is not valid SQL. Nothing belongs to an empty
                    // set; the negation holds for every non-null value,
                    // matching the null rule the in-memory check applies.
                    return if *negated {
                        format!("{} IS NOT NULL", qualify(alias, column))
                    } else {
                        "FALSE".to_string()
                    };
                }
                let list = values
                    .iter()
                    .map(ScalarValue::to_sql_literal)
                    .collect::<Vec<_>>()
                    .join(", ");
                let op = if *negated { "NOT IN" } else { "IN" };
                format!("{} {op} ({list})", qualify(alias, column))
            }
            Self::IsNull { column } => format!("{} IS NULL", qualify(alias, column)),
            Self::IsNotNull { column } => format!("{} IS NOT NULL", qualify(alias, column)),
        }
    }

    /// Collect every column this predicate reads, for change-relevance checks.
    pub fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::True | Self::False => {}
            Self::And(parts) | Self::Or(parts) => {
                for p in parts {
                    p.collect_columns(out);
                }
            }
            Self::Not(inner) => inner.collect_columns(out),
            Self::Compare(cmp) => {
                out.insert(cmp.column.clone());
            }
            Self::InSet { column, .. } | Self::IsNull { column } | Self::IsNotNull { column } => {
                out.insert(column.clone());
            }
        }
    }

    fn join_sql(parts: &[Self], alias: &str, separator: &str) -> String {
        if parts.is_empty() {
            // Empty AND is vacuously true, empty OR vacuously false.
            return if separator.contains("AND") { "TRUE" } else { "FALSE" }.to_string();
        }
        parts
            .iter()
            .map(|p| format!("({})", p.to_sql(alias)))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, score: i64) -> impl Fn(&str) -> ScalarValue {
        let status = status.to_string();
        move |column: &str| match column {
            "status" => ScalarValue::Text(status.clone()),
            "score" => ScalarValue::Int(score),
            _ => ScalarValue::Null,
        }
    }

    #[test]
    fn equality_matches_and_renders() {
        let pred = Predicate::eq("status", "live");

        assert!(pred.matches(&row("live", 0)));
        assert!(!pred.matches(&row("hidden", 0)));
        assert_eq!(pred.to_sql("comments"), r#""comments"."status" = 'live'"#);
    }

    #[test]
    fn null_comparisons_are_false_both_ways() {
        let pred = Predicate::eq("missing", "x");
        assert!(!pred.matches(&row("live", 0)));

        let not_pred = Predicate::Not(Box::new(pred));
        // NOT lifts the in-memory miss; SQL callers must use IS NULL instead.
        assert!(not_pred.matches(&row("live", 0)));
    }

    #[test]
    fn conjunction_requires_all_parts() {
        let pred = Predicate::And(vec![
            Predicate::eq("status", "live"),
            Predicate::Compare(ComparePredicate {
                column: "score".into(),
                op: CompareOp::Gte,
                value: ScalarValue::Int(10),
            }),
        ]);

        assert!(pred.matches(&row("live", 10)));
        assert!(!pred.matches(&row("live", 9)));
        assert_eq!(
            pred.to_sql("c"),
            r#"("c"."status" = 'live') AND ("c"."score" >= 10)"#
        );
    }

    #[test]
    fn in_set_honors_negation() {
        let pred = Predicate::InSet {
            column: "status".into(),
            values: vec!["live".into(), "pinned".into()],
            negated: true,
        };

        assert!(!pred.matches(&row("live", 0)));
        assert!(pred.matches(&row("hidden", 0)));
        assert_eq!(
            pred.to_sql("c"),
            r#""c"."status" NOT IN ('live', 'pinned')"#
        );
    }

    #[test]
    fn empty_set_renders_valid_sql_and_agrees_with_matching() {
        let none = Predicate::InSet {
            column: "status".into(),
            values: vec![],
            negated: false,
        };
        assert_eq!(none.to_sql("c"), "FALSE");
        assert!(!none.matches(&row("live", 0)));

        let all = Predicate::InSet {
            column: "status".into(),
            values: vec![],
            negated: true,
        };
        assert_eq!(all.to_sql("c"), r#""c"."status" IS NOT NULL"#);
        assert!(all.matches(&row("live", 0)));
        // Null never satisfies a set membership test, negated or not.
        assert!(!all.matches(&|_: &str| ScalarValue::Null));
    }

    #[test]
    fn column_collection_walks_nesting() {
        let pred = Predicate::Or(vec![
            Predicate::eq("status", "live"),
            Predicate::IsNull {
                column: "parent_id".into(),
            },
        ]);

        let mut cols = BTreeSet::new();
        pred.collect_columns(&mut cols);
        assert_eq!(
            cols.into_iter().collect::<Vec<_>>(),
            vec!["parent_id".to_string(), "status".to_string()]
        );
    }
}
