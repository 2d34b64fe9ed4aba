use crate::{
    sql::{
        ident::{qualify, quote},
        join::{JoinCond, JoinPath},
    },
    value::{DeltaValue, NumericKind, ScalarValue},
};

/// Default reconciliation batch size.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

///
/// AggregateExpr
///
/// What gets computed per owner group.
///

#[derive(Clone, Debug, PartialEq)]
pub enum AggregateExpr {
    /// Unit/constant counting: `COUNT(counting.pk) × magnitude`.
    CountRows { magnitude: DeltaValue },
    /// Delta-column mode: `SUM(COALESCE(counting.col, 0))`.
    SumColumn { column: String, kind: NumericKind },
}

impl AggregateExpr {
    #[must_use]
    pub const fn kind(&self) -> NumericKind {
        match self {
            Self::CountRows { magnitude } => magnitude.kind(),
            Self::SumColumn { kind, .. } => *kind,
        }
    }
}

///
/// BatchWindow
///
/// Paging window over owner groups, ordered by the owner key.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatchWindow {
    pub limit: usize,
    pub offset: usize,
}

///
/// AggregateSelect
///
/// The grouped recompute query for one (rule, column, owner subtype) pass:
/// true aggregate and currently stored value side by side, grouped by owner
/// key, in a bounded batch window.
///

#[derive(Clone, Debug, PartialEq)]
pub struct AggregateSelect {
    pub path: JoinPath,
    /// Owner key columns on the base alias; group-by and result key.
    pub owner_key_columns: Vec<String>,
    /// Owner column currently storing the aggregate.
    pub stored_column: String,
    /// Primary key of the counting table, so LEFT JOIN misses count as zero.
    pub counting_pk: String,
    pub expr: AggregateExpr,
    /// Inclusive id range on the first owner key column.
    pub start: Option<ScalarValue>,
    pub finish: Option<ScalarValue>,
    pub window: BatchWindow,
}

impl AggregateSelect {
    #[must_use]
    pub fn to_sql(&self) -> String {
        let base = &self.path.base_alias;
        let counting = self.path.counting_alias();

        let mut select_cols: Vec<String> = self
            .owner_key_columns
            .iter()
            .map(|column| qualify(base, column))
            .collect();
        select_cols.push(qualify(base, &self.stored_column));
        select_cols.push(match &self.expr {
            AggregateExpr::CountRows { magnitude } => format!(
                "COUNT({}) * {}",
                qualify(counting, &self.counting_pk),
                magnitude.to_sql_literal()
            ),
            AggregateExpr::SumColumn { column, kind } => format!(
                "COALESCE(SUM(COALESCE({}, {zero})), {zero})",
                qualify(counting, column),
                zero = kind.sql_zero()
            ),
        });

        let mut conditions: Vec<String> =
            self.path.base_conds.iter().map(JoinCond::to_sql).collect();
        let range_column = qualify(base, &self.owner_key_columns[0]);
        if let Some(start) = &self.start {
            conditions.push(format!("{range_column} >= {}", start.to_sql_literal()));
        }
        if let Some(finish) = &self.finish {
            conditions.push(format!("{range_column} <= {}", finish.to_sql_literal()));
        }

        let mut group_by: Vec<String> = self
            .owner_key_columns
            .iter()
            .map(|column| qualify(base, column))
            .collect();
        group_by.push(qualify(base, &self.stored_column));

        let order_by: Vec<String> = self
            .owner_key_columns
            .iter()
            .map(|column| qualify(base, column))
            .collect();

        let mut sql = format!(
            "SELECT {} {}",
            select_cols.join(", "),
            self.path.to_sql_from()
        );
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(&format!(
            " GROUP BY {} ORDER BY {} LIMIT {} OFFSET {}",
            group_by.join(", "),
            order_by.join(", "),
            self.window.limit,
            self.window.offset
        ));
        sql
    }

    /// Quoted table-qualified name of the stored column, for diagnostics.
    #[must_use]
    pub fn stored_column_sql(&self) -> String {
        format!(
            "{}.{}",
            quote(&self.path.base_table.name),
            quote(&self.stored_column)
        )
    }
}
