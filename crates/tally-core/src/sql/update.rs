use crate::{
    key::OwnerKey,
    model::table::TableRef,
    sql::ident::quote,
    value::{DeltaValue, ScalarValue},
};

///
/// ColumnWrite
///
/// One column assignment inside an UPDATE.
///

#[derive(Clone, Debug, PartialEq)]
pub enum ColumnWrite {
    /// Relative arithmetic: `col = COALESCE(col, 0) ± |delta|`.
    ///
    /// The arithmetic is evaluated store-side, which is the engine's sole
    /// concurrency-safety mechanism: concurrent writers serialize on the
    /// row and the additions commute.
    Delta(DeltaValue),
    /// Absolute assignment, used by reconciliation corrections.
    Set(ScalarValue),
}

///
/// UpdateStatement
///
/// A typed UPDATE against one owner row. Hosts may interpret the structure
/// directly or render it with [`UpdateStatement::to_sql`].
///

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateStatement {
    pub table: TableRef,
    pub key: OwnerKey,
    pub writes: Vec<(String, ColumnWrite)>,
    /// Timestamp columns assigned `CURRENT_TIMESTAMP`.
    pub touches: Vec<String>,
}

impl UpdateStatement {
    #[must_use]
    pub fn new(table: TableRef, key: OwnerKey) -> Self {
        Self {
            table,
            key,
            writes: Vec::new(),
            touches: Vec::new(),
        }
    }

    #[must_use]
    pub fn delta(mut self, column: impl Into<String>, delta: DeltaValue) -> Self {
        self.writes.push((column.into(), ColumnWrite::Delta(delta)));
        self
    }

    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: ScalarValue) -> Self {
        self.writes.push((column.into(), ColumnWrite::Set(value)));
        self
    }

    #[must_use]
    pub fn touching(mut self, columns: &[String]) -> Self {
        for column in columns {
            if !self.touches.contains(column) {
                self.touches.push(column.clone());
            }
        }
        self
    }

    /// A statement with nothing to write is not worth sending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.touches.is_empty()
    }

    #[must_use]
    pub fn to_sql(&self) -> String {
        let mut assignments = Vec::with_capacity(self.writes.len() + self.touches.len());

        for (column, write) in &self.writes {
            let quoted = quote(column);
            match write {
                ColumnWrite::Delta(delta) => {
                    let op = if delta.is_negative() { "-" } else { "+" };
                    assignments.push(format!(
                        "{quoted} = COALESCE({quoted}, {}) {op} {}",
                        delta.kind().sql_zero(),
                        delta.abs_sql_literal()
                    ));
                }
                ColumnWrite::Set(value) => {
                    assignments.push(format!("{quoted} = {}", value.to_sql_literal()));
                }
            }
        }
        for column in &self.touches {
            assignments.push(format!("{} = CURRENT_TIMESTAMP", quote(column)));
        }

        let conditions = self
            .key
            .iter()
            .map(|(column, value)| format!("{} = {}", quote(column), value.to_sql_literal()))
            .collect::<Vec<_>>()
            .join(" AND ");

        format!(
            "UPDATE {} SET {} WHERE {conditions}",
            quote(&self.table.name),
            assignments.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn key() -> OwnerKey {
        OwnerKey::single("id", ScalarValue::Int(7))
    }

    #[test]
    fn positive_delta_renders_coalesce_addition() {
        let stmt = UpdateStatement::new(TableRef::new("categories"), key())
            .delta("comments_count", DeltaValue::Int(3));

        assert_eq!(
            stmt.to_sql(),
            r#"UPDATE "categories" SET "comments_count" = COALESCE("comments_count", 0) + 3 WHERE "id" = 7"#
        );
    }

    #[test]
    fn negative_decimal_delta_renders_cast_zero_and_subtraction() {
        let stmt = UpdateStatement::new(TableRef::new("accounts"), key())
            .delta("balance_total", DeltaValue::Decimal(Decimal::new(-250, 2)));

        assert_eq!(
            stmt.to_sql(),
            r#"UPDATE "accounts" SET "balance_total" = COALESCE("balance_total", CAST(0 AS DECIMAL)) - 2.50 WHERE "id" = 7"#
        );
    }

    #[test]
    fn touch_and_set_share_one_statement() {
        let stmt = UpdateStatement::new(TableRef::new("categories"), key())
            .set("comments_count", ScalarValue::Int(2))
            .touching(&["updated_at".to_string()]);

        assert_eq!(
            stmt.to_sql(),
            r#"UPDATE "categories" SET "comments_count" = 2, "updated_at" = CURRENT_TIMESTAMP WHERE "id" = 7"#
        );
    }

    #[test]
    fn composite_keys_filter_on_every_component() {
        let key = OwnerKey::new(vec![
            ("tenant_id".into(), ScalarValue::Int(1)),
            ("id".into(), ScalarValue::Int(2)),
        ]);
        let stmt =
            UpdateStatement::new(TableRef::new("projects"), key).delta("tasks_count", DeltaValue::ONE);

        assert!(stmt.to_sql().ends_with(r#"WHERE "tenant_id" = 1 AND "id" = 2"#));
    }
}
