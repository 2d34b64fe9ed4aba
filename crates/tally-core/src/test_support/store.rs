use crate::{
    error::InternalError,
    key::OwnerKey,
    model::table::TableRef,
    row::RowSnapshot,
    sql::{
        aggregate::{AggregateExpr, AggregateSelect},
        join::{JoinClause, JoinCond},
        update::{ColumnWrite, UpdateStatement},
    },
    store::{AggregateRow, DeferredHook, Store},
    value::ScalarValue,
};
use chrono::Utc;
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
};

type Row = BTreeMap<String, ScalarValue>;

///
/// MemStore
///
/// In-memory host store that interprets the engine's typed statements the
/// way a SQL database would: COALESCE arithmetic for deltas, grouped
/// left-join counting for aggregate selects. Keeps a statement log so tests
/// can assert exactly how much SQL a path produced.
///

#[derive(Debug, Default)]
pub struct MemStore {
    tables: RefCell<BTreeMap<String, Vec<Row>>>,
    statements: RefCell<Vec<UpdateStatement>>,
    fail_next_batch: Cell<bool>,
}

impl MemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, table: &str, row: RowSnapshot) {
        self.tables
            .borrow_mut()
            .entry(table.to_string())
            .or_default()
            .push(row.attrs().clone());
    }

    /// Read one column of the row with `id` = `id`.
    #[must_use]
    pub fn column(&self, table: &str, id: i64, column: &str) -> ScalarValue {
        self.tables
            .borrow()
            .get(table)
            .and_then(|rows| {
                rows.iter()
                    .find(|row| row.get("id") == Some(&ScalarValue::Int(id)))
            })
            .and_then(|row| row.get(column).cloned())
            .unwrap_or(ScalarValue::Null)
    }

    /// Overwrite one column directly, bypassing the engine (drift injection).
    pub fn set_column(&self, table: &str, id: i64, column: &str, value: ScalarValue) {
        if let Some(rows) = self.tables.borrow_mut().get_mut(table) {
            for row in rows.iter_mut() {
                if row.get("id") == Some(&ScalarValue::Int(id)) {
                    row.insert(column.to_string(), value.clone());
                }
            }
        }
    }

    /// Delete rows matching `id`, bypassing the engine.
    pub fn delete(&self, table: &str, id: i64) {
        if let Some(rows) = self.tables.borrow_mut().get_mut(table) {
            rows.retain(|row| row.get("id") != Some(&ScalarValue::Int(id)));
        }
    }

    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.statements.borrow().len()
    }

    #[must_use]
    pub fn statements(&self) -> Vec<UpdateStatement> {
        self.statements.borrow().clone()
    }

    /// Make the next `execute_batch` call fail without applying anything.
    pub fn fail_next_batch(&self) {
        self.fail_next_batch.set(true);
    }

    fn key_matches(row: &Row, key: &OwnerKey) -> bool {
        key.iter().all(|(column, value)| {
            !value.is_null() && row.get(column.as_str()) == Some(value)
        })
    }

    fn apply_update(&self, statement: &UpdateStatement) -> u64 {
        let mut tables = self.tables.borrow_mut();
        let Some(rows) = tables.get_mut(&statement.table.name) else {
            return 0;
        };

        let mut affected = 0;
        for row in rows.iter_mut() {
            if !Self::key_matches(row, &statement.key) {
                continue;
            }
            affected += 1;
            for (column, write) in &statement.writes {
                match write {
                    ColumnWrite::Delta(delta) => {
                        let base = row
                            .get(column)
                            .and_then(|v| v.as_numeric(delta.kind()))
                            .unwrap_or_else(|| delta.kind().zero());
                        row.insert(column.clone(), (base + *delta).to_scalar());
                    }
                    ColumnWrite::Set(value) => {
                        row.insert(column.clone(), value.clone());
                    }
                }
            }
            for column in &statement.touches {
                row.insert(column.clone(), ScalarValue::Timestamp(Utc::now()));
            }
        }
        affected
    }

    fn resolve_ref<'t>(
        tuple: &'t BTreeMap<String, Row>,
        candidate_alias: &str,
        candidate: &'t Row,
        alias: &str,
        column: &str,
    ) -> ScalarValue {
        let row = if alias == candidate_alias {
            Some(candidate)
        } else {
            tuple.get(alias)
        };
        row.and_then(|r| r.get(column).cloned())
            .unwrap_or(ScalarValue::Null)
    }

    fn cond_holds(
        tuple: &BTreeMap<String, Row>,
        candidate_alias: &str,
        candidate: &Row,
        cond: &JoinCond,
    ) -> bool {
        match cond {
            JoinCond::KeyEq {
                left_alias,
                left_column,
                right_alias,
                right_column,
            } => {
                let left =
                    Self::resolve_ref(tuple, candidate_alias, candidate, left_alias, left_column);
                let right =
                    Self::resolve_ref(tuple, candidate_alias, candidate, right_alias, right_column);
                !left.is_null() && !right.is_null() && left == right
            }
            JoinCond::ColEq {
                alias,
                column,
                value,
            } => Self::resolve_ref(tuple, candidate_alias, candidate, alias, column) == *value,
            JoinCond::IsNull { alias, column } => {
                Self::resolve_ref(tuple, candidate_alias, candidate, alias, column).is_null()
            }
            JoinCond::Pred { alias, predicate } => {
                let alias = alias.clone();
                let tuple_ref = tuple;
                predicate.matches(&move |column: &str| {
                    Self::resolve_ref(tuple_ref, candidate_alias, candidate, &alias, column)
                })
            }
        }
    }

    /// Expand one join level with inner-join semantics; dropped tuples are
    /// exactly the LEFT JOIN rows a COUNT over the counting key ignores.
    fn join_level(
        &self,
        tuples: Vec<BTreeMap<String, Row>>,
        clause: &JoinClause,
    ) -> Vec<BTreeMap<String, Row>> {
        let tables = self.tables.borrow();
        let rows = tables.get(&clause.table.name).cloned().unwrap_or_default();

        let mut next = Vec::new();
        for tuple in tuples {
            for candidate in &rows {
                if clause
                    .conds
                    .iter()
                    .all(|cond| Self::cond_holds(&tuple, &clause.alias, candidate, cond))
                {
                    let mut extended = tuple.clone();
                    extended.insert(clause.alias.clone(), candidate.clone());
                    next.push(extended);
                }
            }
        }
        next
    }
}

impl Store for MemStore {
    fn execute_update(&self, statement: &UpdateStatement) -> Result<u64, InternalError> {
        self.statements.borrow_mut().push(statement.clone());
        Ok(self.apply_update(statement))
    }

    fn execute_batch(&self, statements: &[UpdateStatement]) -> Result<(), InternalError> {
        if self.fail_next_batch.take() {
            return Err(InternalError::store("injected batch failure"));
        }
        for statement in statements {
            self.statements.borrow_mut().push(statement.clone());
            self.apply_update(statement);
        }
        Ok(())
    }

    fn select_aggregate(
        &self,
        query: &AggregateSelect,
    ) -> Result<Vec<AggregateRow>, InternalError> {
        let base_rows: Vec<Row> = {
            let tables = self.tables.borrow();
            tables
                .get(&query.path.base_table.name)
                .cloned()
                .unwrap_or_default()
        };

        let range_column = &query.owner_key_columns[0];
        let empty = BTreeMap::new();
        let mut groups: Vec<(Vec<ScalarValue>, Row)> = base_rows
            .into_iter()
            .filter(|row| {
                query
                    .path
                    .base_conds
                    .iter()
                    .all(|cond| Self::cond_holds(&empty, &query.path.base_alias, row, cond))
            })
            .filter(|row| {
                let id = row.get(range_column).cloned().unwrap_or(ScalarValue::Null);
                query.start.as_ref().is_none_or(|s| &id >= s)
                    && query.finish.as_ref().is_none_or(|f| &id <= f)
            })
            .map(|row| {
                let key: Vec<ScalarValue> = query
                    .owner_key_columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(ScalarValue::Null))
                    .collect();
                (key, row)
            })
            .collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        let window: Vec<(Vec<ScalarValue>, Row)> = groups
            .into_iter()
            .skip(query.window.offset)
            .take(query.window.limit)
            .collect();

        let counting_alias = query.path.counting_alias().to_string();
        let mut out = Vec::with_capacity(window.len());

        for (key_values, base_row) in window {
            let mut tuples = vec![BTreeMap::from([(
                query.path.base_alias.clone(),
                base_row.clone(),
            )])];
            for clause in &query.path.joins {
                tuples = self.join_level(tuples, clause);
            }

            let computed = match &query.expr {
                AggregateExpr::CountRows { magnitude } => {
                    let count = tuples
                        .iter()
                        .filter(|t| {
                            t.get(&counting_alias)
                                .and_then(|row| row.get(&query.counting_pk))
                                .is_some_and(|v| !v.is_null())
                        })
                        .count();
                    magnitude.scale_by(count as i128)
                }
                AggregateExpr::SumColumn { column, kind } => {
                    let mut sum = kind.zero();
                    for tuple in &tuples {
                        if let Some(row) = tuple.get(&counting_alias) {
                            let value = row
                                .get(column)
                                .and_then(|v| v.as_numeric(*kind))
                                .unwrap_or_else(|| kind.zero());
                            sum += value;
                        }
                    }
                    sum
                }
            };

            let stored = base_row
                .get(&query.stored_column)
                .cloned()
                .unwrap_or(ScalarValue::Null);
            let key = OwnerKey::new(
                query
                    .owner_key_columns
                    .iter()
                    .cloned()
                    .zip(key_values)
                    .collect(),
            );
            out.push(AggregateRow {
                key,
                stored,
                computed,
            });
        }

        Ok(out)
    }

    fn load_row(
        &self,
        table: &TableRef,
        key: &OwnerKey,
    ) -> Result<Option<RowSnapshot>, InternalError> {
        let tables = self.tables.borrow();
        let row = tables
            .get(&table.name)
            .and_then(|rows| rows.iter().find(|row| Self::key_matches(row, key)));
        Ok(row.map(|attrs| RowSnapshot::new(attrs.clone())))
    }
}

///
/// RecordingHook
///
/// Deferred-execution hook that parks statements until the test "commits".
///

#[derive(Debug, Default)]
pub struct RecordingHook {
    pub parked: RefCell<Vec<UpdateStatement>>,
}

impl RecordingHook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every parked statement against the store, in arrival order.
    pub fn run_parked(&self, store: &dyn Store) -> Result<usize, InternalError> {
        let parked = self.parked.take();
        let count = parked.len();
        for statement in parked {
            store.execute_update(&statement)?;
        }
        Ok(count)
    }
}

impl DeferredHook for RecordingHook {
    fn after_commit(&self, statement: UpdateStatement) -> Result<(), InternalError> {
        self.parked.borrow_mut().push(statement);
        Ok(())
    }
}
