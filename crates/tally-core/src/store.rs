use crate::{
    error::InternalError,
    key::OwnerKey,
    model::table::TableRef,
    row::RowSnapshot,
    sql::{aggregate::AggregateSelect, update::UpdateStatement},
    value::{DeltaValue, ScalarValue},
};

///
/// AggregateRow
///
/// One owner group from a recompute query: its key, the value the column
/// currently stores, and the freshly computed aggregate.
///

#[derive(Clone, Debug, PartialEq)]
pub struct AggregateRow {
    pub key: OwnerKey,
    pub stored: ScalarValue,
    pub computed: DeltaValue,
}

///
/// Store
///
/// The narrow host-persistence contract. The engine owns neither query
/// execution nor transaction boundaries; it hands typed statements to the
/// host and trusts these semantics:
///
/// - `execute_update` runs inside whatever unit of work the host has open.
/// - `execute_batch` applies all statements atomically in one transaction;
///   one reconciliation batch maps to one call.
/// - No retries anywhere. Store failures propagate to the caller unmodified.
///

pub trait Store {
    fn execute_update(&self, statement: &UpdateStatement) -> Result<u64, InternalError>;

    fn execute_batch(&self, statements: &[UpdateStatement]) -> Result<(), InternalError>;

    fn select_aggregate(&self, query: &AggregateSelect)
    -> Result<Vec<AggregateRow>, InternalError>;

    /// Load one row by key, for walking intermediate hops of a chain.
    fn load_row(
        &self,
        table: &TableRef,
        key: &OwnerKey,
    ) -> Result<Option<RowSnapshot>, InternalError>;
}

///
/// DeferredHook
///
/// Post-commit scheduling supplied by the host for rules flagged as
/// deferred. The hook owns when (and on which connection) the statement
/// eventually runs.
///

pub trait DeferredHook {
    fn after_commit(&self, statement: UpdateStatement) -> Result<(), InternalError>;
}
