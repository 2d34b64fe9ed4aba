use crate::{
    engine::delta::ApplyCtx,
    error::InternalError,
    key::OwnerRef,
    sql::update::UpdateStatement,
    store::Store,
    value::DeltaValue,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

///
/// PendingDelta
///
/// Accumulated state for one owner row inside an aggregation scope.
///

#[derive(Clone, Debug, Default)]
pub struct PendingDelta {
    pub columns: BTreeMap<String, DeltaValue>,
    pub touches: BTreeSet<String>,
}

///
/// UpdateAggregator
///
/// Transaction-scoped accumulator that coalesces every delta bound for the
/// same owner row into one outgoing UPDATE. Deliberately not shareable
/// across units of work: one instance per scope, threaded through the
/// apply context, dropped after flush.
///
/// Accumulation is a plain algebraic sum, so remember order never changes
/// the flushed value; flush iterates a BTreeMap, so emission order is
/// deterministic but carries no semantics.
///

#[derive(Debug, Default)]
pub struct UpdateAggregator {
    pending: BTreeMap<OwnerRef, PendingDelta>,
}

impl UpdateAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate one delta for `(owner, column)`.
    pub fn remember(&mut self, owner: OwnerRef, column: &str, delta: DeltaValue) {
        let pending = self.pending.entry(owner).or_default();
        pending
            .columns
            .entry(column.to_string())
            .and_modify(|acc| *acc += delta)
            .or_insert(delta);
    }

    /// Record touch columns to stamp on flush, independent of net deltas.
    pub fn remember_touch(&mut self, owner: OwnerRef, columns: &[String]) {
        let pending = self.pending.entry(owner).or_default();
        pending.touches.extend(columns.iter().cloned());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of owner rows with pending state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Emit one UPDATE per owner row and clear the scope.
    ///
    /// Columns whose net delta cancelled to zero are dropped; an owner whose
    /// columns all cancelled still gets a touch-only statement if touches
    /// were requested, and is skipped entirely otherwise.
    pub fn flush(&mut self, store: &dyn Store) -> Result<Vec<UpdateStatement>, InternalError> {
        let pending = std::mem::take(&mut self.pending);
        let mut executed = Vec::new();

        for (owner, delta) in pending {
            let mut statement = UpdateStatement::new(owner.table, owner.key);
            for (column, net) in delta.columns {
                if !net.is_zero() {
                    statement = statement.delta(column, net);
                }
            }
            let touches: Vec<String> = delta.touches.into_iter().collect();
            statement = statement.touching(&touches);

            if statement.is_empty() {
                continue;
            }

            store.execute_update(&statement)?;
            executed.push(statement);
        }

        debug!(statements = executed.len(), "aggregation scope flushed");
        Ok(executed)
    }
}

/// Run `f` inside a fresh aggregation scope, flushing on success.
///
/// The scope lives exactly as long as the call: if `f` errors or panics the
/// aggregator is dropped with its pending deltas, so a failed unit of work
/// cannot leak partial state into a later one. Returns `f`'s value together
/// with the statements the flush executed.
pub fn with_aggregation<T>(
    store: &dyn Store,
    f: impl FnOnce(&mut ApplyCtx<'_>) -> Result<T, InternalError>,
) -> Result<(T, Vec<UpdateStatement>), InternalError> {
    let mut aggregator = UpdateAggregator::new();
    let value = {
        let mut ctx = ApplyCtx::aggregated(store, &mut aggregator);
        f(&mut ctx)?
    };
    let executed = aggregator.flush(store)?;
    Ok((value, executed))
}
