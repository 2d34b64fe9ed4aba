use crate::{
    engine::{
        aggregator::UpdateAggregator,
        resolver::{association_changed, resolve_owner},
    },
    error::{ErrorOrigin, InternalError},
    key::{OwnerKey, OwnerRef},
    model::{rule::CounterRule, table::TableRef},
    row::{AttrState, RowSnapshot},
    sql::update::UpdateStatement,
    store::{DeferredHook, Store},
    value::{DeltaValue, ScalarValue},
};
use std::collections::BTreeMap;
use tracing::debug;

///
/// Sign
///
/// Direction of a rule application: increment on create (or the new side of
/// an update), decrement on destroy (or the old side of an update).
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sign {
    Inc,
    Dec,
}

impl Sign {
    #[must_use]
    pub fn apply(self, magnitude: DeltaValue) -> DeltaValue {
        match self {
            Self::Inc => magnitude,
            Self::Dec => -magnitude,
        }
    }
}

///
/// NoopReason
///
/// Why a rule application produced no SQL. All of these are normal
/// outcomes, never errors.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoopReason {
    /// Chain resolved no owner (null FK, unknown or disallowed subtype).
    AbsentOwner,
    /// Target column resolved to none for this instance.
    NullColumn,
    /// Magnitude resolved to zero; elided before any statement is built.
    ZeroMagnitude,
}

///
/// DeltaOutcome
///

#[derive(Clone, Debug, PartialEq)]
pub enum DeltaOutcome {
    /// Immediate atomic UPDATE executed.
    Applied(UpdateStatement),
    /// Handed to the active aggregation scope.
    Remembered,
    /// Routed to the host's post-commit hook.
    Deferred(UpdateStatement),
    Noop(NoopReason),
}

impl DeltaOutcome {
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::Noop(_))
    }
}

///
/// LoadedOwner
///
/// An owner object the caller already holds in memory and wants kept in
/// step with the store. Best-effort cache refresh only; the store stays
/// authoritative.
///

#[derive(Clone, Debug)]
pub struct LoadedOwner {
    pub table: TableRef,
    pub key: OwnerKey,
    pub attrs: BTreeMap<String, ScalarValue>,
}

///
/// ApplyCtx
///
/// Everything one delta application may touch. Built per unit of work and
/// threaded through every call; there is no ambient state.
///

pub struct ApplyCtx<'a> {
    pub store: &'a dyn Store,
    /// When set, deltas are coalesced here instead of issuing SQL.
    pub aggregator: Option<&'a mut UpdateAggregator>,
    pub deferred: Option<&'a dyn DeferredHook>,
    pub mirror: Option<&'a mut LoadedOwner>,
}

impl<'a> ApplyCtx<'a> {
    #[must_use]
    pub fn immediate(store: &'a dyn Store) -> Self {
        Self {
            store,
            aggregator: None,
            deferred: None,
            mirror: None,
        }
    }

    #[must_use]
    pub fn aggregated(store: &'a dyn Store, aggregator: &'a mut UpdateAggregator) -> Self {
        Self {
            store,
            aggregator: Some(aggregator),
            deferred: None,
            mirror: None,
        }
    }
}

/// Apply one signed rule to one dependent instance.
///
/// The pipeline: resolve owner, resolve column, resolve magnitude, then
/// route — aggregator if a scope is active, the deferred hook for deferred
/// rules, otherwise one immediate arithmetic UPDATE. Zero magnitude exits
/// before any statement exists, so it provably costs no SQL.
pub fn apply(
    rule: &CounterRule,
    row: &RowSnapshot,
    sign: Sign,
    state: AttrState,
    ctx: &mut ApplyCtx<'_>,
) -> Result<DeltaOutcome, InternalError> {
    let Some(owner) = resolve_owner(rule, row, state, ctx.store)? else {
        return Ok(DeltaOutcome::Noop(NoopReason::AbsentOwner));
    };

    let Some(column) = rule.column.resolve(row, state) else {
        return Ok(DeltaOutcome::Noop(NoopReason::NullColumn));
    };

    let magnitude = rule.magnitude.resolve(row, state);
    if magnitude.is_zero() {
        return Ok(DeltaOutcome::Noop(NoopReason::ZeroMagnitude));
    }
    let delta = sign.apply(magnitude);

    debug!(
        owner = %owner.key,
        table = %owner.table,
        column,
        ?delta,
        "applying counter delta"
    );

    mirror_if_safe(rule, row, state, &owner, &column, delta, ctx.mirror.as_deref_mut());

    let touches = rule
        .touch
        .as_ref()
        .map(|t| t.columns.clone())
        .unwrap_or_default();

    if let Some(aggregator) = ctx.aggregator.as_deref_mut() {
        aggregator.remember(owner.clone(), &column, delta);
        if !touches.is_empty() {
            aggregator.remember_touch(owner, &touches);
        }
        return Ok(DeltaOutcome::Remembered);
    }

    let statement = UpdateStatement::new(owner.table, owner.key)
        .delta(column, delta)
        .touching(&touches);

    if rule.deferred {
        let Some(hook) = ctx.deferred else {
            return Err(InternalError::config(
                ErrorOrigin::Delta,
                format!(
                    "rule '{}' requests deferred execution but no hook was supplied",
                    rule.chain.path()
                ),
            ));
        };
        hook.after_commit(statement.clone())?;
        return Ok(DeltaOutcome::Deferred(statement));
    }

    ctx.store.execute_update(&statement)?;
    Ok(DeltaOutcome::Applied(statement))
}

/// Mirror the delta onto a loaded owner object when that is provably safe.
///
/// Safe means: the loaded object is the row being updated, and the
/// dependent still points at it. Decrementing a prior owner after the
/// foreign key moved elsewhere must not touch the loaded object, because
/// the in-memory association no longer refers to that row.
fn mirror_if_safe(
    rule: &CounterRule,
    row: &RowSnapshot,
    state: AttrState,
    owner: &OwnerRef,
    column: &str,
    delta: DeltaValue,
    mirror: Option<&mut LoadedOwner>,
) {
    let Some(loaded) = mirror else { return };
    if loaded.table != owner.table || loaded.key != owner.key {
        return;
    }
    if state == AttrState::Prior && association_changed(rule, row) {
        return;
    }

    let current = loaded
        .attrs
        .get(column)
        .cloned()
        .unwrap_or(ScalarValue::Null);
    let base = current
        .as_numeric(delta.kind())
        .unwrap_or_else(|| delta.kind().zero());
    loaded.attrs.insert(column.to_string(), (base + delta).to_scalar());
}
