use crate::{
    engine::{
        delta::{self, ApplyCtx, DeltaOutcome, Sign},
        resolver::association_changed,
    },
    error::InternalError,
    model::rule::CounterRule,
    registry::RuleRegistry,
    row::{AttrState, RowSnapshot},
};
use std::sync::Arc;

///
/// Engine
///
/// Event-facing entry point: maps create/update/destroy events on a
/// dependent entity onto signed rule applications. Holds only the immutable
/// rule registry; all per-call state rides in the [`ApplyCtx`].
///

#[derive(Debug, Default)]
pub struct Engine {
    registry: RuleRegistry,
}

impl Engine {
    #[must_use]
    pub const fn new(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// A dependent row was created: increment every matching rule.
    pub fn created(
        &self,
        entity: &str,
        row: &RowSnapshot,
        ctx: &mut ApplyCtx<'_>,
    ) -> Result<Vec<DeltaOutcome>, InternalError> {
        self.registry
            .rules_for_dependent(entity)
            .iter()
            .map(|rule| delta::apply(rule, row, Sign::Inc, AttrState::Current, ctx))
            .collect()
    }

    /// A dependent row was destroyed: decrement using its current values.
    pub fn destroyed(
        &self,
        entity: &str,
        row: &RowSnapshot,
        ctx: &mut ApplyCtx<'_>,
    ) -> Result<Vec<DeltaOutcome>, InternalError> {
        self.registry
            .rules_for_dependent(entity)
            .iter()
            .map(|rule| delta::apply(rule, row, Sign::Dec, AttrState::Current, ctx))
            .collect()
    }

    /// A dependent row was updated. Each affected rule splits into a
    /// prior-state decrement and a current-state increment, which together
    /// move the magnitude from the old (owner, column) to the new one. An
    /// association change therefore conserves the sum across both owners.
    pub fn updated(
        &self,
        entity: &str,
        row: &RowSnapshot,
        ctx: &mut ApplyCtx<'_>,
    ) -> Result<Vec<DeltaOutcome>, InternalError> {
        let changed = row.changed_columns();
        let mut outcomes = Vec::new();

        for rule in self.registry.rules_for_dependent(entity) {
            if !rule.relevant_columns().touched_by(&changed) {
                continue;
            }
            if update_is_neutral(&rule, row) {
                continue;
            }

            outcomes.push(delta::apply(&rule, row, Sign::Dec, AttrState::Prior, ctx)?);
            outcomes.push(delta::apply(&rule, row, Sign::Inc, AttrState::Current, ctx)?);
        }

        Ok(outcomes)
    }

    /// Rules triggered by mutations of the given dependent entity.
    #[must_use]
    pub fn rules_for(&self, entity: &str) -> Vec<Arc<CounterRule>> {
        self.registry.rules_for_dependent(entity)
    }
}

/// True when the old and new side of an update would write the same
/// (owner, column, magnitude) — nothing to move, so no SQL at all.
fn update_is_neutral(rule: &CounterRule, row: &RowSnapshot) -> bool {
    if association_changed(rule, row) {
        return false;
    }
    let prior_column = rule.column.resolve(row, AttrState::Prior);
    let current_column = rule.column.resolve(row, AttrState::Current);
    if prior_column != current_column {
        return false;
    }
    rule.magnitude.resolve(row, AttrState::Prior)
        == rule.magnitude.resolve(row, AttrState::Current)
}
