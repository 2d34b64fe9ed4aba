use crate::{
    error::{ErrorOrigin, InternalError},
    key::{OwnerKey, OwnerRef},
    model::{
        chain::{HopTarget, RelationHop},
        rule::CounterRule,
        table::EntityDef,
    },
    row::{AttrState, RowSnapshot},
    store::Store,
    value::ScalarValue,
};

/// Resolve the owner row a rule targets for one dependent instance.
///
/// Walks the chain left to right. `state` applies to the triggering row
/// only: prior foreign keys exist solely on the instance that changed;
/// intermediate rows loaded along the way are always read as they are now.
///
/// `Ok(None)` is the normal absent case (null foreign key somewhere, owner
/// subtype outside the allow-list, unknown discriminator value) and results
/// in no SQL at all.
pub fn resolve_owner(
    rule: &CounterRule,
    row: &RowSnapshot,
    state: AttrState,
    store: &dyn Store,
) -> Result<Option<OwnerRef>, InternalError> {
    if let Some(override_fn) = &rule.fk_override {
        let Some(key) = override_fn(row, state) else {
            return Ok(None);
        };
        let Some(owner) = final_owner_entity(rule, row, state)? else {
            return Ok(None);
        };
        if !key.is_complete() {
            return Ok(None);
        }
        return Ok(Some(OwnerRef::new(owner.table.clone(), key)));
    }

    let mut current = row.clone();
    let hops = &rule.chain.hops;

    for (index, hop) in hops.iter().enumerate() {
        let hop_state = if index == 0 { state } else { AttrState::Current };

        let Some(target) = hop_target_entity(rule, hop, &current, hop_state)? else {
            return Ok(None);
        };

        let key = hop_key(hop, &current, hop_state);
        if !key.is_complete() {
            return Ok(None);
        }

        if index == hops.len() - 1 {
            return Ok(Some(OwnerRef::new(target.table.clone(), key)));
        }

        // Intermediate hop: continue the walk from the referenced row.
        match store.load_row(&target.table, &key)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }

    Err(InternalError::internal(
        ErrorOrigin::Resolver,
        "relation chain walk exited without reaching a final hop",
    ))
}

/// Extract the composite key a hop points at, in key-pair order.
fn hop_key(hop: &RelationHop, row: &RowSnapshot, state: AttrState) -> OwnerKey {
    OwnerKey::new(
        hop.keys
            .iter()
            .map(|pair| (pair.primary_key.clone(), row.get(&pair.foreign_key, state)))
            .collect(),
    )
}

/// Concrete entity a hop lands on, reading the discriminator when the hop
/// is polymorphic.
fn hop_target_entity<'a>(
    rule: &'a CounterRule,
    hop: &'a RelationHop,
    row: &RowSnapshot,
    state: AttrState,
) -> Result<Option<&'a EntityDef>, InternalError> {
    match &hop.target {
        HopTarget::Entity(entity) => Ok(Some(entity)),
        HopTarget::Polymorphic {
            discriminator,
            owners,
        } => {
            let subtype = match row.get(discriminator, state) {
                ScalarValue::Text(value) => value,
                ScalarValue::Null => return Ok(None),
                other => {
                    return Err(InternalError::config(
                        ErrorOrigin::Resolver,
                        format!(
                            "discriminator '{discriminator}' must be text, got {other:?}"
                        ),
                    ));
                }
            };
            if !rule.allows_subtype(&subtype) {
                return Ok(None);
            }
            // Unknown discriminator values resolve to no owner, same as a
            // null foreign key.
            Ok(owners.get(&subtype))
        }
    }
}

fn final_owner_entity<'a>(
    rule: &'a CounterRule,
    row: &RowSnapshot,
    state: AttrState,
) -> Result<Option<&'a EntityDef>, InternalError> {
    hop_target_entity(rule, rule.chain.final_hop(), row, state)
}

/// Whether the triggering mutation moved the first hop to a different
/// target: a foreign-key component or discriminator changed.
#[must_use]
pub fn association_changed(rule: &CounterRule, row: &RowSnapshot) -> bool {
    let first = &rule.chain.hops[0];
    let keys_changed = first
        .keys
        .iter()
        .any(|pair| row.changed(&pair.foreign_key));
    let discriminator_changed = match &first.target {
        HopTarget::Polymorphic { discriminator, .. } => row.changed(discriminator),
        HopTarget::Entity(_) => false,
    };
    keys_changed || discriminator_changed
}
