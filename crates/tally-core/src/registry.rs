use crate::{
    error::{ErrorOrigin, InternalError},
    model::rule::CounterRule,
};
use std::{collections::BTreeMap, sync::Arc};

///
/// RuleRegistry
///
/// All registered counter rules, indexed by dependent entity. Populated at
/// startup and immutable afterwards; configuration failures surface here,
/// never per instance.
///

#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<CounterRule>>,
    by_dependent: BTreeMap<String, Vec<usize>>,
}

impl RuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one rule. Chains are re-validated so hand-constructed rules
    /// get the same fatal checks as builder-made ones.
    pub fn register(&mut self, rule: CounterRule) -> Result<Arc<CounterRule>, InternalError> {
        rule.chain.validate().map_err(|err| {
            InternalError::config(
                ErrorOrigin::Registry,
                format!(
                    "rule '{}' on {}: {err}",
                    rule.chain.path(),
                    rule.dependent.entity_name
                ),
            )
        })?;

        let rule = Arc::new(rule);
        let index = self.rules.len();
        self.rules.push(Arc::clone(&rule));
        self.by_dependent
            .entry(rule.dependent.entity_name.clone())
            .or_default()
            .push(index);

        Ok(rule)
    }

    /// Rules triggered by mutations of the given dependent entity.
    #[must_use]
    pub fn rules_for_dependent(&self, entity_name: &str) -> Vec<Arc<CounterRule>> {
        self.by_dependent
            .get(entity_name)
            .map(|indexes| {
                indexes
                    .iter()
                    .map(|&i| Arc::clone(&self.rules[i]))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rules whose chain terminates at the given owner entity; the
    /// reconciliation entry point.
    #[must_use]
    pub fn rules_for_owner(&self, entity_name: &str) -> Vec<Arc<CounterRule>> {
        self.rules
            .iter()
            .filter(|rule| {
                rule.chain
                    .owner_entities()
                    .iter()
                    .any(|(_, owner)| owner.entity_name == entity_name)
            })
            .map(Arc::clone)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
