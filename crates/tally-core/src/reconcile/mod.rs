
use crate::{
    error::{ErrorOrigin, InternalError},
    key::OwnerKey,
    model::{
        predicate::Predicate,
        rule::{ColumnTarget, CounterRule, MagnitudeSource},
        table::EntityDef,
    },
    registry::RuleRegistry,
    sql::{
        aggregate::{AggregateExpr, AggregateSelect, BatchWindow, DEFAULT_BATCH_SIZE},
        join::{JoinBuildSpec, build_join_path},
        update::UpdateStatement,
    },
    store::Store,
    value::{DeltaValue, ScalarValue},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

///
/// ReconcileTouch
///
/// Whether corrective updates also stamp timestamp columns.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ReconcileTouch {
    /// Corrections write only the aggregate column.
    #[default]
    Off,
    /// Stamp whatever the rule's touch spec names.
    Rule,
    /// Stamp an explicit column list, overriding the rule.
    Columns(Vec<String>),
}

///
/// ReconcileOptions
///

#[derive(Clone, Debug)]
pub struct ReconcileOptions {
    pub batch_size: usize,
    /// Inclusive owner-id range, on the first primary-key column.
    pub start: Option<ScalarValue>,
    pub finish: Option<ScalarValue>,
    /// Relation-path filters; empty `only` means all.
    pub only: Vec<String>,
    pub exclude: Vec<String>,
    /// Restrict to one aggregate column of conditional rules.
    pub column: Option<String>,
    /// Restrict polymorphic scans to these owner subtypes.
    pub owner_subtypes: Option<Vec<String>>,
    /// Skip rules the bulk recompute cannot express instead of failing.
    pub skip_unsupported: bool,
    pub touch: ReconcileTouch,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            start: None,
            finish: None,
            only: Vec::new(),
            exclude: Vec::new(),
            column: None,
            owner_subtypes: None,
            skip_unsupported: false,
            touch: ReconcileTouch::Off,
        }
    }
}

///
/// ReconciliationRecord
///
/// One detected-and-corrected drift. Emitted only when the stored value
/// truly differs from the recomputed aggregate, so a clean second run
/// yields an empty list.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReconciliationRecord {
    pub entity: String,
    pub key: OwnerKey,
    pub column: String,
    pub wrong: ScalarValue,
    pub right: ScalarValue,
}

/// Recompute every aggregate owned by `owner_entity` and correct drift.
///
/// Unsupported rule shapes are decided up front, before the first batch:
/// with `skip_unsupported` they are skipped with a warning, otherwise the
/// run fails without having scanned anything. Each batch's corrections go
/// through one atomic store call, independent of other batches — a failure
/// mid-run never undoes earlier batches.
pub fn reconcile(
    registry: &RuleRegistry,
    owner_entity: &str,
    store: &dyn Store,
    options: &ReconcileOptions,
) -> Result<Vec<ReconciliationRecord>, InternalError> {
    let rules = select_rules(registry, owner_entity, options);
    let supported = triage(&rules, options)?;

    let mut records = Vec::new();
    for rule in supported {
        for (subtype, owner) in owner_passes(&rule, owner_entity, options) {
            for (predicate, column) in column_passes(&rule, options) {
                run_passes(
                    &rule,
                    owner,
                    subtype.as_deref(),
                    predicate.as_ref(),
                    &column,
                    store,
                    options,
                    &mut records,
                )?;
            }
        }
    }

    Ok(records)
}

fn select_rules(
    registry: &RuleRegistry,
    owner_entity: &str,
    options: &ReconcileOptions,
) -> Vec<Arc<CounterRule>> {
    registry
        .rules_for_owner(owner_entity)
        .into_iter()
        .filter(|rule| {
            let path = rule.path();
            let included = options.only.is_empty() || options.only.contains(&path);
            included && !options.exclude.contains(&path)
        })
        .collect()
}

/// Decide supportability for every selected rule before scanning anything.
fn triage(
    rules: &[Arc<CounterRule>],
    options: &ReconcileOptions,
) -> Result<Vec<Arc<CounterRule>>, InternalError> {
    let mut supported = Vec::with_capacity(rules.len());

    for rule in rules {
        let reason = unsupported_reason(rule);
        match reason {
            None => supported.push(Arc::clone(rule)),
            Some(reason) if options.skip_unsupported => {
                warn!(rule = rule.path(), reason, "skipping unsupported rule");
            }
            Some(reason) => {
                return Err(InternalError::unsupported(
                    ErrorOrigin::Reconcile,
                    format!("rule '{}' cannot be reconciled in bulk: {reason}", rule.path()),
                ));
            }
        }
    }

    Ok(supported)
}

fn unsupported_reason(rule: &CounterRule) -> Option<&'static str> {
    if rule.fk_override.is_some() {
        return Some("foreign-key override function");
    }
    if matches!(rule.column, ColumnTarget::Selector(_)) {
        return Some("procedural column selector without a conditional map");
    }
    if matches!(rule.magnitude, MagnitudeSource::Selector { .. }) {
        return Some("procedural magnitude function");
    }
    None
}

/// One pass per candidate owner subtype; exactly one for plain chains.
fn owner_passes<'r>(
    rule: &'r CounterRule,
    owner_entity: &str,
    options: &ReconcileOptions,
) -> Vec<(Option<String>, &'r EntityDef)> {
    rule.chain
        .owner_entities()
        .into_iter()
        .filter(|(_, entity)| entity.entity_name == owner_entity)
        .filter(|(subtype, _)| match subtype {
            None => true,
            Some(s) => {
                rule.allows_subtype(s)
                    && options
                        .owner_subtypes
                        .as_ref()
                        .is_none_or(|wanted| wanted.contains(s))
            }
        })
        .collect()
}

/// One pass per declared column; conditional rules carry their predicate.
///
/// Conditional arms resolve first-match-wins on the incremental path, so the
/// pass for an arm must count only rows that fail every earlier arm.
/// Otherwise a row satisfying two arms reconciles into both columns while
/// the incremental path credited exactly one.
fn column_passes(
    rule: &CounterRule,
    options: &ReconcileOptions,
) -> Vec<(Option<Predicate>, String)> {
    let passes: Vec<(Option<Predicate>, String)> = match &rule.column {
        ColumnTarget::Static(column) => vec![(None, column.clone())],
        ColumnTarget::Conditional(arms) => arms
            .iter()
            .enumerate()
            .map(|(index, (predicate, column))| {
                let guard = if index == 0 {
                    predicate.clone()
                } else {
                    let mut parts = Vec::with_capacity(index + 1);
                    parts.push(predicate.clone());
                    for (earlier, _) in &arms[..index] {
                        parts.push(Predicate::Not(Box::new(earlier.clone())));
                    }
                    Predicate::And(parts)
                };
                (Some(guard), column.clone())
            })
            .collect(),
        // Filtered out during triage.
        ColumnTarget::Selector(_) => vec![],
    };

    passes
        .into_iter()
        .filter(|(_, column)| options.column.as_ref().is_none_or(|wanted| wanted == column))
        .collect()
}

#[expect(clippy::too_many_arguments)]
fn run_passes(
    rule: &CounterRule,
    owner: &EntityDef,
    subtype: Option<&str>,
    predicate: Option<&Predicate>,
    column: &str,
    store: &dyn Store,
    options: &ReconcileOptions,
    records: &mut Vec<ReconciliationRecord>,
) -> Result<(), InternalError> {
    let path = build_join_path(&JoinBuildSpec {
        chain: &rule.chain,
        dependent: &rule.dependent,
        owner,
        owner_subtype: subtype,
        predicate,
    })?;

    let expr = match &rule.magnitude {
        MagnitudeSource::Unit => AggregateExpr::CountRows {
            magnitude: DeltaValue::ONE,
        },
        MagnitudeSource::Const(magnitude) => AggregateExpr::CountRows {
            magnitude: *magnitude,
        },
        MagnitudeSource::Column { column, kind } => AggregateExpr::SumColumn {
            column: column.clone(),
            kind: *kind,
        },
        MagnitudeSource::Selector { .. } => {
            return Err(InternalError::internal(
                ErrorOrigin::Reconcile,
                "selector magnitude survived triage",
            ));
        }
    };

    let touches: Vec<String> = match &options.touch {
        ReconcileTouch::Off => Vec::new(),
        ReconcileTouch::Rule => rule
            .touch
            .as_ref()
            .map(|t| t.columns.clone())
            .unwrap_or_default(),
        ReconcileTouch::Columns(columns) => columns.clone(),
    };

    let mut offset = 0;
    loop {
        let query = AggregateSelect {
            path: path.clone(),
            owner_key_columns: owner.primary_key.clone(),
            stored_column: column.to_string(),
            counting_pk: rule.dependent.primary_key[0].clone(),
            expr: expr.clone(),
            start: options.start.clone(),
            finish: options.finish.clone(),
            window: BatchWindow {
                limit: options.batch_size,
                offset,
            },
        };

        let rows = store.select_aggregate(&query)?;
        let scanned = rows.len();

        let mut corrections: Vec<UpdateStatement> = Vec::new();
        for row in rows {
            if row.computed.equals_stored(&row.stored) {
                continue;
            }
            let right = row.computed.to_scalar();
            info!(
                entity = owner.entity_name,
                key = %row.key,
                column,
                wrong = ?row.stored,
                right = ?right,
                "correcting counter drift"
            );
            records.push(ReconciliationRecord {
                entity: owner.entity_name.clone(),
                key: row.key.clone(),
                column: column.to_string(),
                wrong: row.stored,
                right: right.clone(),
            });
            corrections.push(
                UpdateStatement::new(owner.table.clone(), row.key)
                    .set(column, right)
                    .touching(&touches),
            );
        }

        // One atomic store call per batch; earlier batches stay committed
        // even if a later one fails.
        if !corrections.is_empty() {
            store.execute_batch(&corrections)?;
        }

        if scanned < options.batch_size {
            return Ok(());
        }
        offset += options.batch_size;
    }
}
