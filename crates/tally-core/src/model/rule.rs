use crate::{
    key::OwnerKey,
    model::{
        chain::RelationChain,
        predicate::Predicate,
        table::EntityDef,
    },
    row::{AttrState, RowSnapshot},
    value::{DeltaValue, NumericKind},
};
use std::{collections::BTreeSet, fmt, sync::Arc};
use thiserror::Error as ThisError;

/// Per-instance target-column selector.
pub type ColumnSelectorFn = Arc<dyn Fn(&RowSnapshot, AttrState) -> Option<String> + Send + Sync>;

/// Per-instance magnitude function.
pub type MagnitudeFn = Arc<dyn Fn(&RowSnapshot, AttrState) -> DeltaValue + Send + Sync>;

/// Foreign-key override: bypasses chain resolution entirely.
pub type FkOverrideFn = Arc<dyn Fn(&RowSnapshot, AttrState) -> Option<OwnerKey> + Send + Sync>;

///
/// ColumnTarget
///
/// How a rule names the aggregate column on the owner. The conditional-map
/// form is declarative on purpose: it is the only dynamic form the
/// reconciler can translate into SQL.
///

#[derive(Clone)]
pub enum ColumnTarget {
    Static(String),
    Selector(ColumnSelectorFn),
    /// Ordered `(predicate, column)` pairs; first match wins, no match means
    /// the rule is a no-op for that instance.
    Conditional(Vec<(Predicate, String)>),
}

impl ColumnTarget {
    /// Resolve the target column for one instance. `None` is a normal no-op.
    #[must_use]
    pub fn resolve(&self, row: &RowSnapshot, state: AttrState) -> Option<String> {
        match self {
            Self::Static(column) => Some(column.clone()),
            Self::Selector(f) => f(row, state),
            Self::Conditional(arms) => arms
                .iter()
                .find(|(predicate, _)| predicate.matches(&|column| row.get(column, state)))
                .map(|(_, column)| column.clone()),
        }
    }

    /// Every column this target can resolve to.
    #[must_use]
    pub fn candidate_columns(&self) -> Vec<&str> {
        match self {
            Self::Static(column) => vec![column.as_str()],
            Self::Selector(_) => vec![],
            Self::Conditional(arms) => arms.iter().map(|(_, column)| column.as_str()).collect(),
        }
    }
}

impl fmt::Debug for ColumnTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(column) => f.debug_tuple("Static").field(column).finish(),
            Self::Selector(_) => f.write_str("Selector(<fn>)"),
            Self::Conditional(arms) => {
                let columns: Vec<_> = arms.iter().map(|(_, c)| c).collect();
                f.debug_tuple("Conditional").field(&columns).finish()
            }
        }
    }
}

///
/// MagnitudeSource
///
/// Where the unsigned magnitude of a delta comes from.
///

#[derive(Clone)]
pub enum MagnitudeSource {
    /// Plain counting: magnitude 1.
    Unit,
    /// A fixed magnitude per dependent row.
    Const(DeltaValue),
    /// A numeric column on the dependent row; NULL reads as zero.
    Column { column: String, kind: NumericKind },
    /// Procedural magnitude. Unsupported by bulk reconciliation.
    Selector { kind: NumericKind, f: MagnitudeFn },
}

impl MagnitudeSource {
    #[must_use]
    pub const fn kind(&self) -> NumericKind {
        match self {
            Self::Unit => NumericKind::Integer,
            Self::Const(value) => value.kind(),
            Self::Column { kind, .. } | Self::Selector { kind, .. } => *kind,
        }
    }

    /// Resolve the magnitude for one instance. NULL column values are zero.
    #[must_use]
    pub fn resolve(&self, row: &RowSnapshot, state: AttrState) -> DeltaValue {
        match self {
            Self::Unit => DeltaValue::ONE,
            Self::Const(value) => *value,
            Self::Column { column, kind } => row
                .get(column, state)
                .as_numeric(*kind)
                .unwrap_or_else(|| kind.zero()),
            Self::Selector { kind, f } => f(row, state).coerce(*kind),
        }
    }
}

impl fmt::Debug for MagnitudeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("Unit"),
            Self::Const(value) => f.debug_tuple("Const").field(value).finish(),
            Self::Column { column, kind } => f
                .debug_struct("Column")
                .field("column", column)
                .field("kind", kind)
                .finish(),
            Self::Selector { kind, .. } => {
                f.debug_struct("Selector").field("kind", kind).finish()
            }
        }
    }
}

///
/// TouchSpec
///
/// Timestamp columns stamped alongside counter updates.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TouchSpec {
    pub columns: Vec<String>,
}

impl TouchSpec {
    /// The conventional default touch column.
    #[must_use]
    pub fn updated_at() -> Self {
        Self {
            columns: vec!["updated_at".to_string()],
        }
    }

    #[must_use]
    pub fn columns(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(ToString::to_string).collect(),
        }
    }
}

///
/// RuleError
///
/// Build-time rule validation failures.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RuleError {
    #[error("chain invalid: {0}")]
    Chain(#[from] crate::model::chain::ChainError),

    #[error("conditional column map is empty")]
    EmptyConditionalMap,

    #[error("conditional column map names an empty column")]
    EmptyConditionalColumn,

    #[error("owner allow-list requires a polymorphic chain")]
    AllowListWithoutPolymorphism,

    #[error("owner allow-list names unknown subtype '{subtype}'")]
    AllowListUnknownSubtype { subtype: String },
}

///
/// CounterRule
///
/// One registered counter: which dependent feeds which owner column, and
/// how. Immutable for the process lifetime once built.
///

#[derive(Clone)]
pub struct CounterRule {
    pub dependent: EntityDef,
    pub chain: RelationChain,
    pub column: ColumnTarget,
    pub magnitude: MagnitudeSource,
    pub touch: Option<TouchSpec>,
    pub fk_override: Option<FkOverrideFn>,
    pub deferred: bool,
    /// Polymorphic owner subtypes this rule applies to; `None` means all.
    pub owner_allow_list: Option<BTreeSet<String>>,
}

impl fmt::Debug for CounterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterRule")
            .field("dependent", &self.dependent.entity_name)
            .field("path", &self.path())
            .field("column", &self.column)
            .field("magnitude", &self.magnitude)
            .field("touch", &self.touch)
            .field("fk_override", &self.fk_override.is_some())
            .field("deferred", &self.deferred)
            .field("owner_allow_list", &self.owner_allow_list)
            .finish()
    }
}

impl CounterRule {
    #[must_use]
    pub fn builder(dependent: EntityDef, chain: RelationChain) -> CounterRuleBuilder {
        CounterRuleBuilder {
            dependent,
            chain,
            column: None,
            magnitude: MagnitudeSource::Unit,
            touch: None,
            fk_override: None,
            deferred: false,
            owner_allow_list: None,
        }
    }

    /// Filter handle: the dotted association path of the chain.
    #[must_use]
    pub fn path(&self) -> String {
        self.chain.path()
    }

    /// Whether a polymorphic subtype passes this rule's allow-list.
    #[must_use]
    pub fn allows_subtype(&self, subtype: &str) -> bool {
        self.owner_allow_list
            .as_ref()
            .is_none_or(|list| list.contains(subtype))
    }

    /// Columns on the dependent row whose change can affect this rule.
    #[must_use]
    pub fn relevant_columns(&self) -> RelevantColumns {
        let mut columns = BTreeSet::new();
        let first = &self.chain.hops[0];
        for pair in &first.keys {
            columns.insert(pair.foreign_key.clone());
        }
        if let crate::model::chain::HopTarget::Polymorphic { discriminator, .. } = &first.target {
            columns.insert(discriminator.clone());
        }

        let mut always_relevant = self.fk_override.is_some();
        match &self.column {
            ColumnTarget::Static(_) => {}
            // Procedural selectors can read anything.
            ColumnTarget::Selector(_) => always_relevant = true,
            ColumnTarget::Conditional(arms) => {
                for (predicate, _) in arms {
                    predicate.collect_columns(&mut columns);
                }
            }
        }
        match &self.magnitude {
            MagnitudeSource::Unit | MagnitudeSource::Const(_) => {}
            MagnitudeSource::Column { column, .. } => {
                columns.insert(column.clone());
            }
            MagnitudeSource::Selector { .. } => always_relevant = true,
        }

        RelevantColumns {
            columns,
            always_relevant,
        }
    }
}

///
/// RelevantColumns
///
/// Change-relevance summary for one rule: the named columns that matter,
/// plus a flag for procedural rules where relevance cannot be narrowed.
///

#[derive(Clone, Debug)]
pub struct RelevantColumns {
    pub columns: BTreeSet<String>,
    pub always_relevant: bool,
}

impl RelevantColumns {
    #[must_use]
    pub fn touched_by(&self, changed: &BTreeSet<String>) -> bool {
        self.always_relevant || self.columns.iter().any(|c| changed.contains(c))
    }
}

///
/// CounterRuleBuilder
///

pub struct CounterRuleBuilder {
    dependent: EntityDef,
    chain: RelationChain,
    column: Option<ColumnTarget>,
    magnitude: MagnitudeSource,
    touch: Option<TouchSpec>,
    fk_override: Option<FkOverrideFn>,
    deferred: bool,
    owner_allow_list: Option<BTreeSet<String>>,
}

impl CounterRuleBuilder {
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(ColumnTarget::Static(column.into()));
        self
    }

    #[must_use]
    pub fn column_selector(mut self, f: ColumnSelectorFn) -> Self {
        self.column = Some(ColumnTarget::Selector(f));
        self
    }

    #[must_use]
    pub fn conditional_columns(mut self, arms: Vec<(Predicate, String)>) -> Self {
        self.column = Some(ColumnTarget::Conditional(arms));
        self
    }

    #[must_use]
    pub fn magnitude(mut self, magnitude: MagnitudeSource) -> Self {
        self.magnitude = magnitude;
        self
    }

    #[must_use]
    pub fn delta_column(mut self, column: impl Into<String>, kind: NumericKind) -> Self {
        self.magnitude = MagnitudeSource::Column {
            column: column.into(),
            kind,
        };
        self
    }

    #[must_use]
    pub fn touch(mut self, touch: TouchSpec) -> Self {
        self.touch = Some(touch);
        self
    }

    #[must_use]
    pub fn fk_override(mut self, f: FkOverrideFn) -> Self {
        self.fk_override = Some(f);
        self
    }

    #[must_use]
    pub const fn deferred(mut self, deferred: bool) -> Self {
        self.deferred = deferred;
        self
    }

    #[must_use]
    pub fn owner_allow_list(mut self, subtypes: &[&str]) -> Self {
        self.owner_allow_list = Some(subtypes.iter().map(ToString::to_string).collect());
        self
    }

    /// Validate and freeze the rule. All shape errors surface here, before
    /// any instance is processed.
    pub fn build(self) -> Result<CounterRule, RuleError> {
        self.chain.validate()?;

        let column = self.column.unwrap_or_else(|| {
            // Conventional default: <dependent_table>_count on the owner.
            ColumnTarget::Static(format!("{}_count", self.dependent.table.name))
        });

        if let ColumnTarget::Conditional(arms) = &column {
            if arms.is_empty() {
                return Err(RuleError::EmptyConditionalMap);
            }
            if arms.iter().any(|(_, c)| c.is_empty()) {
                return Err(RuleError::EmptyConditionalColumn);
            }
        }

        if let Some(list) = &self.owner_allow_list {
            if !self.chain.is_polymorphic() {
                return Err(RuleError::AllowListWithoutPolymorphism);
            }
            let known: BTreeSet<_> = self
                .chain
                .owner_entities()
                .into_iter()
                .filter_map(|(discriminator, _)| discriminator)
                .collect();
            for subtype in list {
                if !known.contains(subtype) {
                    return Err(RuleError::AllowListUnknownSubtype {
                        subtype: subtype.clone(),
                    });
                }
            }
        }

        Ok(CounterRule {
            dependent: self.dependent,
            chain: self.chain,
            column,
            magnitude: self.magnitude,
            touch: self.touch,
            fk_override: self.fk_override,
            deferred: self.deferred,
            owner_allow_list: self.owner_allow_list,
        })
    }
}
