use crate::{
    error::{ErrorOrigin, InternalError},
    model::{
        chain::{HopKind, HopTarget, RelationChain},
        predicate::Predicate,
        table::{EntityDef, SoftDeleteSpec, TableRef},
    },
    sql::ident::{qualify, quote, unique_alias},
    value::ScalarValue,
};

///
/// JoinCond
///
/// One condition on a join clause, kept structured so hosts and the test
/// store can interpret it without parsing SQL.
///

#[derive(Clone, Debug, PartialEq)]
pub enum JoinCond {
    /// Key equality between two aliased columns.
    KeyEq {
        left_alias: String,
        left_column: String,
        right_alias: String,
        right_column: String,
    },
    /// Column equals a literal (STI and polymorphic discriminators,
    /// boolean soft-delete flags).
    ColEq {
        alias: String,
        column: String,
        value: ScalarValue,
    },
    /// Column is NULL (timestamp soft-delete exclusion).
    IsNull { alias: String, column: String },
    /// The rule's runtime condition, attached only at the counting join.
    Pred { alias: String, predicate: Predicate },
}

impl JoinCond {
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::KeyEq {
                left_alias,
                left_column,
                right_alias,
                right_column,
            } => format!(
                "{} = {}",
                qualify(left_alias, left_column),
                qualify(right_alias, right_column)
            ),
            Self::ColEq {
                alias,
                column,
                value,
            } => format!("{} = {}", qualify(alias, column), value.to_sql_literal()),
            Self::IsNull { alias, column } => format!("{} IS NULL", qualify(alias, column)),
            Self::Pred { alias, predicate } => format!("({})", predicate.to_sql(alias)),
        }
    }
}

///
/// JoinClause
///

#[derive(Clone, Debug, PartialEq)]
pub struct JoinClause {
    pub table: TableRef,
    pub alias: String,
    pub conds: Vec<JoinCond>,
}

impl JoinClause {
    fn to_sql(&self) -> String {
        let table = if self.alias == self.table.name {
            quote(&self.table.name)
        } else {
            format!("{} AS {}", quote(&self.table.name), quote(&self.alias))
        };
        let on = self
            .conds
            .iter()
            .map(JoinCond::to_sql)
            .collect::<Vec<_>>()
            .join(" AND ");
        format!("LEFT JOIN {table} ON {on}")
    }
}

///
/// JoinPath
///
/// The reversed relation chain as SQL joins: rooted at the owner table and
/// descending hop by hop to the dependent (counting) table.
///

#[derive(Clone, Debug, PartialEq)]
pub struct JoinPath {
    pub base_table: TableRef,
    pub base_alias: String,
    /// Conditions on the base table itself (owner STI membership).
    pub base_conds: Vec<JoinCond>,
    pub joins: Vec<JoinClause>,
}

impl JoinPath {
    /// Alias of the counting (dependent) table: always the last join.
    #[must_use]
    pub fn counting_alias(&self) -> &str {
        self.joins
            .last()
            .map_or(self.base_alias.as_str(), |join| join.alias.as_str())
    }

    /// Render the FROM/JOIN section.
    #[must_use]
    pub fn to_sql_from(&self) -> String {
        let base = if self.base_alias == self.base_table.name {
            quote(&self.base_table.name)
        } else {
            format!(
                "{} AS {}",
                quote(&self.base_table.name),
                quote(&self.base_alias)
            )
        };

        let mut sql = format!("FROM {base}");
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }
        sql
    }
}

///
/// JoinBuildSpec
///
/// Inputs for one join-path build: the chain, the dependent entity, and the
/// concrete owner the path terminates at (one subtype of a polymorphic
/// chain, or the chain's sole owner).
///

#[derive(Clone, Debug)]
pub struct JoinBuildSpec<'a> {
    pub chain: &'a RelationChain,
    pub dependent: &'a EntityDef,
    pub owner: &'a EntityDef,
    /// Discriminator value selecting `owner`, when the chain is polymorphic.
    pub owner_subtype: Option<&'a str>,
    /// Rule condition, attached only at the counting join.
    pub predicate: Option<&'a Predicate>,
}

/// Build the owner-rooted join path for a chain.
///
/// Hops run dependent → owner; joins are emitted in the reverse direction,
/// one LEFT JOIN per hop, ending at the dependent table. Soft-delete and
/// discriminator filters ride on the join conditions rather than a WHERE
/// clause so LEFT JOIN semantics still yield zero-count owner rows.
pub fn build_join_path(spec: &JoinBuildSpec<'_>) -> Result<JoinPath, InternalError> {
    let hops = &spec.chain.hops;
    if hops.is_empty() {
        return Err(InternalError::config(
            ErrorOrigin::Join,
            "cannot build a join path for an empty relation chain",
        ));
    }

    // Entity on the dependent-ward side of each hop.
    let mut sources: Vec<&EntityDef> = Vec::with_capacity(hops.len());
    sources.push(spec.dependent);
    for hop in &hops[..hops.len() - 1] {
        match &hop.target {
            HopTarget::Entity(entity) => sources.push(entity),
            HopTarget::Polymorphic { .. } => {
                return Err(InternalError::config(
                    ErrorOrigin::Join,
                    format!(
                        "polymorphic hop '{}' must be the final hop of the chain",
                        hop.name
                    ),
                ));
            }
        }
    }

    let mut taken: Vec<String> = Vec::new();
    let base_alias = unique_alias(&spec.owner.table.name, &taken);
    taken.push(base_alias.clone());

    let mut base_conds = Vec::new();
    if let Some(sti) = &spec.owner.sti {
        base_conds.push(JoinCond::ColEq {
            alias: base_alias.clone(),
            column: sti.column.clone(),
            value: ScalarValue::Text(sti.value.clone()),
        });
    }

    let mut joins = Vec::with_capacity(hops.len());
    let mut upper_alias = base_alias.clone();

    for (index, hop) in hops.iter().enumerate().rev() {
        let source = sources[index];
        let alias = unique_alias(&source.table.name, &taken);
        taken.push(alias.clone());

        let mut conds = Vec::new();
        for pair in &hop.keys {
            let cond = match hop.kind {
                // Source side carries the foreign key.
                HopKind::ToOne => JoinCond::KeyEq {
                    left_alias: alias.clone(),
                    left_column: pair.foreign_key.clone(),
                    right_alias: upper_alias.clone(),
                    right_column: pair.primary_key.clone(),
                },
                // Target side carries the foreign key.
                HopKind::ToMany => JoinCond::KeyEq {
                    left_alias: alias.clone(),
                    left_column: pair.primary_key.clone(),
                    right_alias: upper_alias.clone(),
                    right_column: pair.foreign_key.clone(),
                },
            };
            conds.push(cond);
        }

        if let Some(sti) = &source.sti {
            conds.push(JoinCond::ColEq {
                alias: alias.clone(),
                column: sti.column.clone(),
                value: ScalarValue::Text(sti.value.clone()),
            });
        }

        // Counting-join-only conditions.
        if index == 0 {
            if let HopTarget::Polymorphic { discriminator, .. } = &hop.target {
                let subtype = spec.owner_subtype.ok_or_else(|| {
                    InternalError::config(
                        ErrorOrigin::Join,
                        "polymorphic chain requires an owner subtype to scan",
                    )
                })?;
                conds.push(JoinCond::ColEq {
                    alias: alias.clone(),
                    column: discriminator.clone(),
                    value: ScalarValue::Text(subtype.to_string()),
                });
            }

            match &spec.dependent.soft_delete {
                Some(SoftDeleteSpec::Timestamp { column }) => conds.push(JoinCond::IsNull {
                    alias: alias.clone(),
                    column: column.clone(),
                }),
                Some(SoftDeleteSpec::Flag { column }) => conds.push(JoinCond::ColEq {
                    alias: alias.clone(),
                    column: column.clone(),
                    value: ScalarValue::Bool(false),
                }),
                None => {}
            }

            if let Some(predicate) = spec.predicate {
                conds.push(JoinCond::Pred {
                    alias: alias.clone(),
                    predicate: predicate.clone(),
                });
            }
        }

        joins.push(JoinClause {
            table: source.table.clone(),
            alias: alias.clone(),
            conds,
        });
        upper_alias = alias;
    }

    Ok(JoinPath {
        base_table: spec.owner.table.clone(),
        base_alias,
        base_conds,
        joins,
    })
}
