use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// TableRef
///
/// Physical table identity.
///

#[derive(
    Clone, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[display("{name}")]
pub struct TableRef {
    pub name: String,
}

impl TableRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

///
/// StiSpec
///
/// Marks an entity as a single-table-inheritance child: rows belonging to
/// this entity carry `value` in the discriminator `column` of the shared
/// table.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StiSpec {
    pub column: String,
    pub value: String,
}

///
/// SoftDeleteSpec
///
/// How the entity marks rows as logically deleted. Reconciliation must never
/// count rows matching this marker.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SoftDeleteSpec {
    /// A nullable timestamp column; non-null means deleted (`deleted_at`).
    Timestamp { column: String },
    /// A boolean column; true means deleted.
    Flag { column: String },
}

impl SoftDeleteSpec {
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Timestamp { column } | Self::Flag { column } => column,
        }
    }
}

///
/// EntityDef
///
/// Static descriptor for one entity type: logical name, physical table,
/// primary key, and the optional STI / soft-delete markers the join builder
/// folds into scan conditions. Built once at rule registration and treated
/// as immutable afterwards.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EntityDef {
    pub entity_name: String,
    pub table: TableRef,
    pub primary_key: Vec<String>,
    pub sti: Option<StiSpec>,
    pub soft_delete: Option<SoftDeleteSpec>,
}

impl EntityDef {
    #[must_use]
    pub fn new(entity_name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            table: TableRef::new(table),
            primary_key: vec!["id".to_string()],
            sti: None,
            soft_delete: None,
        }
    }

    #[must_use]
    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_sti(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.sti = Some(StiSpec {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn with_soft_delete(mut self, spec: SoftDeleteSpec) -> Self {
        self.soft_delete = Some(spec);
        self
    }
}
