use crate::model::table::EntityDef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// HopKind
///
/// Which side of the hop carries the foreign key.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HopKind {
    /// The source (dependent-ward) side carries the foreign key (belongs-to).
    ToOne,
    /// The target side carries the foreign key (has-many, seen in reverse).
    ToMany,
}

///
/// KeyPair
///
/// One foreign-key / primary-key column pairing. Composite keys are a list
/// of pairs whose order is significant and preserved end to end.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeyPair {
    pub foreign_key: String,
    pub primary_key: String,
}

impl KeyPair {
    #[must_use]
    pub fn new(foreign_key: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            foreign_key: foreign_key.into(),
            primary_key: primary_key.into(),
        }
    }
}

///
/// HopTarget
///
/// What a hop lands on. Only the final hop of a chain may be polymorphic,
/// because intermediate entities must be known statically to continue the
/// walk.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HopTarget {
    Entity(EntityDef),
    Polymorphic {
        /// Column on the source row naming the concrete owner type.
        discriminator: String,
        /// Discriminator value → concrete owner entity.
        owners: BTreeMap<String, EntityDef>,
    },
}

///
/// RelationHop
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RelationHop {
    /// Association name, used in diagnostics and rule filters.
    pub name: String,
    pub kind: HopKind,
    pub keys: Vec<KeyPair>,
    pub target: HopTarget,
}

impl RelationHop {
    #[must_use]
    pub fn to_one(name: impl Into<String>, keys: Vec<KeyPair>, target: EntityDef) -> Self {
        Self {
            name: name.into(),
            kind: HopKind::ToOne,
            keys,
            target: HopTarget::Entity(target),
        }
    }

    #[must_use]
    pub fn polymorphic(
        name: impl Into<String>,
        keys: Vec<KeyPair>,
        discriminator: impl Into<String>,
        owners: BTreeMap<String, EntityDef>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: HopKind::ToOne,
            keys,
            target: HopTarget::Polymorphic {
                discriminator: discriminator.into(),
                owners,
            },
        }
    }

    #[must_use]
    pub const fn is_polymorphic(&self) -> bool {
        matches!(self.target, HopTarget::Polymorphic { .. })
    }
}

///
/// ChainError
///
/// Registration-time validation failures. All of these are programmer
/// errors; none can occur per instance once a chain is registered.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ChainError {
    #[error("relation chain has no hops")]
    Empty,

    #[error("hop '{hop}' has no key pairs")]
    NoKeys { hop: String },

    #[error("polymorphic hop '{hop}' is only supported on a direct single-hop chain")]
    PolymorphicBeyondFirstHop { hop: String },

    #[error("polymorphic hop '{hop}' declares no candidate owners")]
    PolymorphicNoOwners { hop: String },

    #[error("hop '{hop}' must be to-one to walk from dependent to owner")]
    ToManyHop { hop: String },
}

///
/// RelationChain
///
/// Ordered hops from the dependent entity toward the owner.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RelationChain {
    pub hops: Vec<RelationHop>,
}

impl RelationChain {
    #[must_use]
    pub fn new(hops: Vec<RelationHop>) -> Self {
        Self { hops }
    }

    /// Validate chain shape. Called once at rule registration; failures are
    /// fatal configuration errors, never runtime no-ops.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.hops.is_empty() {
            return Err(ChainError::Empty);
        }

        for (position, hop) in self.hops.iter().enumerate() {
            if hop.keys.is_empty() {
                return Err(ChainError::NoKeys {
                    hop: hop.name.clone(),
                });
            }
            if hop.kind == HopKind::ToMany {
                return Err(ChainError::ToManyHop {
                    hop: hop.name.clone(),
                });
            }
            if hop.is_polymorphic() {
                // Polymorphism needs the dependent instance as discriminator
                // source, so it only works on a direct relation.
                if position != 0 || self.hops.len() != 1 {
                    return Err(ChainError::PolymorphicBeyondFirstHop {
                        hop: hop.name.clone(),
                    });
                }
                if let HopTarget::Polymorphic { owners, .. } = &hop.target
                    && owners.is_empty()
                {
                    return Err(ChainError::PolymorphicNoOwners {
                        hop: hop.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn final_hop(&self) -> &RelationHop {
        // Chains are validated non-empty at registration.
        self.hops.last().expect("validated chain has hops")
    }

    #[must_use]
    pub fn is_polymorphic(&self) -> bool {
        self.final_hop().is_polymorphic()
    }

    /// Dotted association path, used as the rule's filter handle.
    #[must_use]
    pub fn path(&self) -> String {
        self.hops
            .iter()
            .map(|hop| hop.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Candidate owner entities: one for a plain chain, one per
    /// discriminator value for a polymorphic chain.
    #[must_use]
    pub fn owner_entities(&self) -> Vec<(Option<String>, &EntityDef)> {
        match &self.final_hop().target {
            HopTarget::Entity(entity) => vec![(None, entity)],
            HopTarget::Polymorphic { owners, .. } => owners
                .iter()
                .map(|(discriminator, entity)| (Some(discriminator.clone()), entity))
                .collect(),
        }
    }
}
