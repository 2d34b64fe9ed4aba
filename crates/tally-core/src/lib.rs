//! Core runtime for tally: counter rules, the incremental delta engine,
//! the transaction-scoped update aggregator, SQL construction, and the
//! batched reconciliation engine, plus the ergonomics exported via the
//! `prelude`.

pub mod engine;
pub mod error;
pub mod key;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod row;
pub mod sql;
pub mod store;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, stores, or SQL builders are re-exported here.
///

pub mod prelude {
    pub use crate::{
        engine::{ApplyCtx, Engine, Sign, UpdateAggregator, with_aggregation},
        key::{OwnerKey, OwnerRef},
        model::{
            chain::{KeyPair, RelationChain, RelationHop},
            predicate::Predicate,
            rule::{CounterRule, MagnitudeSource, TouchSpec},
            table::{EntityDef, SoftDeleteSpec, TableRef},
        },
        reconcile::{ReconcileOptions, ReconciliationRecord},
        registry::RuleRegistry,
        row::{AttrState, RowSnapshot},
        value::{DeltaValue, NumericKind, ScalarValue},
    };
}
