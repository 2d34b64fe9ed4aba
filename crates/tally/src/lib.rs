//! ## Crate layout
//! - `core`: rules, chains, the delta engine, SQL construction, and the
//!   reconciliation engine.
//!
//! The `prelude` module mirrors the runtime surface hosts use when wiring
//! rules into their persistence callbacks.

pub use tally_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use tally_core::{
    engine::Engine,
    error::InternalError,
    reconcile::reconcile,
    registry::RuleRegistry,
};

///
/// Host Prelude
///

pub mod prelude {
    pub use crate::core::{
        engine::{ApplyCtx, DeltaOutcome, Engine, LoadedOwner, Sign, UpdateAggregator, with_aggregation},
        error::InternalError,
        key::{OwnerKey, OwnerRef},
        model::{
            chain::{KeyPair, RelationChain, RelationHop},
            predicate::Predicate,
            rule::{ColumnTarget, CounterRule, MagnitudeSource, TouchSpec},
            table::{EntityDef, SoftDeleteSpec, StiSpec, TableRef},
        },
        reconcile::{ReconcileOptions, ReconcileTouch, ReconciliationRecord, reconcile},
        registry::RuleRegistry,
        row::{AttrState, RowSnapshot},
        store::{AggregateRow, DeferredHook, Store},
        value::{DeltaValue, NumericKind, ScalarValue},
    };
}
