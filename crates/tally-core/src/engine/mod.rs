pub mod aggregator;
pub mod delta;
pub mod events;
pub mod resolver;


pub use aggregator::{UpdateAggregator, with_aggregation};
pub use delta::{ApplyCtx, DeltaOutcome, LoadedOwner, NoopReason, Sign};
pub use events::Engine;
pub use resolver::resolve_owner;
