pub mod chain;
pub mod predicate;
pub mod rule;
pub mod table;
