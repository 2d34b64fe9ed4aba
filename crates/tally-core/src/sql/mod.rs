pub mod aggregate;
pub mod ident;
pub mod join;
pub mod update;
