//! Postgres-backed analysis state store for the gc worker.

pub mod config;
pub mod store;

pub use config::*;
pub use store::*;
