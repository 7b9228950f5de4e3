//! Core types, errors, and retry policy for the gc worker.

pub mod backoff;
pub mod error;
pub mod event;

pub use backoff::Backoff;
pub use error::{Error, Result};
pub use event::AnalyzedEvent;
