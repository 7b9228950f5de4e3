//! Consume loop, completion logic, and repository reaper for the gc worker.
//!
//! - `reaper`: recursive removal of a repository's clone directory
//! - `gc`: the per-message pipeline (mark → completion check → maybe reap)
//! - `supervisor`: connection lifecycle and the outer consume loop

pub mod gc;
pub mod reaper;
pub mod supervisor;

pub use gc::{GcWorker, ProcessOutcome};
pub use reaper::{ReapOutcome, Reaper};
pub use supervisor::{GcSupervisor, SupervisorConfig};
