//! RabbitMQ consumer plumbing for the gc worker.

pub mod client;
pub mod config;

pub use client::*;
pub use config::*;
