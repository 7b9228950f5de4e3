//! Unified error types for the gc worker.
//!
//! The taxonomy distinguishes transient connectivity faults (retried by the
//! connection supervisor) from everything else:
//! - Queue errors: always transient, any AMQP fault triggers a reconnect
//! - Database errors: transient only when connectivity-shaped
//! - Decode errors: the message is structurally invalid and gets dropped
//! - Reap errors: filesystem faults, fatal to the current message

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the gc worker.
#[derive(Debug, Error)]
pub enum Error {
    /// AMQP connection or channel fault.
    #[error("queue error: {0}")]
    Queue(#[from] lapin::Error),

    /// Database fault. Use [`Error::is_transient`] to decide whether a
    /// reconnect cycle can recover it.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Message body was not the expected JSON shape.
    #[error("malformed message body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Recursive directory removal failed for a reason other than the
    /// directory being absent.
    #[error("failed to delete {path}: {source}")]
    Reap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A repository id that cannot be used as a single path component.
    #[error("invalid repository id: {0:?}")]
    InvalidRepositoryId(String),

    /// The backoff policy ran out of attempts.
    #[error("gave up after {attempts} connection attempts")]
    RetriesExhausted { attempts: u32 },

    /// Startup configuration problem.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether a reconnect cycle can recover from this error.
    ///
    /// Queue faults are always worth retrying: the broker client surfaces
    /// every connection-level problem through the same error type, and all
    /// of them are handled by reconnecting. Database faults are retried
    /// only when they look like lost connectivity; a malformed query or
    /// constraint violation will not heal by reconnecting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Queue(_) => true,
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}
