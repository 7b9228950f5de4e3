//! Analysis state store.
//!
//! One row per (repository_id, language_id) pair, created by the upstream
//! producer before any event reaches this worker. The worker only flips the
//! `analyzed` flag (and, deliberately, `present` along with it) and asks
//! whether every present language of a repository has been analyzed.
//!
//! Dropped events and unknown repositories are named outcome variants
//! rather than silent booleans, so callers and tests can assert on the
//! reason.

use async_trait::async_trait;
use gc_core::{Backoff, Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, error, info};

use crate::config::PostgresConfig;

/// Result of marking a (repository, language) pair analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The pair's row now has `present = analyzed = true`.
    Marked,
    /// No row exists for the pair; the event is dropped.
    UnknownPair,
}

/// Result of the completion check for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every present language has been analyzed.
    Complete { present: i64, analyzed: i64 },
    /// At least one present language is still unanalyzed.
    Incomplete { present: i64, analyzed: i64 },
    /// The repository has no rows at all. Treated as incomplete so an
    /// unknown repository can never trigger a deletion.
    UnknownRepository,
}

impl Completion {
    /// Derives the completion state from the two aggregates.
    ///
    /// `None` aggregates mean zero rows matched. Completion uses a
    /// difference rather than equality: marking a language analyzed also
    /// forces it present, so `analyzed` can exceed `present` and the
    /// repository still counts as complete.
    pub fn from_counts(present: Option<i64>, analyzed: Option<i64>) -> Self {
        match (present, analyzed) {
            (Some(present), Some(analyzed)) => {
                if present - analyzed <= 0 {
                    Self::Complete { present, analyzed }
                } else {
                    Self::Incomplete { present, analyzed }
                }
            }
            _ => Self::UnknownRepository,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// Store of per-(repository, language) analysis completion flags.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Marks the pair analyzed (and present). A missing row is reported as
    /// [`MarkOutcome::UnknownPair`], not an error.
    async fn mark_analyzed(&self, repository_id: &str, language_id: i32) -> Result<MarkOutcome>;

    /// Whether all present languages of the repository have been analyzed.
    async fn all_present_analyzed(&self, repository_id: &str) -> Result<Completion>;
}

/// Postgres-backed implementation of [`AnalysisStore`].
#[derive(Clone)]
pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    /// Single connection attempt against the configured database.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Connecting to Postgres"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect(&config.url())
            .await?;

        info!(database = %config.database, "Connected to Postgres");
        Ok(Self { pool })
    }

    /// Connects with retries according to the backoff policy.
    ///
    /// Only transient connectivity faults are retried; any other database
    /// error propagates immediately.
    pub async fn connect_with_retry(config: &PostgresConfig, backoff: &Backoff) -> Result<Self> {
        let mut attempt = 0u32;
        loop {
            match Self::connect(config).await {
                Ok(store) => return Ok(store),
                Err(e) if e.is_transient() => {
                    error!(
                        host = %config.host,
                        attempt = attempt + 1,
                        error = %e,
                        "Database connection error"
                    );
                    match backoff.delay_for(attempt) {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            return Err(Error::RetriesExhausted {
                                attempts: attempt + 1,
                            })
                        }
                    }
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, "Fatal database error while connecting");
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn mark_analyzed(&self, repository_id: &str, language_id: i32) -> Result<MarkOutcome> {
        // The pair is unique (enforced by migration 0001), so this touches
        // at most one row. Setting `present` alongside `analyzed` is the
        // preserved forced-present behavior: an analyzed language is
        // asserted present whatever the producer wrote.
        let result = sqlx::query(
            "UPDATE repository_language \
             SET present = TRUE, analyzed = TRUE \
             WHERE repository_id = $1 AND language_id = $2",
        )
        .bind(repository_id)
        .bind(language_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            error!(
                repository_id = repository_id,
                language_id = language_id,
                "Tried to mark a nonexistent repository/language pair as analyzed"
            );
            return Ok(MarkOutcome::UnknownPair);
        }

        debug!(
            repository_id = repository_id,
            language_id = language_id,
            "Marked language as analyzed"
        );
        Ok(MarkOutcome::Marked)
    }

    async fn all_present_analyzed(&self, repository_id: &str) -> Result<Completion> {
        // SUM over CASE is NULL when no rows match, which is how an unknown
        // repository is told apart from an empty-but-known one.
        let (present, analyzed): (Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT \
                 SUM(CASE WHEN present THEN 1 ELSE 0 END), \
                 SUM(CASE WHEN analyzed THEN 1 ELSE 0 END) \
             FROM repository_language \
             WHERE repository_id = $1",
        )
        .bind(repository_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            repository_id = repository_id,
            present = ?present,
            analyzed = ?analyzed,
            "Completion counts"
        );

        let completion = Completion::from_counts(present, analyzed);
        if completion == Completion::UnknownRepository {
            error!(
                repository_id = repository_id,
                "Completion query matched no rows; repository id is unknown to the store"
            );
        }
        Ok(completion)
    }
}
