//! Mock implementations for testing.

use async_trait::async_trait;
use gc_core::Result;
use parking_lot::Mutex;
use postgres_store::{AnalysisStore, Completion, MarkOutcome};
use std::sync::Arc;

/// One in-memory repository_language row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRow {
    pub repository_id: String,
    pub language_id: i32,
    pub present: bool,
    pub analyzed: bool,
}

/// In-memory store that mirrors the Postgres semantics.
///
/// Implements the same `AnalysisStore` trait as `PgAnalysisStore`, so the
/// gc pipeline can be exercised without a database: the pair-keyed UPDATE,
/// the forced-present side effect, and the NULL-aggregate behavior for
/// unknown repositories are all reproduced.
#[derive(Clone, Default)]
pub struct MockAnalysisStore {
    rows: Arc<Mutex<Vec<LanguageRow>>>,
    /// Simulate a connectivity fault if set.
    should_fail: Arc<Mutex<bool>>,
}

impl MockAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one row.
    pub fn insert_row(&self, repository_id: &str, language_id: i32, present: bool, analyzed: bool) {
        self.rows.lock().push(LanguageRow {
            repository_id: repository_id.to_string(),
            language_id,
            present,
            analyzed,
        });
    }

    /// Returns a copy of the row for a pair, if any.
    pub fn row(&self, repository_id: &str, language_id: i32) -> Option<LanguageRow> {
        self.rows
            .lock()
            .iter()
            .find(|r| r.repository_id == repository_id && r.language_id == language_id)
            .cloned()
    }

    /// All rows, for assertions on the full table state.
    pub fn rows(&self) -> Vec<LanguageRow> {
        self.rows.lock().clone()
    }

    /// Set failure mode for testing error handling.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    fn check_failure(&self) -> Result<()> {
        if *self.should_fail.lock() {
            return Err(gc_core::Error::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for MockAnalysisStore {
    async fn mark_analyzed(&self, repository_id: &str, language_id: i32) -> Result<MarkOutcome> {
        self.check_failure()?;

        let mut rows = self.rows.lock();
        match rows
            .iter_mut()
            .find(|r| r.repository_id == repository_id && r.language_id == language_id)
        {
            Some(row) => {
                row.present = true;
                row.analyzed = true;
                Ok(MarkOutcome::Marked)
            }
            None => Ok(MarkOutcome::UnknownPair),
        }
    }

    async fn all_present_analyzed(&self, repository_id: &str) -> Result<Completion> {
        self.check_failure()?;

        let rows = self.rows.lock();
        let matching: Vec<_> = rows
            .iter()
            .filter(|r| r.repository_id == repository_id)
            .collect();

        if matching.is_empty() {
            // SUM over zero rows is NULL.
            return Ok(Completion::from_counts(None, None));
        }

        let present = matching.iter().filter(|r| r.present).count() as i64;
        let analyzed = matching.iter().filter(|r| r.analyzed).count() as i64;
        Ok(Completion::from_counts(Some(present), Some(analyzed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_store_marks_pair() {
        let store = MockAnalysisStore::new();
        store.insert_row("abc", 1, true, false);

        let outcome = store.mark_analyzed("abc", 1).await.unwrap();
        assert_eq!(outcome, MarkOutcome::Marked);

        let row = store.row("abc", 1).unwrap();
        assert!(row.present);
        assert!(row.analyzed);
    }

    #[tokio::test]
    async fn test_mock_store_unknown_pair() {
        let store = MockAnalysisStore::new();
        let outcome = store.mark_analyzed("abc", 1).await.unwrap();
        assert_eq!(outcome, MarkOutcome::UnknownPair);
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_mock_store_failure_mode() {
        let store = MockAnalysisStore::new();
        store.set_should_fail(true);

        let err = store.mark_analyzed("abc", 1).await.unwrap_err();
        assert!(err.is_transient());
    }
}
