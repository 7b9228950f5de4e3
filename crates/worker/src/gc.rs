//! The per-message gc pipeline.
//!
//! For one well-formed event: mark the (repository, language) pair analyzed,
//! ask the store whether the repository is complete, and reap the clone when
//! it is. The caller acknowledges the message only after this returns Ok, so
//! any error here leaves the message unacked for redelivery.

use gc_core::{AnalyzedEvent, Result};
use postgres_store::{AnalysisStore, Completion, MarkOutcome};
use tracing::{debug, info};

use crate::reaper::{ReapOutcome, Reaper};

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Repository complete; its clone was reaped.
    Reaped(ReapOutcome),
    /// Not all present languages analyzed yet.
    Pending,
    /// No store row for the pair; event dropped.
    DroppedUnknownPair,
    /// Store has no rows for the repository at all; never reaps.
    DroppedUnknownRepository,
}

/// Drives the store and the reaper for one event at a time.
pub struct GcWorker<S> {
    store: S,
    reaper: Reaper,
}

impl<S: AnalysisStore> GcWorker<S> {
    pub fn new(store: S, reaper: Reaper) -> Self {
        Self { store, reaper }
    }

    /// Processes one decoded event.
    ///
    /// Every step is idempotent, so redelivery of an already-processed
    /// event is safe: the mark is a no-op rewrite, the completion check
    /// re-runs, and reaping an already-deleted clone reports AlreadyAbsent.
    pub async fn handle_event(&self, event: &AnalyzedEvent) -> Result<ProcessOutcome> {
        debug!(
            repository_id = %event.repo_id,
            language_id = event.language_id,
            "Processing analyzed event"
        );

        match self
            .store
            .mark_analyzed(&event.repo_id, event.language_id)
            .await?
        {
            MarkOutcome::Marked => {}
            // Already logged by the store; the event is dropped on purpose.
            MarkOutcome::UnknownPair => return Ok(ProcessOutcome::DroppedUnknownPair),
        }

        match self.store.all_present_analyzed(&event.repo_id).await? {
            Completion::Complete { present, analyzed } => {
                let outcome = self.reaper.delete(&event.repo_id).await?;
                info!(
                    repository_id = %event.repo_id,
                    present = present,
                    analyzed = analyzed,
                    "All languages analyzed; repository deleted"
                );
                Ok(ProcessOutcome::Reaped(outcome))
            }
            Completion::Incomplete { present, analyzed } => {
                debug!(
                    repository_id = %event.repo_id,
                    present = present,
                    analyzed = analyzed,
                    "Not all languages analyzed; repository kept"
                );
                Ok(ProcessOutcome::Pending)
            }
            Completion::UnknownRepository => Ok(ProcessOutcome::DroppedUnknownRepository),
        }
    }
}
