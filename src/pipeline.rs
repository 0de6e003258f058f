//! Per-source update driver.
//!
//! Runs every configured source through
//! `Fetching → Merging → Summarizing → Persisting → Done`, one source after
//! another.  A fetch or save failure moves that source to `Failed` and the
//! run carries on with the next one.
//!
//! ## For contributors
//!
//! The pipeline only talks to its collaborators through traits
//! ([`FeedSource`], [`SnapshotStore`], and the orchestrator's
//! [`Summarizer`](crate::summarize::Summarizer)), so it can be driven
//! end-to-end in tests without network or disk.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{FetchError, PersistError};
use crate::merge::merge;
use crate::source::{FeedSnapshot, FeedSource};
use crate::store::SnapshotStore;
use crate::summarize::SummarizationOrchestrator;

/// Where a source is in its update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Merging,
    Summarizing,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Merging => "merging",
            Self::Summarizing => "summarizing",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a source's cycle was aborted.
#[derive(Debug, Error)]
pub enum SourceFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("save failed: {0}")]
    Persist(#[from] PersistError),
}

impl SourceFailure {
    /// The stage the source was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Fetch(_) => Stage::Fetching,
            Self::Persist(_) => Stage::Persisting,
        }
    }
}

/// What a successful cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    /// Entries in the saved snapshot.
    pub items: usize,
    /// Entries not seen in the previous snapshot.
    pub new_entries: usize,
    pub summarized: usize,
    pub summary_failures: usize,
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub source_id: String,
    pub result: Result<SourceReport, SourceFailure>,
}

impl SourceOutcome {
    /// Terminal stage of the cycle: `Done` or `Failed`.
    pub fn final_stage(&self) -> Stage {
        match self.result {
            Ok(_) => Stage::Done,
            Err(_) => Stage::Failed,
        }
    }
}

/// One outcome per source, in processing order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Per-source success flag, keyed by source identifier.
    pub fn flags(&self) -> impl Iterator<Item = (&str, bool)> {
        self.outcomes
            .iter()
            .map(|o| (o.source_id.as_str(), o.result.is_ok()))
    }
}

pub struct UpdatePipeline {
    source: Arc<dyn FeedSource>,
    store: Arc<dyn SnapshotStore>,
    orchestrator: SummarizationOrchestrator,
    max_items: usize,
}

impl UpdatePipeline {
    pub fn new(
        source: Arc<dyn FeedSource>,
        store: Arc<dyn SnapshotStore>,
        orchestrator: SummarizationOrchestrator,
        max_items: usize,
    ) -> Self {
        Self {
            source,
            store,
            orchestrator,
            max_items,
        }
    }

    /// Update every source in order.  Failures are recorded, never raised.
    pub async fn run(&self, sources: &[String]) -> RunReport {
        let mut report = RunReport::default();

        for source_id in sources {
            let result = self.update_source(source_id).await;
            match &result {
                Ok(r) => info!(
                    source = %source_id,
                    items = r.items,
                    new = r.new_entries,
                    summarized = r.summarized,
                    summary_failures = r.summary_failures,
                    "source updated"
                ),
                Err(e) => {
                    warn!(
                        source = %source_id,
                        stage = %e.stage(),
                        error = %e,
                        "source update failed"
                    );
                    enter(source_id, Stage::Failed);
                }
            }
            report.outcomes.push(SourceOutcome {
                source_id: source_id.clone(),
                result,
            });
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "update run complete"
        );
        report
    }

    /// Run one source through a full cycle.
    ///
    /// On failure nothing is written, so the stored snapshot stays as it was.
    pub async fn update_source(&self, source_id: &str) -> Result<SourceReport, SourceFailure> {
        enter(source_id, Stage::Fetching);
        let feed = self.source.fetch(source_id).await?;
        let previous = self
            .store
            .load(source_id)
            .await
            .map_err(FetchError::PreviousState)?;

        enter(source_id, Stage::Merging);
        let previous_items = previous.map(|s| s.items).unwrap_or_default();
        let outcome = merge(&previous_items, &feed.items, self.max_items);
        let new_entries = outcome.needs_summary.len();

        enter(source_id, Stage::Summarizing);
        let batch = self
            .orchestrator
            .summarize_new(outcome.merged, &outcome.needs_summary)
            .await;

        enter(source_id, Stage::Persisting);
        let snapshot = FeedSnapshot::assemble(source_id, &feed, batch.items, Utc::now());
        self.store.save(source_id, &snapshot).await?;

        enter(source_id, Stage::Done);
        Ok(SourceReport {
            items: snapshot.items.len(),
            new_entries,
            summarized: batch.generated,
            summary_failures: batch.failed,
        })
    }
}

fn enter(source_id: &str, stage: Stage) {
    debug!(source = %source_id, stage = %stage, "stage");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
