//! Throttled summarization of newly merged entries.
//!
//! For every entry that is new and still has no summary:
//!
//! 1. estimate its token cost and reserve it on the [`TokenBudgetGuard`],
//!    holding up the whole submission loop while the budget is exhausted;
//! 2. run the summarizer through the [`RequestScheduler`], with the
//!    [`RetryPolicy`] wrapped around each scheduled attempt (every retry
//!    reserves the estimate again);
//! 3. attach the result by link, or [`SUMMARY_FALLBACK`] if every attempt
//!    failed.
//!
//! A failed entry never fails the batch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::Summarizer;
use crate::error::SummaryError;
use crate::source::FeedEntry;
use crate::throttle::{estimate_tokens, RequestScheduler, RetryPolicy, TokenBudgetGuard};

/// Placeholder attached when a summary could not be generated.
pub const SUMMARY_FALLBACK: &str = "summary generation failed";

/// Merged entries with summaries attached, plus counts for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryBatch {
    pub items: Vec<FeedEntry>,
    /// Entries that received a generated summary.
    pub generated: usize,
    /// Entries that received the fallback text.
    pub failed: usize,
}

pub struct SummarizationOrchestrator {
    summarizer: Arc<dyn Summarizer>,
    scheduler: Arc<RequestScheduler>,
    budget: Arc<TokenBudgetGuard>,
    retry: RetryPolicy,
}

impl SummarizationOrchestrator {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        scheduler: Arc<RequestScheduler>,
        budget: Arc<TokenBudgetGuard>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            summarizer,
            scheduler,
            budget,
            retry,
        }
    }

    /// Attach summaries to the entries of `merged` listed in `needs_summary`.
    ///
    /// Order of `merged` is preserved no matter which calls finish first.
    pub async fn summarize_new(
        &self,
        merged: Vec<FeedEntry>,
        needs_summary: &[FeedEntry],
    ) -> SummaryBatch {
        let pending: HashSet<&str> = merged
            .iter()
            .filter(|e| !e.has_summary())
            .filter_map(FeedEntry::identity)
            .collect();

        let mut tasks = JoinSet::new();
        let mut dispatched = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for entry in needs_summary {
            let Some(link) = entry.identity() else {
                continue;
            };
            if !pending.contains(link) || !seen.insert(link) {
                continue;
            }

            let body = entry.summary_input();
            let estimate = estimate_tokens(&entry.title, body);
            let waited = self.budget.acquire(estimate).await;
            if !waited.is_zero() {
                info!(
                    waited_ms = waited.as_millis() as u64,
                    "resumed after token budget window reset"
                );
            }

            dispatched.push(link.to_string());
            tasks.spawn(self.summarize_one(
                link.to_string(),
                entry.title.clone(),
                body.to_string(),
                estimate,
            ));
        }

        let mut summaries: HashMap<String, String> = HashMap::with_capacity(dispatched.len());
        let mut generated = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((link, Ok(text))) => {
                    generated += 1;
                    summaries.insert(link, text);
                }
                Ok((link, Err(e))) => {
                    warn!(link = %link, error = %e, "summary failed, attaching placeholder");
                }
                Err(e) => warn!(error = %e, "summary task panicked"),
            }
        }

        let mut failed = 0;
        for link in dispatched {
            summaries.entry(link).or_insert_with(|| {
                failed += 1;
                SUMMARY_FALLBACK.to_string()
            });
        }

        let items = merged
            .into_iter()
            .map(|mut entry| {
                if let Some(text) = entry.identity().and_then(|l| summaries.remove(l)) {
                    entry.summary = Some(text);
                }
                entry
            })
            .collect();

        debug!(generated, failed, "summary batch complete");
        SummaryBatch {
            items,
            generated,
            failed,
        }
    }

    /// A `'static` future summarizing one entry, retries included.
    ///
    /// The first attempt's tokens were reserved by the caller; each retry
    /// reserves `estimate` again before it is scheduled.
    fn summarize_one(
        &self,
        link: String,
        title: String,
        body: String,
        estimate: u64,
    ) -> impl std::future::Future<Output = (String, Result<String, SummaryError>)> + Send + 'static
    {
        let summarizer = self.summarizer.clone();
        let scheduler = self.scheduler.clone();
        let budget = self.budget.clone();
        let retry = self.retry.clone();
        let title: Arc<str> = title.into();
        let body: Arc<str> = body.into();

        async move {
            let mut reserved = true;
            let result = retry
                .execute(|| {
                    let summarizer = summarizer.clone();
                    let scheduler = scheduler.clone();
                    let budget = budget.clone();
                    let title = title.clone();
                    let body = body.clone();
                    let needs_reservation = !std::mem::replace(&mut reserved, false);
                    async move {
                        if needs_reservation {
                            budget.acquire(estimate).await;
                        }
                        scheduler
                            .submit(async move { summarizer.summarize(&title, &body).await })
                            .await
                            .map_err(SummaryError::from)
                            .and_then(|r| r)
                    }
                })
                .await;
            (link, result)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
