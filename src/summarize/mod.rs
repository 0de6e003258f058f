//! Generating summaries for new entries.
//!
//! [`Summarizer`] is the seam to the text-generation service;
//! [`SummarizationOrchestrator`] decides what to summarize and pushes the
//! calls through the throttling stack.

mod openai;
mod orchestrator;

pub use openai::{OpenAiSummarizer, SummarizerSettings};
pub use orchestrator::{SummarizationOrchestrator, SummaryBatch, SUMMARY_FALLBACK};

use async_trait::async_trait;

use crate::error::SummaryError;

/// Turns an entry's title and body into a short summary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, title: &str, body: &str) -> Result<String, SummaryError>;
}
