//! Error taxonomy for the update pipeline.
//!
//! | Error            | Scope  | Effect                                          |
//! |------------------|--------|-------------------------------------------------|
//! | `FetchError`     | source | cycle aborted before merge, stored state intact |
//! | `PersistError`   | source | cycle aborted, in-memory summaries lost         |
//! | `SummaryError`   | entry  | retried, then the entry gets a placeholder      |
//! | `SchedulerError` | entry  | treated like a retryable summary failure        |
//!
//! Nothing in here escalates to the whole run; only configuration problems
//! do (see [`crate::config::ConfigError`]).

use std::path::PathBuf;

use thiserror::Error;

use crate::throttle::Retryable;

/// The source could not be retrieved or its previous state could not be read.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed feed: {0}")]
    Parse(#[from] rss::Error),

    #[error("previous snapshot unreadable: {0}")]
    PreviousState(#[source] PersistError),
}

/// Reading or writing a snapshot failed.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A single summarization call failed.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// The service rejected us for exceeding its rate limit.  Retrying inside
    /// the same window is pointless, so this aborts the retry loop.
    #[error("rate limited by summary service: {0}")]
    RateLimited(String),

    #[error("summary request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("summary service answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("summary service returned no text")]
    EmptyResponse,

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl Retryable for SummaryError {
    fn is_abort(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// The request scheduler could not deliver a task's result.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is shut down or the task panicked")]
    Closed,
}
