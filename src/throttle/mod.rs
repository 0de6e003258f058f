//! Throttling primitives for calls to the summary service.
//!
//! Three independent layers, composed by the
//! [`SummarizationOrchestrator`](crate::summarize::SummarizationOrchestrator):
//!
//! * [`TokenBudgetGuard`]: estimated tokens per minute.
//! * [`RequestScheduler`]: concurrent requests and requests per minute.
//! * [`RetryPolicy`]: bounded exponential backoff with an abort signal.

mod budget;
mod retry;
mod scheduler;

pub use budget::{
    estimate_tokens, Clock, TokenBudgetGuard, TokioClock, BUDGET_WINDOW,
    DEFAULT_TOKENS_PER_MINUTE, TOKENS_PER_CHAR,
};
pub use retry::{RetryPolicy, Retryable};
pub use scheduler::{RequestScheduler, SchedulerLimits};
