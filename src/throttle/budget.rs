//! Per-minute token budget for the summary service.
//!
//! The guard keeps one counter per window.  Callers estimate how many tokens
//! a request will cost, ask [`TokenBudgetGuard::reserve`] for room and, if
//! told to wait, sleep before asking again.  Both counters live behind a
//! single mutex so concurrent callers never lose an increment across a
//! window reset.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Length of one budget window.
pub const BUDGET_WINDOW: Duration = Duration::from_secs(60);

/// Default ceiling, a little under the service's 1M tokens/minute.
pub const DEFAULT_TOKENS_PER_MINUTE: u64 = 900_000;

/// Rough tokens-per-character ratio used for estimates.
pub const TOKENS_PER_CHAR: f64 = 0.4;

/// Estimated token cost of summarizing an entry.
pub fn estimate_tokens(title: &str, body: &str) -> u64 {
    let chars = title.chars().count() + body.chars().count();
    (chars as f64 * TOKENS_PER_CHAR).floor() as u64
}

/// Source of "now" for the guard, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Reads the tokio clock, which follows paused/advanced time in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct Window {
    consumed: u64,
    started: Instant,
}

pub struct TokenBudgetGuard {
    ceiling: u64,
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<Window>,
}

impl TokenBudgetGuard {
    pub fn new(ceiling: u64) -> Self {
        Self::with_clock(ceiling, BUDGET_WINDOW, Arc::new(TokioClock))
    }

    pub fn with_clock(ceiling: u64, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            ceiling,
            window,
            clock,
            state: Mutex::new(Window {
                consumed: 0,
                started,
            }),
        }
    }

    /// Try to reserve `estimated` tokens in the current window.
    ///
    /// Returns `Duration::ZERO` when the tokens were recorded.  Otherwise
    /// nothing is recorded and the return value is how long until the window
    /// rolls over; the caller sleeps that long and calls again.
    ///
    /// An estimate bigger than the whole ceiling is let through on an empty
    /// window, since no amount of waiting would ever make room for it.
    pub fn reserve(&self, estimated: u64) -> Duration {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let mut elapsed = now.saturating_duration_since(state.started);
        if elapsed >= self.window {
            state.consumed = 0;
            state.started = now;
            elapsed = Duration::ZERO;
        }

        if state.consumed > 0 && state.consumed.saturating_add(estimated) > self.ceiling {
            return self.window - elapsed;
        }

        state.consumed = state.consumed.saturating_add(estimated);
        Duration::ZERO
    }

    /// Reserve `estimated` tokens, sleeping through window resets as needed.
    ///
    /// Returns the total time spent waiting.
    pub async fn acquire(&self, estimated: u64) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let wait = self.reserve(estimated);
            if wait.is_zero() {
                return waited;
            }
            debug!(
                tokens = estimated,
                wait_ms = wait.as_millis() as u64,
                "token budget exhausted, waiting for next window"
            );
            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    /// Tokens recorded in the current window.
    pub fn consumed(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .consumed
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
