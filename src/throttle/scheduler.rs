//! Global admission control for outbound summary requests.
//!
//! Every request goes through one [`RequestScheduler`].  It bounds how many
//! tasks run at once and how many are started per rolling interval.
//!
//! ```text
//!  submit() ──► unbounded queue ──► dispatcher ──► tokio::spawn(task)
//!   (FIFO)                          │ 1. wait for an in-flight permit
//!                                   │ 2. wait for a rate slot
//! ```
//!
//! The dispatcher is the only writer of the rate log and the only holder of
//! the semaphore, so admission is strictly in submission order.  Tasks may
//! finish in any order; each caller gets its own result back over a oneshot.
//! Retrying is not the scheduler's job: wrap `submit` in a
//! [`RetryPolicy`](super::RetryPolicy) and every attempt is admitted again.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::Instant;
use tracing::trace;

use crate::error::SchedulerError;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Limits enforced by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerLimits {
    /// Tasks allowed to run at the same time.
    pub max_in_flight: usize,
    /// Tasks allowed to start within any `interval`.
    pub max_per_interval: usize,
    pub interval: Duration,
}

impl Default for SchedulerLimits {
    fn default() -> Self {
        Self {
            max_in_flight: 3,
            max_per_interval: 15,
            interval: Duration::from_secs(60),
        }
    }
}

pub struct RequestScheduler {
    queue: mpsc::UnboundedSender<Job>,
    limits: SchedulerLimits,
}

impl RequestScheduler {
    /// Start the dispatcher.  Must be called from within a tokio runtime.
    pub fn new(limits: SchedulerLimits) -> Self {
        let (queue, jobs) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(jobs, limits.clone()));
        Self { queue, limits }
    }

    pub fn limits(&self) -> &SchedulerLimits {
        &self.limits
    }

    /// Queue `task` for execution.
    ///
    /// The task is enqueued immediately, before the returned future is first
    /// polled, so submission order is call order.  The returned future
    /// resolves with the task's output once it has run.
    pub fn submit<F, T>(&self, task: F) -> impl Future<Output = Result<T, SchedulerError>> + Send + 'static
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            // receiver gone means the caller stopped caring
            let _ = tx.send(task.await);
        });
        let queued = self.queue.send(job).is_ok();

        async move {
            if !queued {
                return Err(SchedulerError::Closed);
            }
            rx.await.map_err(|_| SchedulerError::Closed)
        }
    }
}

async fn dispatch(mut jobs: mpsc::UnboundedReceiver<Job>, limits: SchedulerLimits) {
    let in_flight = Arc::new(Semaphore::new(limits.max_in_flight.max(1)));
    let mut started: VecDeque<Instant> = VecDeque::new();

    while let Some(job) = jobs.recv().await {
        let Ok(permit) = in_flight.clone().acquire_owned().await else {
            break;
        };
        wait_for_rate_slot(&mut started, &limits).await;
        trace!(
            running = limits.max_in_flight.max(1) - in_flight.available_permits(),
            "dispatching task"
        );

        tokio::spawn(async move {
            job.await;
            drop(permit);
        });
    }
}

/// Block until fewer than `max_per_interval` tasks started within the last
/// `interval`, then record a start at the current instant.
async fn wait_for_rate_slot(started: &mut VecDeque<Instant>, limits: &SchedulerLimits) {
    let max = limits.max_per_interval.max(1);
    loop {
        let now = Instant::now();
        while started
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= limits.interval)
        {
            started.pop_front();
        }

        if started.len() < max {
            started.push_back(now);
            return;
        }

        if let Some(oldest) = started.front() {
            let until = *oldest + limits.interval;
            trace!(wait_ms = (until - now).as_millis() as u64, "rate limit reached");
            tokio::time::sleep_until(until).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn limits(max_in_flight: usize, max_per_interval: usize) -> SchedulerLimits {
        SchedulerLimits {
            max_in_flight,
            max_per_interval,
            interval: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_concurrency_bound() {
        let scheduler = RequestScheduler::new(limits(3, 100));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut pending = Vec::new();
        for _ in 0..10 {
            let running = running.clone();
            let peak = peak.clone();
            pending.push(scheduler.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for p in pending {
            p.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_defers_excess_tasks_to_next_interval() {
        let scheduler = RequestScheduler::new(limits(10, 2));
        let origin = Instant::now();

        let mut pending = Vec::new();
        for _ in 0..3 {
            pending.push(scheduler.submit(async move { Instant::now() }));
        }
        let mut starts = Vec::new();
        for p in pending {
            starts.push(p.await.unwrap() - origin);
        }

        assert!(starts[0] < Duration::from_secs(1));
        assert!(starts[1] < Duration::from_secs(1));
        assert!(starts[2] >= Duration::from_secs(60), "third start waits a full interval");
    }

    #[tokio::test(start_paused = true)]
    async fn admits_in_submission_order() {
        let scheduler = RequestScheduler::new(limits(1, 100));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut pending = Vec::new();
        for i in 0..6 {
            let order = order.clone();
            pending.push(scheduler.submit(async move {
                order.lock().unwrap().push(i);
                tokio::task::yield_now().await;
            }));
        }
        for p in pending {
            p.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn results_reach_their_own_caller_when_completing_out_of_order() {
        let scheduler = RequestScheduler::new(limits(3, 100));

        let slow = scheduler.submit(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "slow"
        });
        let fast = scheduler.submit(async { "fast" });

        assert_eq!(fast.await.unwrap(), "fast");
        assert_eq!(slow.await.unwrap(), "slow");
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_inspect_task_errors() {
        let scheduler = RequestScheduler::new(SchedulerLimits::default());
        let out: Result<Result<(), &str>, _> = scheduler.submit(async { Err("boom") }).await;
        assert_eq!(out.unwrap(), Err("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_task_reports_closed_and_frees_its_slot() {
        let scheduler = RequestScheduler::new(limits(1, 100));

        let boom = scheduler.submit(async {
            panic!("task exploded");
        });
        let after = scheduler.submit(async { 7 });

        assert!(matches!(boom.await, Err(SchedulerError::Closed)));
        assert_eq!(after.await.unwrap(), 7);
    }
}
