//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: one probe call tests whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: first call after reset_timeout (admitted as the probe)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (timer restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per protected dependency, shared by every caller
//! - A single mutex guards state and counters; it is never held across
//!   the wrapped operation's await point
//! - Single probe in Half-Open; concurrent callers are rejected meanwhile
//! - No retries and no timeouts inside the breaker; both belong to callers

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Current position in the breaker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    /// Numeric encoding for the state gauge (0=closed, 0.5=half-open, 1=open).
    pub fn gauge_value(&self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 0.5,
            Self::Open => 1.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a call made through a breaker.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The call was rejected without invoking the operation.
    #[error("circuit breaker '{name}' is open; retry after {retry_after:?}")]
    Open { name: String, retry_after: Duration },

    /// The operation ran and failed; its error is passed through unchanged.
    #[error(transparent)]
    Failed(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// The wrapped operation's error, if the operation ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Open { .. } => None,
            Self::Failed(e) => Some(e),
        }
    }
}

/// Point-in-time view of a breaker, for health and admin endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub consecutive_opens: u64,
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub rejections: u64,
    /// Percentage of successes over the rolling window.
    pub success_rate: f64,
    /// Seconds until a probe is admitted, while open.
    pub retry_after_secs: Option<f64>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    open_since: Option<Instant>,
    probe_in_flight: bool,
    consecutive_opens: u64,
    calls: u64,
    successes: u64,
    failures: u64,
    rejections: u64,
    window: VecDeque<bool>,
}

impl Inner {
    fn new(window_size: usize) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            open_since: None,
            probe_in_flight: false,
            consecutive_opens: 0,
            calls: 0,
            successes: 0,
            failures: 0,
            rejections: 0,
            window: VecDeque::with_capacity(window_size),
        }
    }

    fn success_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 100.0;
        }
        let ok = self.window.iter().filter(|ok| **ok).count();
        ok as f64 * 100.0 / self.window.len() as f64
    }
}

/// A call admitted by the breaker. Dropping it unfinished releases a probe slot.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    finished: bool,
}

impl Permit<'_> {
    fn finish(mut self, success: bool) {
        self.finished = true;
        self.breaker.record_outcome(self.probe, success);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.finished {
            let mut inner = self.breaker.lock();
            inner.probe_in_flight = false;
            tracing::debug!(breaker = %self.breaker.name, "Probe cancelled, slot released");
        }
    }
}

/// Call-wrapping fault isolation for one named dependency.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    window_size: usize,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let name = name.into();
        let window_size = config.window_size.max(1);
        let breaker = Self {
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: config.reset_timeout(),
            window_size,
            inner: Mutex::new(Inner::new(window_size)),
            name,
        };
        metrics::record_state(&breaker.name, CircuitState::Closed);
        metrics::record_consecutive_opens(&breaker.name, 0);
        metrics::record_success_rate(&breaker.name, 100.0);
        breaker
    }

    /// Create a closed breaker with an explicit reset timeout (sub-second allowed).
    pub fn with_reset_timeout(
        name: impl Into<String>,
        failure_threshold: u32,
        reset_timeout: Duration,
    ) -> Self {
        let mut breaker = Self::new(name, BreakerConfig::new(failure_threshold, reset_timeout));
        breaker.reset_timeout = reset_timeout;
        breaker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn consecutive_opens(&self) -> u64 {
        self.lock().consecutive_opens
    }

    /// Run `operation` under the breaker.
    ///
    /// Returns `BreakerError::Open` without invoking `operation` while the
    /// breaker is open (or a probe is already in flight). Otherwise the
    /// operation runs and its result is counted and returned unchanged.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.admit().map_err(|retry_after| BreakerError::Open {
            name: self.name.clone(),
            retry_after,
        })?;

        let outcome = operation().await;
        permit.finish(outcome.is_ok());
        outcome.map_err(BreakerError::Failed)
    }

    /// Current counters and state.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        let retry_after_secs = match (inner.state, inner.open_since) {
            (CircuitState::Open, Some(since)) => Some(
                self.reset_timeout
                    .saturating_sub(since.elapsed())
                    .as_secs_f64(),
            ),
            _ => None,
        };
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.failure_threshold,
            consecutive_opens: inner.consecutive_opens,
            calls: inner.calls,
            successes: inner.successes,
            failures: inner.failures,
            rejections: inner.rejections,
            success_rate: inner.success_rate(),
            retry_after_secs,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Decide whether a call may proceed. `Err` carries the suggested wait.
    fn admit(&self) -> Result<Permit<'_>, Duration> {
        let mut inner = self.lock();
        let now = Instant::now();

        let probe = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let since = inner.open_since.unwrap_or(now);
                let elapsed = now.saturating_duration_since(since);
                if elapsed < self.reset_timeout {
                    return Err(self.reject(&mut inner, self.reset_timeout - elapsed));
                }
                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                metrics::record_state(&self.name, CircuitState::HalfOpen);
                tracing::info!(
                    breaker = %self.name,
                    open_for = ?elapsed,
                    "Circuit half-open, admitting probe"
                );
                true
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    return Err(self.reject(&mut inner, Duration::ZERO));
                }
                inner.probe_in_flight = true;
                true
            }
        };

        inner.calls += 1;
        metrics::record_call(&self.name);

        Ok(Permit {
            breaker: self,
            probe,
            finished: false,
        })
    }

    fn reject(&self, inner: &mut Inner, retry_after: Duration) -> Duration {
        inner.rejections += 1;
        metrics::record_rejection(&self.name);
        tracing::debug!(
            breaker = %self.name,
            state = %inner.state,
            retry_after = ?retry_after,
            "Call rejected"
        );
        retry_after
    }

    fn record_outcome(&self, probe: bool, success: bool) {
        let mut inner = self.lock();
        if inner.window.len() == self.window_size {
            inner.window.pop_front();
        }
        inner.window.push_back(success);

        if success {
            inner.successes += 1;
            inner.failure_count = 0;
            metrics::record_success(&self.name);

            if probe {
                inner.probe_in_flight = false;
                inner.state = CircuitState::Closed;
                inner.open_since = None;
                metrics::record_state(&self.name, CircuitState::Closed);
                tracing::info!(breaker = %self.name, "Probe succeeded, circuit closed");
            }
        } else {
            inner.failures += 1;
            inner.failure_count += 1;
            metrics::record_failure(&self.name);

            if probe {
                inner.probe_in_flight = false;
                self.trip(&mut inner);
            } else if inner.state == CircuitState::Closed
                && inner.failure_count >= self.failure_threshold
            {
                self.trip(&mut inner);
            }
        }

        metrics::record_success_rate(&self.name, inner.success_rate());
    }

    fn trip(&self, inner: &mut Inner) {
        inner.state = CircuitState::Open;
        inner.open_since = Some(Instant::now());
        inner.consecutive_opens += 1;
        metrics::record_state(&self.name, CircuitState::Open);
        metrics::record_consecutive_opens(&self.name, inner.consecutive_opens);
        tracing::warn!(
            breaker = %self.name,
            failure_count = inner.failure_count,
            consecutive_opens = inner.consecutive_opens,
            reset_timeout = ?self.reset_timeout,
            "Circuit opened"
        );
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .field("failure_threshold", &self.failure_threshold)
            .field("reset_timeout", &self.reset_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Boom;

    fn breaker(threshold: u32, reset_secs: u64) -> CircuitBreaker {
        CircuitBreaker::with_reset_timeout("test", threshold, Duration::from_secs(reset_secs))
    }

    async fn fail(breaker: &CircuitBreaker, invoked: &AtomicU32) -> Result<(), BreakerError<Boom>> {
        breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Boom)
            })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, invoked: &AtomicU32) -> Result<u32, BreakerError<Boom>> {
        breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Boom>(7)
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_stays_closed_below_threshold() {
        let breaker = breaker(3, 60);
        let invoked = AtomicU32::new(0);

        for _ in 0..2 {
            assert!(matches!(fail(&breaker, &invoked).await, Err(BreakerError::Failed(Boom))));
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 2);
        assert_eq!(invoked.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let breaker = breaker(3, 60);
        let invoked = AtomicU32::new(0);

        fail(&breaker, &invoked).await.unwrap_err();
        fail(&breaker, &invoked).await.unwrap_err();
        assert_eq!(succeed(&breaker, &invoked).await.unwrap(), 7);
        fail(&breaker, &invoked).await.unwrap_err();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_failure_opens_once() {
        let breaker = breaker(3, 60);
        let invoked = AtomicU32::new(0);

        for _ in 0..3 {
            fail(&breaker, &invoked).await.unwrap_err();
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.consecutive_opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_without_invoking() {
        let breaker = breaker(3, 60);
        let invoked = AtomicU32::new(0);
        for _ in 0..3 {
            fail(&breaker, &invoked).await.unwrap_err();
        }

        tokio::time::advance(Duration::from_secs(30)).await;
        for _ in 0..5 {
            let err = succeed(&breaker, &invoked).await.unwrap_err();
            match err {
                BreakerError::Open { name, retry_after } => {
                    assert_eq!(name, "test");
                    assert_eq!(retry_after, Duration::from_secs(30));
                }
                BreakerError::Failed(_) => panic!("operation should not have run"),
            }
        }

        assert_eq!(invoked.load(Ordering::SeqCst), 3);
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.rejections, 5);
        assert_eq!(snapshot.calls, 3);
        assert_eq!(snapshot.failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_scenario() {
        // threshold=3, reset_timeout=60s
        let breaker = breaker(3, 60);
        let invoked = AtomicU32::new(0);
        for _ in 0..3 {
            fail(&breaker, &invoked).await.unwrap_err();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(succeed(&breaker, &invoked).await.unwrap_err().is_open());
        assert_eq!(invoked.load(Ordering::SeqCst), 3);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(succeed(&breaker, &invoked).await.unwrap(), 7);
        assert_eq!(invoked.load(Ordering::SeqCst), 4);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);

        // A single failure after recovery does not reopen.
        fail(&breaker, &invoked).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_admitted_exactly_at_timeout() {
        let breaker = breaker(1, 10);
        let invoked = AtomicU32::new(0);
        fail(&breaker, &invoked).await.unwrap_err();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(succeed(&breaker, &invoked).await.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_restarts_timer() {
        let breaker = breaker(2, 60);
        let invoked = AtomicU32::new(0);
        fail(&breaker, &invoked).await.unwrap_err();
        fail(&breaker, &invoked).await.unwrap_err();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(matches!(fail(&breaker, &invoked).await, Err(BreakerError::Failed(Boom))));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.consecutive_opens(), 2);

        // Timer was restarted by the failed probe, not carried over.
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(succeed(&breaker, &invoked).await.unwrap_err().is_open());
        assert_eq!(invoked.load(Ordering::SeqCst), 3);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(succeed(&breaker, &invoked).await.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_in_half_open() {
        let breaker = Arc::new(breaker(1, 5));
        let invoked = AtomicU32::new(0);
        fail(&breaker, &invoked).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(5)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let probe_breaker = breaker.clone();
        let probe = tokio::spawn(async move {
            probe_breaker
                .call(|| async move {
                    let _ = release_rx.await;
                    Ok::<_, Boom>(())
                })
                .await
        });
        tokio::task::yield_now().await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Second caller is shed while the probe is in flight.
        let err = succeed(&breaker, &invoked).await.unwrap_err();
        assert!(matches!(err, BreakerError::Open { retry_after, .. } if retry_after == Duration::ZERO));

        release_tx.send(()).unwrap();
        probe.await.unwrap().unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_probe_releases_slot() {
        let breaker = breaker(1, 5);
        let invoked = AtomicU32::new(0);
        fail(&breaker, &invoked).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(5)).await;

        let hung = breaker.call(|| std::future::pending::<Result<(), Boom>>());
        let timed_out = tokio::time::timeout(Duration::from_secs(1), hung).await;
        assert!(timed_out.is_err());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        assert!(succeed(&breaker, &invoked).await.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_counted_exactly() {
        let breaker = Arc::new(breaker(3, 60));
        let batch = 10;
        let barrier = Arc::new(tokio::sync::Barrier::new(batch));

        let mut handles = Vec::new();
        for _ in 0..batch {
            let breaker = breaker.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        // Every call is admitted while closed before any fails.
                        barrier.wait().await;
                        Err::<(), _>(Boom)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Err(BreakerError::Failed(Boom))));
        }

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.failure_count, batch as u32);
        assert_eq!(snapshot.failures, batch as u64);
        assert_eq!(snapshot.consecutive_opens, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rolling_success_rate() {
        let breaker = CircuitBreaker::new(
            "window",
            BreakerConfig {
                failure_threshold: 100,
                reset_timeout_secs: 1,
                window_size: 4,
            },
        );
        let invoked = AtomicU32::new(0);
        assert_eq!(breaker.snapshot().success_rate, 100.0);

        fail(&breaker, &invoked).await.unwrap_err();
        fail(&breaker, &invoked).await.unwrap_err();
        succeed(&breaker, &invoked).await.unwrap();
        succeed(&breaker, &invoked).await.unwrap();
        assert_eq!(breaker.snapshot().success_rate, 50.0);

        // Oldest failures fall out of the window.
        succeed(&breaker, &invoked).await.unwrap();
        succeed(&breaker, &invoked).await.unwrap();
        assert_eq!(breaker.snapshot().success_rate, 100.0);
    }

    #[test]
    fn test_state_gauge_encoding() {
        assert_eq!(CircuitState::Closed.gauge_value(), 0.0);
        assert_eq!(CircuitState::HalfOpen.gauge_value(), 0.5);
        assert_eq!(CircuitState::Open.gauge_value(), 1.0);
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
            "\"half_open\""
        );
    }
}
