//! Circuit Breaker for LLM calls
//!
//! Fails fast once an operation keeps failing, then lets a single probe call
//! through after a cool-down to test recovery.
//!
//! ## States
//!
//! - **Closed**: Normal operation, calls flow through
//! - **Open**: Calls are rejected without running the operation
//! - **HalfOpen**: One probe call is in flight; everyone else is rejected
//!
//! ## Transitions
//!
//! ```text
//! Closed --[failure_threshold consecutive failures]--> Open
//! Open --[cooldown elapsed, next call]--> HalfOpen
//! HalfOpen --[probe success]--> Closed
//! HalfOpen --[probe failure]--> Open (fresh timestamp)
//! HalfOpen --[probe cancelled or dropped]--> Open (same timestamp)
//! ```

use std::future::Future;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerSettings;
use crate::constants::circuit_breaker as cb_constants;
use crate::types::{ExtractError, Result};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    /// Probe call in flight
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Time the breaker stays open before allowing a probe
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: cb_constants::FAILURE_THRESHOLD,
            cooldown: Duration::from_secs(cb_constants::COOLDOWN_SECS),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn from_settings(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            cooldown: Duration::from_secs(settings.cooldown_secs),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    blocked_count: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            blocked_count: 0,
        }
    }
}

/// Thread-safe circuit breaker.
///
/// All state lives behind one `RwLock` so the failure count and the state
/// transition it triggers are always observed together.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    name: String,
    inner: RwLock<Inner>,
}

/// Releases an in-flight probe when the call never reports an outcome
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.release_probe();
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let config = CircuitBreakerConfig {
            failure_threshold: config.failure_threshold.max(1),
            ..config
        };
        Self {
            config,
            name: name.into(),
            inner: RwLock::new(Inner::new()),
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Run `operation` under the breaker.
    ///
    /// Returns [`ExtractError::CircuitOpen`] without running the operation
    /// while the breaker is open or a probe is already in flight.
    /// Cancellation outcomes are neither successes nor failures.
    pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let is_probe = self.acquire()?;
        let mut guard = ProbeGuard {
            breaker: self,
            armed: is_probe,
        };

        let result = operation().await;

        // A cancelled probe stays armed and is released by the guard
        match &result {
            Ok(_) => {
                self.record_success();
                guard.armed = false;
            }
            Err(e) if e.is_cancelled() => {}
            Err(_) => {
                self.record_failure();
                guard.armed = false;
            }
        }

        result
    }

    /// Admit a call. `Ok(true)` means the caller holds the single probe slot.
    fn acquire(&self) -> Result<bool> {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_none_or(|t| t.elapsed() >= self.config.cooldown);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    tracing::info!(
                        "Circuit breaker [{}]: Cooldown elapsed, allowing probe call",
                        self.name
                    );
                    Ok(true)
                } else {
                    inner.blocked_count += 1;
                    tracing::debug!(
                        "Circuit breaker [{}]: Call blocked (circuit OPEN)",
                        self.name
                    );
                    Err(ExtractError::CircuitOpen)
                }
            }
            CircuitState::HalfOpen => {
                inner.blocked_count += 1;
                tracing::debug!(
                    "Circuit breaker [{}]: Call blocked (probe in flight)",
                    self.name
                );
                Err(ExtractError::CircuitOpen)
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        inner.failure_count = 0;
        if inner.state != CircuitState::Closed {
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
            tracing::info!("Circuit breaker [{}]: Closed (call succeeded)", self.name);
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        "Circuit breaker [{}]: Opened after {} failures (cooldown: {:?})",
                        self.name,
                        inner.failure_count,
                        self.config.cooldown
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.failure_count += 1;
                tracing::warn!(
                    "Circuit breaker [{}]: Re-opened after failed probe",
                    self.name
                );
            }
            CircuitState::Open => {
                // Late failure from a call admitted before the breaker opened
                inner.failure_count += 1;
            }
        }
    }

    fn release_probe(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Open;
            tracing::debug!(
                "Circuit breaker [{}]: Probe abandoned, slot released",
                self.name
            );
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .state
    }

    /// True while calls are not flowing freely (open or probing)
    pub fn is_open(&self) -> bool {
        self.state() != CircuitState::Closed
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            blocked_count: inner.blocked_count,
            time_in_state: inner.opened_at.map(|t| t.elapsed()),
        }
    }

    /// Force the breaker closed
    pub fn reset(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;

        tracing::info!("Circuit breaker [{}]: Manually reset to CLOSED", self.name);
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub blocked_count: u64,
    pub time_in_state: Option<Duration>,
}

impl CircuitBreakerStats {
    pub fn summary(&self) -> String {
        let time_str = self
            .time_in_state
            .map(|d| format!(" for {:.1}s", d.as_secs_f64()))
            .unwrap_or_default();

        format!(
            "[{}] {} | failures={} blocked={}{}",
            self.name, self.state, self.failure_count, self.blocked_count, time_str
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown,
            },
        )
    }

    async fn fail(cb: &CircuitBreaker, calls: &AtomicU32) -> Result<()> {
        cb.call(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ExtractError::llm("network unreachable"))
        })
        .await
    }

    async fn succeed(cb: &CircuitBreaker, calls: &AtomicU32) -> Result<u32> {
        cb.call(move || async move { Ok(calls.fetch_add(1, Ordering::SeqCst)) })
            .await
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_rejects_without_invoking() {
        let cb = breaker(3, Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            assert!(fail(&cb, &calls).await.is_err());
        }
        assert!(!cb.is_open());

        assert!(fail(&cb, &calls).await.is_err());
        assert!(cb.is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let err = succeed(&cb, &calls).await.unwrap_err();
        assert!(matches!(err, ExtractError::CircuitOpen));
        assert_eq!(err.to_string(), "circuit breaker is open");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cb.stats().blocked_count, 1);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        fail(&cb, &calls).await.unwrap_err();
        succeed(&cb, &calls).await.unwrap();
        fail(&cb, &calls).await.unwrap_err();
        fail(&cb, &calls).await.unwrap_err();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failure_count, 2);
    }

    #[tokio::test]
    async fn test_probe_after_cooldown_closes_on_success() {
        let cb = breaker(1, Duration::from_millis(20));
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        assert!(succeed(&cb, &calls).await.is_err());

        tokio::time::sleep(Duration::from_millis(40)).await;

        succeed(&cb, &calls).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_probe_failure_reopens_with_fresh_timestamp() {
        let cb = breaker(1, Duration::from_millis(30));
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(50)).await;

        fail(&cb, &calls).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        // Fresh cooldown: immediately rejected again
        assert!(matches!(
            succeed(&cb, &calls).await,
            Err(ExtractError::CircuitOpen)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_only_one_probe_in_flight() {
        let cb = breaker(1, Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let probe = cb.call(|| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ExtractError>("probe")
        });
        let contender = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            succeed(&cb, &calls).await
        };

        let (probe_result, contender_result) = tokio::join!(probe, contender);
        assert_eq!(probe_result.unwrap(), "probe");
        assert!(matches!(contender_result, Err(ExtractError::CircuitOpen)));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_cancelled_probe_releases_slot() {
        let cb = breaker(1, Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result: Result<()> = cb.call(|| async { Err(ExtractError::Cancelled) }).await;
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(cb.state(), CircuitState::Open);

        // Cooldown was not restarted, so the next call probes straight away
        succeed(&cb, &calls).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_dropped_probe_releases_slot() {
        let cb = breaker(1, Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cb.call(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ExtractError>(())
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(cb.state(), CircuitState::Open);

        succeed(&cb, &calls).await.unwrap();
        assert!(!cb.is_open());
    }

    #[tokio::test]
    async fn test_manual_reset() {
        let cb = breaker(1, Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        assert!(cb.is_open());

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        succeed(&cb, &calls).await.unwrap();
    }

    #[test]
    fn test_stats_summary() {
        let cb = breaker(2, Duration::from_secs(60));
        cb.record_failure();
        let summary = cb.stats().summary();
        assert!(summary.contains("[test] CLOSED"));
        assert!(summary.contains("failures=1"));
    }
}
