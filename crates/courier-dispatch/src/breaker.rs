//! Circuit breaker protecting the provider.
//!
//! Tracks consecutive failures and trips open once the threshold is
//! reached. After the recovery timeout the breaker half-opens and admits a
//! bounded number of probes; the first probe success closes it, any probe
//! failure reopens it. State is per process — redelivery covers restarts,
//! so nothing is persisted.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation.
    Closed,
    /// Tripped; calls are refused.
    Open,
    /// Testing recovery with a bounded number of probes.
    HalfOpen,
}

/// Configuration for breaker behavior.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Time the circuit stays open before half-opening.
    pub recovery_timeout: Duration,
    /// Probe calls admitted while half-open.
    pub half_open_max_probes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(20),
            half_open_max_probes: 3,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_probes: u32,
}

/// Per-process, per-provider circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_probes: 0,
            }),
        }
    }

    /// Current state (after applying any due open→half-open transition).
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.transition_if_due(&mut inner);
        inner.state
    }

    /// Whether a call would currently be admitted, without consuming a
    /// half-open probe slot. Callers use this to refuse cheaply before
    /// spending other resources (e.g. rate-limit tokens).
    pub fn allows(&self) -> bool {
        let mut inner = self.lock();
        self.transition_if_due(&mut inner);
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => inner.half_open_probes < self.config.half_open_max_probes,
        }
    }

    /// Admit a call. In half-open this consumes one probe slot.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.lock();
        self.transition_if_due(&mut inner);
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => {
                if inner.half_open_probes < self.config.half_open_max_probes {
                    inner.half_open_probes += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call. A half-open success closes the circuit.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                tracing::info!(target: "circuit_breaker", "Circuit closed after successful probe");
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.half_open_probes = 0;
            }
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            BreakerState::Open => {}
        }
    }

    /// Record a failed call. Trips the circuit at the threshold and
    /// reopens it on a failed probe.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        target: "circuit_breaker",
                        failures = inner.consecutive_failures,
                        "Circuit opened after consecutive failures"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.half_open_probes = 0;
                }
            }
            BreakerState::HalfOpen => {
                tracing::warn!(target: "circuit_breaker", "Circuit reopened after failed probe");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_probes = 0;
            }
            BreakerState::Open => {}
        }
    }

    fn transition_if_due(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open {
            let elapsed = inner
                .opened_at
                .map(|at| at.elapsed())
                .unwrap_or(Duration::ZERO);
            if elapsed >= self.config.recovery_timeout {
                tracing::info!(target: "circuit_breaker", "Circuit half-open; admitting probes");
                inner.state = BreakerState::HalfOpen;
                inner.half_open_probes = 0;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-update; breaker state is
        // advisory, so continue with whatever is there.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, recovery: Duration, probes: u32) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            recovery_timeout: recovery,
            half_open_max_probes: probes,
        })
    }

    #[test]
    fn test_starts_closed_and_allows() {
        let cb = breaker(10, Duration::from_secs(20), 3);
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(cb.try_acquire());
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let cb = breaker(10, Duration::from_secs(20), 3);
        for _ in 0..9 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), BreakerState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.try_acquire());
        assert!(!cb.allows());
    }

    #[test]
    fn test_success_resets_consecutive_count() {
        let cb = breaker(3, Duration::from_secs(20), 3);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_opens_after_recovery_timeout() {
        let cb = breaker(1, Duration::from_millis(10), 3);
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert!(cb.try_acquire());
    }

    #[test]
    fn test_half_open_limits_probes() {
        let cb = breaker(1, Duration::from_millis(10), 3);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(15));

        assert!(cb.try_acquire());
        assert!(cb.try_acquire());
        assert!(cb.try_acquire());
        assert!(!cb.try_acquire(), "fourth probe must be refused");
        assert!(!cb.allows());
    }

    #[test]
    fn test_probe_success_closes() {
        let cb = breaker(1, Duration::from_millis(10), 3);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(15));

        assert!(cb.try_acquire());
        cb.record_success();
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(cb.try_acquire());
    }

    #[test]
    fn test_probe_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(10), 3);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(15));

        assert!(cb.try_acquire());
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.try_acquire());
    }
}
