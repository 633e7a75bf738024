//! Per-tool circuit breakers.
//!
//! Every tool gets a breaker that trips open after `fail_max` consecutive
//! failures and admits a probe call once `reset_timeout` has elapsed.  An
//! open breaker causes [`crate::invoker::ToolInvoker`] to fail the call
//! without touching the handler, so a dead upstream provider does not burn a
//! timeout on every reasoning step.
//!
//! State machine: `Closed → Open` (after `fail_max` consecutive failures),
//! `Open → HalfOpen` (after `reset_timeout`), `HalfOpen → Closed` on a
//! successful probe, `HalfOpen → Open` on a failed one.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Breaker thresholds, shared by every tool unless overridden upstream.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub fail_max: u32,
    /// How long the breaker stays open before admitting a probe call.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            fail_max: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// Breaker
// ---------------------------------------------------------------------------

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected without reaching the handler.
    Open,
    /// The reset timeout elapsed; probe calls are admitted.
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Circuit breaker for a single tool.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Ask whether a call may proceed.
    ///
    /// Transitions `Open → HalfOpen` when the reset timeout has elapsed.
    /// While half-open, every caller is admitted as a probe; the first
    /// recorded result decides the next state.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    inner.state = BreakerState::HalfOpen;
                    tracing::debug!("breaker half-open, admitting probe");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call; closes the breaker.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state != BreakerState::Closed {
            tracing::info!("breaker closed after successful call");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    /// Record a failed call; may open the breaker.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.consecutive_failures += 1;

        let should_open = inner.state == BreakerState::HalfOpen
            || inner.consecutive_failures >= self.config.fail_max;

        if should_open && inner.state != BreakerState::Open {
            tracing::warn!(
                failures = inner.consecutive_failures,
                "breaker opened"
            );
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }
}

// ---------------------------------------------------------------------------
// Breaker set
// ---------------------------------------------------------------------------

/// Lazily-created breakers keyed by tool name.
#[derive(Debug)]
pub struct BreakerSet {
    config: BreakerConfig,
    inner: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerSet {
    /// Create an empty set with the given per-tool thresholds.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: DashMap::new(),
        }
    }

    /// Get or create the breaker for a tool.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        self.inner
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.clone())))
            .value()
            .clone()
    }

    /// State of a tool's breaker, if one has been created.
    pub fn state(&self, name: &str) -> Option<BreakerState> {
        self.inner.get(name).map(|b| b.state())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> BreakerConfig {
        BreakerConfig {
            fail_max: 3,
            reset_timeout: Duration::from_millis(20),
        }
    }

    #[test]
    fn opens_after_fail_max_consecutive_failures() {
        let breaker = CircuitBreaker::new(quick_config());

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.try_acquire());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(quick_config());

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        // Only two consecutive failures since the success.
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_probe_closes_on_success() {
        let breaker = CircuitBreaker::new(quick_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.try_acquire());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_probe_reopens_on_failure() {
        let breaker = CircuitBreaker::new(quick_config());
        for _ in 0..3 {
            breaker.record_failure();
        }

        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.try_acquire());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.try_acquire());
    }

    #[test]
    fn breaker_set_isolates_tools() {
        let set = BreakerSet::new(quick_config());
        for _ in 0..3 {
            set.breaker("weather_forecast").record_failure();
        }

        assert_eq!(set.state("weather_forecast"), Some(BreakerState::Open));
        assert!(set.breaker("poi_search").try_acquire());
        assert_eq!(set.state("poi_search"), Some(BreakerState::Closed));
    }
}
