//! Token bucket rate limiting and a rolling-window circuit breaker.
//!
//! The breaker here departs from a plain consecutive-failure counter: it
//! tracks outcomes in a fixed window and opens on failure *ratio*, per the
//! `fail_window` / `fail_threshold` / `half_open_after` knobs in
//! `GateConfig`. Closed/Open/HalfOpen state still lives in an `AtomicU8` so
//! `is_allowed` stays lock-free on the hot path; only the outcome window
//! needs a mutex, and only `record_success`/`record_failure` touch it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::{CircuitBreakerConfig, TokenBucketConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(v: u8) -> Self {
        match v {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }
}

struct Outcome {
    at: Instant,
    ok: bool,
}

/// Per-downstream-topic circuit breaker with a rolling failure-ratio window.
pub struct CircuitBreaker {
    state: AtomicU8,
    window: Mutex<VecDeque<Outcome>>,
    opened_at: Mutex<Option<Instant>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            window: Mutex::new(VecDeque::new()),
            opened_at: Mutex::new(None),
            config,
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::SeqCst))
    }

    /// Whether a caller should attempt the downstream right now. In the
    /// `Open` state this also performs the `Open -> HalfOpen` transition
    /// once `half_open_after_ms` has elapsed.
    pub fn is_allowed(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .lock()
                    .expect("breaker mutex poisoned")
                    .map(|t| t.elapsed());
                match elapsed {
                    Some(e) if e >= Duration::from_millis(self.config.half_open_after_ms) => {
                        self.state
                            .store(CircuitState::HalfOpen as u8, Ordering::SeqCst);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.push_outcome(true);
        if self.state() == CircuitState::HalfOpen {
            self.close();
        }
    }

    pub fn record_failure(&self) {
        self.push_outcome(false);
        if self.state() == CircuitState::HalfOpen {
            self.open();
            return;
        }
        let ratio = self.failure_ratio();
        if ratio >= self.config.fail_threshold {
            self.open();
        }
    }

    pub fn reset(&self) {
        self.close();
        self.window.lock().expect("breaker mutex poisoned").clear();
    }

    fn push_outcome(&self, ok: bool) {
        let now = Instant::now();
        let window = Duration::from_millis(self.config.fail_window_ms);
        let mut guard = self.window.lock().expect("breaker mutex poisoned");
        guard.push_back(Outcome { at: now, ok });
        while let Some(front) = guard.front() {
            if now.duration_since(front.at) > window {
                guard.pop_front();
            } else {
                break;
            }
        }
    }

    fn failure_ratio(&self) -> f64 {
        let guard = self.window.lock().expect("breaker mutex poisoned");
        if guard.is_empty() {
            return 0.0;
        }
        let failures = guard.iter().filter(|o| !o.ok).count();
        failures as f64 / guard.len() as f64
    }

    fn open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
        *self.opened_at.lock().expect("breaker mutex poisoned") = Some(Instant::now());
    }

    fn close(&self) {
        self.state
            .store(CircuitState::Closed as u8, Ordering::SeqCst);
        *self.opened_at.lock().expect("breaker mutex poisoned") = None;
    }
}

/// Simple token bucket. `try_take` is the only hot-path call; refill is
/// computed lazily from elapsed time rather than via a background task.
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: Mutex<(f64, Instant)>,
}

impl TokenBucket {
    pub fn new(config: TokenBucketConfig) -> Self {
        Self {
            capacity: config.capacity,
            refill_per_sec: config.refill_per_sec,
            tokens: Mutex::new((config.capacity, Instant::now())),
        }
    }

    /// Attempt to take `cost` tokens; returns whether enough were available.
    pub fn try_take(&self, cost: f64) -> bool {
        let mut guard = self.tokens.lock().expect("token bucket mutex poisoned");
        let (tokens, last) = &mut *guard;
        let now = Instant::now();
        let elapsed = now.duration_since(*last).as_secs_f64();
        *tokens = (*tokens + elapsed * self.refill_per_sec).min(self.capacity);
        *last = now;
        if *tokens >= cost {
            *tokens -= cost;
            true
        } else {
            false
        }
    }

    pub fn available(&self) -> f64 {
        self.tokens.lock().expect("token bucket mutex poisoned").0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(fail_threshold: f64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            fail_window_ms: 60_000,
            fail_threshold,
            half_open_after_ms: 10,
        })
    }

    #[test]
    fn stays_closed_below_threshold() {
        let cb = breaker(0.5);
        cb.record_success();
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn opens_when_ratio_crosses_threshold() {
        let cb = breaker(0.25);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_allowed());
    }

    #[test]
    fn half_open_after_timeout_and_closes_on_success() {
        let cb = breaker(0.1);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.is_allowed());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let cb = breaker(0.1);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.is_allowed());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn token_bucket_refuses_once_drained() {
        let tb = TokenBucket::new(TokenBucketConfig {
            capacity: 2.0,
            refill_per_sec: 0.0,
        });
        assert!(tb.try_take(1.0));
        assert!(tb.try_take(1.0));
        assert!(!tb.try_take(1.0));
    }

    #[test]
    fn token_bucket_refills_over_time() {
        let tb = TokenBucket::new(TokenBucketConfig {
            capacity: 1.0,
            refill_per_sec: 1000.0,
        });
        assert!(tb.try_take(1.0));
        std::thread::sleep(Duration::from_millis(20));
        assert!(tb.try_take(1.0));
    }
}
