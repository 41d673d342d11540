//! Circuit Breaker Pattern Implementation
//!
//! Prevents cascading failures by failing fast when an upstream becomes
//! unhealthy. One named breaker exists per project prefix, created lazily
//! on first use.
//!
//! State Machine:
//! - **Closed**: Normal operation, outcomes feed a count-based sliding
//!   window; the circuit opens when the window is full and the failure
//!   rate reaches the threshold
//! - **Open**: Calls are rejected immediately (503) until the wait duration
//!   elapses
//! - **Half-Open**: A limited number of concurrent trial calls probe the
//!   upstream; their observed failure rate decides Open vs Closed
//!
//! Failure classification is the caller's concern: upstream 5xx responses,
//! connection errors and deadline-exceeded all count as failures.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::constants::{
    DEFAULT_FAILURE_RATE_THRESHOLD, DEFAULT_HALF_OPEN_PERMITTED_CALLS,
    DEFAULT_SLIDING_WINDOW_SIZE, DEFAULT_WAIT_DURATION_MS,
};

/// Get current time as milliseconds since UNIX epoch (lock-free timestamp)
#[inline]
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed = 0,
    /// Too many failures - reject requests immediately
    Open = 1,
    /// Testing if the upstream recovered - allow limited trial requests
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed, // Default to closed for invalid values
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failure rate (percent of the window) that opens the circuit
    pub failure_rate_threshold: f32,
    /// Number of terminal outcomes the sliding window holds
    pub sliding_window_size: usize,
    /// How long to stay open before probing again
    pub wait_duration: Duration,
    /// Concurrent trial calls permitted in half-open state
    pub half_open_permitted_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: DEFAULT_FAILURE_RATE_THRESHOLD,
            sliding_window_size: DEFAULT_SLIDING_WINDOW_SIZE,
            wait_duration: Duration::from_millis(DEFAULT_WAIT_DURATION_MS),
            half_open_permitted_calls: DEFAULT_HALF_OPEN_PERMITTED_CALLS,
        }
    }
}

/// Count-based window over the most recent terminal outcomes
#[derive(Debug)]
struct OutcomeWindow {
    outcomes: VecDeque<bool>, // true = failure
    capacity: usize,
}

impl OutcomeWindow {
    fn new(capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, failure: bool) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(failure);
    }

    fn is_full(&self) -> bool {
        self.outcomes.len() >= self.capacity
    }

    fn failure_rate_percent(&self) -> f32 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|&&failure| failure).count();
        failures as f32 * 100.0 / self.outcomes.len() as f32
    }

    fn clear(&mut self) {
        self.outcomes.clear();
    }
}

/// Circuit breaker for one upstream project
///
/// State is an atomic byte with Acquire/Release ordering; the outcome
/// window sits behind a mutex that is only held for the few operations on
/// the deque.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Current circuit state (uses Acquire on load, Release on store)
    state: AtomicU8,
    /// Recent terminal outcomes while closed
    window: Mutex<OutcomeWindow>,
    /// Last state transition time as milliseconds since UNIX epoch
    last_transition_ms: AtomicU64,
    /// Trial calls currently in flight in half-open state
    half_open_inflight: AtomicU32,
    /// Trial calls completed in the current half-open round
    half_open_completed: AtomicU32,
    /// Failed trial calls in the current half-open round
    half_open_failures: AtomicU32,
    /// Configuration
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            window: Mutex::new(OutcomeWindow::new(config.sliding_window_size.max(1))),
            last_transition_ms: AtomicU64::new(now_ms()),
            half_open_inflight: AtomicU32::new(0),
            half_open_completed: AtomicU32::new(0),
            half_open_failures: AtomicU32::new(0),
            config,
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.state.load(Ordering::Acquire).into()
    }

    /// Current failure rate of the closed-state window, for metrics export
    pub fn failure_rate_percent(&self) -> f32 {
        self.window.lock().failure_rate_percent()
    }

    /// Check if a request should be allowed through the circuit
    pub fn should_allow_request(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let last_ms = self.last_transition_ms.load(Ordering::Acquire);
                let elapsed_ms = now_ms().saturating_sub(last_ms);
                let wait_ms = self.config.wait_duration.as_millis() as u64;

                if elapsed_ms >= wait_ms {
                    tracing::info!("Circuit breaker wait elapsed, transitioning to half-open");
                    self.transition_to_half_open();
                    true // Allow the first trial request
                } else {
                    false // Still open, reject
                }
            }
            CircuitState::HalfOpen => {
                let inflight = self.half_open_inflight.load(Ordering::Relaxed);
                inflight < self.config.half_open_permitted_calls
            }
        }
    }

    /// Register a trial call entering the half-open circuit
    pub fn begin_trial(&self) {
        if self.state() == CircuitState::HalfOpen {
            self.half_open_inflight.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a successful terminal outcome
    pub fn record_success(&self) {
        self.record_outcome(false);
    }

    /// Record a failed terminal outcome
    pub fn record_failure(&self) {
        self.record_outcome(true);
    }

    fn record_outcome(&self, failure: bool) {
        match self.state() {
            CircuitState::Closed => {
                let (is_full, rate) = {
                    let mut window = self.window.lock();
                    window.record(failure);
                    (window.is_full(), window.failure_rate_percent())
                };

                if is_full && rate >= self.config.failure_rate_threshold {
                    tracing::error!(
                        failure_rate = rate,
                        threshold = self.config.failure_rate_threshold,
                        "Circuit breaker opening: failure rate over threshold"
                    );
                    self.transition_to_open();
                } else if failure {
                    tracing::warn!(
                        failure_rate = rate,
                        threshold = self.config.failure_rate_threshold,
                        "Circuit breaker recorded failure in closed state"
                    );
                }
            }
            CircuitState::HalfOpen => {
                saturating_dec(&self.half_open_inflight);
                if failure {
                    self.half_open_failures.fetch_add(1, Ordering::Relaxed);
                }
                let completed = self.half_open_completed.fetch_add(1, Ordering::Relaxed) + 1;

                if completed >= self.config.half_open_permitted_calls {
                    let failures = self.half_open_failures.load(Ordering::Relaxed);
                    let rate = failures as f32 * 100.0 / completed as f32;

                    if rate >= self.config.failure_rate_threshold {
                        tracing::warn!(
                            trial_failures = failures,
                            trial_calls = completed,
                            "Circuit breaker reopening after failed trial round"
                        );
                        self.transition_to_open();
                    } else {
                        tracing::info!("Circuit breaker closing after successful recovery");
                        self.transition_to_closed();
                    }
                }
            }
            CircuitState::Open => {
                // Outcomes arriving while open (late completions) are ignored
            }
        }
    }

    /// Transition to closed state
    ///
    /// Uses Release ordering to ensure counter resets are visible before
    /// the state change.
    fn transition_to_closed(&self) {
        self.window.lock().clear();
        self.reset_half_open_counters();
        self.last_transition_ms.store(now_ms(), Ordering::Relaxed);
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);
    }

    /// Transition to open state
    fn transition_to_open(&self) {
        self.window.lock().clear();
        self.reset_half_open_counters();
        self.last_transition_ms.store(now_ms(), Ordering::Relaxed);
        self.state.store(CircuitState::Open as u8, Ordering::Release);
    }

    /// Transition to half-open state
    fn transition_to_half_open(&self) {
        self.reset_half_open_counters();
        self.last_transition_ms.store(now_ms(), Ordering::Relaxed);
        self.state
            .store(CircuitState::HalfOpen as u8, Ordering::Release);
    }

    fn reset_half_open_counters(&self) {
        self.half_open_inflight.store(0, Ordering::Relaxed);
        self.half_open_completed.store(0, Ordering::Relaxed);
        self.half_open_failures.store(0, Ordering::Relaxed);
    }
}

/// Decrement an atomic counter without wrapping below zero
fn saturating_dec(counter: &AtomicU32) {
    let mut current = counter.load(Ordering::Relaxed);
    while current > 0 {
        match counter.compare_exchange_weak(
            current,
            current - 1,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// Lazily-populated pool of named breakers, one per project prefix
pub struct BreakerPool {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerPool {
    pub fn new() -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get the breaker for a prefix, creating it on first use
    pub fn get_or_create(&self, prefix: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(prefix) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write();
        Arc::clone(
            breakers
                .entry(prefix.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(config))),
        )
    }

    /// Snapshot of breaker states for metrics export
    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .read()
            .iter()
            .map(|(prefix, breaker)| (prefix.clone(), breaker.state()))
            .collect()
    }
}

impl Default for BreakerPool {
    fn default() -> Self {
        Self::new()
    }
}
