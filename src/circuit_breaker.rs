//! Circuit Breaker implementation for fault tolerance
//!
//! The circuit breaker prevents cascading failures by failing fast when a
//! dependency is experiencing issues. It has three states:
//! - Closed: Normal operation, requests pass through
//! - Open: Dependency is unhealthy, requests fail immediately
//! - HalfOpen: Testing if the dependency has recovered

use crate::error::ExecError;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests fail immediately.
    /// Next attempt time indicates when to admit a half-open probe.
    Open { next_attempt: Instant },
    /// Circuit is half-open, testing dependency recovery
    HalfOpen,
}

impl CircuitState {
    /// Lowercase state label for logs and status reports
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Name of the protected dependency, carried in rejections and logs
    pub name: String,
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Number of consecutive successes in half-open to close the circuit
    pub success_threshold: u32,
    /// Duration to wait before admitting a probe after opening
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "dependency".to_string(),
            failure_threshold: 5,
            success_threshold: 2,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration for the named dependency with default thresholds
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the number of consecutive failures that opens the circuit
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the number of half-open successes that closes the circuit
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the open-state cooldown before the next probe is admitted
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

/// Point-in-time snapshot of breaker state and counters
#[derive(Debug, Clone)]
pub struct BreakerMetrics {
    /// Current circuit state
    pub state: CircuitState,
    /// Consecutive failure count
    pub failure_count: u32,
    /// Consecutive success count (meaningful in half-open)
    pub success_count: u32,
    /// When the last failure was observed
    pub last_failure_at: Option<Instant>,
    /// When the state last changed
    pub last_state_change_at: Instant,
    /// Lifetime request count, including fail-fast rejections
    pub total_requests: u64,
    /// Lifetime failure count
    pub total_failures: u64,
    /// Lifetime success count
    pub total_successes: u64,
}

/// Internal state of the circuit breaker
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
    last_state_change_at: Instant,
    total_requests: u64,
    total_failures: u64,
    total_successes: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_at: None,
            last_state_change_at: Instant::now(),
            total_requests: 0,
            total_failures: 0,
            total_successes: 0,
        }
    }
}

/// Circuit breaker for protecting against cascading failures
///
/// Tracks consecutive failures and successes for one named dependency and
/// decides whether a call may proceed. Lifetime counters only ever grow;
/// [`reset`](CircuitBreaker::reset) clears the state machine but not the
/// totals.
///
/// # Example
/// ```no_run
/// use poolguard::{CircuitBreaker, CircuitBreakerConfig, ExecError};
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("query failed")]
/// struct QueryError;
///
/// #[tokio::main]
/// async fn main() -> Result<(), ExecError<QueryError>> {
///     let breaker = CircuitBreaker::new(CircuitBreakerConfig::new("primary-db"));
///
///     let rows = breaker
///         .execute(|| async {
///             // Your operation here
///             Ok::<_, ExecError<QueryError>>(42)
///         })
///         .await?;
///
///     println!("rows: {rows}");
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BreakerState::new())),
        }
    }

    /// Name of the protected dependency
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get the current state of the circuit breaker
    pub async fn state(&self) -> CircuitState {
        let state = self.state.lock().await;
        state.state
    }

    /// Whether the circuit is currently open. Reports the stored state
    /// without consulting the cooldown clock; the open-to-half-open
    /// transition happens only inside [`execute`](CircuitBreaker::execute).
    pub async fn is_open(&self) -> bool {
        matches!(self.state().await, CircuitState::Open { .. })
    }

    /// Snapshot all counters and the current state
    pub async fn metrics(&self) -> BreakerMetrics {
        let state = self.state.lock().await;
        BreakerMetrics {
            state: state.state,
            failure_count: state.failure_count,
            success_count: state.success_count,
            last_failure_at: state.last_failure_at,
            last_state_change_at: state.last_state_change_at,
            total_requests: state.total_requests,
            total_failures: state.total_failures,
            total_successes: state.total_successes,
        }
    }

    /// Lifetime success rate as a percentage. 100.0 when no requests have
    /// been made yet.
    pub async fn success_rate(&self) -> f64 {
        let state = self.state.lock().await;
        if state.total_requests == 0 {
            100.0
        } else {
            state.total_successes as f64 / state.total_requests as f64 * 100.0
        }
    }

    /// Unconditionally force the circuit closed and clear consecutive
    /// counters. Lifetime totals are kept. An operator escape hatch, not
    /// part of automatic state logic.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.success_count = 0;
        state.last_state_change_at = Instant::now();
        info!(breaker = %self.config.name, "circuit breaker reset to closed");
    }

    /// Execute an operation under circuit protection.
    ///
    /// While open and inside the cooldown window the operation is never
    /// invoked and the call fails immediately with
    /// [`ExecError::CircuitOpen`]; once the cooldown elapses the next call
    /// transitions to half-open and runs as a probe. Success and failure
    /// bookkeeping happens before the result is handed back, and the
    /// operation's error is re-thrown, never swallowed.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, ExecError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ExecError<E>>>,
        E: std::error::Error + 'static,
    {
        self.admit().await?;

        match op().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(e) => {
                self.on_failure().await;
                Err(e)
            }
        }
    }

    /// Gate check: count the request and decide whether the call proceeds,
    /// transitioning open to half-open when the cooldown has elapsed.
    async fn admit<E>(&self) -> Result<(), ExecError<E>>
    where
        E: std::error::Error + 'static,
    {
        let mut state = self.state.lock().await;
        state.total_requests += 1;

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open { next_attempt } => {
                if Instant::now() >= next_attempt {
                    // Cooldown elapsed: this call becomes the recovery probe
                    state.state = CircuitState::HalfOpen;
                    state.success_count = 0;
                    state.last_state_change_at = Instant::now();
                    debug!(breaker = %self.config.name, "circuit half-open, admitting probe");
                    Ok(())
                } else {
                    Err(ExecError::CircuitOpen {
                        name: self.config.name.clone(),
                    })
                }
            }
        }
    }

    /// Handle successful operation
    async fn on_success(&self) {
        let mut state = self.state.lock().await;
        state.total_successes += 1;
        state.failure_count = 0;

        if state.state == CircuitState::HalfOpen {
            state.success_count += 1;
            if state.success_count >= self.config.success_threshold {
                state.state = CircuitState::Closed;
                state.success_count = 0;
                state.failure_count = 0;
                state.last_state_change_at = Instant::now();
                info!(breaker = %self.config.name, "circuit closed, dependency recovered");
            }
        }
    }

    /// Handle failed operation
    async fn on_failure(&self) {
        let mut state = self.state.lock().await;
        state.total_failures += 1;
        state.failure_count += 1;
        state.last_failure_at = Some(Instant::now());

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    state.state = CircuitState::Open {
                        next_attempt: Instant::now() + self.config.cooldown,
                    };
                    state.last_state_change_at = Instant::now();
                    warn!(
                        breaker = %self.config.name,
                        failures = state.failure_count,
                        cooldown = ?self.config.cooldown,
                        "circuit opened after consecutive failures"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // One strike: any failure during recovery testing reopens
                state.state = CircuitState::Open {
                    next_attempt: Instant::now() + self.config.cooldown,
                };
                state.success_count = 0;
                state.last_state_change_at = Instant::now();
                warn!(breaker = %self.config.name, "probe failed, circuit reopened");
            }
            CircuitState::Open { .. } => {}
        }
    }
}
