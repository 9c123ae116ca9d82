//! Resilient executor: timeout race, circuit breaker gate, bounded retry
//! with exponential backoff, and the cached health-check procedure
//!
//! # Timeout semantics
//!
//! The per-attempt deadline wraps the operation future *inside* circuit
//! breaker protection. When the deadline wins the race the operation future
//! is dropped, so the underlying call is cancelled at the race and the
//! attempt is recorded as a breaker failure before [`ExecError::Timeout`]
//! reaches the caller. A timed-out attempt can therefore never surface
//! later as a breaker success.

use crate::circuit_breaker::{BreakerMetrics, CircuitBreaker, CircuitBreakerConfig};
use crate::error::ExecError;
use crate::pool_stats::PoolGauges;
use crate::retry::RetryConfig;
use crate::status_cache::{BreakerSnapshot, HealthLevel, StatusCache, StatusReport};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Deadline for health-check probes
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(2000);
/// Probe round-trips above this are classified as warnings
pub const PROBE_LATENCY_WARNING: Duration = Duration::from_millis(1000);
/// Default TTL for successful health-check results
pub const DEFAULT_STATUS_TTL: Duration = Duration::from_millis(5000);
/// Short TTL for cached failure results, so re-probing resumes quickly
/// without hammering the dependency on every caller
pub const FAILURE_STATUS_TTL: Duration = Duration::from_millis(2000);

/// The protected dependency, as seen by this layer: a way to probe it and
/// a way to read its pool gauges. The actual resource acquire/use/release
/// cycle stays inside the caller-supplied operations.
#[async_trait]
pub trait PoolBackend: Send + Sync {
    /// Error type produced by the dependency's operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Cheap liveness probe, e.g. `SELECT 1` on a connection pool
    async fn probe(&self) -> Result<(), Self::Error>;

    /// Current pool gauges
    fn gauges(&self) -> PoolGauges;
}

/// Per-call execution options
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Deadline per attempt
    pub timeout: Duration,
    /// Whether failed attempts are retried
    pub retry: bool,
    /// Retry bounds and backoff shape, consulted only when `retry` is true
    pub retry_config: RetryConfig,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: true,
            retry_config: RetryConfig::default(),
        }
    }
}

impl ExecOptions {
    /// Single attempt with the given deadline
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            timeout,
            retry: false,
            ..Default::default()
        }
    }
}

/// Combined executor metrics for monitoring
#[derive(Debug, Clone)]
pub struct ExecutorMetrics {
    /// Breaker state and counters
    pub circuit_breaker: BreakerMetrics,
    /// Number of cached health entries, fresh and stale alike
    pub cache_size: usize,
    /// Keys currently present in the status cache
    pub cached_keys: Vec<String>,
}

/// Orchestrates resilient access to one named flaky dependency.
///
/// Owns exactly one [`CircuitBreaker`] and one [`StatusCache`]; neither is
/// shared across executors. Construct one executor per protected
/// dependency and inject it where needed rather than holding it in global
/// state.
///
/// # Example
/// ```no_run
/// use poolguard::{ExecOptions, PoolBackend, PoolGauges, ResilientExecutor};
/// use std::sync::Arc;
///
/// # #[derive(Debug, thiserror::Error)]
/// # #[error("db error")]
/// # struct DbError;
/// struct Primary; // wraps your connection pool
///
/// #[async_trait::async_trait]
/// impl PoolBackend for Primary {
///     type Error = DbError;
///
///     async fn probe(&self) -> Result<(), DbError> {
///         // SELECT 1
/// #       Ok(())
///     }
///
///     fn gauges(&self) -> PoolGauges {
/// #       PoolGauges { total_count: 0, idle_count: 0, waiting_count: 0, max_connections: 10 }
///     }
/// }
///
/// # async fn example() -> Result<(), poolguard::ExecError<DbError>> {
/// let executor = ResilientExecutor::new("primary-db", Arc::new(Primary));
///
/// let rows = executor
///     .execute(|| async { Ok::<_, DbError>(vec![1, 2, 3]) }, ExecOptions::default())
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ResilientExecutor<B: PoolBackend> {
    backend: Arc<B>,
    breaker: CircuitBreaker,
    cache: StatusCache,
}

impl<B: PoolBackend> ResilientExecutor<B> {
    /// Create an executor for the named dependency with default breaker
    /// thresholds
    pub fn new(name: impl Into<String>, backend: Arc<B>) -> Self {
        Self::with_breaker_config(CircuitBreakerConfig::new(name), backend)
    }

    /// Create an executor with explicit breaker configuration
    pub fn with_breaker_config(config: CircuitBreakerConfig, backend: Arc<B>) -> Self {
        Self {
            backend,
            breaker: CircuitBreaker::new(config),
            cache: StatusCache::new(),
        }
    }

    /// The circuit breaker guarding this dependency
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Execute an operation with timeout, circuit protection, and bounded
    /// retry.
    ///
    /// Each attempt races the operation against `opts.timeout` inside the
    /// breaker; between failed attempts the task sleeps for the backoff
    /// delay (`tokio::time::sleep`, never blocking the runtime). On
    /// success the value is returned immediately. When the final attempt
    /// of a multi-attempt run fails, the error is wrapped in
    /// [`ExecError::RetriesExhausted`]; a single-attempt failure
    /// propagates unwrapped.
    pub async fn execute<F, Fut, T>(
        &self,
        op: F,
        opts: ExecOptions,
    ) -> Result<T, ExecError<B::Error>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, B::Error>>,
    {
        let max_attempts = if opts.retry {
            opts.retry_config.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            let deadline = opts.timeout;
            let result = self
                .breaker
                .execute(|| async {
                    match tokio::time::timeout(deadline, op()).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => Err(ExecError::Operation(e)),
                        // Timer won: the operation future is dropped here,
                        // and the breaker records this attempt as a failure
                        Err(_) => Err(ExecError::Timeout(deadline)),
                    }
                })
                .await;

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    let delay = opts.retry_config.delay_for(attempt);
                    debug!(
                        breaker = %self.breaker.name(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "attempt failed, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(if max_attempts > 1 {
                        ExecError::RetriesExhausted {
                            attempts: attempt,
                            source: Box::new(e),
                        }
                    } else {
                        e
                    });
                }
            }
        }
    }

    /// Check dependency health, serving cached results while they are
    /// fresh.
    ///
    /// Never fails: a probe failure degrades to a `warning` report built
    /// from the previous (possibly expired) entry, or to an `unhealthy`
    /// report embedding breaker state when no history exists. Only the
    /// no-history failure result is cached, with [`FAILURE_STATUS_TTL`],
    /// so recovery is re-probed quickly.
    pub async fn health_check(&self, key: &str, ttl: Duration) -> StatusReport {
        if let Some(report) = self.cache.get_fresh(key).await {
            return report;
        }

        let backend = Arc::clone(&self.backend);
        let started = Instant::now();
        let outcome = self
            .execute(
                move || {
                    let backend = Arc::clone(&backend);
                    async move { backend.probe().await }
                },
                ExecOptions::no_retry(PROBE_TIMEOUT),
            )
            .await;

        match outcome {
            Ok(()) => {
                let elapsed = started.elapsed();
                let status = if elapsed <= PROBE_LATENCY_WARNING {
                    HealthLevel::Healthy
                } else {
                    HealthLevel::Warning
                };
                let report = StatusReport::probe(status, elapsed.as_millis() as u64);
                self.cache.insert(key, report.clone(), ttl).await;
                report
            }
            Err(e) => {
                if let Some(previous) = self.cache.get_any(key).await {
                    warn!(
                        breaker = %self.breaker.name(),
                        key,
                        error = %e,
                        "probe failed, serving stale health status"
                    );
                    let mut report = previous;
                    report.status = HealthLevel::Warning;
                    report.stale = true;
                    report.error = Some(e.to_string());
                    report.message =
                        Some("stale health status served after probe failure".to_string());
                    report
                } else {
                    let metrics = self.breaker.metrics().await;
                    let report = StatusReport {
                        status: HealthLevel::Unhealthy,
                        latency_ms: None,
                        message: None,
                        stale: false,
                        error: Some(e.to_string()),
                        breaker: Some(BreakerSnapshot {
                            state: metrics.state.as_str().to_string(),
                            failure_count: metrics.failure_count,
                            last_failure_ms_ago: metrics
                                .last_failure_at
                                .map(|at| at.elapsed().as_millis() as u64),
                        }),
                        pool: None,
                    };
                    self.cache
                        .insert(key, report.clone(), FAILURE_STATUS_TTL)
                        .await;
                    report
                }
            }
        }
    }

    /// Classify pool utilization from the backend's gauges. Pure derived
    /// computation; no breaker or cache involvement.
    pub fn pool_health_check(&self) -> StatusReport {
        let gauges = self.backend.gauges();
        StatusReport {
            status: gauges.classify(),
            latency_ms: None,
            message: Some(format!("pool utilization {:.1}%", gauges.utilization_pct())),
            stale: false,
            error: None,
            breaker: None,
            pool: Some(gauges),
        }
    }

    /// Remove one cached health entry, or all of them when `key` is `None`
    pub async fn clear_cache(&self, key: Option<&str>) {
        match key {
            Some(key) => self.cache.remove(key).await,
            None => self.cache.clear().await,
        }
    }

    /// Snapshot breaker metrics and cache occupancy
    pub async fn metrics(&self) -> ExecutorMetrics {
        ExecutorMetrics {
            circuit_breaker: self.breaker.metrics().await,
            cache_size: self.cache.len().await,
            cached_keys: self.cache.keys().await,
        }
    }

    /// Force the breaker closed and drop all cached health entries
    pub async fn reset_circuit_breaker(&self) {
        self.breaker.reset().await;
        self.cache.clear().await;
    }
}
