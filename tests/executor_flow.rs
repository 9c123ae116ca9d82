//! End-to-end breaker lifecycle and health degradation scenarios

use poolguard::{
    CircuitBreakerConfig, CircuitState, ExecOptions, HealthLevel, PoolBackend, PoolGauges,
    ResilientExecutor,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("database unavailable")]
struct DbDown;

struct FlakyPool {
    calls: AtomicU32,
    failing: AtomicBool,
}

impl FlakyPool {
    fn new(failing: bool) -> Self {
        Self {
            calls: AtomicU32::new(0),
            failing: AtomicBool::new(failing),
        }
    }
}

#[async_trait::async_trait]
impl PoolBackend for FlakyPool {
    type Error = DbDown;

    async fn probe(&self) -> Result<(), DbDown> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(DbDown)
        } else {
            Ok(())
        }
    }

    fn gauges(&self) -> PoolGauges {
        PoolGauges {
            total_count: 10,
            idle_count: 1,
            waiting_count: 3,
            max_connections: 10,
        }
    }
}

/// Full open / probe / close cycle: five failures trip the breaker, the
/// cooldown gates a sixth call without invoking the operation, and two
/// half-open successes restore normal operation.
#[tokio::test]
async fn breaker_lifecycle_end_to_end() {
    let pool = Arc::new(FlakyPool::new(true));
    let config = CircuitBreakerConfig::new("primary-db")
        .with_failure_threshold(5)
        .with_success_threshold(2)
        .with_cooldown(Duration::from_millis(100));
    let exec = ResilientExecutor::with_breaker_config(config, Arc::clone(&pool));

    let opts = || ExecOptions::no_retry(Duration::from_secs(1));
    let query = || {
        let pool = Arc::clone(&pool);
        move || {
            let pool = Arc::clone(&pool);
            async move { pool.probe().await }
        }
    };

    // Five consecutive failures open the circuit
    for _ in 0..5 {
        assert!(exec.execute(query(), opts()).await.is_err());
    }
    let metrics = exec.metrics().await;
    assert!(matches!(metrics.circuit_breaker.state, CircuitState::Open { .. }));
    assert_eq!(metrics.circuit_breaker.failure_count, 5);
    assert_eq!(pool.calls.load(Ordering::SeqCst), 5);

    // Inside the cooldown: rejected fast, operation never invoked
    let rejected = exec.execute(query(), opts()).await;
    assert!(rejected.unwrap_err().is_circuit_open());
    assert_eq!(pool.calls.load(Ordering::SeqCst), 5);

    // After the cooldown the next call runs as a half-open probe
    tokio::time::sleep(Duration::from_millis(120)).await;
    pool.failing.store(false, Ordering::SeqCst);

    assert!(exec.execute(query(), opts()).await.is_ok());
    let metrics = exec.metrics().await;
    assert_eq!(metrics.circuit_breaker.state, CircuitState::HalfOpen);
    assert_eq!(metrics.circuit_breaker.success_count, 1);
    assert_eq!(pool.calls.load(Ordering::SeqCst), 6);

    // Second success reaches the threshold and closes the circuit
    assert!(exec.execute(query(), opts()).await.is_ok());
    let metrics = exec.metrics().await;
    assert_eq!(metrics.circuit_breaker.state, CircuitState::Closed);
    assert_eq!(metrics.circuit_breaker.failure_count, 0);
    assert_eq!(metrics.circuit_breaker.success_count, 0);
    assert_eq!(metrics.circuit_breaker.total_requests, 8);
}

/// Health checks degrade through the full ladder: healthy, stale-warning
/// fallback, and recovery, without ever surfacing an error to the caller.
#[tokio::test]
async fn health_check_degrades_and_recovers() {
    let pool = Arc::new(FlakyPool::new(false));
    let exec = ResilientExecutor::new("primary-db", Arc::clone(&pool));
    let ttl = Duration::from_millis(50);

    // Healthy probe, cached
    let report = exec.health_check("db", ttl).await;
    assert_eq!(report.status, HealthLevel::Healthy);
    assert_eq!(pool.calls.load(Ordering::SeqCst), 1);

    // Cache hit while fresh
    let report = exec.health_check("db", ttl).await;
    assert_eq!(report.status, HealthLevel::Healthy);
    assert_eq!(pool.calls.load(Ordering::SeqCst), 1);

    // Entry expires, dependency goes down: stale fallback, labeled
    tokio::time::sleep(Duration::from_millis(60)).await;
    pool.failing.store(true, Ordering::SeqCst);

    let report = exec.health_check("db", ttl).await;
    assert_eq!(report.status, HealthLevel::Warning);
    assert!(report.stale);
    assert!(report.error.is_some());

    // Dependency recovers: fresh probe succeeds again
    pool.failing.store(false, Ordering::SeqCst);
    let report = exec.health_check("db", ttl).await;
    assert_eq!(report.status, HealthLevel::Healthy);
    assert!(!report.stale);
}

/// Pool gauges feed the derived utilization check without touching the
/// breaker or issuing probes.
#[tokio::test]
async fn pool_utilization_check_is_pure() {
    let pool = Arc::new(FlakyPool::new(true)); // failing is irrelevant here
    let exec = ResilientExecutor::new("primary-db", Arc::clone(&pool));

    let report = exec.pool_health_check();
    assert_eq!(report.status, HealthLevel::Warning); // 90% utilization
    assert_eq!(report.pool.unwrap().waiting_count, 3);
    assert_eq!(pool.calls.load(Ordering::SeqCst), 0);
    assert_eq!(exec.metrics().await.circuit_breaker.total_requests, 0);
}
