//! Poolguard: resilient execution layer for flaky pooled dependencies
//!
//! # Overview
//!
//! This crate protects callers from a flaky downstream dependency
//! (canonically a database connection pool) by combining:
//!
//! - **Circuit Breaker**: Tracks consecutive failures for one named
//!   dependency and fails fast while it is unhealthy
//! - **Bounded Retry**: Exponential backoff with a cap between attempts
//! - **Per-call Timeout**: Races every attempt against a deadline,
//!   cancelling the attempt when the deadline wins
//! - **Health Status Cache**: Keyed TTL store of the last health-check
//!   result, serving stale-but-labeled data when a fresh probe fails
//!
//! # Key Principles
//!
//! This crate is **pure orchestration** with zero knowledge of:
//! - The protected dependency itself (the caller supplies an arbitrary
//!   fallible async operation and a [`PoolBackend`] probe seam)
//! - Cross-process coordination (all state is process-local; distributed
//!   health coherence is a different system)
//!
//! Resource acquire/use/release stays inside the caller-supplied
//! operation; this layer never holds the resource.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Your Application                │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       ResilientExecutor                 │  ← Retry loop + backoff
//! │  (per-attempt timeout race)             │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Breaker                   │  ← Fail-fast protection
//! │  (Tracks failures, opens on threshold)  │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//!         Flaky Dependency
//!       (database pool, API, …)
//!
//!  Health checks consult:
//!   Status Cache → fresh hit served verbatim, probe otherwise,
//!                  stale-but-labeled fallback on probe failure
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use poolguard::{ExecOptions, PoolBackend, PoolGauges, ResilientExecutor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[derive(Debug, thiserror::Error)]
//! # #[error("db error")]
//! # struct DbError;
//! # struct PrimaryPool;
//! # #[async_trait::async_trait]
//! # impl PoolBackend for PrimaryPool {
//! #     type Error = DbError;
//! #     async fn probe(&self) -> Result<(), DbError> { Ok(()) }
//! #     fn gauges(&self) -> PoolGauges {
//! #         PoolGauges { total_count: 0, idle_count: 0, waiting_count: 0, max_connections: 10 }
//! #     }
//! # }
//! # async fn example() -> Result<(), poolguard::ExecError<DbError>> {
//! let executor = ResilientExecutor::new("primary-db", Arc::new(PrimaryPool));
//!
//! // Query with timeout, circuit protection, and retry
//! let rows = executor
//!     .execute(|| async { Ok::<_, DbError>(vec![1, 2, 3]) }, ExecOptions::default())
//!     .await?;
//!
//! // Cached health check; degrades instead of failing
//! let status = executor.health_check("db", Duration::from_secs(5)).await;
//! println!("db is {}", status.status.as_str());
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod error;
pub mod executor;
pub mod pool_stats;
pub mod retry;
pub mod status_cache;

// Re-export main types for convenience
pub use circuit_breaker::{BreakerMetrics, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::ExecError;
pub use executor::{
    ExecOptions, ExecutorMetrics, PoolBackend, ResilientExecutor, DEFAULT_STATUS_TTL,
    FAILURE_STATUS_TTL, PROBE_LATENCY_WARNING, PROBE_TIMEOUT,
};
pub use pool_stats::PoolGauges;
pub use retry::RetryConfig;
pub use status_cache::{BreakerSnapshot, HealthLevel, StatusCache, StatusReport};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use poolguard::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use super::error::ExecError;
    pub use super::executor::{ExecOptions, PoolBackend, ResilientExecutor};
    pub use super::pool_stats::PoolGauges;
    pub use super::retry::RetryConfig;
    pub use super::status_cache::{HealthLevel, StatusReport};
}
