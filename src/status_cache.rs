//! Health status reports and the TTL status cache
//!
//! The cache is a keyed store of the last known health-check result.
//! Freshness is evaluated lazily on read; there is no background eviction.
//! Entries for successful and failed probes may carry different TTLs, which
//! lets the executor bias toward availability (long TTL on success, short
//! TTL on failure so re-probing resumes quickly).

use crate::pool_stats::PoolGauges;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Classification of a health-check outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    /// Dependency responded promptly
    Healthy,
    /// Degraded: slow probe, elevated utilization, or stale fallback
    Warning,
    /// Dependency is failing and no prior status exists to fall back on
    Unhealthy,
}

impl HealthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "healthy",
            HealthLevel::Warning => "warning",
            HealthLevel::Unhealthy => "unhealthy",
        }
    }
}

/// Serializable view of breaker state embedded in unhealthy reports
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    /// Circuit state label ("closed", "open", "half-open")
    pub state: String,
    /// Consecutive failure count at report time
    pub failure_count: u32,
    /// Milliseconds since the last observed failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_ms_ago: Option<u64>,
}

/// Result of a health check, served to monitoring consumers
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Overall classification
    pub status: HealthLevel,
    /// Probe round-trip time, when a probe was issued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Human-readable context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// True when this report is a stale entry served after a probe failure
    pub stale: bool,
    /// Message of the error that triggered a fallback or unhealthy report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Breaker state at report time (unhealthy reports only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breaker: Option<BreakerSnapshot>,
    /// Pool gauges (pool health checks only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolGauges>,
}

impl StatusReport {
    /// A probe result classified by latency alone
    pub fn probe(status: HealthLevel, latency_ms: u64) -> Self {
        Self {
            status,
            latency_ms: Some(latency_ms),
            message: None,
            stale: false,
            error: None,
            breaker: None,
            pool: None,
        }
    }
}

/// A cached status entry. Fresh iff `cached_at.elapsed() < ttl`.
#[derive(Debug, Clone)]
struct CachedStatus {
    report: StatusReport,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedStatus {
    fn is_fresh(&self) -> bool {
        self.cached_at.elapsed() < self.ttl
    }
}

/// Keyed TTL store of last known health-check results.
/// Owned exclusively by one executor; never shared across instances.
#[derive(Debug, Default)]
pub struct StatusCache {
    entries: Mutex<HashMap<String, CachedStatus>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `key` only if it is still fresh
    pub async fn get_fresh(&self, key: &str) -> Option<StatusReport> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.report.clone())
    }

    /// Return the entry for `key` regardless of freshness. Used for
    /// stale-if-error fallback when a probe fails.
    pub async fn get_any(&self, key: &str) -> Option<StatusReport> {
        let entries = self.entries.lock().await;
        entries.get(key).map(|entry| entry.report.clone())
    }

    /// Store a report under `key` with the given TTL, replacing any
    /// previous entry
    pub async fn insert(&self, key: &str, report: StatusReport, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CachedStatus {
                report,
                cached_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove one entry
    pub async fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
    }

    /// Remove all entries
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Currently cached keys, fresh and stale alike
    pub async fn keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_entry_is_served() {
        let cache = StatusCache::new();
        cache
            .insert(
                "db",
                StatusReport::probe(HealthLevel::Healthy, 12),
                Duration::from_secs(5),
            )
            .await;

        let report = cache.get_fresh("db").await.unwrap();
        assert_eq!(report.status, HealthLevel::Healthy);
        assert_eq!(report.latency_ms, Some(12));
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_fresh_but_still_reachable() {
        let cache = StatusCache::new();
        cache
            .insert(
                "db",
                StatusReport::probe(HealthLevel::Healthy, 12),
                Duration::from_millis(10),
            )
            .await;

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.get_fresh("db").await.is_none());
        // Stale fallback path still sees it
        assert!(cache.get_any("db").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let cache = StatusCache::new();
        let ttl = Duration::from_secs(5);
        cache
            .insert("a", StatusReport::probe(HealthLevel::Healthy, 1), ttl)
            .await;
        cache
            .insert("b", StatusReport::probe(HealthLevel::Warning, 1500), ttl)
            .await;
        assert_eq!(cache.len().await, 2);

        cache.remove("a").await;
        assert_eq!(cache.keys().await, vec!["b".to_string()]);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_report_serializes_without_empty_fields() {
        let cache = StatusCache::new();
        cache
            .insert(
                "db",
                StatusReport::probe(HealthLevel::Healthy, 7),
                Duration::from_secs(5),
            )
            .await;
        let report = cache.get_fresh("db").await.unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["latency_ms"], 7);
        assert_eq!(json["stale"], false);
        assert!(json.get("error").is_none());
        assert!(json.get("breaker").is_none());
    }
}
