//! Bounded, timeout-guarded enrichment prefetch.
//!
//! Resolves every distinct IP of a log against a provider before the
//! synchronous aggregation pass. The resulting [`EnrichmentCache`] is itself
//! an [`EnrichmentProvider`], so the aggregator never blocks on a lookup.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use insights_core::enrichment::EnrichmentProvider;
use insights_core::error::{InsightsError, Result};
use insights_core::models::EnrichmentRecord;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Limits for [`prefetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchConfig {
    /// Lookups in flight at once (at least one).
    pub max_concurrency: usize,
    /// Budget for a single lookup.
    pub timeout: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

// ── EnrichmentCache ───────────────────────────────────────────────────────────

/// Prefetched enrichment records keyed by IP.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentCache {
    records: HashMap<String, EnrichmentRecord>,
    misses: HashSet<String>,
}

impl EnrichmentCache {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// IPs whose lookup failed or timed out.
    pub fn misses(&self) -> &HashSet<String> {
        &self.misses
    }
}

impl EnrichmentProvider for EnrichmentCache {
    fn lookup(&self, ip: &str) -> Result<EnrichmentRecord> {
        self.records
            .get(ip)
            .cloned()
            .ok_or_else(|| InsightsError::EnrichmentUnavailable(ip.to_string()))
    }
}

// ── Prefetch ──────────────────────────────────────────────────────────────────

/// Look up every IP in `ips` with at most `config.max_concurrency` lookups
/// in flight. Each lookup runs on the blocking pool under `config.timeout`.
///
/// A slot is held until the provider call actually returns, so a lookup that
/// times out keeps its slot while it is still running. Waiting for a slot is
/// bounded by the same timeout.
///
/// Failed, timed-out or panicked lookups are recorded as misses.
pub async fn prefetch(
    provider: Arc<dyn EnrichmentProvider>,
    ips: &[String],
    config: PrefetchConfig,
) -> EnrichmentCache {
    let mut cache = EnrichmentCache::default();
    let slots = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
    let timeout = config.timeout;
    let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

    let mut set = JoinSet::new();
    for ip in ips {
        let provider = Arc::clone(&provider);
        let slots = Arc::clone(&slots);
        let ip = ip.clone();
        set.spawn(async move {
            let permit = match tokio::time::timeout(timeout, slots.acquire_owned()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(closed)) => {
                    let err = InsightsError::EnrichmentUnavailable(format!("{ip}: {closed}"));
                    return (ip, Err(err));
                }
                Err(_) => {
                    let err = InsightsError::EnrichmentTimeout {
                        ip: ip.clone(),
                        millis,
                    };
                    return (ip, Err(err));
                }
            };

            let key = ip.clone();
            let lookup = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                provider.lookup(&key)
            });
            let outcome = match tokio::time::timeout(timeout, lookup).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(InsightsError::EnrichmentUnavailable(format!(
                    "{ip}: {join_err}"
                ))),
                Err(_) => Err(InsightsError::EnrichmentTimeout {
                    ip: ip.clone(),
                    millis,
                }),
            };
            (ip, outcome)
        });
    }

    while let Some(res) = set.join_next().await {
        match res {
            Ok((ip, Ok(record))) => {
                cache.records.insert(ip, record);
            }
            Ok((ip, Err(e))) => {
                tracing::warn!(ip = %ip, error = %e, "enrichment prefetch miss");
                cache.misses.insert(ip);
            }
            Err(e) => {
                tracing::warn!("JoinSet task panicked in enrichment prefetch: {e}");
            }
        }
    }

    tracing::debug!(
        resolved = cache.records.len(),
        misses = cache.misses.len(),
        "enrichment prefetch complete"
    );
    cache
}

// ── Tests ─────────────────────────────────────────────────────────────────────
