//! Request/response entry point tying the log cache, enrichment prefetch and
//! analysis pipeline together.

use std::path::Path;
use std::sync::Arc;

use insights_core::enrichment::EnrichmentProvider;
use insights_core::error::Result;
use insights_core::models::{EntitySummary, SessionSummary};
use insights_data::analysis::{
    build_dashboard, get_entity_detail, get_session_detail, DashboardView,
};
use insights_data::filter::FilterRequest;
use insights_data::reader::LogStore;

use crate::enrichment::{prefetch, EnrichmentCache, PrefetchConfig};
use crate::log_cache::LogCache;

/// One dashboard over one log source.
///
/// Each [`render`](Self::render) resolves the request against the (cached)
/// store and runs the full pipeline. Enrichment is prefetched once per
/// loaded store.
pub struct Dashboard {
    cache: LogCache,
    provider: Arc<dyn EnrichmentProvider>,
    prefetch: PrefetchConfig,
    /// Enrichment for the store it was prefetched against.
    enrichment: Option<(Arc<LogStore>, EnrichmentCache)>,
}

impl Dashboard {
    pub fn new(
        cache: LogCache,
        provider: Arc<dyn EnrichmentProvider>,
        prefetch: PrefetchConfig,
    ) -> Self {
        Self {
            cache,
            provider,
            prefetch,
            enrichment: None,
        }
    }

    /// Render `request` against the current store.
    pub async fn render(&mut self, request: &FilterRequest) -> Result<DashboardView> {
        let store = self.cache.get()?;
        let spec = request.resolve(&store.events);
        let enrichment = self.enrichment_for(&store).await;
        Ok(build_dashboard(&store, &spec, enrichment))
    }

    /// One session under `request`.
    ///
    /// Fails with a `NotFound` error when the filter excludes the session.
    pub async fn session_detail(
        &mut self,
        session_id: &str,
        request: &FilterRequest,
    ) -> Result<SessionSummary> {
        let store = self.cache.get()?;
        let spec = request.resolve(&store.events);
        let enrichment = self.enrichment_for(&store).await;
        get_session_detail(&store.events, session_id, &spec, enrichment)
    }

    /// One entity (IP) under `request`.
    pub async fn entity_detail(
        &mut self,
        ip: &str,
        request: &FilterRequest,
    ) -> Result<EntitySummary> {
        let store = self.cache.get()?;
        let spec = request.resolve(&store.events);
        let enrichment = self.enrichment_for(&store).await;
        get_entity_detail(&store.events, ip, &spec, enrichment)
    }

    /// Drop the cached store and render again from disk.
    pub async fn reload(&mut self, request: &FilterRequest) -> Result<DashboardView> {
        tracing::info!(source = %self.cache.source().display(), "reloading visitor log");
        self.cache.invalidate();
        self.enrichment = None;
        self.render(request).await
    }

    /// The most recently loaded store, if any.
    pub fn store(&self) -> Option<Arc<LogStore>> {
        self.cache.cached()
    }

    pub fn source(&self) -> &Path {
        self.cache.source()
    }

    pub fn timezone(&self) -> &str {
        self.cache.timezone()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.cache.last_error()
    }

    async fn enrichment_for(&mut self, store: &Arc<LogStore>) -> &EnrichmentCache {
        let entry = match self.enrichment.take() {
            Some(entry) if Arc::ptr_eq(&entry.0, store) => entry,
            _ => {
                let ips = store.distinct_ips();
                tracing::debug!(ips = ips.len(), "prefetching enrichment");
                let cache = prefetch(Arc::clone(&self.provider), &ips, self.prefetch).await;
                (Arc::clone(store), cache)
            }
        };
        &self.enrichment.insert(entry).1
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
