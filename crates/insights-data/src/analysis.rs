//! Pipeline entry points consumed by the presentation layer.
//!
//! Every call runs the Filter Engine first and hands only the surviving
//! events to the Aggregator, so all outputs reflect the same filter.

use chrono::Utc;
use insights_core::enrichment::EnrichmentProvider;
use insights_core::error::{InsightsError, Result};
use insights_core::models::{CategoryCount, DailyCount, EntitySummary, SessionSummary, VisitEvent};
use serde::Serialize;

use crate::aggregator::{
    daily_page_views, pages_by_vertical, summarize_entities, summarize_sessions,
};
use crate::filter::{apply, FilterSpec};
use crate::reader::LogStore;

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside a dashboard render.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetadata {
    /// RFC 3339 timestamp when this view was generated.
    pub generated_at: String,
    /// Display form of the log source path.
    pub source: String,
    /// Events in the loaded log.
    pub total_events: usize,
    /// Events surviving the filter.
    pub matched_events: usize,
    /// Rows rejected while loading.
    pub skipped_rows: usize,
    pub entity_count: usize,
    pub session_count: usize,
    /// The resolved filter the view was built with.
    pub filter: FilterSpec,
    /// Wall-clock milliseconds spent filtering and aggregating.
    pub render_time_ms: f64,
}

/// Everything one dashboard render needs.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    /// Entity rows, most recent visitor first.
    pub entities: Vec<EntitySummary>,
    /// Session panels, ordered by session id.
    pub sessions: Vec<SessionSummary>,
    pub daily_page_views: Vec<DailyCount>,
    pub pages_by_vertical: Vec<CategoryCount>,
    pub metadata: DashboardMetadata,
}

impl DashboardView {
    /// `true` when no event survived the filter.
    pub fn is_empty(&self) -> bool {
        self.metadata.matched_events == 0
    }
}

// ── Operations ────────────────────────────────────────────────────────────────

/// Events matching `filter`, in file order.
pub fn search<'a>(events: &'a [VisitEvent], filter: &FilterSpec) -> Vec<&'a VisitEvent> {
    apply(events, filter)
}

/// Entity summaries for the filtered events.
pub fn list_entities(
    events: &[VisitEvent],
    filter: &FilterSpec,
    provider: &dyn EnrichmentProvider,
) -> Vec<EntitySummary> {
    summarize_entities(&apply(events, filter), provider)
}

/// Detail of one session among the filtered events.
pub fn get_session_detail(
    events: &[VisitEvent],
    session_id: &str,
    filter: &FilterSpec,
    provider: &dyn EnrichmentProvider,
) -> Result<SessionSummary> {
    let matched: Vec<&VisitEvent> = apply(events, filter)
        .into_iter()
        .filter(|e| e.session_id == session_id)
        .collect();

    summarize_sessions(&matched, provider)
        .remove(session_id)
        .ok_or_else(|| InsightsError::SessionNotFound(session_id.to_string()))
}

/// Summary of one entity (IP) among the filtered events.
pub fn get_entity_detail(
    events: &[VisitEvent],
    ip: &str,
    filter: &FilterSpec,
    provider: &dyn EnrichmentProvider,
) -> Result<EntitySummary> {
    let matched: Vec<&VisitEvent> = apply(events, filter)
        .into_iter()
        .filter(|e| e.ip == ip)
        .collect();

    summarize_entities(&matched, provider)
        .into_iter()
        .next()
        .ok_or_else(|| InsightsError::EntityNotFound(ip.to_string()))
}

/// Run the whole pipeline once over `store`.
///
/// 1. Filter the store's events.
/// 2. Summarize entities and sessions, enriching through `provider`.
/// 3. Build the chart series.
pub fn build_dashboard(
    store: &LogStore,
    filter: &FilterSpec,
    provider: &dyn EnrichmentProvider,
) -> DashboardView {
    let start = std::time::Instant::now();

    // ── Step 1: Filter ────────────────────────────────────────────────────────
    let matched = search(&store.events, filter);

    // ── Step 2: Aggregate ─────────────────────────────────────────────────────
    let entities = list_entities(&store.events, filter, provider);
    let sessions: Vec<SessionSummary> = summarize_sessions(&matched, provider)
        .into_values()
        .collect();

    // ── Step 3: Chart series ──────────────────────────────────────────────────
    let daily = daily_page_views(&matched);
    let by_vertical = pages_by_vertical(&matched);

    let metadata = DashboardMetadata {
        generated_at: Utc::now().to_rfc3339(),
        source: store.source.display().to_string(),
        total_events: store.len(),
        matched_events: matched.len(),
        skipped_rows: store.skipped_rows,
        entity_count: entities.len(),
        session_count: sessions.len(),
        filter: filter.clone(),
        render_time_ms: start.elapsed().as_secs_f64() * 1000.0,
    };

    tracing::debug!(
        matched = metadata.matched_events,
        entities = metadata.entity_count,
        sessions = metadata.session_count,
        "built dashboard view"
    );

    DashboardView {
        entities,
        sessions,
        daily_page_views: daily,
        pages_by_vertical: by_vertical,
        metadata,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
