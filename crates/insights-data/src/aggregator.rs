//! Grouping of filtered visit events into entity, session and chart views.
//!
//! The first event of a group in file order is its representative row:
//! descriptive fields (company, state, vertical, sentiment, intent,
//! engagement score) are read from it, counts are computed over the whole
//! group.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use insights_core::enrichment::{enrich, EnrichmentProvider};
use insights_core::models::{
    CategoryCount, DailyCount, EntitySummary, PageVisit, SessionSummary, VisitEvent,
};
use tracing::{debug, warn};

/// Label used for events without a vertical.
pub const UNKNOWN_VERTICAL: &str = "Unknown";

// ── Entities ──────────────────────────────────────────────────────────────────

/// One summary per distinct IP, most recent visitor first.
///
/// Entities with equal `last_visit` keep their first-encounter order.
pub fn summarize_entities(
    events: &[&VisitEvent],
    provider: &dyn EnrichmentProvider,
) -> Vec<EntitySummary> {
    let groups = group_in_encounter_order(events, |e| e.ip.as_str());

    let mut summaries: Vec<EntitySummary> = groups
        .into_iter()
        .map(|(ip, group)| {
            let conflicts = descriptive_conflicts(&group);
            if !conflicts.is_empty() {
                warn!(ip, fields = ?conflicts, "entity rows disagree; using first row");
            }

            let first = group[0];
            let sessions: HashSet<&str> = group.iter().map(|e| e.session_id.as_str()).collect();
            let last_visit = group
                .iter()
                .map(|e| e.timestamp)
                .max()
                .unwrap_or(first.timestamp);

            EntitySummary {
                ip: ip.to_string(),
                company_name: first.company_name.clone(),
                enrichment: enrich(provider, ip),
                session_count: sessions.len(),
                page_count: group.len(),
                last_visit,
                state: first.state.clone(),
                vertical: first.vertical.clone(),
                sentiment: first.sentiment.clone(),
                intent: first.intent.clone(),
                engagement_score: first.engagement_score,
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.last_visit.cmp(&a.last_visit));
    debug!(entities = summaries.len(), "summarized entities");
    summaries
}

// ── Sessions ──────────────────────────────────────────────────────────────────

/// One summary per session id, keyed (and ordered) by id.
pub fn summarize_sessions(
    events: &[&VisitEvent],
    provider: &dyn EnrichmentProvider,
) -> BTreeMap<String, SessionSummary> {
    let mut groups: BTreeMap<&str, Vec<&VisitEvent>> = BTreeMap::new();
    for &event in events {
        groups.entry(event.session_id.as_str()).or_default().push(event);
    }

    let sessions: BTreeMap<String, SessionSummary> = groups
        .into_iter()
        .map(|(session_id, group)| {
            let first = group[0];
            if group.iter().any(|e| e.ip != first.ip) {
                warn!(session_id, "session spans multiple IPs; using first row");
            }

            let mut pages: Vec<PageVisit> = group.iter().map(|e| PageVisit::from(*e)).collect();
            pages.sort_by_key(|p| p.timestamp);

            let first_visit = pages.first().map(|p| p.timestamp).unwrap_or(first.timestamp);
            let last_visit = pages.last().map(|p| p.timestamp).unwrap_or(first.timestamp);

            let summary = SessionSummary {
                session_id: session_id.to_string(),
                ip: first.ip.clone(),
                company_name: first.company_name.clone(),
                state: first.state.clone(),
                vertical: first.vertical.clone(),
                enrichment: enrich(provider, &first.ip),
                page_count: group.len(),
                first_visit,
                last_visit,
                pages,
            };
            (session_id.to_string(), summary)
        })
        .collect();

    debug!(sessions = sessions.len(), "summarized sessions");
    sessions
}

// ── Chart series ──────────────────────────────────────────────────────────────

/// Page views per calendar day, ascending by date.
pub fn daily_page_views(events: &[&VisitEvent]) -> Vec<DailyCount> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for event in events {
        *per_day.entry(event.date()).or_insert(0) += 1;
    }
    per_day
        .into_iter()
        .map(|(date, pages)| DailyCount { date, pages })
        .collect()
}

/// Page views per vertical, busiest first; ties ordered by name.
pub fn pages_by_vertical(events: &[&VisitEvent]) -> Vec<CategoryCount> {
    let mut per_vertical: HashMap<&str, usize> = HashMap::new();
    for event in events {
        let label = event.vertical.as_deref().unwrap_or(UNKNOWN_VERTICAL);
        *per_vertical.entry(label).or_insert(0) += 1;
    }

    let mut counts: Vec<CategoryCount> = per_vertical
        .into_iter()
        .map(|(label, pages)| CategoryCount {
            label: label.to_string(),
            pages,
        })
        .collect();
    counts.sort_by(|a, b| b.pages.cmp(&a.pages).then_with(|| a.label.cmp(&b.label)));
    counts
}

// ── Invariant check ───────────────────────────────────────────────────────────

/// Names of descriptive fields whose values differ within `group`.
pub fn descriptive_conflicts(group: &[&VisitEvent]) -> Vec<&'static str> {
    let Some(first) = group.first() else {
        return Vec::new();
    };

    let mut conflicts = Vec::new();
    let mut check = |name: &'static str, differs: bool| {
        if differs {
            conflicts.push(name);
        }
    };
    check("company_name", group.iter().any(|e| e.company_name != first.company_name));
    check("state", group.iter().any(|e| e.state != first.state));
    check("vertical", group.iter().any(|e| e.vertical != first.vertical));
    check("sentiment", group.iter().any(|e| e.sentiment != first.sentiment));
    check("intent", group.iter().any(|e| e.intent != first.intent));
    check(
        "engagement_score",
        group
            .iter()
            .any(|e| !same_score(e.engagement_score, first.engagement_score)),
    );
    conflicts
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn same_score(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
        (None, None) => true,
        _ => false,
    }
}

/// Group by `key`, preserving the order in which keys are first seen.
fn group_in_encounter_order<'a>(
    events: &[&'a VisitEvent],
    key: impl Fn(&'a VisitEvent) -> &'a str,
) -> Vec<(&'a str, Vec<&'a VisitEvent>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&VisitEvent>)> = Vec::new();
    for &event in events {
        let k = key(event);
        match index.get(k) {
            Some(&i) => groups[i].1.push(event),
            None => {
                index.insert(k, groups.len());
                groups.push((k, vec![event]));
            }
        }
    }
    groups
}

// ── Tests ─────────────────────────────────────────────────────────────────────
