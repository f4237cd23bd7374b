//! Filter Engine: date range, entity selector and free-text search.

use chrono::{Local, NaiveDate};
use insights_core::models::VisitEvent;
use serde::{Deserialize, Serialize};

// ── EntitySelector ────────────────────────────────────────────────────────────

/// Which visiting entity to keep.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitySelector {
    #[default]
    All,
    /// Exact match on the event's IP.
    Ip(String),
}

impl EntitySelector {
    pub fn matches(&self, event: &VisitEvent) -> bool {
        match self {
            Self::All => true,
            Self::Ip(ip) => event.ip == *ip,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::All => "All",
            Self::Ip(ip) => ip,
        }
    }
}

// ── FilterSpec ────────────────────────────────────────────────────────────────

/// A fully resolved filter. Both date bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub entity: EntitySelector,
    /// Case-insensitive substring; empty matches everything.
    pub search_text: String,
}

impl FilterSpec {
    /// The default filter: the log's full date range, every entity, no search.
    ///
    /// An empty log yields today's date for both bounds.
    pub fn all_time(events: &[VisitEvent]) -> Self {
        let today = Local::now().date_naive();
        let start_date = events.iter().map(VisitEvent::date).min().unwrap_or(today);
        let end_date = events.iter().map(VisitEvent::date).max().unwrap_or(today);
        Self {
            start_date,
            end_date,
            entity: EntitySelector::All,
            search_text: String::new(),
        }
    }

    /// Conjunction of the date, entity and search predicates.
    pub fn matches(&self, event: &VisitEvent) -> bool {
        self.date_matches(event) && self.entity.matches(event) && self.search_matches(event)
    }

    /// `true` when `start_date > end_date`; such a filter matches nothing.
    pub fn is_inverted(&self) -> bool {
        self.start_date > self.end_date
    }

    fn date_matches(&self, event: &VisitEvent) -> bool {
        let date = event.date();
        self.start_date <= date && date <= self.end_date
    }

    fn search_matches(&self, event: &VisitEvent) -> bool {
        if self.search_text.is_empty() {
            return true;
        }
        let needle = self.search_text.to_lowercase();
        let contains = |field: Option<&str>| {
            field
                .map(|v| v.to_lowercase().contains(&needle))
                .unwrap_or(false)
        };

        contains(event.company_name.as_deref())
            || contains(event.state.as_deref())
            || contains(event.vertical.as_deref())
            || contains(event.total_pages_viewed.map(|n| n.to_string()).as_deref())
    }
}

/// Events matching `spec`, in their original order.
pub fn apply<'a>(events: &'a [VisitEvent], spec: &FilterSpec) -> Vec<&'a VisitEvent> {
    let matched: Vec<&VisitEvent> = events.iter().filter(|e| spec.matches(e)).collect();
    tracing::debug!(
        total = events.len(),
        matched = matched.len(),
        entity = spec.entity.label(),
        "applied filter"
    );
    matched
}

// ── FilterRequest ─────────────────────────────────────────────────────────────

/// A user-facing filter whose unset fields default to "everything".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub ip: Option<String>,
    pub search: Option<String>,
}

impl FilterRequest {
    /// Fill unset fields from [`FilterSpec::all_time`] over `events`.
    ///
    /// Bounds are taken as given; `start > end` is not corrected.
    pub fn resolve(&self, events: &[VisitEvent]) -> FilterSpec {
        let defaults = FilterSpec::all_time(events);
        FilterSpec {
            start_date: self.start_date.unwrap_or(defaults.start_date),
            end_date: self.end_date.unwrap_or(defaults.end_date),
            entity: match &self.ip {
                Some(ip) if !ip.is_empty() => EntitySelector::Ip(ip.clone()),
                _ => EntitySelector::All,
            },
            search_text: self.search.clone().unwrap_or_default(),
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
