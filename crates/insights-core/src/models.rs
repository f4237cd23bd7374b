use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single page view read from the visitor log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitEvent {
    /// Visiting IP address; the entity key.
    pub ip: String,
    /// Opaque identifier grouping one browsing visit.
    pub session_id: String,
    /// Wall-clock time of the page view in the display timezone.
    pub timestamp: NaiveDateTime,
    /// Requested URL or path.
    pub url: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub vertical: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    /// Precomputed interest signal, 0–100 by convention.
    #[serde(default)]
    pub engagement_score: Option<f64>,
    #[serde(default)]
    pub total_pages_viewed: Option<u64>,
    #[serde(default)]
    pub repeat_visits: Option<u64>,
    #[serde(default)]
    pub contact_match_in_crm: Option<bool>,
}

impl VisitEvent {
    /// Build an event carrying only the four required columns.
    pub fn new(
        ip: impl Into<String>,
        session_id: impl Into<String>,
        timestamp: NaiveDateTime,
        url: impl Into<String>,
    ) -> Self {
        Self {
            ip: ip.into(),
            session_id: session_id.into(),
            timestamp,
            url: url.into(),
            company_name: None,
            state: None,
            vertical: None,
            sentiment: None,
            intent: None,
            engagement_score: None,
            total_pages_viewed: None,
            repeat_visits: None,
            contact_match_in_crm: None,
        }
    }

    /// Calendar date of the event, used by the date-range predicate.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Firmographic data attached to a visiting IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub company: String,
    pub location: String,
    pub industry: String,
    /// Employee-count band, e.g. `"201-500"`.
    pub employee_count: String,
    pub technologies: Vec<String>,
}

impl EnrichmentRecord {
    /// Record shown when a lookup fails or times out.
    pub fn placeholder() -> Self {
        Self {
            company: "Unknown".to_string(),
            location: "Unknown".to_string(),
            industry: "Unknown".to_string(),
            employee_count: "n/a".to_string(),
            technologies: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }
}

/// One row of a session's page-visit table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVisit {
    pub timestamp: NaiveDateTime,
    pub url: String,
    pub intent: Option<String>,
    pub sentiment: Option<String>,
}

impl From<&VisitEvent> for PageVisit {
    fn from(event: &VisitEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            url: event.url.clone(),
            intent: event.intent.clone(),
            sentiment: event.sentiment.clone(),
        }
    }
}

/// Detail view of one browsing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub ip: String,
    pub company_name: Option<String>,
    pub state: Option<String>,
    pub vertical: Option<String>,
    pub enrichment: EnrichmentRecord,
    /// Number of events in the session.
    pub page_count: usize,
    pub first_visit: NaiveDateTime,
    pub last_visit: NaiveDateTime,
    /// Page visits, ascending by timestamp.
    pub pages: Vec<PageVisit>,
}

/// Summary row for one visiting entity (keyed by IP).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub ip: String,
    pub company_name: Option<String>,
    pub enrichment: EnrichmentRecord,
    /// Distinct session ids among the entity's events.
    pub session_count: usize,
    /// Total events for the entity.
    pub page_count: usize,
    pub last_visit: NaiveDateTime,
    pub state: Option<String>,
    pub vertical: Option<String>,
    pub sentiment: Option<String>,
    pub intent: Option<String>,
    pub engagement_score: Option<f64>,
}

impl EntitySummary {
    /// Company to display: the log's own column first, then enrichment.
    pub fn display_company(&self) -> &str {
        self.company_name
            .as_deref()
            .unwrap_or(self.enrichment.company.as_str())
    }

    pub fn engagement_band(&self) -> EngagementBand {
        EngagementBand::from_score(self.engagement_score)
    }
}

/// Display banding of the engagement score.
///
/// | score          | band     |
/// |----------------|----------|
/// | > 80           | `High`   |
/// | (50, 80]       | `Medium` |
/// | ≤ 50           | `Low`    |
/// | missing / NaN  | `Unknown`|
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementBand {
    High,
    Medium,
    Low,
    Unknown,
}

impl EngagementBand {
    pub const HIGH_ABOVE: f64 = 80.0;
    pub const MEDIUM_ABOVE: f64 = 50.0;

    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            Some(s) if s.is_nan() => Self::Unknown,
            Some(s) if s > Self::HIGH_ABOVE => Self::High,
            Some(s) if s > Self::MEDIUM_ABOVE => Self::Medium,
            Some(_) => Self::Low,
            None => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unknown => "n/a",
        }
    }
}

/// Page views on one calendar day (chart series).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub pages: usize,
}

/// Page views for one category label (chart series).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub label: String,
    pub pages: usize,
}
