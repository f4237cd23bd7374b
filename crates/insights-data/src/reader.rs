//! CSV discovery and loading for visitor logs.
//!
//! Reads one CSV file, or every `*.csv` file below a directory, and converts
//! the rows into [`VisitEvent`]s held by a [`LogStore`].

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use insights_core::error::{InsightsError, Result};
use insights_core::models::VisitEvent;
use insights_core::time_utils::TimezoneHandler;
use tracing::{debug, warn};

// ── LogStore ──────────────────────────────────────────────────────────────────

/// The loaded visitor log. Immutable once built.
#[derive(Debug, Clone)]
pub struct LogStore {
    /// The path the store was loaded from (file or directory).
    pub source: PathBuf,
    /// Events in file order (files concatenated in path order).
    pub events: Vec<VisitEvent>,
    /// Rows dropped because a required value was missing or unparseable.
    pub skipped_rows: usize,
    /// The CSV files that contributed rows.
    pub files: Vec<PathBuf>,
}

impl LogStore {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Earliest and latest calendar dates in the log.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.events.iter().map(VisitEvent::date).min()?;
        let max = self.events.iter().map(VisitEvent::date).max()?;
        Some((min, max))
    }

    /// Distinct visitor IPs in encounter order.
    pub fn distinct_ips(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        self.events
            .iter()
            .filter(|e| seen.insert(e.ip.as_str()))
            .map(|e| e.ip.clone())
            .collect()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.csv` files recursively under `dir`, sorted by path.
pub fn find_csv_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load `source` into a [`LogStore`].
///
/// `source` may be a single CSV file or a directory of CSV files.
/// Timestamps carrying an offset are converted to `timezone`.
///
/// Rows with a missing or unparseable required value are skipped and
/// counted. A source that yields no usable rows is an error.
pub fn load_events(source: &Path, timezone: &str) -> Result<LogStore> {
    if !source.exists() {
        return Err(InsightsError::SourceNotFound(source.to_path_buf()));
    }

    let files = if source.is_dir() {
        let found = find_csv_files(source);
        if found.is_empty() {
            return Err(InsightsError::NoCsvFiles(source.to_path_buf()));
        }
        found
    } else {
        vec![source.to_path_buf()]
    };

    let tz = TimezoneHandler::new(timezone);
    let mut events: Vec<VisitEvent> = Vec::new();
    let mut skipped_rows = 0usize;

    for file_path in &files {
        let before = events.len();
        skipped_rows += read_csv_file(file_path, &tz, &mut events)?;
        debug!(
            file = %file_path.display(),
            rows = events.len() - before,
            "loaded visitor log file"
        );
    }

    if events.is_empty() {
        return Err(InsightsError::EmptySource(source.to_path_buf()));
    }

    debug!(
        "Loaded {} events from {} files ({} rows skipped)",
        events.len(),
        files.len(),
        skipped_rows
    );

    Ok(LogStore {
        source: source.to_path_buf(),
        events,
        skipped_rows,
        files,
    })
}

// ── Column mapping ────────────────────────────────────────────────────────────

/// Header positions for one CSV file.
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    ip: usize,
    session_id: usize,
    timestamp: usize,
    url: usize,
    company_name: Option<usize>,
    state: Option<usize>,
    vertical: Option<usize>,
    sentiment: Option<usize>,
    intent: Option<usize>,
    engagement_score: Option<usize>,
    total_pages_viewed: Option<usize>,
    repeat_visits: Option<usize>,
    contact_match_in_crm: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String], path: &Path) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| InsightsError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
        };

        Ok(Self {
            ip: require("ip")?,
            session_id: require("session_id")?,
            timestamp: require("timestamp")?,
            url: require("url")?,
            company_name: find("company_name"),
            state: find("state"),
            vertical: find("vertical"),
            sentiment: find("sentiment"),
            intent: find("intent"),
            engagement_score: find("engagement_score"),
            total_pages_viewed: find("total_pages_viewed"),
            repeat_visits: find("repeat_visits"),
            contact_match_in_crm: find("contact_match_in_crm"),
        })
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Append the rows of one file to `events`, returning the number skipped.
fn read_csv_file(
    path: &Path,
    tz: &TimezoneHandler,
    events: &mut Vec<VisitEvent>,
) -> Result<usize> {
    let file = File::open(path).map_err(|source| InsightsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(file);

    let headers: Vec<String> = rdr.headers()?.iter().map(|s| s.to_string()).collect();
    let columns = ColumnMap::from_headers(&headers, path)?;

    let mut skipped = 0usize;
    for (idx, result) in rdr.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(file = %path.display(), line, error = %e, "skipping unreadable row");
                skipped += 1;
                continue;
            }
        };

        match parse_row(&record, &columns, tz) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!(file = %path.display(), line, error = %e, "skipping row");
                skipped += 1;
            }
        }
    }

    Ok(skipped)
}

fn parse_row(
    record: &csv::StringRecord,
    columns: &ColumnMap,
    tz: &TimezoneHandler,
) -> Result<VisitEvent> {
    let ip = required(record, columns.ip, "ip")?;
    let session_id = required(record, columns.session_id, "session_id")?;
    let url = required(record, columns.url, "url")?;
    let raw_ts = required(record, columns.timestamp, "timestamp")?;
    let timestamp = tz
        .parse_timestamp(&raw_ts)
        .ok_or(InsightsError::TimestampParse(raw_ts))?;

    let mut event = VisitEvent::new(ip, session_id, timestamp, url);
    event.company_name = text(record, columns.company_name);
    event.state = text(record, columns.state);
    event.vertical = text(record, columns.vertical);
    event.sentiment = text(record, columns.sentiment);
    event.intent = text(record, columns.intent);
    event.engagement_score = optional(record, columns.engagement_score, "engagement_score", |s| {
        s.parse::<f64>().ok()
    });
    event.total_pages_viewed =
        optional(record, columns.total_pages_viewed, "total_pages_viewed", parse_count);
    event.repeat_visits = optional(record, columns.repeat_visits, "repeat_visits", parse_count);
    event.contact_match_in_crm = optional(
        record,
        columns.contact_match_in_crm,
        "contact_match_in_crm",
        parse_flag,
    );
    Ok(event)
}

/// Trimmed non-empty value of a required column.
fn required(record: &csv::StringRecord, idx: usize, column: &str) -> Result<String> {
    match record.get(idx).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        other => Err(InsightsError::FieldParse {
            column: column.to_string(),
            value: other.unwrap_or_default().to_string(),
        }),
    }
}

fn text(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    let v = record.get(idx?)?.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

/// Parse an optional column; an unparseable value is dropped to `None`.
fn optional<T>(
    record: &csv::StringRecord,
    idx: Option<usize>,
    column: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = text(record, idx)?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        debug!(column, value = %raw, "ignoring unparseable optional value");
    }
    parsed
}

/// Non-negative integer, also accepting whole floats such as `"12.0"`.
fn parse_count(s: &str) -> Option<u64> {
    if let Ok(n) = s.parse::<u64>() {
        return Some(n);
    }
    match s.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Some(f as u64),
        _ => None,
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
