//! Expandable per-session panels for the Visitor Insights TUI.
//!
//! Each session is one summary line. An expanded session additionally shows
//! its detail: the enrichment block and its page visits in ascending time
//! order. Expanded sessions the current filter excludes get a one-line note.

use std::collections::BTreeMap;

use ratatui::{
    layout::Rect,
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use insights_core::formatting::{self, format_count};
use insights_core::models::{EnrichmentRecord, SessionSummary};

use crate::themes::Theme;

const INDENT: &str = "    ";
const URL_WIDTH: usize = 40;
const TAG_WIDTH: usize = 12;

/// Detail loaded for one expanded session.
#[derive(Debug, Clone)]
pub enum SessionDetail {
    Loaded(SessionSummary),
    /// The current filter excludes the session.
    Missing,
    /// The lookup failed for another reason.
    Failed(String),
}

/// Lines for all session panels plus the index of the selected panel's
/// first line (for scrolling).
pub struct SessionLines<'a> {
    pub lines: Vec<Line<'a>>,
    pub selected_line: usize,
}

/// Build the panel lines.
///
/// `details` holds one entry per session id the user has opened.
pub fn build_session_lines<'a>(
    sessions: &'a [SessionSummary],
    selected: Option<usize>,
    details: &'a BTreeMap<String, SessionDetail>,
    theme: &'a Theme,
) -> SessionLines<'a> {
    let mut lines: Vec<Line<'a>> = Vec::new();
    let mut selected_line = 0;

    for (i, session) in sessions.iter().enumerate() {
        let is_selected = selected == Some(i);
        let detail = details.get(&session.session_id);
        if is_selected {
            selected_line = lines.len();
        }

        lines.push(summary_line(session, is_selected, detail.is_some(), theme));
        match detail {
            Some(SessionDetail::Loaded(detail)) => {
                lines.extend(detail_lines(detail, theme));
                lines.push(Line::from(""));
            }
            Some(SessionDetail::Missing) => {
                lines.push(note_line(missing_message(&session.session_id), theme.warning));
            }
            Some(SessionDetail::Failed(message)) => {
                lines.push(note_line(message.clone(), theme.error));
            }
            None => {}
        }
    }

    // Opened sessions the filter no longer shows.
    for (id, detail) in details {
        if matches!(detail, SessionDetail::Missing)
            && !sessions.iter().any(|s| &s.session_id == id)
        {
            lines.push(Line::from(vec![
                Span::styled("▾ ", theme.dim),
                Span::styled(missing_message(id), theme.warning),
            ]));
        }
    }

    SessionLines {
        lines,
        selected_line,
    }
}

/// Render the session panels into `area`, scrolled so the selection is visible.
pub fn render_sessions(
    frame: &mut Frame,
    area: Rect,
    sessions: &[SessionSummary],
    selected: Option<usize>,
    details: &BTreeMap<String, SessionDetail>,
    theme: &Theme,
) {
    let built = build_session_lines(sessions, selected, details, theme);
    // Two rows of border.
    let visible = area.height.saturating_sub(2) as usize;
    let offset = scroll_offset(built.selected_line, visible);

    let paragraph = Paragraph::new(Text::from(built.lines))
        .scroll((scroll_rows(offset), 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.table_border)
                .title(format!(
                    " Sessions ({}) · Enter to expand ",
                    format_count(sessions.len())
                )),
        );
    frame.render_widget(paragraph, area);
}

/// Shown for an opened session that the current filter excludes.
pub fn missing_message(session_id: &str) -> String {
    format!("Session {session_id} is not in the current filter")
}

// ── Line builders ─────────────────────────────────────────────────────────────

fn summary_line<'a>(
    session: &'a SessionSummary,
    selected: bool,
    expanded: bool,
    theme: &'a Theme,
) -> Line<'a> {
    let marker = if expanded { "▾ " } else { "▸ " };
    let id_style = if selected {
        theme.table_selected
    } else {
        theme.bold
    };
    let company = session
        .company_name
        .as_deref()
        .unwrap_or(session.enrichment.company.as_str());

    Line::from(vec![
        Span::styled(marker, theme.info),
        Span::styled(session.session_id.as_str(), id_style),
        Span::styled("  ", theme.dim),
        Span::styled(session.ip.as_str(), theme.text),
        Span::styled("  ", theme.dim),
        Span::styled(company, theme.value),
        Span::styled(
            format!("  {} pages  ", format_count(session.page_count)),
            theme.label,
        ),
        Span::styled(
            format!(
                "{} → {}",
                formatting::format_timestamp(&session.first_visit),
                formatting::format_timestamp(&session.last_visit)
            ),
            theme.dim,
        ),
    ])
}

fn detail_lines<'a>(session: &'a SessionSummary, theme: &'a Theme) -> Vec<Line<'a>> {
    let mut lines = enrichment_lines(&session.enrichment, theme);
    lines.push(Line::from(vec![
        Span::styled(format!("{INDENT}State: "), theme.label),
        Span::styled(formatting::or_missing(session.state.as_deref()), theme.value),
        Span::styled("   Vertical: ", theme.label),
        Span::styled(
            formatting::or_missing(session.vertical.as_deref()),
            theme.value,
        ),
    ]));
    lines.push(Line::from(""));
    lines.extend(page_lines(session, theme));
    lines
}

fn note_line<'a>(message: String, style: ratatui::style::Style) -> Line<'a> {
    Line::from(Span::styled(format!("{INDENT}{message}"), style))
}

fn enrichment_lines<'a>(record: &'a EnrichmentRecord, theme: &'a Theme) -> Vec<Line<'a>> {
    let technologies = if record.technologies.is_empty() {
        formatting::MISSING.to_string()
    } else {
        record.technologies.join(", ")
    };
    vec![
        Line::from(vec![
            Span::styled(format!("{INDENT}Company: "), theme.label),
            Span::styled(record.company.as_str(), theme.value),
            Span::styled("   Location: ", theme.label),
            Span::styled(record.location.as_str(), theme.value),
        ]),
        Line::from(vec![
            Span::styled(format!("{INDENT}Industry: "), theme.label),
            Span::styled(record.industry.as_str(), theme.value),
            Span::styled("   Employees: ", theme.label),
            Span::styled(record.employee_count.as_str(), theme.value),
        ]),
        Line::from(vec![
            Span::styled(format!("{INDENT}Technologies: "), theme.label),
            Span::styled(technologies, theme.value),
        ]),
    ]
}

fn page_lines<'a>(session: &'a SessionSummary, theme: &'a Theme) -> Vec<Line<'a>> {
    let mut lines = Vec::with_capacity(session.pages.len() + 1);
    lines.push(Line::from(Span::styled(
        format!(
            "{INDENT}{}  {}  {}  {}",
            fit("Time", 19),
            fit("URL", URL_WIDTH),
            fit("Intent", TAG_WIDTH),
            "Sentiment"
        ),
        theme.table_header,
    )));

    for (i, page) in session.pages.iter().enumerate() {
        lines.push(Line::from(Span::styled(
            format!(
                "{INDENT}{}  {}  {}  {}",
                formatting::format_timestamp_full(&page.timestamp),
                fit(&page.url, URL_WIDTH),
                fit(formatting::or_missing(page.intent.as_deref()), TAG_WIDTH),
                formatting::or_missing(page.sentiment.as_deref())
            ),
            theme.row_style(i),
        )));
    }
    lines
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Truncate or pad `s` to exactly `width` display columns.
pub fn fit(s: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    if s.width() > width {
        for ch in s.chars() {
            let w = ch.width().unwrap_or(0);
            if used + w + 1 > width {
                break;
            }
            out.push(ch);
            used += w;
        }
        out.push('…');
        used += 1;
    } else {
        out.push_str(s);
        used = s.width();
    }
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

/// Paragraph scroll rows for a line offset, saturating at `u16::MAX`.
fn scroll_rows(offset: usize) -> u16 {
    u16::try_from(offset).unwrap_or(u16::MAX)
}

/// First line to show so that `target` is inside a window of `visible` lines.
fn scroll_offset(target: usize, visible: usize) -> usize {
    if visible == 0 {
        return target;
    }
    target.saturating_sub(visible.saturating_sub(1))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use insights_core::enrichment::{EnrichmentProvider, StaticEnrichment};
    use insights_core::models::PageVisit;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn make_sessions() -> Vec<SessionSummary> {
        let enrichment = StaticEnrichment::new().lookup("1.1.1.1").unwrap();
        vec![
            SessionSummary {
                session_id: "s1".to_string(),
                ip: "1.1.1.1".to_string(),
                company_name: None,
                state: Some("CA".to_string()),
                vertical: None,
                enrichment: enrichment.clone(),
                page_count: 2,
                first_visit: ts("2024-01-01 09:00:00"),
                last_visit: ts("2024-01-01 10:00:00"),
                pages: vec![
                    PageVisit {
                        timestamp: ts("2024-01-01 09:00:00"),
                        url: "/b".to_string(),
                        intent: Some("research".to_string()),
                        sentiment: None,
                    },
                    PageVisit {
                        timestamp: ts("2024-01-01 10:00:00"),
                        url: "/a".to_string(),
                        intent: None,
                        sentiment: Some("positive".to_string()),
                    },
                ],
            },
            SessionSummary {
                session_id: "s2".to_string(),
                ip: "2.2.2.2".to_string(),
                company_name: Some("Globex".to_string()),
                state: None,
                vertical: Some("Retail".to_string()),
                enrichment,
                page_count: 1,
                first_visit: ts("2024-01-02 08:00:00"),
                last_visit: ts("2024-01-02 08:00:00"),
                pages: vec![PageVisit {
                    timestamp: ts("2024-01-02 08:00:00"),
                    url: "/c".to_string(),
                    intent: None,
                    sentiment: None,
                }],
            },
        ]
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn opened(sessions: &[SessionSummary], ids: &[&str]) -> BTreeMap<String, SessionDetail> {
        ids.iter()
            .map(|id| {
                let detail = sessions
                    .iter()
                    .find(|s| s.session_id == *id)
                    .map_or(SessionDetail::Missing, |s| SessionDetail::Loaded(s.clone()));
                (id.to_string(), detail)
            })
            .collect()
    }

    #[test]
    fn test_collapsed_sessions_one_line_each() {
        let theme = Theme::dark();
        let sessions = make_sessions();
        let details = BTreeMap::new();
        let built = build_session_lines(&sessions, Some(1), &details, &theme);
        assert_eq!(built.lines.len(), 2);
        assert_eq!(built.selected_line, 1);

        let first = text(&built.lines[0]);
        assert!(first.starts_with("▸ s1"), "got: {first}");
        assert!(first.contains("Acme Corp"), "enrichment company used: {first}");
        assert!(text(&built.lines[1]).contains("Globex"));
    }

    #[test]
    fn test_expanded_session_shows_enrichment_and_pages_in_order() {
        let theme = Theme::dark();
        let sessions = make_sessions();
        let details = opened(&sessions, &["s1"]);
        let built = build_session_lines(&sessions, Some(1), &details, &theme);
        let all: Vec<String> = built.lines.iter().map(text).collect();

        assert!(all[0].starts_with("▾ s1"));
        assert!(all.iter().any(|l| l.contains("Location: San Francisco, CA")));
        assert!(all.iter().any(|l| l.contains("Technologies: Salesforce, Zendesk")));

        let b = all.iter().position(|l| l.contains("2024-01-01 09:00:00")).unwrap();
        let a = all.iter().position(|l| l.contains("2024-01-01 10:00:00")).unwrap();
        assert!(b < a);
        assert!(all[b].contains("research"));

        // The second panel starts after the expanded block.
        assert!(built.selected_line > 1);
        assert!(all[built.selected_line].contains("s2"));
    }

    #[test]
    fn test_filtered_out_session_shows_note() {
        let theme = Theme::dark();
        let mut sessions = make_sessions();
        // Both were opened; the filter now keeps only s1.
        sessions.truncate(1);
        let details = opened(&sessions, &["s1", "s2"]);

        let built = build_session_lines(&sessions, Some(0), &details, &theme);
        let all: Vec<String> = built.lines.iter().map(text).collect();
        assert!(all[0].starts_with("▾ s1"));
        assert!(all.iter().any(|l| l.contains("/b")));
        assert_eq!(all.last().unwrap(), &format!("▾ {}", missing_message("s2")));
        assert!(!all.iter().any(|l| l.contains("Globex")));
    }

    #[test]
    fn test_failed_detail_shows_message_under_summary() {
        let theme = Theme::dark();
        let sessions = make_sessions();
        let mut details = BTreeMap::new();
        details.insert(
            "s1".to_string(),
            SessionDetail::Failed("Data source not found: weblogs.csv".to_string()),
        );

        let built = build_session_lines(&sessions, None, &details, &theme);
        let all: Vec<String> = built.lines.iter().map(text).collect();
        assert_eq!(all.len(), 3);
        assert!(all[1].contains("Data source not found"));
    }

    #[test]
    fn test_scroll_rows_saturates() {
        assert_eq!(scroll_rows(0), 0);
        assert_eq!(scroll_rows(65_535), u16::MAX);
        assert_eq!(scroll_rows(70_000), u16::MAX);
    }

    #[test]
    fn test_render_far_down_selection_does_not_wrap() {
        // The selected panel sits just past u16::MAX lines; an offset of
        // 65_536 truncated to u16 would scroll back to the very top.
        let theme = Theme::dark();
        let template = make_sessions().remove(0);
        let mut big = template.clone();
        big.session_id = "s0".to_string();
        big.pages = vec![template.pages[0].clone(); usize::from(u16::MAX)];
        let mut last = template;
        last.session_id = "s9".to_string();
        let sessions = vec![big, last];
        let details = opened(&sessions, &["s0"]);

        let built = build_session_lines(&sessions, Some(1), &details, &theme);
        assert!(built.selected_line > usize::from(u16::MAX));

        let mut terminal = Terminal::new(TestBackend::new(80, 10)).unwrap();
        terminal
            .draw(|frame| {
                let area = frame.area();
                render_sessions(frame, area, &sessions, Some(1), &details, &theme);
            })
            .unwrap();
        let shown = buffer_text(&terminal);
        assert!(!shown.contains("▾ s0"));
        assert!(shown.contains("2024-01-01 09:00:00"));
    }

    #[test]
    fn test_fit_pads_and_truncates() {
        assert_eq!(fit("/a", 5), "/a   ");
        assert_eq!(fit("/pricing/enterprise", 8), "/pricin…");
        assert_eq!(fit("/pricing/enterprise", 8).width(), 8);
        assert_eq!(fit("日本語", 4).width(), 4);
    }

    #[test]
    fn test_scroll_offset() {
        assert_eq!(scroll_offset(0, 10), 0);
        assert_eq!(scroll_offset(9, 10), 0);
        assert_eq!(scroll_offset(15, 10), 6);
        assert_eq!(scroll_offset(3, 0), 3);
    }

    #[test]
    fn test_render_sessions_does_not_panic() {
        let mut terminal = Terminal::new(TestBackend::new(120, 20)).unwrap();
        let theme = Theme::dark();
        let sessions = make_sessions();
        let details = opened(&sessions, &["s2"]);

        terminal
            .draw(|frame| {
                let area = frame.area();
                render_sessions(frame, area, &sessions, Some(1), &details, &theme);
            })
            .unwrap();
    }

    #[test]
    fn test_render_sessions_tiny_area_does_not_panic() {
        let mut terminal = Terminal::new(TestBackend::new(20, 3)).unwrap();
        let theme = Theme::classic();
        let sessions = make_sessions();

        terminal
            .draw(|frame| {
                let area = frame.area();
                render_sessions(frame, area, &sessions, Some(0), &BTreeMap::new(), &theme);
            })
            .unwrap();
    }
}
