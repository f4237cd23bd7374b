use crate::themes::Theme;
use insights_core::formatting::{format_count, format_score};
use insights_core::models::EngagementBand;
use insights_data::analysis::DashboardMetadata;
use ratatui::text::{Line, Span};

// ── EngagementIndicator ──────────────────────────────────────────────────────

/// Engagement score with a band marker, coloured by band.
///
/// | score     | marker | band    |
/// |-----------|--------|---------|
/// | > 80      | ●●●    | high    |
/// | (50, 80]  | ●●○    | medium  |
/// | ≤ 50      | ●○○    | low     |
/// | missing   | ○○○    | n/a     |
pub struct EngagementIndicator<'a> {
    pub score: Option<f64>,
    pub theme: &'a Theme,
}

impl<'a> EngagementIndicator<'a> {
    pub fn new(score: Option<f64>, theme: &'a Theme) -> Self {
        Self { score, theme }
    }

    pub fn band(&self) -> EngagementBand {
        EngagementBand::from_score(self.score)
    }

    pub fn marker(&self) -> &'static str {
        match self.band() {
            EngagementBand::High => "●●●",
            EngagementBand::Medium => "●●○",
            EngagementBand::Low => "●○○",
            EngagementBand::Unknown => "○○○",
        }
    }

    /// Plain cell text, e.g. `"87.5 ●●●"`.
    pub fn text(&self) -> String {
        format!("{} {}", format_score(self.score), self.marker())
    }

    /// Format: `"Engagement: 87.5 ●●● (high)"`
    pub fn to_line(&self) -> Line<'a> {
        let style = self.theme.engagement_style(self.band());
        Line::from(vec![
            Span::styled("Engagement: ", self.theme.label),
            Span::styled(self.text(), style),
            Span::styled(format!(" ({})", self.band().label()), self.theme.dim),
        ])
    }
}

// ── SummaryIndicator ─────────────────────────────────────────────────────────

/// Headline counts for one render.
///
/// Format: `"Visitors: 12  Sessions: 30  Pages: 1,204 / 1,500"`, with a
/// trailing skipped-row note when the loader rejected rows.
pub struct SummaryIndicator<'a> {
    pub metadata: &'a DashboardMetadata,
    pub theme: &'a Theme,
}

impl<'a> SummaryIndicator<'a> {
    pub fn new(metadata: &'a DashboardMetadata, theme: &'a Theme) -> Self {
        Self { metadata, theme }
    }

    pub fn to_line(&self) -> Line<'a> {
        let m = self.metadata;
        let mut spans = vec![
            Span::styled("Visitors: ", self.theme.label),
            Span::styled(format_count(m.entity_count), self.theme.value),
            Span::styled("  Sessions: ", self.theme.label),
            Span::styled(format_count(m.session_count), self.theme.value),
            Span::styled("  Pages: ", self.theme.label),
            Span::styled(format_count(m.matched_events), self.theme.value),
            Span::styled(format!(" / {}", format_count(m.total_events)), self.theme.dim),
        ];

        if m.skipped_rows > 0 {
            spans.push(Span::styled(
                format!("  ({} rows skipped)", format_count(m.skipped_rows)),
                self.theme.warning,
            ));
        }

        Line::from(spans)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use insights_data::filter::{EntitySelector, FilterSpec};
    use ratatui::style::Color;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn metadata(skipped_rows: usize) -> DashboardMetadata {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        DashboardMetadata {
            generated_at: "2024-01-01T00:00:00+00:00".to_string(),
            source: "weblogs.csv".to_string(),
            total_events: 1500,
            matched_events: 1204,
            skipped_rows,
            entity_count: 12,
            session_count: 30,
            filter: FilterSpec {
                start_date: day,
                end_date: day,
                entity: EntitySelector::All,
                search_text: String::new(),
            },
            render_time_ms: 1.0,
        }
    }

    #[test]
    fn test_engagement_markers() {
        let theme = Theme::dark();
        assert_eq!(EngagementIndicator::new(Some(95.0), &theme).marker(), "●●●");
        assert_eq!(EngagementIndicator::new(Some(80.0), &theme).marker(), "●●○");
        assert_eq!(EngagementIndicator::new(Some(50.0), &theme).marker(), "●○○");
        assert_eq!(EngagementIndicator::new(None, &theme).marker(), "○○○");
    }

    #[test]
    fn test_engagement_text() {
        let theme = Theme::dark();
        assert_eq!(EngagementIndicator::new(Some(87.5), &theme).text(), "87.5 ●●●");
        assert_eq!(EngagementIndicator::new(None, &theme).text(), "- ○○○");
    }

    #[test]
    fn test_engagement_to_line_styled_by_band() {
        let theme = Theme::dark();
        let line = EngagementIndicator::new(Some(20.0), &theme).to_line();
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].style.fg, Some(Color::Red));
        assert!(text(&line).contains("(low)"));
    }

    #[test]
    fn test_summary_line_content() {
        let theme = Theme::dark();
        let meta = metadata(0);
        let line = SummaryIndicator::new(&meta, &theme).to_line();
        let full = text(&line);
        assert!(full.contains("Visitors: 12"), "got: {full}");
        assert!(full.contains("Sessions: 30"));
        assert!(full.contains("Pages: 1,204 / 1,500"));
        assert_eq!(line.spans.len(), 7);
    }

    #[test]
    fn test_summary_line_reports_skipped_rows() {
        let theme = Theme::dark();
        let meta = metadata(3);
        let line = SummaryIndicator::new(&meta, &theme).to_line();
        assert_eq!(line.spans.len(), 8);
        assert!(text(&line).contains("3 rows skipped"));
    }
}
