use crate::themes::Theme;
use insights_data::filter::FilterSpec;
use ratatui::text::{Line, Span};

/// Decorative marks placed either side of the application title.
pub const ACCENTS: &str = "◆ ◇";

/// Dashboard header rendering four lines:
///
/// 1. Application title with accent marks (ALL CAPS).
/// 2. A 60-column `=` separator.
/// 3. Data source and timezone in `[ source | timezone ]` format.
/// 4. The active filter, or an empty line before the first render.
pub struct Header<'a> {
    /// Log source shown to the user (file or directory).
    pub source: &'a str,
    pub timezone: &'a str,
    pub filter: Option<&'a FilterSpec>,
    pub theme: &'a Theme,
}

impl<'a> Header<'a> {
    pub fn new(
        source: &'a str,
        timezone: &'a str,
        filter: Option<&'a FilterSpec>,
        theme: &'a Theme,
    ) -> Self {
        Self {
            source,
            timezone,
            filter,
            theme,
        }
    }

    /// Render the header as exactly four lines.
    pub fn to_lines(&self) -> Vec<Line<'a>> {
        let separator = "=".repeat(60);

        let filter_line = match self.filter {
            Some(spec) => Line::from(vec![
                Span::styled("Filter: ", self.theme.label),
                Span::styled(filter_summary(spec), self.theme.value),
            ]),
            None => Line::from(""),
        };

        vec![
            Line::from(vec![
                Span::styled(ACCENTS, self.theme.header_accent),
                Span::styled(" VISITOR INSIGHTS DASHBOARD ", self.theme.header),
                Span::styled(ACCENTS, self.theme.header_accent),
            ]),
            Line::from(Span::styled(separator, self.theme.separator)),
            Line::from(vec![
                Span::styled("[ ", self.theme.label),
                Span::styled(self.source, self.theme.value),
                Span::styled(" | ", self.theme.label),
                Span::styled(self.timezone, self.theme.value),
                Span::styled(" ]", self.theme.label),
            ]),
            filter_line,
        ]
    }
}

/// One-line description of a filter, e.g.
/// `2024-01-01 → 2024-01-31 · entity: All · search: "soft"`.
pub fn filter_summary(spec: &FilterSpec) -> String {
    let mut summary = format!(
        "{} → {} · entity: {}",
        spec.start_date.format("%Y-%m-%d"),
        spec.end_date.format("%Y-%m-%d"),
        spec.entity.label()
    );
    if !spec.search_text.is_empty() {
        summary.push_str(&format!(" · search: \"{}\"", spec.search_text));
    }
    if spec.is_inverted() {
        summary.push_str(" · start is after end");
    }
    summary
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use insights_data::filter::EntitySelector;

    fn spec() -> FilterSpec {
        FilterSpec {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            entity: EntitySelector::All,
            search_text: String::new(),
        }
    }

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_header_to_lines_count() {
        let theme = Theme::dark();
        let header = Header::new("weblogs.csv", "UTC", None, &theme);
        assert_eq!(header.to_lines().len(), 4);
    }

    #[test]
    fn test_header_title_line_content() {
        let theme = Theme::dark();
        let lines = Header::new("weblogs.csv", "UTC", None, &theme).to_lines();
        let title = text(&lines[0]);
        assert!(title.contains("VISITOR INSIGHTS"), "got: {title}");
        assert!(title.contains(ACCENTS));
    }

    #[test]
    fn test_header_separator_line() {
        let theme = Theme::dark();
        let lines = Header::new("weblogs.csv", "UTC", None, &theme).to_lines();
        let sep = text(&lines[1]);
        assert_eq!(sep.chars().count(), 60);
        assert!(sep.chars().all(|c| c == '='));
    }

    #[test]
    fn test_header_info_line() {
        let theme = Theme::dark();
        let lines = Header::new("logs/", "Europe/Berlin", None, &theme).to_lines();
        assert_eq!(text(&lines[2]), "[ logs/ | Europe/Berlin ]");
        assert_eq!(lines[2].spans.len(), 5);
    }

    #[test]
    fn test_header_filter_line() {
        let theme = Theme::dark();
        let spec = spec();
        let lines = Header::new("weblogs.csv", "UTC", Some(&spec), &theme).to_lines();
        let filter = text(&lines[3]);
        assert!(filter.contains("2024-01-01 → 2024-01-31"), "got: {filter}");

        let empty = Header::new("weblogs.csv", "UTC", None, &theme).to_lines();
        assert!(text(&empty[3]).is_empty());
    }

    #[test]
    fn test_filter_summary_includes_entity_and_search() {
        let mut spec = spec();
        spec.entity = EntitySelector::Ip("1.1.1.1".to_string());
        spec.search_text = "soft".to_string();
        let summary = filter_summary(&spec);
        assert!(summary.contains("entity: 1.1.1.1"));
        assert!(summary.contains("search: \"soft\""));
        assert!(!summary.contains("start is after end"));
    }

    #[test]
    fn test_filter_summary_flags_inverted_range() {
        let mut spec = spec();
        std::mem::swap(&mut spec.start_date, &mut spec.end_date);
        assert!(filter_summary(&spec).ends_with("start is after end"));
    }
}
