//! Entity summary table for the Visitor Insights TUI.
//!
//! Renders a bordered [`ratatui::widgets::Table`] with one row per visiting
//! entity, most recent visitor first, plus the shared empty/error panels.

use ratatui::{
    layout::{Constraint, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use insights_core::formatting::{self, format_count};
use insights_core::models::EntitySummary;

use crate::components::indicators::EngagementIndicator;
use crate::themes::Theme;

/// Shown in place of any view whose filter matched nothing.
pub const EMPTY_MESSAGE: &str = "No visits match the current filter";

const HEADERS: [&str; 8] = [
    "Company",
    "IP",
    "Sessions",
    "Pages",
    "Last Visit",
    "State",
    "Vertical",
    "Engagement",
];

/// Render the entity table into `area`, highlighting `selected`.
pub fn render_entity_table(
    frame: &mut Frame,
    area: Rect,
    entities: &[EntitySummary],
    selected: Option<usize>,
    theme: &Theme,
) {
    let header = Row::new(
        HEADERS
            .iter()
            .map(|h| Cell::from(*h).style(theme.table_header)),
    )
    .height(1);

    let rows: Vec<Row> = entities
        .iter()
        .enumerate()
        .map(|(i, entity)| entity_row(entity, i, theme))
        .collect();

    let widths = [
        Constraint::Min(16),
        Constraint::Length(16),
        Constraint::Length(9),
        Constraint::Length(7),
        Constraint::Length(17),
        Constraint::Length(8),
        Constraint::Length(14),
        Constraint::Length(12),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.table_border)
                .title(format!(" Visitors ({}) ", format_count(entities.len()))),
        )
        .style(theme.text)
        .row_highlight_style(theme.table_selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(selected.filter(|&i| i < entities.len()));
    frame.render_stateful_widget(table, area, &mut state);
}

fn entity_row<'a>(entity: &'a EntitySummary, index: usize, theme: &Theme) -> Row<'a> {
    let engagement = EngagementIndicator::new(entity.engagement_score, theme);
    Row::new(vec![
        Cell::from(entity.display_company()),
        Cell::from(entity.ip.as_str()),
        Cell::from(format_count(entity.session_count)),
        Cell::from(format_count(entity.page_count)),
        Cell::from(formatting::format_timestamp(&entity.last_visit)),
        Cell::from(formatting::or_missing(entity.state.as_deref())),
        Cell::from(formatting::or_missing(entity.vertical.as_deref())),
        Cell::from(engagement.text()).style(theme.engagement_style(engagement.band())),
    ])
    .style(theme.row_style(index))
}

/// Render the enrichment strip for the selected entity.
pub fn render_entity_detail(
    frame: &mut Frame,
    area: Rect,
    entity: &EntitySummary,
    theme: &Theme,
) {
    let record = &entity.enrichment;
    let technologies = if record.technologies.is_empty() {
        formatting::MISSING.to_string()
    } else {
        record.technologies.join(", ")
    };
    let line = Line::from(vec![
        Span::styled("Industry: ", theme.label),
        Span::styled(record.industry.as_str(), theme.value),
        Span::styled("   Location: ", theme.label),
        Span::styled(record.location.as_str(), theme.value),
        Span::styled("   Employees: ", theme.label),
        Span::styled(record.employee_count.as_str(), theme.value),
        Span::styled("   Technologies: ", theme.label),
        Span::styled(technologies, theme.value),
    ]);
    frame.render_widget(
        Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.table_border)
                .title(format!(" {} · {} ", entity.display_company(), entity.ip)),
        ),
        area,
    );
}

/// Render the empty-state panel.
pub fn render_no_data(frame: &mut Frame, area: Rect, theme: &Theme) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(EMPTY_MESSAGE, theme.warning)),
        Line::from(""),
        Line::from(Span::styled(
            "Widen the date range, clear the search ('x') or pick another visitor ('e').",
            theme.dim,
        )),
        Line::from(Span::styled("Press 'q' or Ctrl+C to exit", theme.dim)),
    ];
    frame.render_widget(
        Paragraph::new(Text::from(text)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Visitor Insights "),
        ),
        area,
    );
}

/// Render an error panel for a failed load or reload.
pub fn render_error(frame: &mut Frame, area: Rect, message: &str, theme: &Theme) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("Could not load visitor log", theme.error)),
        Line::from(""),
        Line::from(Span::styled(message.to_string(), theme.text)),
        Line::from(""),
        Line::from(Span::styled("Press 'r' to retry or 'q' to exit", theme.dim)),
    ];
    frame.render_widget(
        Paragraph::new(Text::from(text))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(theme.error)
                    .title(" Error "),
            ),
        area,
    );
}

// ── Tests ──────────────────────────────────────────────────────────────────────
