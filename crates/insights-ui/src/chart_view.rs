//! Bar charts: page views per day and pages per vertical.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
    Frame,
};

use insights_core::formatting::{format_count, format_short_date};
use insights_core::models::{CategoryCount, DailyCount};
use insights_data::analysis::DashboardView;

use crate::themes::Theme;

const DAY_BAR_WIDTH: u16 = 6;
const VERTICAL_BAR_WIDTH: u16 = 10;
const BAR_GAP: u16 = 1;

/// Render both charts stacked vertically into `area`.
pub fn render_charts(frame: &mut Frame, area: Rect, view: &DashboardView, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    render_daily_chart(frame, chunks[0], &view.daily_page_views, theme);
    render_vertical_chart(frame, chunks[1], &view.pages_by_vertical, theme);
}

fn render_daily_chart(frame: &mut Frame, area: Rect, series: &[DailyCount], theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.table_border)
        .title(" Page Views by Day ");
    if series.is_empty() {
        render_empty_chart(frame, area, block, theme);
        return;
    }

    // Keep the most recent days that fit.
    let fit = max_bars(area.width, DAY_BAR_WIDTH);
    let shown = &series[series.len().saturating_sub(fit)..];
    let bars: Vec<Bar> = shown
        .iter()
        .enumerate()
        .map(|(i, day)| {
            bar(
                format_short_date(&day.date),
                day.pages,
                if i % 2 == 0 {
                    theme.chart_bar
                } else {
                    theme.chart_bar_alt
                },
                theme,
            )
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .bar_width(DAY_BAR_WIDTH)
        .bar_gap(BAR_GAP)
        .value_style(theme.chart_value)
        .label_style(theme.chart_label);
    frame.render_widget(chart, area);
}

fn render_vertical_chart(frame: &mut Frame, area: Rect, series: &[CategoryCount], theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.table_border)
        .title(" Pages by Vertical ");
    if series.is_empty() {
        render_empty_chart(frame, area, block, theme);
        return;
    }

    let fit = max_bars(area.width, VERTICAL_BAR_WIDTH);
    let bars: Vec<Bar> = series
        .iter()
        .take(fit)
        .map(|c| bar(c.label.clone(), c.pages, theme.chart_bar, theme))
        .collect();

    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .bar_width(VERTICAL_BAR_WIDTH)
        .bar_gap(BAR_GAP)
        .value_style(theme.chart_value)
        .label_style(theme.chart_label);
    frame.render_widget(chart, area);
}

fn bar<'a>(label: String, pages: usize, style: ratatui::style::Style, theme: &Theme) -> Bar<'a> {
    Bar::default()
        .value(pages as u64)
        .text_value(format_count(pages))
        .label(Line::from(label))
        .style(style)
        .value_style(theme.chart_value)
}

fn render_empty_chart(frame: &mut Frame, area: Rect, block: Block, theme: &Theme) {
    frame.render_widget(
        Paragraph::new(Line::styled("No data", theme.dim)).block(block),
        area,
    );
}

/// Number of bars of `bar_width` that fit inside a bordered area `width` wide.
fn max_bars(width: u16, bar_width: u16) -> usize {
    let inner = width.saturating_sub(2) + BAR_GAP;
    (inner / (bar_width + BAR_GAP)).max(1) as usize
}

// ── Tests ──────────────────────────────────────────────────────────────────────
