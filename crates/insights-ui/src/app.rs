//! Main application state and TUI event loop for Visitor Insights.
//!
//! [`App`] owns the theme, the [`Dashboard`], the user's current filter
//! request, the last rendered view and the details loaded for it. Key
//! handling is split from the terminal loop so it can be driven directly in
//! tests.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span, Text},
    widgets::{Paragraph, Tabs},
    Frame, Terminal,
};

use insights_core::error::ErrorKind;
use insights_core::models::EntitySummary;
use insights_data::analysis::DashboardView;
use insights_data::filter::FilterRequest;
use insights_runtime::dashboard::Dashboard;

use crate::chart_view;
use crate::components::header::Header;
use crate::components::indicators::SummaryIndicator;
use crate::session_view::{self, SessionDetail};
use crate::table_view;
use crate::themes::Theme;

// ── Tab ───────────────────────────────────────────────────────────────────────

/// Which dashboard section is shown below the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Entities,
    Sessions,
    Charts,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Entities, Tab::Sessions, Tab::Charts];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Entities => "Entities",
            Tab::Sessions => "Sessions",
            Tab::Charts => "Charts",
        }
    }

    fn index(self) -> usize {
        match self {
            Tab::Entities => 0,
            Tab::Sessions => 1,
            Tab::Charts => 2,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

// ── Action ────────────────────────────────────────────────────────────────────

/// What the event loop must do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Local state changed (or nothing did); just redraw.
    None,
    /// The filter request changed; render the dashboard again.
    Refresh,
    /// Invalidate the log cache and render from disk.
    Reload,
    /// The selection or the opened sessions changed; reload details.
    Details,
    Quit,
}

// ── App ───────────────────────────────────────────────────────────────────────

/// Root application state for the Visitor Insights TUI.
pub struct App {
    pub theme: Theme,
    dashboard: Dashboard,
    /// The filter as the user has set it; unset fields mean "everything".
    pub request: FilterRequest,
    /// Last successful render, kept on screen when a later one fails.
    pub view: Option<DashboardView>,
    /// Message from the most recent failed render.
    pub error: Option<String>,
    pub tab: Tab,
    pub selected_entity: usize,
    pub selected_session: usize,
    /// Session ids whose panels are open.
    pub expanded: HashSet<String>,
    /// Detail of every open session under the current request.
    pub session_details: BTreeMap<String, SessionDetail>,
    /// Detail of the selected entity under the current request.
    pub entity_detail: Option<EntitySummary>,
    /// `true` while keystrokes edit the search text.
    pub search_mode: bool,
    /// IPs available to the entity selector, in log order.
    pub entity_ips: Vec<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(theme_name: &str, dashboard: Dashboard, request: FilterRequest) -> Self {
        Self {
            theme: Theme::from_name(theme_name),
            dashboard,
            request,
            view: None,
            error: None,
            tab: Tab::default(),
            selected_entity: 0,
            selected_session: 0,
            expanded: HashSet::new(),
            session_details: BTreeMap::new(),
            entity_detail: None,
            search_mode: false,
            entity_ips: Vec::new(),
            should_quit: false,
        }
    }

    // ── Event loop ────────────────────────────────────────────────────────────

    /// Run the interactive dashboard until `q`, `Q` or `Ctrl+C`.
    ///
    /// Uses `crossterm::event::poll` with a 250 ms timeout; every key press
    /// that changes the filter re-renders through the dashboard.
    pub async fn run(mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.refresh().await;

        let tick_rate = Duration::from_millis(250);

        let result = loop {
            terminal.draw(|frame| self.render(frame))?;

            if event::poll(tick_rate)? {
                if let Event::Key(key) = event::read()? {
                    match self.handle_key(key) {
                        Action::Quit => break Ok(()),
                        Action::Refresh => self.refresh().await,
                        Action::Reload => self.reload().await,
                        Action::Details => self.load_details().await,
                        Action::None => {}
                    }
                }
            }

            if self.should_quit {
                break Ok(());
            }
        };

        // Restore terminal state unconditionally.
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    /// Render the current request, keeping the previous view on failure.
    pub async fn refresh(&mut self) {
        let result = self.dashboard.render(&self.request).await;
        if self.apply_result(result) {
            self.load_details().await;
        }
    }

    /// Drop the cached log and render from disk.
    pub async fn reload(&mut self) {
        let result = self.dashboard.reload(&self.request).await;
        if self.apply_result(result) {
            self.load_details().await;
        }
    }

    /// Look up every open session and the selected entity under the
    /// current request.
    ///
    /// An open session the filter excludes stays open and is marked
    /// [`SessionDetail::Missing`].
    pub async fn load_details(&mut self) {
        let mut details = BTreeMap::new();
        for id in &self.expanded {
            let detail = match self.dashboard.session_detail(id, &self.request).await {
                Ok(session) => SessionDetail::Loaded(session),
                Err(e) if e.kind() == ErrorKind::NotFound => SessionDetail::Missing,
                Err(e) => {
                    tracing::warn!(session = %id, error = %e, "session detail failed");
                    SessionDetail::Failed(e.to_string())
                }
            };
            details.insert(id.clone(), detail);
        }
        self.session_details = details;

        let selected_ip = self
            .view
            .as_ref()
            .and_then(|v| v.entities.get(self.selected_entity))
            .map(|e| e.ip.clone());
        self.entity_detail = match selected_ip {
            Some(ip) => match self.dashboard.entity_detail(&ip, &self.request).await {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::debug!(ip = %ip, error = %e, "entity detail unavailable");
                    None
                }
            },
            None => None,
        };
    }

    /// Returns `true` when a new view was stored.
    fn apply_result(&mut self, result: insights_core::error::Result<DashboardView>) -> bool {
        match result {
            Ok(view) => {
                self.error = None;
                self.entity_ips = self
                    .dashboard
                    .store()
                    .map(|store| store.distinct_ips())
                    .unwrap_or_default();
                self.selected_entity = clamp(self.selected_entity, view.entities.len());
                self.selected_session = clamp(self.selected_session, view.sessions.len());
                self.view = Some(view);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "dashboard render failed");
                self.error = Some(e.to_string());
                false
            }
        }
    }

    // ── Key handling ──────────────────────────────────────────────────────────

    /// Update state for one key press and report what the loop must do next.
    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Action::Quit;
        }
        if self.search_mode {
            return self.handle_search_key(key);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
                Action::Quit
            }
            KeyCode::Tab => {
                self.tab = self.tab.next();
                Action::None
            }
            KeyCode::BackTab => {
                self.tab = self.tab.previous();
                Action::None
            }
            KeyCode::Char('/') => {
                self.search_mode = true;
                Action::None
            }
            KeyCode::Char('e') => self.cycle_entity(true),
            KeyCode::Char('E') => self.cycle_entity(false),
            KeyCode::Char('[') => self.shift_start(-1),
            KeyCode::Char(']') => self.shift_start(1),
            KeyCode::Char('{') => self.shift_end(-1),
            KeyCode::Char('}') => self.shift_end(1),
            KeyCode::Char('x') => {
                if self.request.is_default() {
                    return Action::None;
                }
                self.request = FilterRequest::default();
                Action::Refresh
            }
            KeyCode::Char('r') => Action::Reload,
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected_session(),
            KeyCode::Char('c') => {
                self.expanded.clear();
                self.session_details.clear();
                Action::None
            }
            _ => Action::None,
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                self.search_mode = false;
                Action::None
            }
            KeyCode::Backspace => {
                let mut text = self.request.search.take().unwrap_or_default();
                if text.pop().is_none() {
                    return Action::None;
                }
                self.request.search = (!text.is_empty()).then_some(text);
                Action::Refresh
            }
            KeyCode::Char(c) => {
                self.request.search.get_or_insert_with(String::new).push(c);
                Action::Refresh
            }
            _ => Action::None,
        }
    }

    /// Step the entity selector through `All` followed by every IP.
    fn cycle_entity(&mut self, forward: bool) -> Action {
        if self.entity_ips.is_empty() {
            return Action::None;
        }
        // Position 0 is "All".
        let slots = self.entity_ips.len() + 1;
        let current = self
            .request
            .ip
            .as_ref()
            .and_then(|ip| self.entity_ips.iter().position(|known| known == ip))
            .map_or(0, |i| i + 1);
        let next = if forward {
            (current + 1) % slots
        } else {
            (current + slots - 1) % slots
        };
        self.request.ip = match next {
            0 => None,
            i => Some(self.entity_ips[i - 1].clone()),
        };
        self.selected_entity = 0;
        self.selected_session = 0;
        Action::Refresh
    }

    fn shift_start(&mut self, days: i64) -> Action {
        let Some(current) = self.request.start_date.or_else(|| self.resolved_bounds().map(|b| b.0))
        else {
            return Action::None;
        };
        match shift_date(current, days) {
            Some(date) => {
                self.request.start_date = Some(date);
                Action::Refresh
            }
            None => Action::None,
        }
    }

    fn shift_end(&mut self, days: i64) -> Action {
        let Some(current) = self.request.end_date.or_else(|| self.resolved_bounds().map(|b| b.1))
        else {
            return Action::None;
        };
        match shift_date(current, days) {
            Some(date) => {
                self.request.end_date = Some(date);
                Action::Refresh
            }
            None => Action::None,
        }
    }

    /// Date bounds of the filter the current view was built with.
    fn resolved_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.view
            .as_ref()
            .map(|v| (v.metadata.filter.start_date, v.metadata.filter.end_date))
    }

    fn move_selection(&mut self, delta: isize) -> Action {
        let Some(view) = &self.view else {
            return Action::None;
        };
        let (selected, len) = match self.tab {
            Tab::Entities => (&mut self.selected_entity, view.entities.len()),
            Tab::Sessions => (&mut self.selected_session, view.sessions.len()),
            Tab::Charts => return Action::None,
        };
        if len == 0 {
            return Action::None;
        }
        let before = *selected;
        *selected = selected.saturating_add_signed(delta).min(len - 1);
        if self.tab == Tab::Entities && *selected != before {
            Action::Details
        } else {
            Action::None
        }
    }

    fn toggle_selected_session(&mut self) -> Action {
        if self.tab != Tab::Sessions {
            return Action::None;
        }
        let Some(id) = self
            .view
            .as_ref()
            .and_then(|v| v.sessions.get(self.selected_session))
            .map(|s| s.session_id.clone())
        else {
            return Action::None;
        };
        if self.expanded.remove(&id) {
            self.session_details.remove(&id);
            Action::None
        } else {
            self.expanded.insert(id);
            Action::Details
        }
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    /// Render the current application state into `frame`.
    pub fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // header
                Constraint::Length(1), // summary
                Constraint::Length(1), // tabs
                Constraint::Min(0),    // content
                Constraint::Length(1), // footer
            ])
            .split(frame.area());

        let source = self.dashboard.source().display().to_string();
        let filter = self.view.as_ref().map(|v| &v.metadata.filter);
        let header = Header::new(&source, self.dashboard.timezone(), filter, &self.theme);
        frame.render_widget(Paragraph::new(Text::from(header.to_lines())), chunks[0]);

        if let Some(view) = &self.view {
            let summary = SummaryIndicator::new(&view.metadata, &self.theme).to_line();
            frame.render_widget(Paragraph::new(summary), chunks[1]);
        }

        let titles: Vec<Line> = Tab::ALL
            .iter()
            .map(|t| Line::styled(t.title(), self.theme.tab_style(*t == self.tab)))
            .collect();
        let tabs = Tabs::new(titles)
            .select(self.tab.index())
            .highlight_style(self.theme.tab_active)
            .divider(" | ");
        frame.render_widget(tabs, chunks[2]);

        self.render_content(frame, chunks[3]);
        frame.render_widget(Paragraph::new(self.footer_line()), chunks[4]);
    }

    fn render_content(&self, frame: &mut Frame, area: Rect) {
        let view = match (&self.view, &self.error) {
            (Some(view), _) => view,
            (None, Some(message)) => {
                table_view::render_error(frame, area, message, &self.theme);
                return;
            }
            (None, None) => {
                table_view::render_no_data(frame, area, &self.theme);
                return;
            }
        };

        if view.is_empty() {
            table_view::render_no_data(frame, area, &self.theme);
            return;
        }

        match self.tab {
            Tab::Entities => {
                let (table_area, detail_area) = match &self.entity_detail {
                    Some(_) => {
                        let split = Layout::default()
                            .direction(Direction::Vertical)
                            .constraints([Constraint::Min(0), Constraint::Length(3)])
                            .split(area);
                        (split[0], Some(split[1]))
                    }
                    None => (area, None),
                };
                table_view::render_entity_table(
                    frame,
                    table_area,
                    &view.entities,
                    Some(self.selected_entity),
                    &self.theme,
                );
                if let (Some(entity), Some(detail_area)) = (&self.entity_detail, detail_area) {
                    table_view::render_entity_detail(frame, detail_area, entity, &self.theme);
                }
            }
            Tab::Sessions => session_view::render_sessions(
                frame,
                area,
                &view.sessions,
                Some(self.selected_session),
                &self.session_details,
                &self.theme,
            ),
            Tab::Charts => chart_view::render_charts(frame, area, view, &self.theme),
        }
    }

    fn footer_line(&self) -> Line<'_> {
        if self.search_mode {
            let text = self.request.search.as_deref().unwrap_or("");
            return Line::from(vec![
                Span::styled("Search: ", self.theme.label),
                Span::styled(format!("{text}█"), self.theme.search_input),
                Span::styled("  (Enter/Esc to finish)", self.theme.dim),
            ]);
        }
        if let (Some(message), Some(_)) = (&self.error, &self.view) {
            return Line::from(Span::styled(
                format!("Reload failed: {message}"),
                self.theme.error,
            ));
        }
        Line::from(Span::styled(
            "q quit · Tab switch · / search · e/E visitor · [ ] start · { } end · x reset · c collapse · r reload",
            self.theme.dim,
        ))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn shift_date(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let step = Days::new(days.unsigned_abs());
    if days < 0 {
        date.checked_sub_days(step)
    } else {
        date.checked_add_days(step)
    }
}

fn clamp(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
