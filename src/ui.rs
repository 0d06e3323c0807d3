use anyhow::Result;
use chrono::{DateTime, Days, Local, Months, NaiveDate, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame, Terminal,
};
use rand::rngs::StdRng;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use roll_call::{
    day_range, default_export_name, AttendanceRecord, AttendanceStatus, Config, Session,
    SessionEvent, SessionState, Severity,
};

/// How long the event loop waits for a key before ticking the session.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a notification stays in the status line.
const TOAST_TTL: Duration = Duration::from_secs(4);

/// Date window of the recent-records panel, cycled with `r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecentRange {
    All,
    Today,
    Week,
    Month,
}

impl RecentRange {
    pub fn next(&self) -> Self {
        match self {
            RecentRange::All => RecentRange::Today,
            RecentRange::Today => RecentRange::Week,
            RecentRange::Week => RecentRange::Month,
            RecentRange::Month => RecentRange::All,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            RecentRange::All => "All",
            RecentRange::Today => "Today",
            RecentRange::Week => "Last 7 days",
            RecentRange::Month => "Last month",
        }
    }

    pub fn bounds(&self, today: NaiveDate) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let from = match self {
            RecentRange::All => return (None, None),
            RecentRange::Today => today,
            RecentRange::Week => today.checked_sub_days(Days::new(6)).unwrap_or(today),
            RecentRange::Month => today.checked_sub_months(Months::new(1)).unwrap_or(today),
        };
        let (start, end) = day_range(from, today);
        (Some(start), Some(end))
    }
}

pub struct Toast {
    pub message: String,
    pub severity: Severity,
    pub shown_at: Instant,
}

pub struct App {
    pub session: Session<StdRng>,
    pub config: Config,
    pub recent: Vec<AttendanceRecord>,
    pub last_outcome: Option<AttendanceRecord>,
    pub toast: Option<Toast>,
    pub confirm_clear: bool,
    pub recent_range: RecentRange,
    /// Path being typed at the import prompt
    pub import_input: Option<String>,
}

impl App {
    pub fn new(session: Session<StdRng>, config: Config) -> Self {
        let mut app = Self {
            session,
            config,
            recent: Vec::new(),
            last_outcome: None,
            toast: None,
            confirm_clear: false,
            recent_range: RecentRange::All,
            import_input: None,
        };
        app.refresh_recent();
        app.process_events(Instant::now());
        app
    }

    pub fn refresh_recent(&mut self) {
        let (start, end) = self.recent_range.bounds(Local::now().date_naive());
        self.recent = self
            .session
            .recent_records(start, end, self.config.recent_records_limit);
    }

    /// Fold queued session events into what the screen shows.
    pub fn process_events(&mut self, now: Instant) {
        for event in self.session.drain_events() {
            match event {
                SessionEvent::Notification { message, severity } => {
                    self.toast = Some(Toast {
                        message,
                        severity,
                        shown_at: now,
                    });
                }
                SessionEvent::OutcomeRecorded { record } => {
                    self.last_outcome = Some(record);
                    self.refresh_recent();
                }
                SessionEvent::StudentSelected { .. } => {}
                SessionEvent::StatsUpdated { .. } => {}
            }
        }

        if let Some(toast) = &self.toast {
            if now.duration_since(toast.shown_at) >= TOAST_TTL {
                self.toast = None;
            }
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.session.tick(now);
        self.process_events(now);
    }

    /// Returns false when the app should quit.
    pub fn handle_key(&mut self, code: KeyCode, now: Instant) -> bool {
        if self.import_input.is_some() {
            self.handle_import_key(code);
            self.process_events(now);
            return true;
        }

        if self.confirm_clear {
            self.confirm_clear = false;
            if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                self.session.clear_all();
                self.last_outcome = None;
                self.refresh_recent();
            } else {
                self.toast = Some(Toast {
                    message: "Clear cancelled".to_string(),
                    severity: Severity::Info,
                    shown_at: now,
                });
            }
            self.process_events(now);
            return true;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char(' ') | KeyCode::Enter => {
                self.session.start_roll(now);
            }
            KeyCode::Char('p') => self.mark(AttendanceStatus::Present),
            KeyCode::Char('l') => self.mark(AttendanceStatus::Late),
            KeyCode::Char('a') => self.mark(AttendanceStatus::Absent),
            KeyCode::Right | KeyCode::Char('n') => {
                self.session.go_next(now);
            }
            KeyCode::Left | KeyCode::Char('b') => {
                self.session.go_previous();
            }
            KeyCode::Char('t') => {
                self.session.toggle_auto_roll(now);
            }
            KeyCode::Char('e') => self.export_last_month(),
            KeyCode::Char('c') => self.confirm_clear = true,
            KeyCode::Char('i') => self.import_input = Some(String::new()),
            KeyCode::Char('r') => {
                self.recent_range = self.recent_range.next();
                self.refresh_recent();
            }
            _ => {}
        }

        self.process_events(now);
        true
    }

    fn handle_import_key(&mut self, code: KeyCode) {
        let Some(input) = self.import_input.as_mut() else {
            return;
        };

        match code {
            KeyCode::Char(c) => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Esc => self.import_input = None,
            KeyCode::Enter => {
                let path = input.trim().to_string();
                self.import_input = None;
                if self.session.import_roster_file(Path::new(&path)).is_ok() {
                    self.last_outcome = None;
                }
            }
            _ => {}
        }
    }

    fn mark(&mut self, status: AttendanceStatus) {
        self.session.mark_attendance(status);
    }

    fn export_last_month(&mut self) {
        let today = Local::now().date_naive();
        let from = today.checked_sub_months(Months::new(1)).unwrap_or(today);
        let (start, end) = day_range(from, today);
        let path = self.config.export_dir.join(default_export_name(today));
        self.session.export_range(Some(start), Some(end), &path);
    }

    /// Outcome badge for the student on the name plate, if one was just recorded.
    pub fn current_badge(&self) -> Option<AttendanceStatus> {
        let current = self.session.current()?;
        self.last_outcome
            .as_ref()
            .filter(|record| record.student_id == current.student.id)
            .filter(|_| !self.session.awaiting_outcome())
            .map(|record| record.status)
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "ui loop failed");
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !app.handle_key(key.code, Instant::now()) {
                    return Ok(());
                }
            }
        }

        app.on_tick(Instant::now());
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with stats
            Constraint::Length(7), // Name plate
            Constraint::Min(0),    // Recent records
            Constraint::Length(3), // Controls / status
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_name_plate(f, chunks[1], app);
    render_recent(f, chunks[2], app);
    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let stats = app.session.stats();

    let spans = vec![
        Span::styled(
            "Roll Call",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Students: {}", stats.student_count),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Rolls: {}", stats.total_rolls),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("✅ {}%", stats.attendance_rate),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  "),
        Span::styled(
            format!("⏰ {}%", stats.late_rate),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw("  "),
        Span::styled(
            format!("❌ {}%", stats.absent_rate),
            Style::default().fg(Color::Red),
        ),
    ];

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_name_plate(f: &mut Frame, area: Rect, app: &App) {
    let state = app.session.state();

    let name_line = match (state, app.session.current()) {
        (SessionState::Rolling { .. }, _) => Line::from(Span::styled(
            "Selecting...",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )),
        (_, Some(entry)) => Line::from(Span::styled(
            entry.student.name.clone(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        (_, None) if app.session.students().is_empty() => Line::from(Span::styled(
            "Press i to import a roster",
            Style::default().fg(Color::DarkGray),
        )),
        (_, None) => Line::from(Span::styled(
            "Press space to roll",
            Style::default().fg(Color::DarkGray),
        )),
    };

    let detail_line = match app.current_badge() {
        Some(status) => Line::from(Span::styled(
            status.badge(),
            Style::default().fg(status_color(status)),
        )),
        None if app.session.awaiting_outcome() => Line::from(Span::styled(
            "p present  l late  a absent",
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(""),
    };

    let position = app
        .session
        .history()
        .cursor()
        .map(|i| format!(" {}/{} ", i + 1, app.session.history().len()))
        .unwrap_or_default();

    let mut title = String::from(" Selected ");
    if matches!(state, SessionState::AutoRolling { .. }) {
        title.push_str("(auto) ");
    }

    let plate = Paragraph::new(vec![Line::from(""), name_line, Line::from(""), detail_line])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(title)
                .title(
                    ratatui::widgets::block::Title::from(position)
                        .alignment(Alignment::Right),
                ),
        );

    f.render_widget(plate, area);
}

fn render_recent(f: &mut Frame, area: Rect, app: &App) {
    let header_cells = ["Time", "Name", "Status"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.recent.iter().map(|record| {
        let cells = vec![
            Cell::from(
                record
                    .timestamp
                    .with_timezone(&Local)
                    .format("%m-%d %H:%M")
                    .to_string(),
            ),
            Cell::from(truncate(&record.student_name, 30)),
            Cell::from(record.status.badge())
                .style(Style::default().fg(status_color(record.status))),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(13),
            Constraint::Length(32),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Recent Records ({}) ", app.recent_range.title())),
    );

    f.render_widget(table, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let line = if let Some(input) = &app.import_input {
        Line::from(vec![
            Span::styled(" Import roster (.csv/.txt): ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{}_", input)),
            Span::styled("  Enter", Style::default().fg(Color::Yellow)),
            Span::raw(" load, "),
            Span::styled("Esc", Style::default().fg(Color::Yellow)),
            Span::raw(" cancel"),
        ])
    } else if app.confirm_clear {
        Line::from(vec![
            Span::styled(
                " Clear ALL records and counters? ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::styled("y", Style::default().fg(Color::Yellow)),
            Span::raw(" confirm, any other key cancels"),
        ])
    } else if let Some(toast) = &app.toast {
        Line::from(Span::styled(
            format!(" {}", toast.message),
            Style::default().fg(severity_color(toast.severity)),
        ))
    } else {
        controls_line(app)
    };

    let status_bar = Paragraph::new(vec![line]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn controls_line(app: &App) -> Line<'static> {
    let controls = app.session.controls();
    let auto_label = if controls.auto_rolling { " Stop auto" } else { " Auto" };

    let keys = [
        ("space", " Roll", controls.start_roll),
        ("p/l/a", " Mark", controls.mark),
        ("←", " Prev", controls.previous),
        ("→", " Next", controls.next),
        ("t", auto_label, controls.auto_roll),
        ("r", " Range", true),
        ("i", " Import", true),
        ("e", " Export", true),
        ("c", " Clear", true),
    ];

    let mut spans = vec![Span::raw(" ")];
    for (key, label, enabled) in keys {
        let (key_style, label_style) = if enabled {
            (Style::default().fg(Color::Yellow), Style::default())
        } else {
            (
                Style::default().fg(Color::DarkGray),
                Style::default().fg(Color::DarkGray),
            )
        };
        spans.push(Span::styled(key, key_style));
        spans.push(Span::styled(label, label_style));
        spans.push(Span::raw(" | "));
    }
    spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    spans.push(Span::raw(" Quit"));

    Line::from(spans)
}

fn status_color(status: AttendanceStatus) -> Color {
    match status {
        AttendanceStatus::Present => Color::Green,
        AttendanceStatus::Late => Color::Yellow,
        AttendanceStatus::Absent => Color::Red,
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Info => Color::Cyan,
        Severity::Success => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use roll_call::{MemoryEventLog, MemoryRosterStore, SessionSettings, Student};

    fn test_app() -> App {
        let students = vec![Student::new("Alice"), Student::new("Bob")];
        let settings = SessionSettings {
            reveal_delay: Duration::ZERO,
            ..SessionSettings::default()
        };
        let session = Session::new(
            Box::new(MemoryRosterStore::with_students(students)),
            Box::new(MemoryEventLog::new()),
            StdRng::seed_from_u64(7),
            settings,
        );
        App::new(session, Config::default())
    }

    #[test]
    fn test_roll_then_mark_updates_recent() {
        let mut app = test_app();
        let now = Instant::now();

        assert!(app.handle_key(KeyCode::Char(' '), now));
        assert!(app.session.current().is_some());
        assert!(app.session.awaiting_outcome());

        app.handle_key(KeyCode::Char('l'), now);
        assert_eq!(app.recent.len(), 1);
        assert_eq!(app.recent[0].status, AttendanceStatus::Late);
        assert_eq!(app.current_badge(), Some(AttendanceStatus::Late));
        assert_eq!(app.toast.as_ref().map(|t| t.severity), Some(Severity::Success));
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let mut app = test_app();
        let now = Instant::now();

        app.handle_key(KeyCode::Char(' '), now);
        app.handle_key(KeyCode::Char('p'), now);
        assert_eq!(app.recent.len(), 1);

        app.handle_key(KeyCode::Char('c'), now);
        assert!(app.confirm_clear);
        app.handle_key(KeyCode::Char('n'), now);
        assert!(!app.confirm_clear);
        assert_eq!(app.recent.len(), 1);

        app.handle_key(KeyCode::Char('c'), now);
        app.handle_key(KeyCode::Char('y'), now);
        assert!(app.recent.is_empty());
        assert_eq!(app.session.stats().total_rolls, 0);
    }

    #[test]
    fn test_toast_expires() {
        let mut app = test_app();
        let now = Instant::now();

        app.handle_key(KeyCode::Char(' '), now);
        assert!(app.toast.is_some());

        app.on_tick(now + TOAST_TTL);
        assert!(app.toast.is_none());
    }

    fn type_text(app: &mut App, text: &str, now: Instant) {
        for c in text.chars() {
            app.handle_key(KeyCode::Char(c), now);
        }
    }

    #[test]
    fn test_import_prompt_loads_roster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class.txt");
        std::fs::write(&path, "Xena\nYara\nZed\n").unwrap();

        let mut app = test_app();
        let now = Instant::now();

        app.handle_key(KeyCode::Char('i'), now);
        assert_eq!(app.import_input.as_deref(), Some(""));

        // keys go to the prompt, not the roll controls
        type_text(&mut app, &path.display().to_string(), now);
        assert!(app.session.current().is_none());

        app.handle_key(KeyCode::Enter, now);
        assert!(app.import_input.is_none());
        let names: Vec<&str> = app.session.students().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Xena", "Yara", "Zed"]);
    }

    #[test]
    fn test_import_prompt_rejects_bad_file_and_cancels() {
        let mut app = test_app();
        let now = Instant::now();

        app.handle_key(KeyCode::Char('i'), now);
        type_text(&mut app, "roster.xlsx", now);
        app.handle_key(KeyCode::Enter, now);
        assert_eq!(app.session.students().len(), 2);
        assert_eq!(app.toast.as_ref().map(|t| t.severity), Some(Severity::Error));

        app.handle_key(KeyCode::Char('i'), now);
        type_text(&mut app, "abc", now);
        app.handle_key(KeyCode::Backspace, now);
        assert_eq!(app.import_input.as_deref(), Some("ab"));
        assert!(app.handle_key(KeyCode::Esc, now));
        assert!(app.import_input.is_none());
    }

    #[test]
    fn test_recent_range_cycles_and_filters() {
        let mut app = test_app();
        let now = Instant::now();

        app.handle_key(KeyCode::Char(' '), now);
        app.handle_key(KeyCode::Char('a'), now);

        for expected in [
            RecentRange::Today,
            RecentRange::Week,
            RecentRange::Month,
            RecentRange::All,
        ] {
            app.handle_key(KeyCode::Char('r'), now);
            assert_eq!(app.recent_range, expected);
            assert_eq!(app.recent.len(), 1);
        }
    }

    #[test]
    fn test_recent_range_bounds() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();

        assert_eq!(RecentRange::All.bounds(today), (None, None));

        let (start, end) = RecentRange::Week.bounds(today);
        let (week_start, _) = day_range(NaiveDate::from_ymd_opt(2026, 3, 25).unwrap(), today);
        assert_eq!(start, Some(week_start));
        assert!(end > start);

        let (start, _) = RecentRange::Month.bounds(today);
        let (month_start, _) = day_range(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(), today);
        assert_eq!(start, Some(month_start));
    }

    #[test]
    fn test_quit_keys() {
        let mut app = test_app();
        assert!(!app.handle_key(KeyCode::Char('q'), Instant::now()));
        assert!(!app.handle_key(KeyCode::Esc, Instant::now()));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("Zoë", 10), "Zoë");
        assert_eq!(truncate("Élodie Marchand-Dupont", 10), "Élodie ...");
    }
}
