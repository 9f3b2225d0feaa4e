use crate::activity::ActivityLog;
use crate::backend::HttpBackend;
use crate::cli::Cli;
use crate::model::{parse_delay, Level, PanelEvent, RunState, RunSummary};
use crate::notify::NotificationSink;
use crate::orchestrator::{self, PanelForm, RunController, UiCommand};
use crate::stats::RunStats;
use crate::status::{self, Tone};
use crate::storage::ConfigStore;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal,
};
use std::{io, time::Duration};
use tokio::sync::mpsc;

/// Presentation-side mirror of the controller, fed exclusively by
/// `PanelEvent`s. Never mutated from anywhere else.
struct UiState {
    state: RunState,
    session_user: Option<String>,
    stats: RunStats,
    progress: f64,
    last_summary: Option<RunSummary>,
    activity: ActivityLog,
    notices: NotificationSink,
    // Form values shown in the tiles.
    delay_secs: u32,
}

impl UiState {
    fn new(form: &PanelForm) -> Self {
        Self {
            state: RunState::Idle,
            session_user: None,
            stats: RunStats::default(),
            progress: 0.0,
            last_summary: None,
            activity: ActivityLog::default(),
            notices: NotificationSink::default(),
            delay_secs: parse_delay(&form.delay),
        }
    }

    fn apply(&mut self, ev: PanelEvent) {
        match ev {
            PanelEvent::StateChanged { state } => self.state = state,
            PanelEvent::Log { level, message } => self.activity.push(level, message),
            PanelEvent::Notice { level, message } => self.notices.push(level, message),
            PanelEvent::StatsReset => {
                self.stats = RunStats::default();
                self.progress = 0.0;
            }
            PanelEvent::Attempt {
                stats, progress, ..
            } => {
                self.stats = stats;
                self.progress = progress;
            }
            PanelEvent::RunCompleted { summary } => self.last_summary = Some(summary),
            PanelEvent::SessionValidated { user } => self.session_user = Some(user),
        }
    }
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Muted => Color::DarkGray,
        Tone::Accent => Color::Cyan,
        Tone::Positive => Color::Green,
        Tone::Caution => Color::Yellow,
        Tone::Danger => Color::Red,
    }
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Info => Color::Gray,
        Level::Success => Color::Green,
        Level::Warning => Color::Yellow,
        Level::Error => Color::Red,
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let store = ConfigStore::new();
    let cfg = store.load();
    let appstate_raw = crate::cli::read_appstate(&args)?;
    let form = crate::cli::build_form(&args, &cfg, appstate_raw);

    let backend = HttpBackend::new(&args.backend_url)?;
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<PanelEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let controller = RunController::new(backend.clone(), evt_tx.clone());
    let driver = tokio::spawn(orchestrator::run_driver(
        controller,
        backend,
        form.clone(),
        store,
        evt_tx,
        cmd_rx,
    ));

    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
    let backend_term = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend_term).context("creating terminal")?;

    let mut state = UiState::new(&form);
    state.activity.push(Level::Success, "System initialized");

    let loop_result = ui_loop(&mut terminal, &mut state, &cmd_tx, &mut evt_rx);

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    // The loop sends Quit on its way out; repeat it here so a terminal
    // error cannot leave the driver waiting forever.
    let _ = cmd_tx.send(UiCommand::Quit);
    let driver_result = driver.await.context("controller task failed")?;
    loop_result?;
    driver_result
}

fn ui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut UiState,
    cmd_tx: &mpsc::UnboundedSender<UiCommand>,
    evt_rx: &mut mpsc::UnboundedReceiver<PanelEvent>,
) -> Result<()> {
    loop {
        while let Ok(ev) = evt_rx.try_recv() {
            state.apply(ev);
        }

        terminal.draw(|f| draw(f, state))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        return Ok(());
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        return Ok(());
                    }
                    KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        let _ = cmd_tx.send(UiCommand::SaveConfig);
                    }
                    KeyCode::Char('v') => {
                        let _ = cmd_tx.send(UiCommand::Validate);
                    }
                    KeyCode::Char('r') => {
                        let _ = cmd_tx.send(UiCommand::Start);
                    }
                    KeyCode::Esc if state.state == RunState::Running => {
                        let _ = cmd_tx.send(UiCommand::Stop);
                    }
                    _ => {}
                }
            }
        }
    }
}

fn draw(f: &mut Frame, state: &mut UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // status
            Constraint::Length(3), // stat tiles
            Constraint::Length(3), // progress
            Constraint::Min(6),    // activity feed
            Constraint::Length(2), // notices
            Constraint::Length(1), // key hints
        ])
        .split(f.area());

    draw_status(f, chunks[0], state);
    draw_tiles(f, chunks[1], state);
    draw_progress(f, chunks[2], state);
    draw_activity(f, chunks[3], state);
    draw_notices(f, chunks[4], &mut state.notices);
    draw_footer(f, chunks[5]);
}

fn draw_status(f: &mut Frame, area: Rect, state: &UiState) {
    let view = status::project(state.state);
    let color = tone_color(view.tone);
    let mut spans = vec![
        Span::styled(view.glyph, Style::default().fg(color)),
        Span::raw(" "),
        Span::styled(
            view.label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(summary) = &state.last_summary {
        spans.push(Span::styled(
            format!(
                "   last run: {}/{} successful",
                summary.successful, summary.total
            ),
            Style::default().fg(Color::Gray),
        ));
    }
    let line = Line::from(spans);
    let widget = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" share-console "),
    );
    f.render_widget(widget, area);
}

fn tile(f: &mut Frame, area: Rect, label: &str, value: String) {
    let line = Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().add_modifier(Modifier::BOLD)),
    ]);
    let widget = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(widget, area);
}

fn draw_tiles(f: &mut Frame, area: Rect, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(area);

    let session = state
        .session_user
        .clone()
        .unwrap_or_else(|| "none".to_string());
    tile(f, cols[0], "Session", session);
    tile(f, cols[1], "Shares", state.stats.shares.to_string());
    tile(
        f,
        cols[2],
        "Success rate",
        format!("{}%", state.stats.success_rate()),
    );
    tile(f, cols[3], "Delay", format!("~{}s", state.delay_secs));
}

fn draw_progress(f: &mut Frame, area: Rect, state: &UiState) {
    let ratio = (state.progress / 100.0).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Progress "))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format!("{:.0}%", state.progress));
    f.render_widget(gauge, area);
}

fn draw_activity(f: &mut Frame, area: Rect, state: &UiState) {
    if state.activity.is_empty() {
        let placeholder = Paragraph::new(Line::from(Span::styled(
            "No activity yet",
            Style::default().fg(Color::DarkGray),
        )))
        .block(Block::default().borders(Borders::ALL).title(" Activity "));
        f.render_widget(placeholder, area);
        return;
    }
    let lines: Vec<Line> = state
        .activity
        .iter()
        .map(|entry| {
            Line::from(vec![
                Span::styled(entry.time_label(), Style::default().fg(Color::DarkGray)),
                Span::raw(" "),
                Span::styled(
                    entry.level.glyph(),
                    Style::default().fg(level_color(entry.level)),
                ),
                Span::raw(" "),
                Span::raw(entry.message.clone()),
            ])
        })
        .collect();
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Activity "));
    f.render_widget(widget, area);
}

fn draw_notices(f: &mut Frame, area: Rect, notices: &mut NotificationSink) {
    let lines: Vec<Line> = notices
        .active()
        .map(|n| {
            Line::from(Span::styled(
                format!("{} {}", n.level.glyph(), n.message),
                Style::default().fg(level_color(n.level)),
            ))
        })
        .collect();
    f.render_widget(Paragraph::new(lines), area);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let hints = Paragraph::new(Line::from(Span::styled(
        " v validate   r run   Esc stop   Ctrl+S save   q quit",
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(hints, area);
}
