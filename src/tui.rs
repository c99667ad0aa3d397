use crate::config::Config;
use crate::gh::{GhCli, PrCreator, PrForm};
use crate::repos;
use crate::scheduler::Scheduler;
use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};
use std::io;
use std::path::PathBuf;

const FIELD_LOCAL_PATH: usize = 0;
const FIELD_REPO: usize = 1;
const FIELD_FORK_USER: usize = 2;
const FIELD_FORK_BRANCH: usize = 3;
const FIELD_BASE: usize = 4;
const FIELD_TITLE: usize = 5;
const FIELD_BODY: usize = 6;
const FIELD_COUNT: usize = 7;

const FIELD_LABELS: [&str; FIELD_COUNT] = [
    "Local Git Repo Path",
    "Origin Repository",
    "Forked Username",
    "Forked Branch",
    "Origin Base Branch",
    "PR Title",
    "PR Body",
];

const FIELD_HINTS: [&str; FIELD_COUNT] = [
    "Path to your local working copy (Ctrl+R to pick)",
    "Format: organization/repository",
    "Your GitHub username",
    "Your branch containing the changes",
    "Target branch for the PR",
    "Brief description of your changes",
    "Detailed description of your changes (optional)",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Form,
    Pending,
    /// Editing the date/time buffer; `Some(id)` reschedules an
    /// existing entry, `None` schedules the current form.
    Schedule(Option<u64>),
    ConfirmCancel(u64),
    RepoPicker,
}

pub struct App<C: PrCreator> {
    pub scheduler: Scheduler<C>,
    fields: [String; FIELD_COUNT],
    focus: usize,
    pub input_mode: InputMode,
    when_buffer: String,
    pending_state: ListState,
    picker_repos: Vec<PathBuf>,
    picker_state: ListState,
    history_cycle: Option<(usize, usize)>,
    repos_root: Option<PathBuf>,
    pub status_message: Option<String>,
    pub should_quit: bool,
}

impl<C: PrCreator> App<C> {
    pub fn new(scheduler: Scheduler<C>, config: &Config, username: &str) -> Self {
        let mut fields: [String; FIELD_COUNT] = std::array::from_fn(|_| String::new());
        fields[FIELD_FORK_USER] = username.to_string();
        fields[FIELD_BASE] = config.default_base.clone();

        let missed = scheduler.missed_on_load().to_vec();
        let status_message = if missed.is_empty() {
            None
        } else {
            let ids: Vec<String> = missed.iter().map(|id| format!("#{id}")).collect();
            Some(format!(
                "Missed while not running: {} - reschedule (e) or cancel (x)",
                ids.join(", ")
            ))
        };

        let mut pending_state = ListState::default();
        if !scheduler.is_empty() {
            pending_state.select(Some(0));
        }

        Self {
            scheduler,
            fields,
            focus: 0,
            input_mode: InputMode::Form,
            when_buffer: String::new(),
            pending_state,
            picker_repos: Vec::new(),
            picker_state: ListState::default(),
            history_cycle: None,
            repos_root: config.repos_root.as_ref().map(PathBuf::from),
            status_message,
            should_quit: false,
        }
    }

    pub fn form(&self) -> PrForm {
        PrForm {
            local_path: self.fields[FIELD_LOCAL_PATH].clone(),
            repo: self.fields[FIELD_REPO].clone(),
            fork_user: self.fields[FIELD_FORK_USER].clone(),
            fork_branch: self.fields[FIELD_FORK_BRANCH].clone(),
            base: self.fields[FIELD_BASE].clone(),
            title: self.fields[FIELD_TITLE].clone(),
            body: self.fields[FIELD_BODY].clone(),
        }
    }

    /// Drains due timers and surfaces outcomes; runs every loop turn.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let reports = self.scheduler.tick(now);
        if !reports.is_empty() {
            let lines: Vec<String> = reports.iter().map(|r| r.message()).collect();
            self.status_message = Some(lines.join(" | "));
            self.clamp_pending_selection();
        }
        if let Some(warning) = self.scheduler.take_persist_warning() {
            self.status_message = Some(warning);
        }
    }

    fn selected_pending_id(&self) -> Option<u64> {
        let idx = self.pending_state.selected()?;
        self.scheduler.pending().nth(idx).map(|record| record.id)
    }

    fn clamp_pending_selection(&mut self) {
        let count = self.scheduler.pending_count();
        if count == 0 {
            self.pending_state.select(None);
        } else if self.pending_state.selected().is_none_or(|i| i >= count) {
            self.pending_state.select(Some(count - 1));
        }
    }

    fn next_pending(&mut self) {
        let count = self.scheduler.pending_count();
        if count == 0 {
            return;
        }
        let i = match self.pending_state.selected() {
            Some(i) => (i + 1) % count,
            None => 0,
        };
        self.pending_state.select(Some(i));
    }

    fn previous_pending(&mut self) {
        let count = self.scheduler.pending_count();
        if count == 0 {
            return;
        }
        let i = match self.pending_state.selected() {
            Some(0) | None => count - 1,
            Some(i) => i - 1,
        };
        self.pending_state.select(Some(i));
    }

    fn history_for(&self, field: usize) -> Option<&[String]> {
        let history = self.scheduler.history();
        match field {
            FIELD_REPO => Some(&history.repos),
            FIELD_FORK_USER => Some(&history.usernames),
            FIELD_FORK_BRANCH => Some(&history.branches),
            FIELD_TITLE => Some(&history.titles),
            _ => None,
        }
    }

    /// Ctrl+P fills the focused field from its history list; repeated
    /// presses walk further back.
    fn cycle_history(&mut self) {
        let picked = match self.history_for(self.focus) {
            Some(values) if !values.is_empty() => {
                let pos = match self.history_cycle {
                    Some((field, pos)) if field == self.focus => (pos + 1) % values.len(),
                    _ => 0,
                };
                Some((pos, values[pos].clone()))
            }
            _ => None,
        };
        match picked {
            Some((pos, value)) => {
                self.fields[self.focus] = value;
                self.history_cycle = Some((self.focus, pos));
            }
            None => self.status_message = Some("No history for this field".to_string()),
        }
    }

    fn create_now(&mut self) {
        let form = self.form();
        self.status_message = Some(match self.scheduler.create_now(&form) {
            Ok(()) => "Pull request created successfully!".to_string(),
            Err(e) => e.to_string(),
        });
    }

    fn open_schedule_popup(&mut self, target: Option<u64>) {
        // Validate the form up front for new schedules so the user is
        // not asked for a time that will be rejected anyway.
        if target.is_none() {
            if let Err(e) = self.form().validate() {
                self.status_message = Some(e.to_string());
                return;
            }
        }
        self.when_buffer = match target.and_then(|id| {
            self.scheduler
                .pending()
                .find(|record| record.id == id)
                .map(|record| record.scheduled_at)
        }) {
            Some(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            None => (Local::now() + Duration::hours(1))
                .format("%Y-%m-%d %H:%M")
                .to_string(),
        };
        self.input_mode = InputMode::Schedule(target);
    }

    fn submit_schedule(&mut self, target: Option<u64>) {
        let when = match parse_when(&self.when_buffer) {
            Ok(when) => when,
            Err(msg) => {
                // Stay in the popup so the user can fix the buffer.
                self.status_message = Some(msg);
                return;
            }
        };

        let now = Utc::now();
        let result = match target {
            Some(id) => self.scheduler.reschedule(id, when, now).map(|new_id| {
                format!("PR #{id} rescheduled as #{new_id} for {}", self.when_buffer)
            }),
            None => {
                let form = self.form();
                self.scheduler
                    .schedule(&form, when, now)
                    .map(|id| format!("PR #{id} scheduled for {}", self.when_buffer))
            }
        };

        match result {
            Ok(message) => {
                self.status_message = Some(message);
                self.input_mode = match target {
                    Some(_) => InputMode::Pending,
                    None => InputMode::Form,
                };
                self.clamp_pending_selection();
            }
            Err(e) => {
                self.status_message = Some(e.to_string());
                self.input_mode = InputMode::Form;
            }
        }
    }

    fn confirm_cancel(&mut self, id: u64) {
        if self.scheduler.cancel(id) {
            self.status_message = Some(format!("PR #{id} cancelled successfully"));
        }
        self.clamp_pending_selection();
        self.input_mode = InputMode::Pending;
    }

    fn open_repo_picker(&mut self) {
        let root = self
            .repos_root
            .clone()
            .or_else(|| std::env::current_dir().ok());
        let Some(root) = root else {
            self.status_message = Some("No repos_root configured".to_string());
            return;
        };
        self.picker_repos = repos::find_repos(&root, 3);
        if self.picker_repos.is_empty() {
            self.status_message = Some(format!("No git repos found under {}", root.display()));
            return;
        }
        self.picker_state.select(Some(0));
        self.input_mode = InputMode::RepoPicker;
    }

    pub fn handle_event(&mut self) -> Result<()> {
        if event::poll(std::time::Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    return Ok(());
                }
                self.handle_key(key.code, key.modifiers);
            }
        }
        Ok(())
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match self.input_mode {
            InputMode::Form => self.handle_form_key(code, modifiers),
            InputMode::Pending => self.handle_pending_key(code),
            InputMode::Schedule(target) => self.handle_schedule_key(code, target),
            InputMode::ConfirmCancel(id) => self.handle_confirm_key(code, id),
            InputMode::RepoPicker => self.handle_picker_key(code),
        }
    }

    fn handle_form_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if modifiers.contains(KeyModifiers::CONTROL) {
            match code {
                KeyCode::Char('c') | KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('n') => self.create_now(),
                KeyCode::Char('s') => self.open_schedule_popup(None),
                KeyCode::Char('r') => self.open_repo_picker(),
                KeyCode::Char('p') => self.cycle_history(),
                _ => {}
            }
            return;
        }

        match code {
            KeyCode::Tab | KeyCode::Down | KeyCode::Enter => {
                self.focus = (self.focus + 1) % FIELD_COUNT;
                self.history_cycle = None;
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = if self.focus == 0 {
                    FIELD_COUNT - 1
                } else {
                    self.focus - 1
                };
                self.history_cycle = None;
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Pending;
                if self.pending_state.selected().is_none() && self.scheduler.pending_count() > 0 {
                    self.pending_state.select(Some(0));
                }
            }
            KeyCode::Backspace => {
                self.fields[self.focus].pop();
                self.history_cycle = None;
            }
            KeyCode::Char(c) => {
                self.fields[self.focus].push(c);
                self.history_cycle = None;
            }
            _ => {}
        }
    }

    fn handle_pending_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.next_pending(),
            KeyCode::Char('k') | KeyCode::Up => self.previous_pending(),
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(id) = self.selected_pending_id() {
                    self.open_schedule_popup(Some(id));
                }
            }
            KeyCode::Char('x') | KeyCode::Char('c') | KeyCode::Delete => {
                if let Some(id) = self.selected_pending_id() {
                    self.input_mode = InputMode::ConfirmCancel(id);
                }
            }
            KeyCode::Esc | KeyCode::Tab => self.input_mode = InputMode::Form,
            _ => {}
        }
    }

    fn handle_schedule_key(&mut self, code: KeyCode, target: Option<u64>) {
        match code {
            KeyCode::Enter => self.submit_schedule(target),
            KeyCode::Esc => {
                self.input_mode = match target {
                    Some(_) => InputMode::Pending,
                    None => InputMode::Form,
                };
            }
            KeyCode::Backspace => {
                self.when_buffer.pop();
            }
            KeyCode::Char(c) => self.when_buffer.push(c),
            _ => {}
        }
    }

    fn handle_confirm_key(&mut self, code: KeyCode, id: u64) {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => self.confirm_cancel(id),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.input_mode = InputMode::Pending;
            }
            _ => {}
        }
    }

    fn handle_picker_key(&mut self, code: KeyCode) {
        let count = self.picker_repos.len();
        if count == 0 {
            self.input_mode = InputMode::Form;
            return;
        }
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                let i = self.picker_state.selected().map_or(0, |i| (i + 1) % count);
                self.picker_state.select(Some(i));
            }
            KeyCode::Char('k') | KeyCode::Up => {
                let i = match self.picker_state.selected() {
                    Some(0) | None => count - 1,
                    Some(i) => i - 1,
                };
                self.picker_state.select(Some(i));
            }
            KeyCode::Enter => {
                if let Some(path) = self
                    .picker_state
                    .selected()
                    .and_then(|i| self.picker_repos.get(i))
                {
                    self.fields[FIELD_LOCAL_PATH] = path.display().to_string();
                }
                self.input_mode = InputMode::Form;
            }
            KeyCode::Esc | KeyCode::Char('q') => self.input_mode = InputMode::Form,
            _ => {}
        }
    }
}

/// Parses the schedule buffer as local wall-clock time.
pub fn parse_when(buffer: &str) -> Result<DateTime<Utc>, String> {
    let naive = NaiveDateTime::parse_from_str(buffer.trim(), "%Y-%m-%d %H:%M")
        .map_err(|_| "Enter the time as YYYY-MM-DD HH:MM".to_string())?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| "Ambiguous local time, pick another minute".to_string())
}

pub fn draw<C: PrCreator>(frame: &mut Frame, app: &mut App<C>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(FIELD_COUNT as u16 + 2),
            Constraint::Min(4),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_form(frame, app, chunks[0]);
    draw_pending(frame, app, chunks[1]);
    draw_status(frame, app, chunks[2]);

    match app.input_mode {
        InputMode::Schedule(target) => draw_schedule_popup(frame, app, target),
        InputMode::ConfirmCancel(id) => draw_confirm_dialog(frame, app, id),
        InputMode::RepoPicker => draw_repo_picker(frame, app),
        _ => {}
    }
}

fn draw_form<C: PrCreator>(frame: &mut Frame, app: &App<C>, area: Rect) {
    let focused = app.input_mode == InputMode::Form;
    let lines: Vec<Line> = app
        .fields
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let marker = if focused && i == app.focus { "▶ " } else { "  " };
            let label_style = if focused && i == app.focus {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan)
            };
            let shown = if focused && i == app.focus {
                format!("{value}▏")
            } else {
                value.clone()
            };
            Line::from(vec![
                Span::raw(marker),
                Span::styled(format!("{:<22}", FIELD_LABELS[i]), label_style),
                Span::raw(shown),
            ])
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" PR Details ")
        .border_style(if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        });
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_pending<C: PrCreator>(frame: &mut Frame, app: &mut App<C>, area: Rect) {
    let focused = app.input_mode == InputMode::Pending;
    let now = Utc::now();
    let items: Vec<ListItem> = app
        .scheduler
        .pending()
        .map(|record| {
            let title: String = record.title.chars().take(40).collect();
            let time = record
                .scheduled_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M");
            let mut spans = vec![
                Span::styled(format!("#{:<4}", record.id), Style::default().fg(Color::Cyan)),
                Span::styled(
                    format!("{title:<42}"),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(time.to_string(), Style::default().fg(Color::Green)),
            ];
            if record.is_missed(now) {
                spans.push(Span::styled(
                    "  [missed]",
                    Style::default().fg(Color::Red).bold(),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = format!(" Scheduled Pull Requests ({}) ", app.scheduler.pending_count());
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(if focused {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                }),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(list, area, &mut app.pending_state);
}

fn draw_status<C: PrCreator>(frame: &mut Frame, app: &App<C>, area: Rect) {
    let text = match &app.status_message {
        Some(msg) => msg.clone(),
        None => match app.input_mode {
            InputMode::Form => format!(
                "{} | Ctrl+N: create now | Ctrl+S: schedule | Ctrl+P: history | Esc: list | Ctrl+Q: quit",
                FIELD_HINTS[app.focus]
            ),
            InputMode::Pending => {
                "j/k: navigate | e: edit time | x: cancel | Esc: form | q: quit".to_string()
            }
            InputMode::Schedule(_) => "Enter: confirm | Esc: back".to_string(),
            InputMode::ConfirmCancel(_) => "y: confirm | n: keep".to_string(),
            InputMode::RepoPicker => "j/k: navigate | Enter: select | Esc: back".to_string(),
        },
    };
    let style = if app.status_message.is_some() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let status = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(" Status "));
    frame.render_widget(status, area);
}

fn draw_schedule_popup<C: PrCreator>(frame: &mut Frame, app: &App<C>, target: Option<u64>) {
    let area = frame.area();
    let popup_area = Rect {
        x: area.width / 6,
        y: area.height / 3,
        width: area.width * 2 / 3,
        height: 3,
    };

    let title = match target {
        Some(id) => format!(" Reschedule PR #{id} (YYYY-MM-DD HH:MM) "),
        None => " Schedule for (YYYY-MM-DD HH:MM) ".to_string(),
    };
    let input = Paragraph::new(format!("{}▏", app.when_buffer)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(Style::default().fg(Color::Yellow)),
    );

    frame.render_widget(Clear, popup_area);
    frame.render_widget(input, popup_area);
}

fn draw_confirm_dialog<C: PrCreator>(frame: &mut Frame, app: &App<C>, id: u64) {
    let title = app
        .scheduler
        .pending()
        .find(|record| record.id == id)
        .map(|record| record.title.clone())
        .unwrap_or_default();

    let area = frame.area();
    let popup_area = Rect {
        x: area.width / 6,
        y: area.height / 3,
        width: area.width * 2 / 3,
        height: 7,
    };

    let text = vec![
        Line::from(""),
        Line::from(vec![
            Span::raw("  Cancel scheduled PR "),
            Span::styled(format!("#{id} \"{title}\""), Style::default().fg(Color::Cyan).bold()),
            Span::raw("?"),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  [Y]", Style::default().fg(Color::Green).bold()),
            Span::raw(" Yes    "),
            Span::styled("[N]", Style::default().fg(Color::Red).bold()),
            Span::raw(" No"),
        ]),
    ];

    let dialog = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Confirm Cancellation ")
            .style(Style::default().fg(Color::Yellow)),
    );

    frame.render_widget(Clear, popup_area);
    frame.render_widget(dialog, popup_area);
}

fn draw_repo_picker<C: PrCreator>(frame: &mut Frame, app: &mut App<C>) {
    let area = frame.area();
    let popup_area = Rect {
        x: area.width / 8,
        y: area.height / 6,
        width: area.width * 3 / 4,
        height: (area.height * 2 / 3).max(5),
    };

    let items: Vec<ListItem> = app
        .picker_repos
        .iter()
        .map(|path| ListItem::new(path.display().to_string()))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Select Local Repository ")
                .style(Style::default().fg(Color::Yellow)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_widget(Clear, popup_area);
    frame.render_stateful_widget(list, popup_area, &mut app.picker_state);
}

pub fn run(scheduler: Scheduler<GhCli>, config: &Config, username: &str) -> Result<()> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(scheduler, config, username);

    loop {
        app.tick(Utc::now());
        terminal.draw(|f| draw(f, &mut app))?;
        app.handle_event()?;

        if app.should_quit {
            break;
        }
    }

    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(())
}
