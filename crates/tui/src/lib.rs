use std::io::{self, Stdout};
use std::path::Path;
use std::sync::Arc;

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ojol_adapters::export::{export_document, ExportOptions};
use ojol_adapters::mysql::MysqlDataBackend;
use ojol_core::config::AppConfig;
use ojol_core::console::{AdminConsole, Notice, NoticeLevel, Section};
use ojol_core::crud::{CrudError, CrudPage, PageMode};
use ojol_core::data_access::DataBackend;
use ojol_core::form::RecordForm;
use ojol_core::grid::Grid;
use ojol_core::report::ReportError;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Row, Table, Tabs, Wrap};
use ratatui::{Frame, Terminal};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tracing::{error, info, warn};

const SIDEBAR_WIDTH: u16 = 18;

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Browse,
    Dialog,
    ConfirmDelete,
    ExportPrompt,
    Notice,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormKey {
    NextField,
    PreviousField,
    NextChoice,
    PreviousChoice,
    Input(char),
    Backspace,
    Submit,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKey {
    Input(char),
    Backspace,
    Submit,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Msg {
    Quit,
    ToggleHelp,
    DismissNotice,
    SelectSection(Section),
    NextSection,
    MoveUp,
    MoveDown,
    PreviousTab,
    NextTab,
    Add,
    Edit,
    Delete,
    Refresh,
    Export,
    Form(FormKey),
    AnswerDelete(bool),
    Prompt(PromptKey),
}

struct TuiApp<'a, B: ?Sized> {
    runtime: &'a Runtime,
    backend: &'a B,
    config: Arc<AppConfig>,
    console: AdminConsole,
    notice: Option<Notice>,
    export_prompt: Option<String>,
    report_cursor: Option<usize>,
    show_help: bool,
    should_quit: bool,
    status_line: String,
}

impl<'a, B: DataBackend + ?Sized> TuiApp<'a, B> {
    fn new(runtime: &'a Runtime, backend: &'a B, config: Arc<AppConfig>) -> Self {
        Self {
            runtime,
            backend,
            config,
            console: AdminConsole::new(),
            notice: None,
            export_prompt: None,
            report_cursor: None,
            show_help: false,
            should_quit: false,
            status_line: "Loading...".to_string(),
        }
    }

    fn start(&mut self) {
        let (runtime, backend) = (self.runtime, self.backend);
        if let Err(err) = runtime.block_on(backend.ping()) {
            error!(error = %err, "database unreachable at startup");
            self.status_line = "Database unreachable".to_string();
            self.notice = Some(Notice::error(err.to_string()));
            return;
        }

        let schema_notice = match runtime.block_on(self.console.verify_schema(backend)) {
            Ok(issues) if issues.is_empty() => None,
            Ok(issues) => Some(
                issues
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Err(err) => {
                warn!(error = %err, "schema verification failed");
                None
            }
        };

        let load_notice = runtime.block_on(self.console.start(backend));
        self.notice = match (schema_notice, load_notice) {
            (None, notice) => notice,
            (Some(drift), None) => Some(Notice::error(format!(
                "The database differs from the expected schema:\n{drift}"
            ))),
            (Some(drift), Some(notice)) => Some(Notice::error(format!(
                "The database differs from the expected schema:\n{drift}\n{}",
                notice.message
            ))),
        };
        self.status_line = if self.notice.is_none() {
            "Ready".to_string()
        } else {
            "Started with problems; see the log".to_string()
        };
    }

    fn input_mode(&self) -> InputMode {
        if self.notice.is_some() {
            return InputMode::Notice;
        }
        if self.show_help {
            return InputMode::Help;
        }
        if self.export_prompt.is_some() {
            return InputMode::ExportPrompt;
        }
        match self.console.page(self.console.section()).map(CrudPage::mode) {
            Some(PageMode::Dialog { .. }) => InputMode::Dialog,
            Some(PageMode::ConfirmDelete { .. }) => InputMode::ConfirmDelete,
            _ => InputMode::Browse,
        }
    }

    fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::Quit => self.should_quit = true,
            Msg::ToggleHelp => self.show_help = !self.show_help,
            Msg::DismissNotice => self.notice = None,
            Msg::SelectSection(section) => self.navigate(section),
            Msg::NextSection => self.navigate(self.console.section().next()),
            Msg::MoveUp => self.move_cursor(false),
            Msg::MoveDown => self.move_cursor(true),
            Msg::PreviousTab | Msg::NextTab => self.switch_tab(msg == Msg::NextTab),
            Msg::Add => self.begin_add(),
            Msg::Edit => self.begin_edit(),
            Msg::Delete => self.begin_delete(),
            Msg::Refresh => self.refresh(),
            Msg::Export => self.open_export_prompt(),
            Msg::Form(key) => self.handle_form_key(key),
            Msg::AnswerDelete(confirmed) => self.answer_delete(confirmed),
            Msg::Prompt(key) => self.handle_prompt_key(key),
        }
    }

    fn navigate(&mut self, section: Section) {
        let (runtime, backend) = (self.runtime, self.backend);
        self.notice = runtime.block_on(self.console.navigate(section, backend));
        self.report_cursor = None;
        self.status_line = format!("{} section", section.title());
    }

    fn move_cursor(&mut self, down: bool) {
        if let Some(page) = self.console.active_page_mut() {
            if down {
                page.select_next();
            } else {
                page.select_previous();
            }
            return;
        }

        let rows = self
            .console
            .reports()
            .active_tab()
            .map_or(0, |tab| tab.grid().row_count());
        if rows == 0 {
            self.report_cursor = None;
            return;
        }
        self.report_cursor = Some(match (self.report_cursor, down) {
            (None, _) => 0,
            (Some(index), true) => (index + 1).min(rows - 1),
            (Some(index), false) => index.saturating_sub(1),
        });
    }

    fn switch_tab(&mut self, forward: bool) {
        if self.console.section() != Section::Report {
            return;
        }
        let reports = self.console.reports_mut();
        if forward {
            reports.next_tab();
        } else {
            reports.previous_tab();
        }
        self.report_cursor = None;
    }

    fn report_crud_error(&mut self, action: &str, err: CrudError) {
        if err.is_informational() {
            info!(action, reason = %err, "action not possible");
        } else {
            error!(action, error = %err, "action failed");
        }
        self.notice = Some(Notice::from(err));
    }

    fn report_report_error(&mut self, action: &str, err: ReportError) {
        if err.is_informational() {
            info!(action, reason = %err, "action not possible");
        } else {
            error!(action, error = %err, "action failed");
        }
        self.notice = Some(Notice::from(err));
    }

    fn begin_add(&mut self) {
        let (runtime, backend) = (self.runtime, self.backend);
        let Some(page) = self.console.active_page_mut() else {
            return;
        };
        if let Err(err) = runtime.block_on(page.begin_add(backend)) {
            self.report_crud_error("add", err);
        }
    }

    fn begin_edit(&mut self) {
        let (runtime, backend) = (self.runtime, self.backend);
        let Some(page) = self.console.active_page_mut() else {
            return;
        };
        if let Err(err) = runtime.block_on(page.begin_edit(backend)) {
            self.report_crud_error("edit", err);
        }
    }

    fn begin_delete(&mut self) {
        let Some(page) = self.console.active_page_mut() else {
            return;
        };
        if let Err(err) = page.begin_delete() {
            self.report_crud_error("delete", err);
        }
    }

    fn refresh(&mut self) {
        let (runtime, backend) = (self.runtime, self.backend);
        if let Some(page) = self.console.active_page_mut() {
            let title = page.title();
            match runtime.block_on(page.reload(backend)) {
                Ok(()) => self.status_line = format!("{title} refreshed"),
                Err(err) => self.report_crud_error("refresh", err),
            }
            return;
        }

        match runtime.block_on(self.console.reports_mut().refresh_active(backend)) {
            Ok(()) => self.status_line = "Report refreshed".to_string(),
            Err(err) => self.report_report_error("refresh", err),
        }
        self.report_cursor = None;
    }

    fn handle_form_key(&mut self, key: FormKey) {
        let (runtime, backend) = (self.runtime, self.backend);
        let Some(page) = self.console.active_page_mut() else {
            return;
        };

        match key {
            FormKey::Submit => match runtime.block_on(page.submit_dialog(backend)) {
                Ok(affected) => self.status_line = format!("Saved ({affected} row(s) affected)"),
                Err(err) => self.report_crud_error("save", err),
            },
            FormKey::Cancel => {
                page.cancel_dialog();
                self.status_line = "Cancelled".to_string();
            }
            key => {
                if let Some(form) = page.form_mut() {
                    apply_form_key(form, key);
                }
            }
        }
    }

    fn answer_delete(&mut self, confirmed: bool) {
        let (runtime, backend) = (self.runtime, self.backend);
        let Some(page) = self.console.active_page_mut() else {
            return;
        };
        match runtime.block_on(page.answer_delete(backend, confirmed)) {
            Ok(Some(affected)) => self.status_line = format!("Deleted {affected} row(s)"),
            Ok(None) => self.status_line = "Delete cancelled".to_string(),
            Err(err) => self.report_crud_error("delete", err),
        }
    }

    fn open_export_prompt(&mut self) {
        if self.console.section() != Section::Report {
            return;
        }
        let Some(tab) = self.console.reports().active_tab() else {
            return;
        };
        match tab.document() {
            Ok(_) => {
                let path = tab.default_export_path(&self.config.export_dir());
                self.export_prompt = Some(path.display().to_string());
            }
            Err(err) => self.report_report_error("export", err),
        }
    }

    fn handle_prompt_key(&mut self, key: PromptKey) {
        let Some(buffer) = self.export_prompt.as_mut() else {
            return;
        };
        match key {
            PromptKey::Input(ch) => buffer.push(ch),
            PromptKey::Backspace => {
                buffer.pop();
            }
            PromptKey::Cancel => {
                self.export_prompt = None;
                self.status_line = "Export cancelled".to_string();
            }
            PromptKey::Submit => {
                let path = self.export_prompt.take().unwrap_or_default();
                self.export_active_report(path.trim());
            }
        }
    }

    fn export_active_report(&mut self, path: &str) {
        if path.is_empty() {
            self.status_line = "Export cancelled".to_string();
            return;
        }
        let Some(tab) = self.console.reports().active_tab() else {
            return;
        };
        let document = match tab.document() {
            Ok(document) => document,
            Err(err) => {
                self.report_report_error("export", err);
                return;
            }
        };

        let options = ExportOptions::from_config(&self.config);
        match export_document(Path::new(path), &document, &options) {
            Ok(rows) => {
                self.status_line = format!("Exported {}", document.title);
                self.notice = Some(Notice::info(format!("Saved {rows} row(s) to\n{path}")));
            }
            Err(err) => {
                error!(path, error = %err, "export failed");
                self.notice = Some(Notice::error(err.to_string()));
            }
        }
    }
}

fn apply_form_key(form: &mut RecordForm, key: FormKey) {
    match key {
        FormKey::NextField => form.focus_next(),
        FormKey::PreviousField => form.focus_previous(),
        FormKey::NextChoice => form.select_next(),
        FormKey::PreviousChoice => form.select_previous(),
        FormKey::Input(ch) => {
            form.input_char(ch);
        }
        FormKey::Backspace => form.backspace(),
        FormKey::Submit | FormKey::Cancel => {}
    }
}

// Database calls block the UI for their duration.
pub fn run(config: Arc<AppConfig>) -> Result<(), TuiError> {
    let runtime = Builder::new_current_thread().enable_all().build()?;
    let backend = {
        let _guard = runtime.enter();
        MysqlDataBackend::from_config(&config.database)
    };
    info!(
        host = %config.database.host,
        port = config.database.port,
        database = %config.database.database,
        "starting console"
    );

    let mut app = TuiApp::new(&runtime, &backend, config);
    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, &mut app);
    let restore_result = restore_terminal(&mut terminal);

    if let Err(err) = runtime.block_on(backend.disconnect()) {
        warn!(error = %err, "failed to close connection pool");
    }

    if let Err(error) = run_result {
        restore_result?;
        return Err(error);
    }

    restore_result?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), TuiError> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop<B: DataBackend + ?Sized>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut TuiApp<'_, B>,
) -> Result<(), TuiError> {
    terminal.draw(|frame| render(frame, app))?;
    app.start();

    loop {
        terminal.draw(|frame| render(frame, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                if let Some(message) = map_key_event(key, app.input_mode()) {
                    app.handle(message);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn render<B: DataBackend + ?Sized>(frame: &mut Frame<'_>, app: &TuiApp<'_, B>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let database = &app.config.database;
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {} ", app.console.section().title()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::raw(format!(
            "DB: {}@{}:{}/{}",
            database.user, database.host, database.port, database.database
        )),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Ojol Admin"));
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(chunks[1]);
    render_sidebar(frame, app.console.section(), body[0]);

    match app.console.page(app.console.section()) {
        Some(page) => render_grid(frame, body[1], page.title(), page.grid(), page.selected()),
        None => render_reports(frame, app, body[1]),
    }

    let hints = match (app.input_mode(), app.console.section()) {
        (InputMode::Browse, Section::Report) => {
            "1-6/Tab: section | ←/→: report | ↑/↓: row | r: refresh | x: export | ?: help | q: quit"
        }
        (InputMode::Browse, _) => {
            "1-6/Tab: section | ↑/↓: row | a: add | e: edit | d: delete | r: refresh | ?: help | q: quit"
        }
        (InputMode::Dialog, _) => {
            "Tab/↑/↓: field | ←/→: choice | Enter: save | Esc: cancel"
        }
        (InputMode::ConfirmDelete, _) => "y: delete | n/Esc: keep",
        (InputMode::ExportPrompt, _) => "Enter: export (.pdf .html .csv .json) | Esc: cancel",
        (InputMode::Notice | InputMode::Help, _) => "Any key: close",
    };
    let footer = Paragraph::new(vec![
        Line::from(hints),
        Line::from(format!("Status: {}", app.status_line)),
    ])
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    frame.render_widget(footer, chunks[2]);

    if let Some(page) = app.console.page(app.console.section()) {
        match page.mode() {
            PageMode::Dialog { form, .. } => render_form_popup(frame, form),
            PageMode::ConfirmDelete { key } => render_confirm_popup(frame, &key.to_string()),
            PageMode::Idle => {}
        }
    }
    if let Some(path) = &app.export_prompt {
        render_export_prompt(frame, path);
    }
    if app.show_help {
        render_help_popup(frame);
    }
    if let Some(notice) = &app.notice {
        render_notice_popup(frame, notice);
    }
}

fn render_sidebar(frame: &mut Frame<'_>, active: Section, area: Rect) {
    let items = Section::ALL
        .iter()
        .map(|section| {
            let style = if *section == active {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} {}", section.index() + 1, section.title())).style(style)
        })
        .collect::<Vec<_>>();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Menu"));
    frame.render_widget(list, area);
}

fn render_reports<B: DataBackend + ?Sized>(frame: &mut Frame<'_>, app: &TuiApp<'_, B>, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(4)])
        .split(area);

    let reports = app.console.reports();
    let titles = reports
        .tabs()
        .iter()
        .map(|tab| tab.title())
        .collect::<Vec<_>>();
    let tabs = Tabs::new(titles)
        .select(reports.active())
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title("Reports"));
    frame.render_widget(tabs, chunks[0]);

    if let Some(tab) = reports.active_tab() {
        render_grid(frame, chunks[1], tab.title(), tab.grid(), app.report_cursor);
    }
}

fn render_grid(
    frame: &mut Frame<'_>,
    area: Rect,
    title: &str,
    grid: &Grid,
    selected: Option<usize>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("{title} ({} rows)", grid.row_count()));
    if grid.is_empty() {
        frame.render_widget(Paragraph::new("No rows").block(block), area);
        return;
    }

    let visible_limit = usize::from(area.height.saturating_sub(3)).max(1);
    let window_start = selected
        .unwrap_or(0)
        .saturating_sub(visible_limit.saturating_sub(1));
    let rows = grid
        .visible_rows(window_start, visible_limit)
        .into_iter()
        .enumerate()
        .map(|(offset, values)| {
            let style = if selected == Some(window_start + offset) {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            Row::new(values.iter().map(ToString::to_string)).style(style)
        })
        .collect::<Vec<_>>();

    let header = Row::new(grid.headers().iter().map(String::as_str)).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
    let widths = vec![Constraint::Fill(1); grid.column_count()];
    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}

fn render_form_popup(frame: &mut Frame<'_>, form: &RecordForm) {
    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = Vec::with_capacity(form.fields().len() + 2);
    for (index, field) in form.fields().iter().enumerate() {
        let focused = index == form.focused();
        let marker = if focused { ">" } else { " " };
        let mut value = field.display();
        if focused && !field.is_choice() {
            value.push('_');
        }
        let choice_hint = if field.is_choice() { "  ◂ ▸" } else { "" };
        let style = if focused {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::styled(
            format!("{marker} {:<22} {value}{choice_hint}", field.label),
            style,
        ));
    }
    lines.push(Line::from(""));
    lines.push(Line::from("Enter: save   Esc: cancel"));

    let popup = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(form.title()))
        .wrap(Wrap { trim: false });
    frame.render_widget(popup, area);
}

fn render_confirm_popup(frame: &mut Frame<'_>, key: &str) {
    let area = centered_rect(40, 20, frame.area());
    frame.render_widget(Clear, area);
    let popup = Paragraph::new(vec![
        Line::from(format!("Delete row with id {key}?")),
        Line::from(""),
        Line::from("y: yes   n: no"),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).title("Confirm"));
    frame.render_widget(popup, area);
}

fn render_export_prompt(frame: &mut Frame<'_>, path: &str) {
    let area = centered_rect(70, 20, frame.area());
    frame.render_widget(Clear, area);
    let popup = Paragraph::new(vec![
        Line::from("Save report to:"),
        Line::from(format!("{path}_")),
    ])
    .wrap(Wrap { trim: false })
    .block(Block::default().borders(Borders::ALL).title("Export"));
    frame.render_widget(popup, area);
}

fn render_notice_popup(frame: &mut Frame<'_>, notice: &Notice) {
    let area = centered_rect(60, 30, frame.area());
    frame.render_widget(Clear, area);
    let (title, color) = match notice.level {
        NoticeLevel::Info => ("Info", Color::Cyan),
        NoticeLevel::Error => ("Error", Color::Red),
    };
    let popup = Paragraph::new(notice.message.lines().map(Line::from).collect::<Vec<_>>())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(title),
        );
    frame.render_widget(popup, area);
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("Global keymap"),
        Line::from("q: quit"),
        Line::from("?: toggle help"),
        Line::from("1..6 or Tab: switch section"),
        Line::from("Arrows or j/k: move row"),
        Line::from("a / e / d: add, edit, delete row"),
        Line::from("r: refresh"),
        Line::from("Report: ←/→ or h/l switch tab, x export"),
        Line::from("Dialog: Tab/↑/↓ field, ←/→ choice, Enter save, Esc cancel"),
        Line::from("Delete prompt: y / n"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100_u16 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100_u16 - height_percent) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100_u16 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100_u16 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

fn map_key_event(key: KeyEvent, mode: InputMode) -> Option<Msg> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Msg::Quit);
    }

    match mode {
        InputMode::Notice => Some(Msg::DismissNotice),
        InputMode::Help => Some(Msg::ToggleHelp),
        InputMode::Dialog => map_dialog_key(key).map(Msg::Form),
        InputMode::ConfirmDelete => match key.code {
            KeyCode::Char('y' | 'Y') => Some(Msg::AnswerDelete(true)),
            KeyCode::Char('n' | 'N') | KeyCode::Esc => Some(Msg::AnswerDelete(false)),
            _ => None,
        },
        InputMode::ExportPrompt => match key.code {
            KeyCode::Enter => Some(Msg::Prompt(PromptKey::Submit)),
            KeyCode::Esc => Some(Msg::Prompt(PromptKey::Cancel)),
            KeyCode::Backspace => Some(Msg::Prompt(PromptKey::Backspace)),
            KeyCode::Char(ch) => Some(Msg::Prompt(PromptKey::Input(ch))),
            _ => None,
        },
        InputMode::Browse => map_browse_key(key),
    }
}

fn map_dialog_key(key: KeyEvent) -> Option<FormKey> {
    match key.code {
        KeyCode::Tab | KeyCode::Down => Some(FormKey::NextField),
        KeyCode::BackTab | KeyCode::Up => Some(FormKey::PreviousField),
        KeyCode::Right => Some(FormKey::NextChoice),
        KeyCode::Left => Some(FormKey::PreviousChoice),
        KeyCode::Enter => Some(FormKey::Submit),
        KeyCode::Esc => Some(FormKey::Cancel),
        KeyCode::Backspace => Some(FormKey::Backspace),
        KeyCode::Char(ch) => Some(FormKey::Input(ch)),
        _ => None,
    }
}

fn map_browse_key(key: KeyEvent) -> Option<Msg> {
    match key.code {
        KeyCode::Char('q') => Some(Msg::Quit),
        KeyCode::Char('?') => Some(Msg::ToggleHelp),
        KeyCode::Char(digit @ '1'..='6') => {
            let index = digit.to_digit(10).and_then(|value| usize::try_from(value).ok())?;
            Section::from_index(index - 1).map(Msg::SelectSection)
        }
        KeyCode::Tab => Some(Msg::NextSection),
        KeyCode::Up | KeyCode::Char('k') => Some(Msg::MoveUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Msg::MoveDown),
        KeyCode::Left | KeyCode::Char('h') => Some(Msg::PreviousTab),
        KeyCode::Right | KeyCode::Char('l') => Some(Msg::NextTab),
        KeyCode::Char('a') => Some(Msg::Add),
        KeyCode::Char('e') => Some(Msg::Edit),
        KeyCode::Char('d') => Some(Msg::Delete),
        KeyCode::Char('r') => Some(Msg::Refresh),
        KeyCode::Char('x') => Some(Msg::Export),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ojol_core::config::AppConfig;
    use ojol_core::console::{NoticeLevel, Section};
    use ojol_core::data_access::{DataAccessError, DataBackend, Record, ResultSet, SqlValue};
    use ojol_core::pages::{SCHEMA, USERS_PAGE};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use tokio::runtime::{Builder, Runtime};

    use super::{map_key_event, render, FormKey, InputMode, Msg, PromptKey, TuiApp};

    #[derive(Debug, Default)]
    struct ScriptedBackend {
        statements: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn statements(&self) -> Vec<String> {
            self.statements.lock().expect("statements lock").clone()
        }
    }

    #[async_trait::async_trait]
    impl DataBackend for ScriptedBackend {
        async fn query(
            &self,
            sql: &str,
            params: &[SqlValue],
        ) -> Result<ResultSet, DataAccessError> {
            if sql.contains("information_schema.COLUMNS") {
                let table = params.first().map(ToString::to_string).unwrap_or_default();
                return Ok(ResultSet::new(Vec::new(), catalog_rows(&table)));
            }
            if sql == USERS_PAGE.view_query {
                let columns = ["user_id", "nama", "email", "no_hp", "password"]
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                let row = Record::new()
                    .with("user_id", 1_i64)
                    .with("nama", "Budi")
                    .with("email", "b@x.com")
                    .with("no_hp", "0812")
                    .with("password", "p0");
                return Ok(ResultSet::new(columns, vec![row]));
            }
            Ok(ResultSet::default())
        }

        async fn execute(&self, sql: &str, _params: &[SqlValue]) -> Result<u64, DataAccessError> {
            self.statements
                .lock()
                .expect("statements lock")
                .push(sql.to_string());
            Ok(1)
        }

        async fn ping(&self) -> Result<(), DataAccessError> {
            Ok(())
        }
    }

    fn catalog_rows(table: &str) -> Vec<Record> {
        let Some(def) = SCHEMA.tables().iter().find(|def| def.name == table) else {
            return Vec::new();
        };
        def.columns
            .iter()
            .enumerate()
            .map(|(position, column)| {
                let (key, extra) = if position == 0 {
                    ("PRI", "auto_increment")
                } else {
                    ("", "")
                };
                Record::new()
                    .with("column_name", *column)
                    .with("column_type", "varchar(100)")
                    .with("is_nullable", "NO")
                    .with("column_key", key)
                    .with("extra", extra)
            })
            .collect()
    }

    fn runtime() -> Runtime {
        Builder::new_current_thread()
            .build()
            .expect("failed to build runtime")
    }

    fn press<B: DataBackend + ?Sized>(app: &mut TuiApp<'_, B>, code: KeyCode) {
        let key = KeyEvent::new(code, KeyModifiers::NONE);
        if let Some(msg) = map_key_event(key, app.input_mode()) {
            app.handle(msg);
        }
    }

    fn type_text<B: DataBackend + ?Sized>(app: &mut TuiApp<'_, B>, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn screen<B: DataBackend + ?Sized>(app: &TuiApp<'_, B>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 36)).expect("test terminal");
        terminal
            .draw(|frame| render(frame, app))
            .expect("frame should render");
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn browse_keymap_covers_navigation_and_actions() {
        assert_eq!(
            map_key_event(key(KeyCode::Char('q')), InputMode::Browse),
            Some(Msg::Quit)
        );
        assert_eq!(
            map_key_event(key(KeyCode::Char('3')), InputMode::Browse),
            Some(Msg::SelectSection(Section::Admin))
        );
        assert_eq!(
            map_key_event(key(KeyCode::Char('6')), InputMode::Browse),
            Some(Msg::SelectSection(Section::Report))
        );
        assert_eq!(
            map_key_event(key(KeyCode::Char('l')), InputMode::Browse),
            Some(Msg::NextTab)
        );
        assert_eq!(
            map_key_event(key(KeyCode::Char('x')), InputMode::Browse),
            Some(Msg::Export)
        );
        assert_eq!(map_key_event(key(KeyCode::Char('7')), InputMode::Browse), None);
    }

    #[test]
    fn dialog_keys_are_form_input() {
        assert_eq!(
            map_key_event(key(KeyCode::Char('q')), InputMode::Dialog),
            Some(Msg::Form(FormKey::Input('q')))
        );
        assert_eq!(
            map_key_event(key(KeyCode::Left), InputMode::Dialog),
            Some(Msg::Form(FormKey::PreviousChoice))
        );
        assert_eq!(
            map_key_event(key(KeyCode::Esc), InputMode::Dialog),
            Some(Msg::Form(FormKey::Cancel))
        );
        assert_eq!(
            map_key_event(
                KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
                InputMode::Dialog
            ),
            Some(Msg::Quit)
        );
    }

    #[test]
    fn prompts_capture_their_own_keys() {
        assert_eq!(
            map_key_event(key(KeyCode::Char('y')), InputMode::ConfirmDelete),
            Some(Msg::AnswerDelete(true))
        );
        assert_eq!(
            map_key_event(key(KeyCode::Esc), InputMode::ConfirmDelete),
            Some(Msg::AnswerDelete(false))
        );
        assert_eq!(
            map_key_event(key(KeyCode::Char('a')), InputMode::ConfirmDelete),
            None
        );
        assert_eq!(
            map_key_event(key(KeyCode::Char('x')), InputMode::ExportPrompt),
            Some(Msg::Prompt(PromptKey::Input('x')))
        );
        assert_eq!(
            map_key_event(key(KeyCode::Char('q')), InputMode::Notice),
            Some(Msg::DismissNotice)
        );
    }

    #[test]
    fn console_opens_on_reports_and_switches_sections() {
        let runtime = runtime();
        let backend = ScriptedBackend::default();
        let mut app = TuiApp::new(&runtime, &backend, Arc::new(AppConfig::default()));
        app.start();
        assert!(app.notice.is_none());
        assert_eq!(app.status_line, "Ready");

        let output = screen(&app);
        assert!(output.contains("1. Data Users"));
        assert!(output.contains("Payments"));

        press(&mut app, KeyCode::Char('1'));
        assert_eq!(app.console.section(), Section::Users);
        assert!(screen(&app).contains("Budi"));
    }

    #[test]
    fn add_and_delete_go_through_the_page() {
        let runtime = runtime();
        let backend = ScriptedBackend::default();
        let mut app = TuiApp::new(&runtime, &backend, Arc::new(AppConfig::default()));
        app.start();
        press(&mut app, KeyCode::Char('1'));

        press(&mut app, KeyCode::Char('e'));
        let notice = app.notice.clone().expect("selection notice");
        assert_eq!(notice.level, NoticeLevel::Info);
        press(&mut app, KeyCode::Char(' '));
        assert!(app.notice.is_none());

        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.input_mode(), InputMode::Dialog);
        type_text(&mut app, "Andi");
        assert!(screen(&app).contains("Andi_"));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.input_mode(), InputMode::Browse);

        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.input_mode(), InputMode::ConfirmDelete);
        press(&mut app, KeyCode::Char('y'));

        assert_eq!(
            backend.statements(),
            [
                "INSERT INTO `users` (`nama`, `email`, `no_hp`, `password`) VALUES (?, ?, ?, ?)",
                "DELETE FROM `users` WHERE `user_id` = ?",
            ]
        );
    }

    #[test]
    fn exporting_an_empty_report_shows_info() {
        let runtime = runtime();
        let backend = ScriptedBackend::default();
        let mut app = TuiApp::new(&runtime, &backend, Arc::new(AppConfig::default()));
        app.start();

        press(&mut app, KeyCode::Char('x'));

        let notice = app.notice.clone().expect("empty report notice");
        assert_eq!(notice.level, NoticeLevel::Info);
        assert!(notice.message.contains("has no rows to export"));
        assert!(app.export_prompt.is_none());
    }
}
