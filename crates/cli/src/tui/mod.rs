use std::io::stdout;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};

use termgrid_engine::cell::{Alignment, Rgb};
use termgrid_engine::cell_ref::{column_name, MAX_COLS, MAX_ROWS};
use termgrid_engine::{CellRef, Workbook};

use crate::render::{self, GridLayout};
use crate::util;

/// Rows taken by the title, tab bar, edit line and status line
const CHROME_ROWS: u16 = 4;

enum Mode {
    Normal,
    Editing { buffer: String },
}

pub(crate) struct TuiApp {
    workbook: Workbook,
    path: PathBuf,
    cursor: CellRef,
    mode: Mode,
    show_help: bool,
    should_quit: bool,
    /// Set after a quit attempt with unsaved changes
    confirm_quit: bool,
    message: Option<String>,
    /// Cells redrawn because recalculation changed them, last frame
    last_updates: usize,
}

impl TuiApp {
    pub(crate) fn new(workbook: Workbook, path: PathBuf) -> Self {
        Self {
            workbook,
            path,
            cursor: CellRef::new(1, 1),
            mode: Mode::Normal,
            show_help: false,
            should_quit: false,
            confirm_quit: false,
            message: None,
            last_updates: 0,
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        if self.show_help {
            // Any key dismisses help
            self.show_help = false;
            return;
        }
        if matches!(self.mode, Mode::Editing { .. }) {
            self.handle_edit_key(key);
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if !matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
            self.confirm_quit = false;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.request_quit(),
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('s') if ctrl => self.save(),
            KeyCode::Char('r') if ctrl => self.redo(),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1, 0),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1, 0),
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(0, -1),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(0, 1),
            KeyCode::PageUp => {
                let rows = self.workbook.active_sheet().viewport().view_rows as i64;
                self.move_cursor(-rows, 0);
            }
            KeyCode::PageDown => {
                let rows = self.workbook.active_sheet().viewport().view_rows as i64;
                self.move_cursor(rows, 0);
            }
            KeyCode::Home | KeyCode::Char('g') => self.cursor = CellRef::new(1, self.cursor.col),
            KeyCode::Char('0') => self.cursor = CellRef::new(self.cursor.row, 1),
            KeyCode::Enter | KeyCode::F(2) => {
                let buffer = self.workbook.active_sheet().raw_value(self.cursor).to_string();
                self.mode = Mode::Editing { buffer };
            }
            KeyCode::Char('=') => {
                self.mode = Mode::Editing { buffer: "$=".to_string() };
            }
            KeyCode::Delete | KeyCode::Char('x') => {
                let at = self.cursor;
                self.apply("cleared", |wb| wb.edit_active(|s| s.delete_range(at, at)));
            }
            KeyCode::Char('u') => self.undo(),
            KeyCode::Char('o') => {
                let row = self.cursor.row;
                self.apply("row inserted", |wb| wb.edit_active(|s| s.insert_row(row)));
            }
            KeyCode::Char('O') => {
                let col = self.cursor.col;
                self.apply("column inserted", |wb| wb.edit_active(|s| s.insert_column(col)));
            }
            KeyCode::Char('d') => {
                let row = self.cursor.row;
                self.apply("row deleted", |wb| wb.edit_active(|s| s.delete_row(row)));
            }
            KeyCode::Char('D') => {
                let col = self.cursor.col;
                self.apply("column deleted", |wb| wb.edit_active(|s| s.delete_column(col)));
            }
            KeyCode::Tab => self.cycle_sheet(1),
            KeyCode::BackTab => self.cycle_sheet(-1),
            KeyCode::Char('n') => {
                let index = self.workbook.add_sheet();
                self.switch_sheet(index);
            }
            // 1-9: jump to sheet by index
            KeyCode::Char(c @ '1'..='9') => {
                let index = (c as usize) - ('1' as usize);
                self.switch_sheet(index);
            }
            _ => {}
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        let Mode::Editing { buffer } = &mut self.mode else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Enter => {
                let input = std::mem::take(buffer);
                self.mode = Mode::Normal;
                let at = self.cursor;
                self.apply("", |wb| wb.commit_edit(at, &input));
                self.move_cursor(1, 0);
            }
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) => buffer.push(c),
            _ => {}
        }
    }

    /// Run an edit, putting its outcome in the status line.
    fn apply(
        &mut self,
        done: &str,
        edit: impl FnOnce(&mut Workbook) -> Result<(), termgrid_engine::EngineError>,
    ) {
        match edit(&mut self.workbook) {
            Ok(()) => self.message = (!done.is_empty()).then(|| done.to_string()),
            Err(e) => {
                log::info!("edit at {} rejected: {}", self.cursor, e);
                self.message = Some(e.to_string());
            }
        }
    }

    fn undo(&mut self) {
        let undone = self.workbook.undo();
        self.message = Some(if undone { "undone" } else { "nothing to undo" }.to_string());
    }

    fn redo(&mut self) {
        let redone = self.workbook.redo();
        self.message = Some(if redone { "redone" } else { "nothing to redo" }.to_string());
    }

    fn save(&mut self) {
        match termgrid_io::save_workbook(&self.workbook, &self.path) {
            Ok(()) => {
                self.workbook.set_current_file(Some(self.path.clone()));
                self.workbook.mark_clean();
                self.message = Some(format!("saved {}", self.path.display()));
            }
            Err(e) => {
                log::error!("save failed: {}", e);
                self.message = Some(format!("save failed: {}", e));
            }
        }
    }

    fn request_quit(&mut self) {
        if self.workbook.is_dirty() && !self.confirm_quit {
            self.confirm_quit = true;
            self.message = Some("unsaved changes: press q again to quit, Ctrl+S to save".to_string());
        } else {
            self.should_quit = true;
        }
    }

    fn move_cursor(&mut self, drow: i64, dcol: i64) {
        let row = (i64::from(self.cursor.row) + drow).clamp(1, i64::from(MAX_ROWS)) as u32;
        let col = (i64::from(self.cursor.col) + dcol).clamp(1, i64::from(MAX_COLS)) as u32;
        self.cursor = CellRef::new(row, col);
    }

    fn switch_sheet(&mut self, index: usize) {
        if index == self.workbook.active_sheet_index() || !self.workbook.set_active_sheet(index) {
            return;
        }
        self.cursor = CellRef::new(1, 1);
        self.message = None;
    }

    fn cycle_sheet(&mut self, step: isize) {
        let count = self.workbook.sheet_count() as isize;
        if count > 1 {
            let next = (self.workbook.active_sheet_index() as isize + step).rem_euclid(count);
            self.switch_sheet(next as usize);
        }
    }

    /// Fit the viewport to the terminal and keep the cursor on screen.
    pub(crate) fn layout(&mut self, size: Rect) {
        let rows = u32::from(size.height.saturating_sub(CHROME_ROWS + 1)).max(1);
        let cursor = self.cursor;
        let sheet = self.workbook.active_sheet_mut();
        sheet.viewport_mut().ensure_visible(cursor);
        let cols = render::columns_that_fit(sheet, rows, size.width as usize);
        sheet.viewport_mut().resize(rows, cols);
        sheet.viewport_mut().ensure_visible(cursor);
    }

    /// Renderer side of recalculation: drain the queued visible updates,
    /// then drop blank cells that scrolled far away.
    pub(crate) fn after_frame(&mut self) {
        let sheet = self.workbook.active_sheet_mut();
        let updates = sheet.take_visible_updates();
        if !updates.is_empty() {
            log::debug!("{} visible cells refreshed", updates.len());
        }
        self.last_updates = updates.len();
        sheet.evict_distant();
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(2),
            Constraint::Length(1),
        ])
        .split(area);

        self.draw_title(frame, chunks[0]);
        self.draw_tab_bar(frame, chunks[1]);
        self.draw_edit_line(frame, chunks[2]);
        self.draw_grid(frame, chunks[3]);
        self.draw_status(frame, chunks[4]);

        if self.show_help {
            self.draw_help(frame, area);
        }
    }

    fn draw_title(&self, frame: &mut Frame, area: Rect) {
        let dirty = if self.workbook.is_dirty() { " [+]" } else { "" };
        let title = format!(" termgrid: {}{} ", self.file_name(), dirty);
        let para = Paragraph::new(Line::from(vec![Span::styled(
            title,
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )]))
        .style(Style::default().bg(Color::Cyan));
        frame.render_widget(para, area);
    }

    fn draw_tab_bar(&self, frame: &mut Frame, area: Rect) {
        let mut spans = Vec::new();
        for (i, name) in self.workbook.sheet_names().into_iter().enumerate() {
            let label = if i < 9 {
                format!(" {}:{} ", i + 1, name)
            } else {
                format!(" {} ", name)
            };
            let style = if i == self.workbook.active_sheet_index() {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray).bg(Color::DarkGray)
            };
            spans.push(Span::styled(label, style));
            spans.push(Span::styled(" ", Style::default().bg(Color::Black)));
        }
        let para = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
        frame.render_widget(para, area);
    }

    fn draw_edit_line(&self, frame: &mut Frame, area: Rect) {
        let (text, style) = match &self.mode {
            Mode::Editing { buffer } => (
                format!(" {} > {}_", self.cursor, buffer),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Mode::Normal => (
                format!(" {} : {}", self.cursor, self.workbook.active_sheet().raw_value(self.cursor)),
                Style::default().fg(Color::White),
            ),
        };
        frame.render_widget(Paragraph::new(Line::from(Span::styled(text, style))), area);
    }

    fn draw_grid(&self, frame: &mut Frame, area: Rect) {
        let sheet = self.workbook.active_sheet();
        let layout = GridLayout::for_viewport(sheet);

        let mut header_spans = vec![Span::styled(
            format!("{} ", " ".repeat(layout.gutter)),
            Style::default().fg(Color::DarkGray),
        )];
        for &(col, width) in &layout.columns {
            let style = if col == self.cursor.col {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            };
            header_spans.push(Span::styled(
                format!("{} ", util::align(&column_name(col), width, Alignment::Center)),
                style,
            ));
        }

        let mut lines: Vec<Line> = Vec::with_capacity(area.height as usize);
        lines.push(Line::from(header_spans));

        for row in layout.first_row..=layout.last_row {
            let is_cursor_row = row == self.cursor.row;
            let row_num_style = if is_cursor_row {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let mut spans = vec![Span::styled(
                format!("{:>width$} ", row, width = layout.gutter),
                row_num_style,
            )];

            for &(col, width) in &layout.columns {
                let at = CellRef::new(row, col);
                let (text, alignment) = render::cell_text(sheet, at);
                let display = util::align(text, width, alignment);
                let style = if at == self.cursor {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::White)
                        .add_modifier(Modifier::BOLD)
                } else {
                    sheet.cell(at).map_or(Style::default().fg(Color::Gray), cell_style)
                };
                spans.push(Span::styled(display, style));
                spans.push(Span::raw(" "));
            }
            lines.push(Line::from(spans));
        }

        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let sheet = self.workbook.active_sheet();
        let left = match &self.message {
            Some(message) => format!(" {}", message),
            None => format!(" {} = {:?}", self.cursor, sheet.display(self.cursor)),
        };
        let right = format!(
            "{} cells  {} updated  undo {}  ?: help ",
            sheet.len(),
            self.last_updates,
            sheet.history().undo_len()
        );

        let padding = (area.width as usize).saturating_sub(left.chars().count() + right.chars().count());
        let status = format!("{}{:pad$}{}", left, "", right, pad = padding);

        let para = Paragraph::new(Line::from(vec![Span::styled(
            status,
            Style::default().fg(Color::Black).bg(Color::DarkGray),
        )]))
        .style(Style::default().bg(Color::DarkGray));
        frame.render_widget(para, area);
    }

    fn draw_help(&self, frame: &mut Frame, area: Rect) {
        let help_lines = [
            "",
            "  Navigation",
            "  ----------",
            "  arrows / hjkl     Move cursor",
            "  PgUp / PgDn       Page up/down",
            "  Home / g          First row",
            "  0                 First column",
            "",
            "  Editing",
            "  -------",
            "  Enter / F2        Edit cell",
            "  =                 Start a formula",
            "  x / Delete        Clear cell",
            "  u / Ctrl+R        Undo / redo",
            "  o / O             Insert row / column",
            "  d / D             Delete row / column",
            "",
            "  Sheets",
            "  ------",
            "  Tab / Shift+Tab   Next/prev sheet",
            "  1..9              Jump to sheet",
            "  n                 New sheet",
            "",
            "  General",
            "  -------",
            "  Ctrl+S            Save",
            "  q / Esc           Quit",
            "  ?                 Toggle this help",
            "",
        ];
        let help_width: u16 = 44;
        let help_height: u16 = help_lines.len() as u16 + 2;

        let x = area.width.saturating_sub(help_width) / 2;
        let y = area.height.saturating_sub(help_height) / 2;
        let popup = Rect::new(
            area.x + x,
            area.y + y,
            help_width.min(area.width),
            help_height.min(area.height),
        );

        let lines: Vec<Line> = help_lines
            .iter()
            .map(|s| Line::from(Span::styled(*s, Style::default().fg(Color::White))))
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Keybindings ")
            .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .style(Style::default().bg(Color::Black));

        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }

    pub(crate) fn into_workbook(self) -> Workbook {
        self.workbook
    }
}

/// Terminal style for a cell's colors and text flags.
fn cell_style(cell: &termgrid_engine::Cell) -> Style {
    let mut style = Style::default().fg(rgb(cell.color));
    if cell.bg_color != Rgb::BLACK {
        style = style.bg(rgb(cell.bg_color));
    }
    if cell.is_bold() {
        style = style.add_modifier(Modifier::BOLD);
    }
    if cell.is_italic() {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if cell.is_underline() {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if cell.is_strikethrough() {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    style
}

fn rgb(color: Rgb) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

/// Run the full-screen viewer until the user quits. Returns the workbook
/// so the caller can report unsaved state.
pub fn run(workbook: Workbook, path: PathBuf) -> Result<Workbook, String> {
    let app = TuiApp::new(workbook, path);
    run_app(app).map(TuiApp::into_workbook)
}

fn run_app(mut app: TuiApp) -> Result<TuiApp, String> {
    terminal::enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {}", e))?;
    stdout()
        .execute(EnterAlternateScreen)
        .map_err(|e| format!("failed to enter alternate screen: {}", e))?;

    struct Cleanup;
    impl Drop for Cleanup {
        fn drop(&mut self) {
            let _ = stdout().execute(LeaveAlternateScreen);
            let _ = terminal::disable_raw_mode();
        }
    }
    let _cleanup = Cleanup;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend).map_err(|e| format!("failed to create terminal: {}", e))?;

    loop {
        let term_size = terminal
            .size()
            .map(|s| Rect::new(0, 0, s.width, s.height))
            .unwrap_or_default();
        app.layout(term_size);

        terminal
            .draw(|frame| app.draw(frame))
            .map_err(|e| format!("draw error: {}", e))?;
        app.after_frame();

        if event::poll(Duration::from_millis(100)).map_err(|e| format!("event poll error: {}", e))? {
            if let Event::Key(key) = event::read().map_err(|e| format!("event read error: {}", e))? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> TuiApp {
        TuiApp::new(Workbook::default(), PathBuf::from("book.tgrid"))
    }

    fn press(app: &mut TuiApp, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut TuiApp, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn edit_commit_moves_down() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "12");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('='));
        type_text(&mut app, "A1 * 2");
        press(&mut app, KeyCode::Enter);

        let sheet = app.workbook.active_sheet();
        assert_eq!(sheet.display(CellRef::new(1, 1)), "12");
        assert_eq!(sheet.display(CellRef::new(2, 1)), "24.00");
        assert_eq!(app.cursor, CellRef::new(3, 1));
        assert!(app.workbook.is_dirty());
    }

    #[test]
    fn rejected_edit_reports_and_keeps_state() {
        let mut app = app();
        press(&mut app, KeyCode::Char('='));
        type_text(&mut app, "A1 + 1");
        press(&mut app, KeyCode::Enter);
        assert!(app.message.is_some());
        assert_eq!(app.workbook.active_sheet().raw_value(CellRef::new(1, 1)), "");
    }

    #[test]
    fn escape_cancels_edit() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "abc");
        press(&mut app, KeyCode::Esc);
        assert!(matches!(app.mode, Mode::Normal));
        assert!(app.workbook.active_sheet().is_empty());
        assert!(!app.should_quit);
    }

    #[test]
    fn quit_with_unsaved_changes_needs_confirmation() {
        let mut app = app();
        app.workbook.commit_edit(CellRef::new(1, 1), "1").unwrap();
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn cursor_stays_on_sheet() {
        let mut app = app();
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Left);
        assert_eq!(app.cursor, CellRef::new(1, 1));
    }

    #[test]
    fn layout_follows_cursor_and_drains_updates() {
        let mut app = app();
        app.workbook.commit_edit(CellRef::new(1, 1), "3").unwrap();
        app.workbook.commit_edit(CellRef::new(1, 2), "$=A1 + 1").unwrap();
        app.workbook.commit_edit(CellRef::new(1, 1), "4").unwrap();

        app.layout(Rect::new(0, 0, 80, 24));
        let viewport = *app.workbook.active_sheet().viewport();
        assert_eq!(viewport.view_rows, 24 - u32::from(CHROME_ROWS) - 1);
        app.after_frame();
        assert!(app.last_updates >= 1);
        assert!(app.workbook.active_sheet_mut().take_visible_updates().is_empty());

        app.cursor = CellRef::new(500, 1);
        app.layout(Rect::new(0, 0, 80, 24));
        assert!(app.workbook.active_sheet().viewport().is_visible(app.cursor));
    }

    #[test]
    fn undo_and_sheet_keys() {
        let mut app = app();
        app.workbook.commit_edit(CellRef::new(1, 1), "1").unwrap();
        press(&mut app, KeyCode::Char('u'));
        assert!(app.workbook.active_sheet().display(CellRef::new(1, 1)).is_empty());
        app.handle_key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL));
        assert_eq!(app.workbook.active_sheet().display(CellRef::new(1, 1)), "1");

        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.workbook.active_sheet_index(), 1);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.workbook.active_sheet_index(), 0);
    }
}
