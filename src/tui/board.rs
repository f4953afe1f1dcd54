//! Kanban board interface.
//!
//! Three fixed columns (to do, in progress, done) with keyboard-driven card
//! movement. All mutations go through the board session's commit path, so
//! every change is reconciled against the sprint schedule before it is
//! written back.

use std::io;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::board::{BoardSession, BoardStore};
use crate::fields::{format_column, format_task_type, Column, TaskType};
use crate::sprint::{active_sprint, describe_task_deadline, resolve_task_sprint_index};
use crate::task::Task;
use crate::tui::colors::{deadline_color, BOARD_BLUE};
use crate::tui::input::InputField;

const COLUMN_COUNT: usize = 3;
const CARD_HEIGHT: usize = 5;

/// Main board application state.
pub struct BoardApp {
    session: BoardSession,
    now: NaiveDateTime,
    selected_column: usize,
    selected_card: usize,
    column_scroll_offsets: [usize; COLUMN_COUNT],
    status_message: String,
    show_task_detail: bool,
    filter_active: bool,
    filter_text: String,
    quick_add: Option<InputField>,

    // Task ids organized by kanban column.
    columns: [Vec<String>; COLUMN_COUNT],
}

impl BoardApp {
    /// Open the board session and build the initial columns.
    pub fn new(store: BoardStore) -> io::Result<Self> {
        let session = BoardSession::open(store)?;

        let mut app = BoardApp {
            session,
            now: Local::now().naive_local(),
            selected_column: 0,
            selected_card: 0,
            column_scroll_offsets: [0; COLUMN_COUNT],
            status_message: String::new(),
            show_task_detail: false,
            filter_active: false,
            filter_text: String::new(),
            quick_add: None,
            columns: Default::default(),
        };

        app.update_columns();
        Ok(app)
    }

    /// Rebuild the column membership from the session's task collection.
    fn update_columns(&mut self) {
        for (i, column) in self.columns.iter_mut().enumerate() {
            column.clear();
            self.column_scroll_offsets[i] = 0;
        }

        for task in &self.session.board.tasks {
            // Apply text filter if active.
            if !self.filter_text.is_empty() {
                let filter_lower = self.filter_text.to_lowercase();
                let title_matches = task.title.to_lowercase().contains(&filter_lower);
                let tags_match = task
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&filter_lower));
                if !title_matches && !tags_match {
                    continue;
                }
            }

            let column_index = match task.column {
                Column::Todo => 0,
                Column::InProgress => 1,
                Column::Done => 2,
            };
            self.columns[column_index].push(task.id.clone());
        }

        self.clamp_selection();
    }

    /// Ensure selected column and card indices are valid.
    fn clamp_selection(&mut self) {
        if self.selected_column >= COLUMN_COUNT {
            self.selected_column = 0;
        }

        let column_len = self.columns[self.selected_column].len();
        if column_len == 0 {
            self.selected_card = 0;
            self.column_scroll_offsets[self.selected_column] = 0;
        } else if self.selected_card >= column_len {
            self.selected_card = column_len - 1;
        }
    }

    fn selected_task_id(&self) -> Option<&str> {
        self.columns[self.selected_column]
            .get(self.selected_card)
            .map(String::as_str)
    }

    fn task_by_id(&self, id: &str) -> Option<&Task> {
        self.session.board.tasks.iter().find(|t| t.id == id)
    }

    /// Reconcile, persist and rebuild the columns after a mutation.
    /// Returns false (with an error status) when the save failed.
    fn commit(&mut self) -> bool {
        self.now = Local::now().naive_local();
        let saved = match self.session.commit() {
            Ok(()) => true,
            Err(e) => {
                self.set_status_message(format!("Error saving: {e}"));
                false
            }
        };
        self.update_columns();
        saved
    }

    fn set_status_message(&mut self, msg: String) {
        self.status_message = msg;
    }

    fn clear_status_message(&mut self) {
        self.status_message.clear();
    }

    /// Move the selected card one column over, keeping it selected.
    fn move_card(&mut self, target: Option<Column>) {
        let Some(target) = target else { return };
        let Some(task_id) = self.selected_task_id().map(str::to_string) else {
            return;
        };

        if let Some(task) = self.session.board.tasks.iter_mut().find(|t| t.id == task_id) {
            task.column = target;
        }
        if self.commit() {
            self.set_status_message(format!("Moved card to {}", format_column(target)));
        }

        let target_column = match target {
            Column::Todo => 0,
            Column::InProgress => 1,
            Column::Done => 2,
        };
        self.selected_column = target_column;
        if let Some(pos) = self.columns[target_column].iter().position(|id| *id == task_id) {
            self.selected_card = pos;
        } else {
            self.clamp_selection();
        }
    }

    /// Toggle the selected card between done and todo.
    fn toggle_done(&mut self) {
        let Some(task_id) = self.selected_task_id().map(str::to_string) else {
            return;
        };

        let mut message = String::new();
        if let Some(task) = self.session.board.tasks.iter_mut().find(|t| t.id == task_id) {
            task.column = if task.column == Column::Done {
                message = format!("Reopened '{}'", task.title);
                Column::Todo
            } else {
                message = format!("Completed '{}'", task.title);
                Column::Done
            };
        }
        if self.commit() {
            self.set_status_message(message);
        }
    }

    /// Toggle a subtask of the selected card by 1-based position.
    fn toggle_subtask(&mut self, position: usize) {
        let Some(task_id) = self.selected_task_id().map(str::to_string) else {
            return;
        };

        let mut message = None;
        if let Some(task) = self.session.board.tasks.iter_mut().find(|t| t.id == task_id) {
            let subtasks = task.subtasks.get_or_insert_with(Vec::new);
            if let Some(st) = position.checked_sub(1).and_then(|p| subtasks.get_mut(p)) {
                st.done = !st.done;
                message = Some(format!(
                    "{} '{}'",
                    if st.done { "Completed" } else { "Reopened" },
                    st.title
                ));
            }
        }
        if let Some(message) = message {
            if self.commit() {
                self.set_status_message(message);
            }
        }
    }

    /// Add a new sprint task into the currently selected column.
    fn quick_add_task(&mut self, title: String) {
        if title.is_empty() {
            return;
        }
        let mut task = Task::new(title.clone(), TaskType::Sprint);
        task.column = Column::all()[self.selected_column];
        let id = task.id.clone();

        self.session.board.tasks.push(task);
        if self.commit() {
            self.set_status_message(format!("Added '{title}'"));
        }

        // Select the new card.
        if let Some(pos) = self.columns[self.selected_column].iter().position(|c| *c == id) {
            self.selected_card = pos;
        }
    }

    /// Handle keyboard input. Returns true when the board should exit.
    fn handle_input(&mut self) -> io::Result<bool> {
        if !event::poll(Duration::from_millis(50))? {
            return Ok(false);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(false);
        };

        // Quick-add prompt swallows everything until applied or cancelled.
        if let Some(input) = self.quick_add.as_mut() {
            match key.code {
                KeyCode::Esc => {
                    self.quick_add = None;
                    self.clear_status_message();
                }
                KeyCode::Enter => {
                    let title = input.take();
                    self.quick_add = None;
                    self.quick_add_task(title);
                }
                KeyCode::Backspace => input.handle_backspace(),
                KeyCode::Left => input.move_cursor_left(),
                KeyCode::Right => input.move_cursor_right(),
                KeyCode::Char(c) => input.handle_char(c),
                _ => {}
            }
            return Ok(false);
        }

        // Filter mode input.
        if self.filter_active {
            match key.code {
                KeyCode::Esc => {
                    self.filter_active = false;
                    self.filter_text.clear();
                    self.update_columns();
                    self.clear_status_message();
                }
                KeyCode::Enter => {
                    self.filter_active = false;
                    if self.filter_text.is_empty() {
                        self.set_status_message("Filter cleared".to_string());
                    } else {
                        let shown: usize = self.columns.iter().map(Vec::len).sum();
                        self.set_status_message(format!(
                            "Filter: '{}' ({} cards shown)",
                            self.filter_text, shown
                        ));
                    }
                }
                KeyCode::Backspace => {
                    if !self.filter_text.is_empty() {
                        self.filter_text.pop();
                        self.update_columns();
                    }
                }
                KeyCode::Char(c) => {
                    self.filter_text.push(c);
                    self.update_columns();
                }
                _ => {}
            }
            return Ok(false);
        }

        // Detail popup: digit keys toggle subtasks, Enter/Esc closes.
        if self.show_task_detail {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => {
                    self.show_task_detail = false;
                    self.clear_status_message();
                }
                KeyCode::Char(c @ '1'..='9') => {
                    self.toggle_subtask(c as usize - '0' as usize);
                }
                _ => {}
            }
            return Ok(false);
        }

        self.clear_status_message();

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(true)
            }

            // Task detail popup
            KeyCode::Enter => {
                if self.selected_task_id().is_some() {
                    self.show_task_detail = true;
                }
            }

            // Card movement between columns (check first, before navigation)
            KeyCode::Left if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.move_card(Column::all()[self.selected_column].prev());
            }
            KeyCode::Right if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.move_card(Column::all()[self.selected_column].next());
            }

            // Column navigation
            KeyCode::Left => {
                if self.selected_column > 0 {
                    self.selected_column -= 1;
                    self.clamp_selection();
                }
            }
            KeyCode::Right => {
                if self.selected_column < COLUMN_COUNT - 1 {
                    self.selected_column += 1;
                    self.clamp_selection();
                }
            }

            // Card navigation within the column
            KeyCode::Up => {
                self.selected_card = self.selected_card.saturating_sub(1);
            }
            KeyCode::Down => {
                let column_len = self.columns[self.selected_column].len();
                if column_len > 0 && self.selected_card < column_len - 1 {
                    self.selected_card += 1;
                }
            }

            // Complete/reopen card
            KeyCode::Char('c') => {
                self.toggle_done();
            }

            // Quick-add into the selected column
            KeyCode::Char('a') => {
                self.quick_add = Some(InputField::new());
                self.set_status_message(
                    "New task: type a title, Enter to add, Esc to cancel".to_string(),
                );
            }

            // Filter mode
            KeyCode::Char('/') => {
                self.filter_active = true;
                self.set_status_message(
                    "Filter: type to search title/tags, Enter to apply, Esc to cancel".to_string(),
                );
            }

            // Help
            KeyCode::Char('h') => {
                self.set_status_message(
                    "Help: Enter: Details | a: Add | c: Complete | Ctrl+←/→: Move | /: Filter | q: Quit"
                        .to_string(),
                );
            }

            _ => {}
        }
        Ok(false)
    }

    /// Render the kanban board.
    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Board
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        self.render_board(f, chunks[1]);
        self.render_status_bar(f, chunks[2]);

        if self.show_task_detail {
            self.render_task_detail_popup(f);
        }
    }

    /// Render the header: board id plus the active sprint window.
    fn render_header(&self, f: &mut Frame, area: Rect) {
        let active = active_sprint(&self.session.schedule, self.now);
        let window_display = format!(
            "Sprint {}: {} to {} (overflow until {})",
            active.index,
            active.start.format("%b %-d"),
            active.end.format("%b %-d"),
            active.overflow_end.format("%b %-d"),
        );

        let header_text = vec![Line::from(vec![
            Span::styled(
                format!("BOARD {}", self.session.store().board_id()),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                window_display,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ])];

        let header_block = Paragraph::new(header_text)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header_block, area);
    }

    fn render_board(&mut self, f: &mut Frame, area: Rect) {
        let constraints: Vec<Constraint> = (0..COLUMN_COUNT)
            .map(|_| Constraint::Percentage(100 / COLUMN_COUNT as u16))
            .collect();

        let columns_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        for (i, &column_area) in columns_layout.iter().enumerate() {
            self.render_column(f, column_area, i);
        }
    }

    /// Render a single column of cards with scroll indicators.
    fn render_column(&mut self, f: &mut Frame, area: Rect, column_index: usize) {
        let is_selected = column_index == self.selected_column;
        let title = format!(
            "{} ({})",
            format_column(Column::all()[column_index]),
            self.columns[column_index].len()
        );

        let border_style = if is_selected {
            Style::default().fg(BOARD_BLUE).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border_style);

        let inner = block.inner(area);
        f.render_widget(block, area);

        let cards = self.columns[column_index].clone();
        if cards.is_empty() {
            return;
        }

        let available_height = inner.height as usize;
        let visible_cards = available_height / CARD_HEIGHT;

        // Keep the selected card inside the visible window.
        let scroll_offset = if is_selected {
            let start_visible = self.column_scroll_offsets[column_index];
            let end_visible = start_visible + visible_cards;

            if self.selected_card < start_visible {
                self.column_scroll_offsets[column_index] = self.selected_card;
                self.selected_card
            } else if self.selected_card >= end_visible && end_visible > 0 {
                let new_offset = self.selected_card + 1 - visible_cards;
                self.column_scroll_offsets[column_index] = new_offset;
                new_offset
            } else {
                start_visible
            }
        } else {
            self.column_scroll_offsets[column_index]
        };

        let mut current_y = 0;
        let mut rendered_cards = 0;

        for (card_index, task_id) in cards.iter().enumerate().skip(scroll_offset) {
            if current_y + CARD_HEIGHT > available_height {
                break;
            }
            let Some(task) = self.task_by_id(task_id) else {
                continue;
            };

            let is_this_card_selected = is_selected && card_index == self.selected_card;
            let card_area = Rect {
                x: inner.x,
                y: inner.y + current_y as u16,
                width: inner.width,
                height: CARD_HEIGHT as u16,
            };

            render_card(f, card_area, task, self.now, is_this_card_selected);

            current_y += CARD_HEIGHT;
            rendered_cards += 1;
        }

        if scroll_offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{} above", scroll_offset))
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(
                indicator,
                Rect {
                    x: inner.x,
                    y: inner.y,
                    width: inner.width,
                    height: 1,
                },
            );
        }

        let remaining = cards.len() - scroll_offset - rendered_cards;
        if remaining > 0 {
            let indicator = Paragraph::new(format!("▼ +{} below", remaining))
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(
                indicator,
                Rect {
                    x: inner.x,
                    y: inner.y + inner.height - 1,
                    width: inner.width,
                    height: 1,
                },
            );
        }
    }

    /// Render the status bar/quick-add prompt.
    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let status_text = if let Some(input) = &self.quick_add {
            format!("New task: {}_", input.value)
        } else if self.filter_active {
            format!(
                "Filter: {} | Type to search, Enter to apply, Esc to cancel",
                self.filter_text
            )
        } else if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            let total: usize = self.columns.iter().map(Vec::len).sum();
            let filter_indicator = if !self.filter_text.is_empty() {
                format!(" [Filter: {}]", self.filter_text)
            } else {
                String::new()
            };
            format!(
                "Cards: {}{} | a: Add | c: Complete | Ctrl+←/→: Move | /: Filter | h: Help | q: Quit",
                total, filter_indicator
            )
        };

        let status = Paragraph::new(status_text)
            .style(Style::default().bg(BOARD_BLUE).fg(Color::White))
            .alignment(Alignment::Left);

        f.render_widget(status, area);
    }

    /// Render the task detail popup for the selected card.
    fn render_task_detail_popup(&self, f: &mut Frame) {
        let Some(task) = self.selected_task_id().and_then(|id| self.task_by_id(id)) else {
            return;
        };

        // Centered popup, 80% of the screen.
        let popup_area = {
            let area = f.area();
            let popup_width = (area.width * 80) / 100;
            let popup_height = (area.height * 80) / 100;
            let x = (area.width - popup_width) / 2;
            let y = (area.height - popup_height) / 2;
            Rect::new(x, y, popup_width, popup_height)
        };

        f.render_widget(Clear, popup_area);

        let deadline = describe_task_deadline(task.due_date, task.overflow_date, self.now);
        let mut detail_lines = vec![
            Line::from(vec![Span::styled(
                task.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(format!("Id:       {}", task.id)),
            Line::from(format!("Type:     {}", format_task_type(task.task_type))),
            Line::from(format!("Column:   {}", format_column(task.column))),
            Line::from(format!("Sprint:   {}", resolve_task_sprint_index(task))),
            Line::from(vec![
                Span::raw("Deadline: "),
                Span::styled(
                    deadline.label.clone(),
                    Style::default().fg(deadline_color(deadline.status)),
                ),
            ]),
            Line::from(format!(
                "Tags:     {}",
                if task.tags.is_empty() {
                    "-".to_string()
                } else {
                    task.tags.join(", ")
                }
            )),
            Line::from(""),
            Line::from("Description:"),
            Line::from(task.desc.as_deref().unwrap_or("-").to_string()),
            Line::from(""),
            Line::from("Subtasks (press 1-9 to toggle):"),
        ];

        if task.subtasks().is_empty() {
            detail_lines.push(Line::from("  -"));
        } else {
            for (i, st) in task.subtasks().iter().enumerate() {
                detail_lines.push(Line::from(format!(
                    "  {}. [{}] {}",
                    i + 1,
                    if st.done { "x" } else { " " },
                    st.title
                )));
            }
        }

        let popup_block = Block::default()
            .borders(Borders::ALL)
            .title("Task Details (Press Enter to close)")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(BOARD_BLUE).add_modifier(Modifier::BOLD));

        let popup_paragraph = Paragraph::new(detail_lines)
            .block(popup_block)
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));

        f.render_widget(popup_paragraph, popup_area);
    }

    /// Main event loop.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }
}

/// Render a single task card: wrapped title plus its deadline label,
/// colored by classification.
fn render_card(f: &mut Frame, area: Rect, task: &Task, now: NaiveDateTime, is_selected: bool) {
    let style = if is_selected {
        Style::default()
            .bg(BOARD_BLUE)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().bg(Color::DarkGray)
    };

    let mut card_text = vec![];

    // Word-wrap the title to at most two lines inside the borders.
    let available_width = area.width.saturating_sub(2) as usize;
    let mut current_line = String::new();
    let mut lines = Vec::new();

    for word in task.title.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= available_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line.clone());
            current_line = word.to_string();
            if lines.len() >= 2 {
                break;
            }
        }
    }
    if !current_line.is_empty() && lines.len() < 2 {
        lines.push(current_line);
    }

    for line in lines {
        card_text.push(Line::from(line));
    }

    let deadline = describe_task_deadline(task.due_date, task.overflow_date, now);
    let deadline_style = if is_selected {
        Style::default()
    } else {
        Style::default().fg(deadline_color(deadline.status))
    };
    card_text.push(Line::from(Span::styled(deadline.label, deadline_style)));

    let card_block = Paragraph::new(card_text)
        .block(Block::default().borders(Borders::ALL))
        .style(style)
        .wrap(Wrap { trim: true });

    f.render_widget(card_block, area);
}
