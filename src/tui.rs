//! Terminal User Interface (TUI) rendering and management.
//!
//! This module handles initializing the terminal in raw mode, restoring it on exit,
//! and drawing the application state using `ratatui`.

use std::io::{self, Stdout};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::Terminal;

use crate::app::{display_name, App, InputMode, StatusLevel};
use crate::registry::ProcessRegistry;

/// Type alias for the specific terminal backend used.
pub type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

const RUNNING_BG: Color = Color::Rgb(0x7f, 0xc9, 0x7f);

/// Initializes the terminal for TUI mode.
///
/// Enables raw mode, enters the alternate screen, and creates a `ratatui` Terminal instance.
pub fn init_terminal() -> io::Result<TuiTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restores the terminal to its original state.
pub fn restore_terminal(mut terminal: TuiTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Draws the current application state to the terminal.
pub fn draw(app: &mut App, registry: &ProcessRegistry, terminal: &mut TuiTerminal) -> io::Result<()> {
    let title = window_title(app);
    execute!(terminal.backend_mut(), SetTitle(title))?;
    terminal.draw(|frame| {
        let area = frame.size();
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(4)])
            .split(area);
        let main = if app.log_view.is_some() {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
                .split(vertical[0])
        } else {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(100)])
                .split(vertical[0])
        };

        app.list_width = main[0].width;
        let border_style = Style::default().fg(Color::DarkGray);

        let marker_width = 4;
        let available = (main[0].width as usize).saturating_sub(2 + marker_width);
        let items: Vec<ListItem> = app
            .scripts
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let is_selected = index == app.selected;
                let marker = marker_char(entry.running, app.use_symbols);
                let row_style = if entry.running {
                    Style::default().bg(RUNNING_BG).fg(Color::Black)
                } else if is_selected {
                    Style::default()
                } else {
                    Style::default().fg(Color::Gray)
                };
                let pointer = pointer_str(is_selected, app.use_symbols);
                ListItem::new(Line::from(vec![
                    Span::styled(pointer, Style::default().fg(Color::Cyan)),
                    Span::styled(format!("{} ", marker), row_style),
                    Span::styled(truncate_left(&entry.path, available), row_style),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .title("Scripts")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(border_style),
            )
            .highlight_style(Style::default().add_modifier(Modifier::BOLD));
        let mut state = ListState::default();
        if !app.scripts.is_empty() {
            state.select(Some(app.selected.min(app.scripts.len() - 1)));
        }
        frame.render_stateful_widget(list, main[0], &mut state);

        if app.scripts.is_empty() {
            let inner = Block::default().borders(Borders::ALL).inner(main[0]);
            let empty = Paragraph::new("No scripts yet. Press a to add one.")
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(empty, inner);
        }

        if let Some(view) = app.log_view.as_mut() {
            let log_block = Block::default()
                .title(format!("Log - {}", display_name(&view.script)))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(border_style);
            let log_area = log_block.inner(main[1]);
            view.set_height(log_area.height as usize);
            let width = log_area.width as usize;
            let lines: Vec<Line> = view
                .visible()
                .iter()
                .map(|line| Line::from(truncate(line, width)))
                .collect();
            let is_empty = view.is_empty();
            frame.render_widget(Paragraph::new(Text::from(lines)).block(log_block), main[1]);
            if is_empty {
                let empty = Paragraph::new("Log is empty")
                    .style(Style::default().fg(Color::DarkGray));
                frame.render_widget(empty, log_area);
            }
        }

        let status_line = app.status_line(registry);
        let default_help = if app.use_symbols {
            "↑/↓ select | a add | d remove | s start | x stop | l log | o open dir | c copy log | q quit | ? help"
        } else {
            "Up/Down select | a add | d remove | s start | x stop | l log | o open dir | c copy log | q quit | ? help"
        };
        let (help_line, help_style) = if app.input_mode == InputMode::AddPath {
            let cursor = if app.use_symbols { "▌" } else { "|" };
            (
                format!("Add script: {}{} (Enter to add, Esc to cancel)", app.input, cursor),
                Style::default().fg(Color::White),
            )
        } else {
            match app.status_message() {
                Some((text, StatusLevel::Warning)) => {
                    (text.to_string(), Style::default().fg(Color::Yellow))
                }
                Some((text, StatusLevel::Info)) => {
                    (text.to_string(), Style::default().fg(Color::Green))
                }
                None => (default_help.to_string(), Style::default().fg(Color::DarkGray)),
            }
        };
        let status = Paragraph::new(Text::from(vec![
            Line::from(Span::raw(status_line)),
            Line::from(Span::styled(help_line, help_style)),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(border_style),
        );
        frame.render_widget(status, vertical[1]);

        if app.show_help {
            let popup_area = centered_rect(60, 60, area);
            let help_text = [
                "Navigation:",
                "  Up/Down    Select script",
                "  Tab        Cycle selection",
                "  PageUp/Dn  Scroll log",
                "  Home/End   Scroll log to top/bottom",
                "",
                "Actions:",
                "  a          Add script",
                "  d / Del    Remove selected",
                "  s / Enter  Start selected",
                "  x          Stop selected",
                "  l          Show log",
                "  o          Open containing folder",
                "  c          Copy log to clipboard",
                "  Esc        Close log / help",
                "",
                "General:",
                "  ?          Toggle this help",
                "  q          Stop all scripts and quit",
            ]
            .join("\n");

            let help_block = Paragraph::new(help_text)
                .block(
                    Block::default()
                        .title("Help")
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded),
                )
                .style(Style::default().bg(Color::DarkGray).fg(Color::White));
            frame.render_widget(Clear, popup_area);
            frame.render_widget(help_block, popup_area);
        }
    })?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn window_title(app: &App) -> String {
    match app.selected_entry() {
        Some(entry) => format!("scriptrack · {}", display_name(&entry.path)),
        None => "scriptrack".to_string(),
    }
}

fn marker_char(running: bool, use_symbols: bool) -> char {
    match (running, use_symbols) {
        (true, true) => '▲',
        (false, true) => '·',
        (true, false) => 'R',
        (false, false) => '.',
    }
}

fn pointer_str(selected: bool, use_symbols: bool) -> &'static str {
    match (selected, use_symbols) {
        (false, _) => "  ",
        (true, true) => "▶ ",
        (true, false) => "> ",
    }
}

fn truncate(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out = text.chars().take(max.saturating_sub(1)).collect::<String>();
    out.push('~');
    out
}

/// Truncates from the front so the file name stays visible.
fn truncate_left(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let mut out = String::from("~");
    out.extend(text.chars().skip(count - max.saturating_sub(1)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("abcdef", 4), "abc~");
        assert_eq!(truncate("abc", 4), "abc");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn truncate_left_keeps_file_name() {
        assert_eq!(truncate_left("/very/long/path/job.py", 8), "~/job.py");
        assert_eq!(truncate_left("/a.py", 8), "/a.py");
    }

    #[test]
    fn markers_follow_symbol_setting() {
        assert_eq!(marker_char(true, true), '▲');
        assert_eq!(marker_char(false, false), '.');
        assert_eq!(marker_char(true, false), 'R');
    }

    #[test]
    fn pointer_is_ascii_without_symbols() {
        assert_eq!(pointer_str(true, false), "> ");
        assert_eq!(pointer_str(true, true), "▶ ");
        assert_eq!(pointer_str(false, false), "  ");
    }
}
