//! Application state and UI logic.
//!
//! This module holds the `App` struct, the single owned state value every handler receives:
//! the script list, the selection, the open log view and the status bar. It also defines how
//! user input is translated into `AppAction`s, which the main loop executes against the
//! process registry.

use std::path::Path;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::launcher::absolute_path;
use crate::logview::LogView;
use crate::monitor::MonitorReport;
use crate::registry::{ProcessRegistry, StopOutcome, Transition};
use crate::script::{ScriptEntry, ScriptList};

/// Modes of user input interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Standard navigation mode.
    Normal,
    /// Typing the path of a script to add.
    AddPath,
}

/// Actions resulting from user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    None,
    Quit,
    /// Append a script (absolute path) to the list.
    Add(String),
    Remove(usize),
    Start(usize),
    Stop(usize),
    ShowLog(usize),
    /// Open the script's directory in the file manager.
    OpenDir(usize),
    /// Copy the open log to the clipboard.
    CopyLog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone)]
struct StatusMessage {
    text: String,
    at: Instant,
    ttl: Option<Duration>,
    level: StatusLevel,
}

#[derive(Debug)]
pub struct App {
    pub scripts: ScriptList,
    /// Index of the selected row.
    pub selected: usize,
    pub input_mode: InputMode,
    /// Buffer for the add-path prompt.
    pub input: String,
    /// Log of the selected script, when open.
    pub log_view: Option<LogView>,
    pub show_help: bool,
    pub use_symbols: bool,
    pub should_quit: bool,
    /// Width of the script list area (for mouse clicks).
    pub list_width: u16,
    status_message: Option<StatusMessage>,
}

impl App {
    pub fn new(scripts: ScriptList, use_symbols: bool) -> Self {
        Self {
            scripts,
            selected: 0,
            input_mode: InputMode::Normal,
            input: String::new(),
            log_view: None,
            show_help: false,
            use_symbols,
            should_quit: false,
            list_width: 0,
            status_message: None,
        }
    }

    pub fn selected_entry(&self) -> Option<&ScriptEntry> {
        self.scripts.get(self.selected)
    }

    /// Keeps the selection on a valid row after the list shrank.
    pub fn clamp_selection(&mut self) {
        if self.selected >= self.scripts.len() {
            self.selected = self.scripts.len().saturating_sub(1);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppAction {
        match self.input_mode {
            InputMode::AddPath => self.handle_add_input(key),
            InputMode::Normal => self.handle_normal_input(key),
        }
    }

    fn handle_add_input(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input.clear();
                AppAction::None
            }
            KeyCode::Enter => {
                let raw = std::mem::take(&mut self.input);
                self.input_mode = InputMode::Normal;
                let raw = raw.trim();
                if raw.is_empty() {
                    return AppAction::None;
                }
                match absolute_path(raw) {
                    Ok(path) => AppAction::Add(path.to_string_lossy().to_string()),
                    Err(err) => {
                        self.set_status_warning_for(err.to_string(), Duration::from_secs(3));
                        AppAction::None
                    }
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
                AppAction::None
            }
            KeyCode::Char(c) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    return AppAction::None;
                }
                self.input.push(c);
                AppAction::None
            }
            _ => AppAction::None,
        }
    }

    fn handle_normal_input(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                AppAction::Quit
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                AppAction::Quit
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if self.selected > 0 {
                    self.select(self.selected - 1);
                }
                AppAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.scripts.len() {
                    self.select(self.selected + 1);
                }
                AppAction::None
            }
            KeyCode::Tab => {
                if !self.scripts.is_empty() {
                    self.select((self.selected + 1) % self.scripts.len());
                }
                AppAction::None
            }
            KeyCode::Char('a') => {
                self.input_mode = InputMode::AddPath;
                self.input.clear();
                AppAction::None
            }
            KeyCode::Char('d') | KeyCode::Delete => self.on_selected(AppAction::Remove),
            KeyCode::Char('s') | KeyCode::Enter => self.on_selected(AppAction::Start),
            KeyCode::Char('x') => self.on_selected(AppAction::Stop),
            KeyCode::Char('l') => self.on_selected(AppAction::ShowLog),
            KeyCode::Char('o') => self.on_selected(AppAction::OpenDir),
            KeyCode::Char('c') => {
                if self.log_view.is_some() {
                    AppAction::CopyLog
                } else {
                    AppAction::None
                }
            }
            KeyCode::Esc => {
                self.show_help = false;
                self.log_view = None;
                AppAction::None
            }
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                AppAction::None
            }
            KeyCode::PageUp => {
                if let Some(view) = self.log_view.as_mut() {
                    view.scroll_up(view.page());
                }
                AppAction::None
            }
            KeyCode::PageDown => {
                if let Some(view) = self.log_view.as_mut() {
                    view.scroll_down(view.page());
                }
                AppAction::None
            }
            KeyCode::Home => {
                if let Some(view) = self.log_view.as_mut() {
                    view.scroll_to_top();
                }
                AppAction::None
            }
            KeyCode::End => {
                if let Some(view) = self.log_view.as_mut() {
                    view.scroll_to_end();
                }
                AppAction::None
            }
            _ => AppAction::None,
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> AppAction {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if mouse.column < self.list_width {
                    // Row 0 is the list border.
                    let row = mouse.row.saturating_sub(1) as usize;
                    if row < self.scripts.len() {
                        self.select(row);
                    }
                }
            }
            MouseEventKind::ScrollDown => {
                if let Some(view) = self.log_view.as_mut() {
                    view.scroll_down(3);
                }
            }
            MouseEventKind::ScrollUp => {
                if let Some(view) = self.log_view.as_mut() {
                    view.scroll_up(3);
                }
            }
            _ => {}
        }
        AppAction::None
    }

    fn on_selected(&self, action: fn(usize) -> AppAction) -> AppAction {
        if self.selected < self.scripts.len() {
            action(self.selected)
        } else {
            AppAction::None
        }
    }

    fn select(&mut self, index: usize) {
        self.selected = index;
        // A log view follows the selection.
        if self.log_view.is_some() {
            self.open_log(index);
        }
    }

    /// Opens the log of the row at `index`, reporting a missing log in the status bar.
    pub fn open_log(&mut self, index: usize) {
        let Some(path) = self.scripts.get(index).map(|e| e.path.clone()) else {
            return;
        };
        match LogView::open(&path) {
            Ok(view) => self.log_view = Some(view),
            Err(err) => {
                self.log_view = None;
                self.set_status_warning_for(err.to_string(), Duration::from_secs(3));
            }
        }
    }

    /// Re-reads the open log so a running script can be tailed.
    pub fn refresh_log(&mut self) {
        let Some(view) = self.log_view.as_mut() else {
            return;
        };
        if let Err(err) = view.refresh() {
            tracing::warn!(script = %view.script, error = %err, "log refresh failed");
        }
    }

    /// Applies a monitor report: clears the marker and announces the exit.
    pub fn on_report(&mut self, report: &MonitorReport) {
        self.scripts.set_running(&report.path, false);
        let name = display_name(&report.path);
        let message = match report.transition {
            Transition::Exited(Some(0)) => format!("{} exited successfully", name),
            Transition::Exited(Some(code)) => format!("{} exited with code {}", name, code),
            Transition::Exited(None) => format!("{} exited", name),
            Transition::Stopped(StopOutcome::Killed(_)) => {
                format!("{} ignored terminate and was killed", name)
            }
            Transition::Stopped(_) => format!("{} stopped", name),
        };
        match report.transition {
            Transition::Exited(Some(0)) | Transition::Stopped(StopOutcome::Exited(_)) => {
                self.set_status_message(message)
            }
            _ => self.set_status_warning_for(message, Duration::from_secs(5)),
        }
    }

    pub fn status_line(&self, registry: &ProcessRegistry) -> String {
        let Some(entry) = self.selected_entry() else {
            return format!("No scripts | list: {}", self.scripts.store().path().display());
        };
        let state = match registry.get(&entry.path) {
            None => "not started".to_string(),
            Some(handle) if handle.is_alive() => {
                let pid = handle
                    .pid
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".into());
                let verb = if handle.is_stopping() {
                    "stopping"
                } else {
                    "running"
                };
                format!(
                    "{} | pid: {} | up: {}",
                    verb,
                    pid,
                    format_duration(handle.started_at.elapsed())
                )
            }
            Some(handle) => match handle.exit.and_then(|e| e.code) {
                Some(code) => format!("exited ({})", code),
                None => "exited (-)".to_string(),
            },
        };
        format!(
            "{} | {} | {}/{}",
            entry.path,
            state,
            self.selected + 1,
            self.scripts.len()
        )
    }

    pub fn status_message(&self) -> Option<(&str, StatusLevel)> {
        if let Some(message) = &self.status_message {
            let still_visible = match message.ttl {
                Some(ttl) => message.at.elapsed() < ttl,
                None => true,
            };
            if still_visible {
                return Some((message.text.as_str(), message.level));
            }
        }
        None
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.set_status_message_with_level(message, StatusLevel::Info, Some(Duration::from_secs(3)));
    }

    pub fn set_status_warning_for(&mut self, message: impl Into<String>, ttl: Duration) {
        self.set_status_message_with_level(message, StatusLevel::Warning, Some(ttl));
    }

    pub fn set_status_warning_persistent(&mut self, message: impl Into<String>) {
        self.set_status_message_with_level(message, StatusLevel::Warning, None);
    }

    fn set_status_message_with_level(
        &mut self,
        message: impl Into<String>,
        level: StatusLevel,
        ttl: Option<Duration>,
    ) {
        self.status_message = Some(StatusMessage {
            text: message.into(),
            at: Instant::now(),
            ttl,
            level,
        });
    }
}

/// File name of a script path, for messages.
pub fn display_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::log_path;
    use crate::store::FileListStore;
    use crossterm::event::KeyEventKind;
    use std::fs;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn make_app(dir: &tempfile::TempDir, paths: &[&str]) -> App {
        let store = FileListStore::new(dir.path().join("file.txt"));
        let mut scripts = ScriptList::load(store).unwrap();
        for path in paths {
            scripts.add(*path).unwrap();
        }
        App::new(scripts, false)
    }

    #[test]
    fn add_prompt_yields_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = make_app(&dir, &[]);
        assert_eq!(app.handle_key(key(KeyCode::Char('a'))), AppAction::None);
        assert_eq!(app.input_mode, InputMode::AddPath);
        for c in "jobs/run.py".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        let action = app.handle_key(key(KeyCode::Enter));
        let expected = std::env::current_dir().unwrap().join("jobs/run.py");
        assert_eq!(action, AppAction::Add(expected.to_string_lossy().to_string()));
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.input.is_empty());
    }

    #[test]
    fn blank_add_prompt_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = make_app(&dir, &[]);
        app.handle_key(key(KeyCode::Char('a')));
        app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(app.handle_key(key(KeyCode::Enter)), AppAction::None);
    }

    #[test]
    fn selection_actions_target_selected_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = make_app(&dir, &["/a.py", "/b.py"]);
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.handle_key(key(KeyCode::Char('s'))), AppAction::Start(1));
        assert_eq!(app.handle_key(key(KeyCode::Char('x'))), AppAction::Stop(1));
        assert_eq!(app.handle_key(key(KeyCode::Char('d'))), AppAction::Remove(1));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected, 1);
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn empty_list_ignores_row_actions() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = make_app(&dir, &[]);
        assert_eq!(app.handle_key(key(KeyCode::Char('s'))), AppAction::None);
        assert_eq!(app.handle_key(key(KeyCode::Char('l'))), AppAction::None);
    }

    #[test]
    fn quit_sets_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = make_app(&dir, &[]);
        let mut event = key(KeyCode::Char('q'));
        event.kind = KeyEventKind::Press;
        assert_eq!(app.handle_key(event), AppAction::Quit);
        assert!(app.should_quit);
    }

    #[test]
    fn open_log_without_log_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("never.py").to_string_lossy().to_string();
        let mut app = make_app(&dir, &[&script]);
        app.open_log(0);
        assert!(app.log_view.is_none());
        let (text, level) = app.status_message().unwrap();
        assert!(text.contains("no log"));
        assert_eq!(level, StatusLevel::Warning);
    }

    #[test]
    fn log_view_follows_selection() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("one.py").to_string_lossy().to_string();
        let two = dir.path().join("two.py").to_string_lossy().to_string();
        fs::write(log_path(&one), "first\n").unwrap();
        fs::write(log_path(&two), "second\n").unwrap();
        let mut app = make_app(&dir, &[&one, &two]);
        app.open_log(0);
        assert_eq!(app.log_view.as_ref().unwrap().lines(), &["first"]);
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.log_view.as_ref().unwrap().lines(), &["second"]);
        assert_eq!(app.handle_key(key(KeyCode::Char('c'))), AppAction::CopyLog);
        app.handle_key(key(KeyCode::Esc));
        assert!(app.log_view.is_none());
    }

    #[test]
    fn report_clears_marker_and_sets_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = make_app(&dir, &["/srv/job.py"]);
        app.scripts.set_running("/srv/job.py", true);
        app.on_report(&MonitorReport {
            path: "/srv/job.py".to_string(),
            transition: Transition::Exited(Some(4)),
        });
        assert!(!app.scripts.get(0).unwrap().running);
        assert_eq!(app.status_message().unwrap().0, "job.py exited with code 4");
    }

    #[test]
    fn clamp_selection_after_removal() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = make_app(&dir, &["/a.py", "/b.py"]);
        app.selected = 1;
        app.scripts.remove(1).unwrap();
        app.clamp_selection();
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn format_duration_rolls_into_hours() {
        assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "1:02:05");
    }
}
