//! Reading and displaying script logs.
//!
//! `read_log` returns the raw contents of `<script>.log`. `LogView` holds a sanitized,
//! scrollable copy for the TUI and re-reads the file on demand so a running script can be
//! tailed.

use std::fs;
use std::io::ErrorKind;

use anyhow::{Context, Result};
use strip_ansi_escapes::strip;

use crate::error::ScriptError;
use crate::launcher::log_path;

/// Reads the whole log of `script`. Fails with `ScriptError::LogMissing` if there is none.
pub fn read_log(script: &str) -> Result<String> {
    let path = log_path(script);
    match fs::read(&path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(ScriptError::LogMissing {
            path: script.to_string(),
        }
        .into()),
        Err(err) => Err(err).with_context(|| format!("failed to read log {}", path.display())),
    }
}

/// Removes ANSI escape codes. Invalid UTF-8 sequences are replaced.
pub fn sanitize_text(text: &str) -> String {
    let stripped = strip(text.as_bytes());
    String::from_utf8_lossy(&stripped).to_string()
}

/// Keeps only what a terminal would show after carriage returns (progress bars and such).
fn strip_carriage(text: &str) -> String {
    text.rsplit('\r').next().unwrap_or("").to_string()
}

/// A scrollable view of one script's log.
#[derive(Debug, Clone)]
pub struct LogView {
    /// Script whose log is shown.
    pub script: String,
    lines: Vec<String>,
    /// Index of the first visible line.
    pub scroll: usize,
    /// Whether the view sticks to the end as the log grows.
    pub follow: bool,
    height: usize,
}

impl LogView {
    /// Opens the log of `script`, positioned at the end.
    pub fn open(script: &str) -> Result<Self> {
        let mut view = Self {
            script: script.to_string(),
            lines: Vec::new(),
            scroll: 0,
            follow: true,
            height: 1,
        };
        view.load(read_log(script)?);
        Ok(view)
    }

    /// Re-reads the log file. A log removed in the meantime keeps the last contents.
    pub fn refresh(&mut self) -> Result<()> {
        match read_log(&self.script) {
            Ok(raw) => {
                self.load(raw);
                Ok(())
            }
            Err(err) => match err.downcast_ref::<ScriptError>() {
                Some(ScriptError::LogMissing { .. }) => Ok(()),
                _ => Err(err),
            },
        }
    }

    fn load(&mut self, raw: String) {
        self.lines = raw
            .lines()
            .map(|line| sanitize_text(&strip_carriage(line)))
            .collect();
        if self.follow {
            self.scroll_to_end();
        } else {
            self.scroll = self.scroll.min(self.max_scroll());
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Sets the number of visible rows, keeping the end pinned when following.
    pub fn set_height(&mut self, height: usize) {
        self.height = height.max(1);
        if self.follow {
            self.scroll_to_end();
        } else {
            self.scroll = self.scroll.min(self.max_scroll());
        }
    }

    pub fn visible(&self) -> &[String] {
        let start = self.scroll.min(self.lines.len());
        let end = (start + self.height).min(self.lines.len());
        &self.lines[start..end]
    }

    pub fn scroll_up(&mut self, amount: usize) {
        self.follow = false;
        self.scroll = self.scroll.saturating_sub(amount);
    }

    pub fn scroll_down(&mut self, amount: usize) {
        self.scroll = (self.scroll + amount).min(self.max_scroll());
        self.follow = self.scroll == self.max_scroll();
    }

    pub fn scroll_to_top(&mut self) {
        self.follow = false;
        self.scroll = 0;
    }

    pub fn scroll_to_end(&mut self) {
        self.follow = true;
        self.scroll = self.max_scroll();
    }

    pub fn page(&self) -> usize {
        self.height
    }

    fn max_scroll(&self) -> usize {
        self.lines.len().saturating_sub(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_with_log(dir: &tempfile::TempDir, log: &str) -> String {
        let script = dir.path().join("job.py").to_string_lossy().to_string();
        fs::write(log_path(&script), log).unwrap();
        script
    }

    #[test]
    fn missing_log_is_an_error_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("never.py").to_string_lossy().to_string();
        let err = read_log(&script).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScriptError>(),
            Some(ScriptError::LogMissing { .. })
        ));
        assert!(LogView::open(&script).is_err());
    }

    #[test]
    fn empty_log_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let script = script_with_log(&dir, "");
        assert_eq!(read_log(&script).unwrap(), "");
        assert!(LogView::open(&script).unwrap().is_empty());
    }

    #[test]
    fn view_opens_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (1..=10).map(|i| format!("line {}\n", i)).collect();
        let script = script_with_log(&dir, &body);
        let mut view = LogView::open(&script).unwrap();
        view.set_height(3);
        assert_eq!(view.visible(), &["line 8", "line 9", "line 10"]);
        view.scroll_to_top();
        assert_eq!(view.visible()[0], "line 1");
        view.scroll_down(100);
        assert!(view.follow);
        assert_eq!(view.visible()[2], "line 10");
    }

    #[test]
    fn view_strips_ansi_and_carriage_returns() {
        let dir = tempfile::tempdir().unwrap();
        let script = script_with_log(&dir, "\u{1b}[32mok\u{1b}[0m\n10%\r50%\r100%\n");
        let view = LogView::open(&script).unwrap();
        assert_eq!(view.lines(), &["ok", "100%"]);
    }

    #[test]
    fn refresh_tails_growing_log() {
        let dir = tempfile::tempdir().unwrap();
        let script = script_with_log(&dir, "a\nb\n");
        let mut view = LogView::open(&script).unwrap();
        view.set_height(1);
        fs::write(log_path(&script), "a\nb\nc\n").unwrap();
        view.refresh().unwrap();
        assert_eq!(view.visible(), &["c"]);
    }

    #[test]
    fn refresh_keeps_position_when_not_following() {
        let dir = tempfile::tempdir().unwrap();
        let script = script_with_log(&dir, "a\nb\nc\n");
        let mut view = LogView::open(&script).unwrap();
        view.set_height(1);
        view.scroll_up(1);
        let scroll = view.scroll;
        fs::write(log_path(&script), "a\nb\nc\nd\n").unwrap();
        view.refresh().unwrap();
        assert_eq!(view.scroll, scroll);
        assert!(!view.follow);
    }

    #[test]
    fn sanitize_text_strips_escapes_only() {
        assert_eq!(sanitize_text("\u{1b}[1mx\u{1b}[0m y"), "x y");
        assert_eq!(sanitize_text("plain"), "plain");
    }
}
