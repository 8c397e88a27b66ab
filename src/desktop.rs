//! Hand-offs to the desktop environment: clipboard and file manager.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};

use crate::launcher::absolute_path;

pub fn copy_text(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("failed to access clipboard")?;
    clipboard
        .set_text(text.to_string())
        .context("failed to set clipboard text")?;
    Ok(())
}

/// Opens the directory containing `script` in the platform file manager.
pub fn open_containing_dir(script: &str) -> Result<()> {
    let script = absolute_path(script)?;
    let dir = script.parent().unwrap_or_else(|| Path::new("."));
    let opener = file_manager();
    tokio::process::Command::new(opener)
        .arg(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to run {} {}", opener, dir.display()))?;
    Ok(())
}

fn file_manager() -> &'static str {
    if cfg!(windows) {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}
