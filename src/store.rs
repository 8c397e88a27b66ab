//! Flat-file persistence for the script list.
//!
//! The list is stored one path per line with no trailing newline. Every save rewrites the
//! whole file through a temporary sibling that is renamed over the target, so a crash
//! mid-write leaves either the old list or the new one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct FileListStore {
    path: PathBuf,
}

impl FileListStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every stored path. A missing file is an empty list.
    pub fn load(&self) -> Result<Vec<String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read list file {}", self.path.display()))
            }
        };
        Ok(parse_list(&raw))
    }

    /// Replaces the stored list with `entries`.
    pub fn save(&self, entries: &[String]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        tmp.write_all(entries.join("\n").as_bytes())
            .with_context(|| format!("failed to write list file {}", self.path.display()))?;
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("failed to flush list file {}", self.path.display()))?;
        tmp.persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to replace list file {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), entries = entries.len(), "list saved");
        Ok(())
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
