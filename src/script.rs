//! The user's script list.
//!
//! `ScriptList` owns the rows shown in the list view (`ScriptEntry`) and writes the full
//! list back through its `FileListStore` after every add or remove.

use anyhow::Result;

use crate::store::FileListStore;

/// A single row of the script list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    /// Path of the script, also the text shown for the row.
    pub path: String,
    /// Visual "running" marker. Set on start, cleared on stop or when the monitor sees an exit.
    pub running: bool,
}

impl ScriptEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            running: false,
        }
    }
}

/// Ordered, persisted list of scripts. Duplicate paths are allowed.
#[derive(Debug)]
pub struct ScriptList {
    entries: Vec<ScriptEntry>,
    store: FileListStore,
}

impl ScriptList {
    /// Loads the list from `store`.
    pub fn load(store: FileListStore) -> Result<Self> {
        let entries = store.load()?.into_iter().map(ScriptEntry::new).collect();
        Ok(Self { entries, store })
    }

    pub fn store(&self) -> &FileListStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ScriptEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptEntry> {
        self.entries.iter()
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    /// Appends `path` and persists. The in-memory list is left untouched if the write fails.
    pub fn add(&mut self, path: impl Into<String>) -> Result<()> {
        let path = path.into();
        self.entries.push(ScriptEntry::new(path.clone()));
        if let Err(err) = self.persist() {
            self.entries.pop();
            return Err(err);
        }
        tracing::info!(path = %path, "script added");
        Ok(())
    }

    /// Removes the row at `index` and persists.
    pub fn remove(&mut self, index: usize) -> Result<Option<ScriptEntry>> {
        if index >= self.entries.len() {
            return Ok(None);
        }
        let removed = self.entries.remove(index);
        if let Err(err) = self.persist() {
            self.entries.insert(index, removed);
            return Err(err);
        }
        tracing::info!(path = %removed.path, "script removed");
        Ok(Some(removed))
    }

    /// Removes the first row whose text is `path`.
    pub fn remove_path(&mut self, path: &str) -> Result<Option<ScriptEntry>> {
        match self.entries.iter().position(|e| e.path == path) {
            Some(index) => self.remove(index),
            None => Ok(None),
        }
    }

    /// Sets the running marker on every row whose text equals `path`.
    pub fn set_running(&mut self, path: &str, running: bool) {
        for entry in self.entries.iter_mut().filter(|e| e.path == path) {
            entry.running = running;
        }
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.paths())
    }
}
