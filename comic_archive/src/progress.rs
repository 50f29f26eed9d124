//! Persistent reading progress, keyed by comic file path.
//!
//! The whole store is read at start-up and rewritten in one piece on every
//! save. One writer per store file is assumed.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::PROGRESS_FILE_NAME;
use crate::prelude::*;

pub type ProgressMap = BTreeMap<String, ProgressRecord>;

/// Lifecycle of the in-memory copy relative to the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Unloaded,
    Loaded,
    Dirty,
    Persisted,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProgressFile<T> {
    #[serde(default = "BTreeMap::new")]
    comics: BTreeMap<String, T>,
}

pub struct ProgressStore {
    path: PathBuf,
    records: ProgressMap,
    state: StoreState,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: ProgressMap::new(),
            state: StoreState::Unloaded,
        }
    }

    /// `~/.comic_shelf_progress.toml`, or the working directory when there is
    /// no home directory.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(PROGRESS_FILE_NAME)
    }

    /// Create and load in one step.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let mut store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    /// Replace the in-memory records with the content of the store file.
    ///
    /// A missing file is an empty store. Records with out-of-range values are
    /// skipped with a warning; a file that is not TOML at all is an error.
    pub fn load(&mut self) -> Result<&ProgressMap, ArchiveError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No progress store at {:?}, starting empty", self.path);
                self.records.clear();
                self.state = StoreState::Loaded;
                return Ok(&self.records);
            }
            Err(e) => return Err(e.into()),
        };

        let raw: ProgressFile<toml::Value> = toml::from_str(&text).map_err(|e| {
            ArchiveError::Store(format!("{}: {}", self.path.display(), e))
        })?;

        let mut records = ProgressMap::new();
        for (key, value) in raw.comics {
            match value.try_into::<ProgressRecord>() {
                Ok(record) if record.is_valid() => {
                    records.insert(key, record);
                }
                Ok(record) => log::warn!(
                    "Skipping progress for {}: progress {} out of range",
                    key,
                    record.progress
                ),
                Err(e) => log::warn!("Skipping progress for {}: {}", key, e),
            }
        }

        log::info!("Loaded {} progress entries from {:?}", records.len(), self.path);
        self.records = records;
        self.state = StoreState::Loaded;
        Ok(&self.records)
    }

    /// Rewrite the store file with the current records.
    ///
    /// The new content goes to a temporary file next to the store which then
    /// replaces it, so readers see either the old or the new store.
    pub fn save(&mut self) -> Result<(), ArchiveError> {
        let file = ProgressFile {
            comics: self.records.clone(),
        };
        let text = toml::to_string_pretty(&file)
            .map_err(|e| ArchiveError::Store(format!("Couldn't serialize: {}", e)))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| ArchiveError::Io(e.error))?;

        log::debug!("Saved {} progress entries to {:?}", self.records.len(), self.path);
        self.state = StoreState::Persisted;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ProgressRecord> {
        self.records.get(key)
    }

    pub fn update(&mut self, key: impl Into<String>, record: ProgressRecord) {
        self.records.insert(key.into(), record);
        self.state = StoreState::Dirty;
    }

    pub fn record_comic(&mut self, comic: &Comic) {
        self.update(comic.key(), comic.progress_record());
    }

    /// Seed a freshly scanned comic from its stored record, if any.
    pub fn apply_to(&self, comic: &mut Comic) {
        if let Some(record) = self.get(&comic.key()) {
            comic.restore(record);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<ProgressRecord> {
        let removed = self.records.remove(key);
        if removed.is_some() {
            self.state = StoreState::Dirty;
        }
        removed
    }

    pub fn records(&self) -> &ProgressMap {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
