//! Durable storage of close-tracking entries.
//!
//! The store always holds a full snapshot: entry counts are bounded by the
//! number of concurrently open threads, so every save rewrites the file.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{domain::Entry, errors::Error, Result};

pub trait EntryStore: Send + Sync {
    /// Persisted entries, in stored order. Missing state is an empty list.
    fn load(&self) -> Result<Vec<Entry>>;

    /// Replace the persisted state with `entries`.
    fn save_all(&self, entries: &[Entry]) -> Result<()>;
}

/// JSON file store (`AutoCloseData{suffix}.json`).
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl EntryStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Entry>> {
        if !self.path.exists() {
            info!(
                "{} will be created when threads are tracked. Do not modify or delete this file.",
                self.path.display()
            );
            return Ok(Vec::new());
        }

        let txt = fs::read_to_string(&self.path)?;
        if txt.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str::<Vec<Entry>>(&txt).map_err(|e| Error::CorruptState {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn save_all(&self, entries: &[Entry]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let tmp_path = self.tmp_path();
        let json = serde_json::to_string(entries)?;

        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(json.as_bytes())?;
        tmp.sync_all()?;

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
