//! Where finished summaries live.
//!
//! A store maps a document id (the source file stem) to its final summary.
//! The batch runner checks it before summarizing so an existing summary is
//! never regenerated unless the run asks for it.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid document id: {0:?}")]
    InvalidId(String),
    #[error("no summary stored for {0:?}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait SummaryStore: Send + Sync {
    fn has(&self, id: &str) -> Result<bool, StoreError>;
    fn get(&self, id: &str) -> Result<String, StoreError>;
    /// Store `summary` under `id`, replacing any previous summary.
    fn put(&self, id: &str, summary: &str) -> Result<(), StoreError>;
}

/// Reject ids that would escape the store directory or name nothing.
fn validate_id(id: &str) -> Result<(), StoreError> {
    let bad = id.trim().is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Markdown files named `<id>_summary.md` in one directory.
#[derive(Debug, Clone)]
pub struct FsSummaryStore {
    dir: PathBuf,
}

impl FsSummaryStore {
    pub const SUFFIX: &'static str = "_summary.md";

    /// Open (creating if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{id}{}", Self::SUFFIX)))
    }
}

impl SummaryStore for FsSummaryStore {
    fn has(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(id)?.is_file())
    }

    fn get(&self, id: &str) -> Result<String, StoreError> {
        let path = self.path_for(id)?;
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, id: &str, summary: &str) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        // Write beside the target and rename so readers never see a partial file.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(summary.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        tracing::debug!(path = %path.display(), bytes = summary.len(), "summary written");
        Ok(())
    }
}

/// In-memory store for tests and library callers that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Io(std::io::Error::other("memory store lock poisoned")))
    }
}

impl SummaryStore for MemoryStore {
    fn has(&self, id: &str) -> Result<bool, StoreError> {
        validate_id(id)?;
        Ok(self.lock()?.contains_key(id))
    }

    fn get(&self, id: &str) -> Result<String, StoreError> {
        validate_id(id)?;
        self.lock()?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn put(&self, id: &str, summary: &str) -> Result<(), StoreError> {
        validate_id(id)?;
        self.lock()?.insert(id.to_string(), summary.to_string());
        Ok(())
    }
}
