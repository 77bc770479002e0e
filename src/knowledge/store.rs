//! JSON file persistence for the knowledge base.
//!
//! File shape: a pretty-printed array of `{ "keywords": [...], "reply": "..." }`.
//! Every save rewrites the whole file through a sibling `*.tmp` file and a
//! rename, so readers never observe a half-written table.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::AppError;
use super::{KnowledgeBase, KnowledgeEntry};

/// Handle to the on-disk knowledge file. Holds no data itself.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    path: PathBuf,
}

impl KnowledgeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the knowledge base, writing seed data when the file is absent.
    ///
    /// An existing file that cannot be read or parsed is an error; callers
    /// treat it as fatal at startup.
    pub fn load(&self) -> Result<KnowledgeBase, AppError> {
        if !self.path.exists() {
            let seed = KnowledgeBase::seed();
            self.save(&seed)?;
            info!(path = %self.path.display(), entries = seed.len(), "knowledge file created with seed data");
            return Ok(seed);
        }

        let data = fs::read_to_string(&self.path).map_err(|e| {
            AppError::Knowledge(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let entries: Vec<KnowledgeEntry> = serde_json::from_str(&data).map_err(|e| {
            AppError::Knowledge(format!("malformed {}: {e}", self.path.display()))
        })?;

        let mut kb = KnowledgeBase::new(entries);
        let dropped = kb.normalize();
        if dropped > 0 {
            warn!(path = %self.path.display(), dropped, "dropped knowledge entries without keywords");
        }
        info!(path = %self.path.display(), entries = kb.len(), "knowledge base loaded");
        Ok(kb)
    }

    /// Overwrite the knowledge file with `kb`.
    pub fn save(&self, kb: &KnowledgeBase) -> Result<(), AppError> {
        write_json_atomic(&self.path, kb.entries())
            .map_err(|e| AppError::Knowledge(format!("cannot write {}: {e}", self.path.display())))
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
/// Creates the parent directory when missing.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}
