//! Per-group welcome texts, persisted as a JSON object `{ groupId: text }`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AppError;
use crate::knowledge::store::write_json_atomic;

#[derive(Debug)]
pub struct WelcomeBook {
    path: PathBuf,
    messages: BTreeMap<String, String>,
}

impl WelcomeBook {
    /// Load from `path`; an absent file is an empty book.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self { path, messages: BTreeMap::new() });
        }
        let data = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        let messages: BTreeMap<String, String> = serde_json::from_str(&data)
            .map_err(|e| AppError::Config(format!("malformed {}: {e}", path.display())))?;
        info!(path = %path.display(), groups = messages.len(), "welcome messages loaded");
        Ok(Self { path, messages })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, chat_id: &str) -> Option<&str> {
        self.messages.get(chat_id).map(String::as_str)
    }

    /// Set the welcome text for `chat_id` and persist the whole book.
    ///
    /// The in-memory value is kept even when the write fails.
    pub fn set(&mut self, chat_id: &str, text: &str) -> Result<(), AppError> {
        self.messages.insert(chat_id.to_string(), text.to_string());
        write_json_atomic(&self.path, &self.messages)
            .map_err(|e| AppError::Config(format!("cannot write {}: {e}", self.path.display())))
    }
}
