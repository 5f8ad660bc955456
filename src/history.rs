//! Saved conversations under the history directory.
//!
//! Each session is one pretty-printed JSON file. Files are named either by the
//! user or by a local timestamp (`YYYYmmdd_HHMMSS`), and only the newest
//! `max_sessions` files (by file name order) are kept.

use crate::config::Settings;
use crate::error::{AskError, Result};
use crate::llm::chat_session::ChatSession;
use crate::llm::models::LlmMessage;
use chrono::Local;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// On-disk form of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub model: String,
    pub messages: Vec<LlmMessage>,
    #[serde(default)]
    pub saved_at: String,
}

impl SavedSession {
    pub fn from_session(session: &ChatSession) -> Self {
        Self {
            model: session.model().to_string(),
            messages: session.messages().to_vec(),
            saved_at: Local::now().to_rfc3339(),
        }
    }
}

pub struct SessionStore {
    dir: PathBuf,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>, max_sessions: usize) -> Self {
        Self {
            dir: dir.into(),
            max_sessions,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.history_dir, settings.max_history_sessions)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a session and prune old ones. Returns the written path.
    pub fn save(&self, session: &ChatSession, name: Option<&str>) -> Result<PathBuf> {
        self.save_snapshot(&SavedSession::from_session(session), name)
    }

    pub fn save_snapshot(&self, saved: &SavedSession, name: Option<&str>) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let stem = match name {
            Some(name) => validate_name(name)?.to_string(),
            None => Local::now().format("%Y%m%d_%H%M%S").to_string(),
        };
        let path = self.dir.join(format!("{}.json", stem));

        fs::write(&path, serde_json::to_string_pretty(saved)?)?;
        info!("Session saved to {}", path.display());

        let removed = self.prune(&path)?;
        if removed > 0 {
            debug!("Pruned {} old session(s)", removed);
        }

        Ok(path)
    }

    /// Load a session by exact name, falling back to the newest partial match
    pub fn load(&self, name: &str) -> Result<(PathBuf, SavedSession)> {
        let name = validate_name(name)?;

        let exact = self.dir.join(format!("{}.json", name));
        let path = if exact.is_file() {
            exact
        } else {
            let pattern = format!("*{}*.json", Pattern::escape(name));
            self.matching_files(&pattern)?
                .pop()
                .ok_or_else(|| AskError::SessionNotFound(name.to_string()))?
        };

        let saved: SavedSession = serde_json::from_str(&fs::read_to_string(&path)?)?;
        debug!("Loaded {} messages from {}", saved.messages.len(), path.display());

        Ok((path, saved))
    }

    /// Names of all saved sessions in file name order
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .matching_files("*.json")?
            .iter()
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect())
    }

    /// Remove the oldest sessions beyond the limit. `keep` is never removed.
    fn prune(&self, keep: &Path) -> Result<usize> {
        let files = self.matching_files("*.json")?;
        if files.len() <= self.max_sessions {
            return Ok(0);
        }

        let excess = files.len() - self.max_sessions.max(1);
        let mut removed = 0;
        for old in files.iter().filter(|p| p.file_name() != keep.file_name()).take(excess) {
            fs::remove_file(old)?;
            removed += 1;
        }
        Ok(removed)
    }

    fn matching_files(&self, file_pattern: &str) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(vec![]);
        }

        let pattern = format!(
            "{}/{}",
            Pattern::escape(&self.dir.to_string_lossy()),
            file_pattern
        );
        let entries = glob::glob(&pattern)
            .map_err(|e| AskError::Config(format!("Bad session pattern {}: {}", pattern, e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Skipping unreadable session entry: {}", e);
                    None
                }
            })
            .filter(|p| p.is_file())
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(files)
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
        return Err(AskError::Config(format!("Invalid session name '{}'", name)));
    }
    Ok(name)
}
