//! On-disk command history.
//!
//! History lives in the XDG data directory as a small JSON file. Loading is
//! lenient (a missing or malformed file means empty history) and saving is
//! best-effort: persistence failures must never break command execution.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_MAX_HISTORY: usize = 100;

/// The persisted payload, also mirrored into replies.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct History {
    #[serde(default)]
    pub last_command: String,
    #[serde(default)]
    pub history: Vec<String>,
}

impl History {
    /// Record a command as most recent: deduplicate, push to the front, and
    /// truncate to `limit` (at least one entry is always kept).
    pub fn record(&mut self, command: &str, limit: usize) {
        self.history.retain(|entry| entry != command);
        self.history.insert(0, command.to_string());
        self.history.truncate(limit.max(1));
        self.last_command = command.to_string();
    }
}

/// Loads and saves [`History`] at a fixed path.
pub struct HistoryStore {
    path: Option<PathBuf>,
}

impl HistoryStore {
    /// Store rooted at the XDG data directory
    /// (`~/.local/share/termbuddy/history.json` by default).
    pub fn open() -> Self {
        let dirs = xdg::BaseDirectories::with_prefix("termbuddy");
        match dirs.place_data_file("history.json") {
            Ok(path) => Self { path: Some(path) },
            Err(err) => {
                warn!(%err, "history directory unavailable, running without persistence");
                Self { path: None }
            }
        }
    }

    /// Store at an explicit file path.
    pub fn at(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Load history, falling back to defaults when the file is missing or
    /// malformed.
    pub fn load(&self) -> History {
        let Some(path) = &self.path else {
            return History::default();
        };
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(%err, "history file malformed, starting fresh");
                History::default()
            }),
            Err(_) => History::default(),
        }
    }

    /// Persist the payload. Failures are logged and swallowed.
    pub fn save(&self, history: &History) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent()
            && let Err(err) = std::fs::create_dir_all(parent)
        {
            warn!(%err, "failed to create history directory");
            return;
        }
        match serde_json::to_string_pretty(history) {
            Ok(contents) => {
                if let Err(err) = std::fs::write(path, contents) {
                    warn!(%err, "failed to write history file");
                }
            }
            Err(err) => warn!(%err, "failed to serialize history"),
        }
    }

}
