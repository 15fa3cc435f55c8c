use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;
use crate::models::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user: User,
    /// Login time, epoch ms.
    pub timestamp: i64,
}

/// The logged-in subscriber, kept on disk between runs.
pub struct SessionStore {
    path: PathBuf,
    duration_ms: i64,
}

impl SessionStore {
    pub fn new(cfg: &Config) -> Self {
        Self::at(cfg.session_file(), cfg.session_duration_hours * 3_600_000)
    }

    pub fn at(path: impl Into<PathBuf>, duration_ms: i64) -> Self {
        Self {
            path: path.into(),
            duration_ms,
        }
    }

    /// The stored session if it is still inside its validity window.
    /// Expired or unreadable sessions are removed.
    pub fn restore(&self, now_ms: i64) -> Option<User> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<StoredSession>(&content) {
            Ok(session) if now_ms - session.timestamp < self.duration_ms => {
                debug!("Restored session for {}", session.user.name);
                Some(session.user)
            }
            Ok(_) => {
                info!("Session expired, login required");
                self.clear();
                None
            }
            Err(e) => {
                debug!("Discarding corrupt session: {}", e);
                self.clear();
                None
            }
        }
    }

    pub fn save(&self, user: &User, now_ms: i64) {
        let session = StoredSession {
            user: user.clone(),
            timestamp: now_ms,
        };
        write_json(&self.path, &session);
    }

    pub fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Sound stays off until the subscriber turns it on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub sound_enabled: bool,
    pub risk_accepted: bool,
}

impl Preferences {
    pub fn load(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) {
        write_json(path, self);
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Ok(json) = serde_json::to_string_pretty(value) {
        let _ = fs::write(path, json);
    }
}
