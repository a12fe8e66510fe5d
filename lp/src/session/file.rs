//! Signed-in identity persisted between CLI invocations

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    user_id: UserId,
    signed_in_at: DateTime<Utc>,
}

pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored identity, if any
    pub fn load(&self) -> Result<Option<UserId>> {
        debug!(path = %self.path.display(), "SessionFile::load: called");
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).context("Failed to read session file")?;
        let stored: StoredSession = serde_json::from_str(&content).context("Failed to parse session file")?;
        Ok(Some(stored.user_id))
    }

    pub fn save(&self, user: &UserId) -> Result<()> {
        debug!(%user, "SessionFile::save: called");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let stored = StoredSession {
            user_id: user.clone(),
            signed_in_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&stored).context("Failed to serialize session")?;
        fs::write(&self.path, content).context("Failed to write session file")
    }

    pub fn clear(&self) -> Result<()> {
        debug!("SessionFile::clear: called");
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_load_clear() {
        let dir = tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("nested").join("session.json"));

        assert_eq!(file.load().unwrap(), None);
        file.save(&UserId::new("u1")).unwrap();
        assert_eq!(file.load().unwrap(), Some(UserId::new("u1")));

        file.clear().unwrap();
        assert_eq!(file.load().unwrap(), None);
        file.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "garbage").unwrap();
        assert!(SessionFile::new(path).load().is_err());
    }
}
