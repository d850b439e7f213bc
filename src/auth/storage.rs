//! Durable session persistence.
//!
//! The persisted session record is the single piece of state shared across
//! browsing contexts: only logout and a successful login/refresh may write
//! it, and readers re-read it fresh on every decision because another context
//! may remove it at any time. A watch channel carries the "token was removed
//! elsewhere" signal so the liveness monitor can react without waiting for
//! its next tick.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::models::User;

/// Session file name in the state directory
const SESSION_FILE: &str = "session.json";

/// The unit of persisted session state. Written and cleared as a whole so the
/// token and the user snapshot can never go out of sync on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub access_token: String,
    pub user: Option<User>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(access_token: String, user: Option<User>) -> Self {
        Self {
            access_token,
            user,
            created_at: Utc::now(),
        }
    }
}

/// Storage backend for the persisted session.
///
/// Implementations must be cheap to read: callers re-read on every guard and
/// monitor decision instead of caching.
pub trait SessionStorage: Send + Sync {
    /// Read the current record, if any.
    fn load(&self) -> Result<Option<SessionRecord>>;

    /// Replace the record as a single unit.
    fn store(&self, record: &SessionRecord) -> Result<()>;

    /// Remove the record as a single unit.
    fn clear(&self) -> Result<()>;

    /// Watch for external-removal signals. The value is a counter; any change
    /// means a removal was signalled.
    fn removal_events(&self) -> watch::Receiver<u64>;

    /// Report that the record was removed by another context. Hosts wire
    /// their own storage-event source (e.g. a browser storage listener or a
    /// file watcher) into this.
    fn signal_external_removal(&self);

    /// Fresh read of the bearer token. Read errors count as "no token".
    fn token(&self) -> Option<String> {
        self.load().ok().flatten().map(|r| r.access_token)
    }
}

/// File-backed storage, one JSON file in the application state directory.
pub struct FileSessionStorage {
    state_dir: PathBuf,
    removal_tx: watch::Sender<u64>,
}

impl FileSessionStorage {
    pub fn new(state_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&state_dir)
            .with_context(|| format!("Failed to create state directory {}", state_dir.display()))?;
        let (removal_tx, _) = watch::channel(0);
        Ok(Self {
            state_dir,
            removal_tx,
        })
    }

    fn session_path(&self) -> PathBuf {
        self.state_dir.join(SESSION_FILE)
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<SessionRecord>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let record: SessionRecord =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(record))
    }

    fn store(&self, record: &SessionRecord) -> Result<()> {
        let contents = serde_json::to_string_pretty(record)?;
        std::fs::write(self.session_path(), contents).context("Failed to write session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }

    fn removal_events(&self) -> watch::Receiver<u64> {
        self.removal_tx.subscribe()
    }

    fn signal_external_removal(&self) {
        self.removal_tx.send_modify(|n| *n += 1);
    }
}

/// In-memory storage for tests and hosts without a filesystem.
pub struct MemorySessionStorage {
    record: Mutex<Option<SessionRecord>>,
    removal_tx: watch::Sender<u64>,
}

impl Default for MemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        let (removal_tx, _) = watch::channel(0);
        Self {
            record: Mutex::new(None),
            removal_tx,
        }
    }

    /// Simulate another context removing the session: drop the record and
    /// fire the removal signal, as a storage-event listener would.
    pub fn remove_externally(&self) {
        *self.lock() = None;
        self.signal_external_removal();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<SessionRecord>> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<SessionRecord>> {
        Ok(self.lock().clone())
    }

    fn store(&self, record: &SessionRecord) -> Result<()> {
        *self.lock() = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock() = None;
        Ok(())
    }

    fn removal_events(&self) -> watch::Receiver<u64> {
        self.removal_tx.subscribe()
    }

    fn signal_external_removal(&self) {
        self.removal_tx.send_modify(|n| *n += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};

    fn sample_user() -> User {
        User {
            id: "u-1".into(),
            email: "t@praktijk.nl".into(),
            role: Role::Therapist,
            two_factor_enabled: false,
            two_factor_setup_completed: false,
        }
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSessionStorage::new(dir.path().to_path_buf()).unwrap();

        assert!(storage.load().unwrap().is_none());
        assert!(storage.token().is_none());

        let record = SessionRecord::new("tok-abc".into(), Some(sample_user()));
        storage.store(&record).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "tok-abc");
        assert_eq!(loaded.user, Some(sample_user()));
        assert_eq!(storage.token().as_deref(), Some("tok-abc"));
    }

    #[test]
    fn test_file_storage_clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSessionStorage::new(dir.path().to_path_buf()).unwrap();

        storage
            .store(&SessionRecord::new("tok".into(), None))
            .unwrap();
        storage.clear().unwrap();

        assert!(storage.load().unwrap().is_none());
        // Clearing an already-empty store is fine.
        storage.clear().unwrap();
    }

    #[test]
    fn test_session_record_uses_storage_key_names() {
        let record = SessionRecord::new("tok".into(), None);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"accessToken\""));
        assert!(json.contains("\"user\""));
    }

    #[tokio::test]
    async fn test_memory_storage_removal_signal() {
        let storage = MemorySessionStorage::new();
        storage
            .store(&SessionRecord::new("tok".into(), None))
            .unwrap();

        let mut events = storage.removal_events();
        storage.remove_externally();

        events.changed().await.unwrap();
        assert!(storage.token().is_none());
    }
}
