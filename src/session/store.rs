// Copyright (c) 2025 MovieMind
// Licensed under the MIT License. See LICENSE file for details.

//! Durable credential storage.
//!
//! Persists the access token, the user snapshot, and the token metadata as
//! one JSON document so the three can only ever be written or cleared
//! together. Writes use a temp file plus atomic rename under an exclusive
//! lock on a sidecar lock file, so a crash mid-write never leaves a
//! half-written session behind.
//!
//! A document missing any of the three parts is treated as unauthenticated
//! and removed on load.

use anyhow::{Context, Result};
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::types::User;

/// File name of the credential document inside the store directory.
const CREDENTIALS_FILE: &str = "credentials.json";

/// Sidecar lock file guarding writes.
const LOCK_FILE: &str = "credentials.lock";

/// Lifetime bookkeeping persisted next to the token.
///
/// Remaining lifetime is always computed from these fields, never by
/// introspecting the opaque token itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Declared lifetime in seconds, as reported by the backend.
    pub expires_in: i64,
    /// Epoch seconds at which the token was stored.
    pub stored_at: i64,
    /// Token scheme, normally `bearer`.
    pub token_type: String,
}

impl TokenMetadata {
    /// Metadata for a token stored right now.
    pub fn issued_now(expires_in: i64, token_type: impl Into<String>) -> Self {
        Self {
            expires_in,
            stored_at: Utc::now().timestamp(),
            token_type: token_type.into(),
        }
    }

    /// Seconds elapsed since the token was stored.
    pub fn elapsed_secs(&self) -> i64 {
        Utc::now().timestamp() - self.stored_at
    }

    /// Seconds of declared lifetime left. Negative once past expiry.
    pub fn remaining_secs(&self) -> i64 {
        self.expires_in - self.elapsed_secs()
    }
}

/// The complete persisted session. All-or-nothing by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub user: User,
    pub metadata: TokenMetadata,
}

/// File-backed store for the persisted session.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// Store under an explicit directory. The directory is created lazily
    /// on first save.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the per-user default, `~/.moviemind/`.
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(Self::at(home.join(".moviemind")))
    }

    fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn acquire_exclusive_lock(&self) -> Result<File> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
            .with_context(|| format!("Failed to open lock file: {:?}", self.lock_path()))?;
        lock_file
            .lock_exclusive()
            .context("Failed to lock credential store")?;
        Ok(lock_file)
    }

    /// Load the persisted session, if a complete one exists.
    ///
    /// A document that fails to parse is removed and reported as absent, so
    /// a corrupt store degrades to "not authenticated" instead of an error
    /// loop at startup.
    pub fn load(&self) -> Result<Option<StoredSession>> {
        let path = self.credentials_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credential file: {:?}", path))?;

        match serde_json::from_str::<StoredSession>(&content) {
            Ok(session) if !session.access_token.is_empty() => Ok(Some(session)),
            Ok(_) => {
                tracing::warn!("CREDENTIALS_INVALID | reason=empty_token");
                self.clear()?;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("CREDENTIALS_INVALID | reason=parse_error error={}", e);
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Persist a complete session, replacing any previous one.
    pub fn save(&self, session: &StoredSession) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create store directory: {:?}", self.dir))?;

        let _lock = self.acquire_exclusive_lock()?;

        let path = self.credentials_path();
        let temp_path = path.with_extension("tmp");

        let content =
            serde_json::to_string_pretty(session).context("Failed to serialize credentials")?;

        {
            let mut temp_file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
            temp_file
                .write_all(content.as_bytes())
                .context("Failed to write credentials")?;
            temp_file
                .sync_all()
                .context("Failed to sync credentials to disk")?;
        }

        // Atomic on POSIX, best-effort on Windows.
        fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to rename {:?} -> {:?}", temp_path, path))?;

        tracing::debug!(
            "CREDENTIALS_SAVED | user={} expires_in={}s",
            session.user.username,
            session.metadata.expires_in
        );

        Ok(())
    }

    /// Remove the persisted session. Idempotent.
    pub fn clear(&self) -> Result<()> {
        let path = self.credentials_path();
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove credential file: {:?}", path))?;
            tracing::debug!("CREDENTIALS_CLEARED");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        serde_json::from_str(r#"{"_id":"u1","username":"alex","email":"alex@example.com"}"#)
            .unwrap()
    }

    fn sample_session(expires_in: i64) -> StoredSession {
        StoredSession {
            access_token: "tok-abc".to_string(),
            user: sample_user(),
            metadata: TokenMetadata::issued_now(expires_in, "bearer"),
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path());

        store.save(&sample_session(3600)).unwrap();
        let loaded = store.load().unwrap().expect("session should be present");

        assert_eq!(loaded.access_token, "tok-abc");
        assert_eq!(loaded.user.username, "alex");
        assert_eq!(loaded.metadata.expires_in, 3600);
    }

    #[test]
    fn test_load_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path());

        store.save(&sample_session(60)).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_partial_document_rejected_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path());

        // Token without user or metadata must never read back as a session.
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(
            dir.path().join(CREDENTIALS_FILE),
            r#"{"access_token":"tok-abc"}"#,
        )
        .unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(!dir.path().join(CREDENTIALS_FILE).exists());
    }

    #[test]
    fn test_corrupt_document_rejected_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path());

        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(CREDENTIALS_FILE), "not json").unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(!dir.path().join(CREDENTIALS_FILE).exists());
    }

    #[test]
    fn test_remaining_secs_with_backdated_metadata() {
        let mut metadata = TokenMetadata::issued_now(3600, "bearer");
        metadata.stored_at -= 3301;
        assert!(metadata.remaining_secs() <= 299);
        assert!(metadata.remaining_secs() > 0);
    }
}
