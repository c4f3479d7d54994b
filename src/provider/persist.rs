// Persisted provider session
// JSON session file so an existing session survives process restarts

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::types::Identity;

/// Provider session tokens as kept on disk between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub identity: Identity,
}

impl StoredSession {
    /// An expired stored session is treated as absent at bootstrap.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }
}

/// Load the stored session, if the file exists.
pub fn load(path: &Path) -> Result<Option<StoredSession>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file: {}", path.display()))?;
    let session: StoredSession = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse session file: {}", path.display()))?;

    Ok(Some(session))
}

/// Write the stored session, creating parent directories as needed.
pub fn store(path: &Path, session: &StoredSession) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create session directory: {}", parent.display()))?;
    }

    let raw = serde_json::to_string_pretty(session).context("Failed to serialize session")?;
    std::fs::write(path, raw)
        .with_context(|| format!("Failed to write session file: {}", path.display()))?;

    Ok(())
}

/// Remove the stored session. Missing file is fine.
pub fn clear(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("Failed to remove session file: {}", path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn stored(expires_at: Option<DateTime<Utc>>) -> StoredSession {
        StoredSession {
            access_token: "token-abc".to_string(),
            refresh_token: Some("refresh-def".to_string()),
            expires_at,
            identity: Identity {
                id: Uuid::new_v4(),
                email: "u1@example.com".to_string(),
            },
        }
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        assert!(load(&path).unwrap().is_none());
    }

    #[test]
    fn test_store_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.json");

        let session = stored(Some(Utc::now() + Duration::hours(1)));
        store(&path, &session).unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.access_token, session.access_token);
        assert_eq!(loaded.identity, session.identity);
        assert!(!loaded.is_expired());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        store(&path, &stored(None)).unwrap();
        clear(&path).unwrap();
        assert!(load(&path).unwrap().is_none());

        // Second clear: file already gone
        clear(&path).unwrap();
    }

    #[test]
    fn test_expiry_check() {
        assert!(stored(Some(Utc::now() - Duration::seconds(60))).is_expired());
        assert!(!stored(Some(Utc::now() + Duration::seconds(600))).is_expired());
        assert!(!stored(None).is_expired());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load(&path).is_err());
    }
}
