//! Durable client storage for session credentials.
//!
//! Holds the opaque access token handed over at login and, once resolved,
//! the user id, so later sessions skip the profile call. Stored at e.g.
//! `~/.dashvite/session.json`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persisted credentials. Token presence is the sole "logged in" signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredentials {
    pub access_token: Option<String>,
    pub user_id: Option<i64>,
}

impl StoredCredentials {
    /// Load from JSON file. Returns None if file missing or invalid.
    pub fn load(path: &Path) -> Option<Self> {
        let s = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&s).ok()
    }

    /// Save to JSON file. Creates parent dirs if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let s = serde_json::to_string_pretty(self)?;
        std::fs::write(path, s)?;
        Ok(())
    }
}

/// Default path for the credentials file.
pub fn default_credentials_path() -> std::path::PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".dashvite").join("session.json"))
        .unwrap_or_else(|| std::path::PathBuf::from("session.json"))
}

/// Remove the credentials file (logout). Missing file is fine.
pub fn clear_credentials(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("dashvite-storage-test-{}", uuid::Uuid::new_v4()))
            .join("session.json")
    }

    #[test]
    fn save_load_roundtrip_creates_parent_dirs() {
        let path = temp_path();
        let creds = StoredCredentials {
            access_token: Some("tok".to_string()),
            user_id: Some(7),
        };
        creds.save(&path).expect("save");
        let loaded = StoredCredentials::load(&path).expect("load");
        assert_eq!(loaded.access_token.as_deref(), Some("tok"));
        assert_eq!(loaded.user_id, Some(7));
    }

    #[test]
    fn load_missing_file_is_none() {
        assert!(StoredCredentials::load(&temp_path()).is_none());
    }

    #[test]
    fn clear_is_idempotent() {
        let path = temp_path();
        clear_credentials(&path).expect("clear missing");
        StoredCredentials::default().save(&path).expect("save");
        clear_credentials(&path).expect("clear existing");
        assert!(StoredCredentials::load(&path).is_none());
    }
}
