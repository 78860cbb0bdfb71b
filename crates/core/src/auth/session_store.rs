//! File-based session persistence
//!
//! Keeps the current session as JSON on disk so it survives restarts.

use std::path::{Path, PathBuf};

use super::model::Session;
use crate::Result;

/// Stores at most one session in a JSON file
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Create a new FileSessionStore
    ///
    /// The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session, if any
    pub async fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let session = serde_json::from_str(&content)?;
        Ok(Some(session))
    }

    /// Replace the stored session
    pub async fn save(&self, session: &Session) -> Result<()> {
        let content = serde_json::to_string_pretty(session)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Remove the stored session. Clearing an empty store is a no-op.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;
    use tempfile::TempDir;

    fn sample_session() -> Session {
        Session {
            access_token: "access".into(),
            token_type: "bearer".into(),
            expires_in: 3600,
            expires_at: Some(1_700_000_000),
            refresh_token: "refresh".into(),
            user: User {
                id: "user-1".into(),
                email: Some("a@x.com".into()),
                email_confirmed_at: None,
            },
        }
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().join("session.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().join("nested").join("session.json"));

        store.save(&sample_session()).await.unwrap();

        let loaded = FileSessionStore::new(store.path()).load().await.unwrap();
        assert_eq!(loaded, Some(sample_session()));
    }

    #[tokio::test]
    async fn test_clear() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().join("session.json"));

        store.save(&sample_session()).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());

        // Second clear is harmless
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("session.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let result = FileSessionStore::new(&path).load().await;
        assert!(matches!(result, Err(crate::Error::Serialization(_))));
    }
}
