//! On-disk settings document
//!
//! The document is always read and written whole. Reads go to disk on every
//! call so edits made by another process are picked up; writes inside this
//! process are serialized through one async mutex and land via a temp file +
//! rename. Across processes the last writer wins.

use crate::config::Settings;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handle to the persisted [`Settings`] document (cheap to clone)
#[derive(Clone, Debug)]
pub struct SettingsStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Open the document at `path`, creating it with defaults when missing
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            inner: Arc::new(StoreInner {
                path: path.into(),
                write_lock: Mutex::new(()),
            }),
        };

        if !tokio::fs::try_exists(store.path()).await? {
            tracing::info!(path = %store.path().display(), "creating default settings");
            let _guard = store.inner.write_lock.lock().await;
            store.write(&Settings::default()).await?;
        }

        Ok(store)
    }

    /// Location of the document
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Read a fresh snapshot of the whole document
    ///
    /// A missing file yields the defaults; a corrupt one is an error.
    pub async fn load(&self) -> Result<Settings> {
        match tokio::fs::read_to_string(self.path()).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`load`](Self::load) but falls back to defaults on any error
    pub async fn load_or_default(&self) -> Settings {
        match self.load().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(
                    path = %self.path().display(),
                    error = %e,
                    "failed to load settings, using defaults"
                );
                Settings::default()
            }
        }
    }

    /// Read-modify-write the whole document
    ///
    /// Updates from clones of this store are applied one at a time. Returns
    /// the document as written.
    pub async fn update<F>(&self, apply: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.inner.write_lock.lock().await;
        let mut settings = self.load().await?;
        apply(&mut settings);
        self.write(&settings).await?;
        Ok(settings)
    }

    /// Replace the whole document
    pub async fn replace(&self, settings: &Settings) -> Result<()> {
        let _guard = self.inner.write_lock.lock().await;
        self.write(settings).await
    }

    /// Persist the login state of the external tool
    pub async fn set_logged_in(&self, logged_in: bool) -> Result<Settings> {
        self.update(|s| s.is_logged_in = logged_in).await
    }

    /// Persist whether downloads require a login
    pub async fn set_requires_login(&self, requires_login: bool) -> Result<Settings> {
        self.update(|s| s.requires_login = requires_login).await
    }

    /// Persist the downloader executable path
    pub async fn set_executable_path(&self, path: impl Into<PathBuf>) -> Result<Settings> {
        let path = path.into();
        self.update(|s| s.executable_path = path).await
    }

    /// Persist the save directory
    pub async fn set_save_directory(&self, path: impl Into<PathBuf>) -> Result<Settings> {
        let path = path.into();
        self.update(|s| s.save_directory = path).await
    }

    /// Persist the identifier used by the login status probe
    pub async fn set_cached_probe_identifier(&self, identifier: &str) -> Result<Settings> {
        let identifier = identifier.to_string();
        self.update(|s| s.cached_probe_identifier = identifier).await
    }

    // Caller must hold `write_lock`.
    async fn write(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path().parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(settings)?;
        let tmp = self.path().with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, self.path()).await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_default_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("bvconfig.json");

        let store = SettingsStore::open(&path).await.unwrap();

        assert!(path.exists(), "open should write the default document");
        assert_eq!(store.load().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_open_keeps_existing_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bvconfig.json");
        std::fs::write(&path, r#"{ "is_logged_in": true, "extra_flags": "-p 1" }"#).unwrap();

        let store = SettingsStore::open(&path).await.unwrap();
        let settings = store.load().await.unwrap();

        assert!(settings.is_logged_in);
        assert_eq!(settings.extra_flags, "-p 1");
    }

    #[tokio::test]
    async fn test_update_is_visible_to_next_load() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("bvconfig.json"))
            .await
            .unwrap();

        let written = store.set_logged_in(true).await.unwrap();
        assert!(written.is_logged_in);
        assert!(store.load().await.unwrap().is_logged_in);

        store.set_executable_path("/opt/BBDown").await.unwrap();
        let settings = store.load().await.unwrap();
        assert_eq!(settings.executable_path, PathBuf::from("/opt/BBDown"));
        assert!(settings.is_logged_in, "earlier update must survive");
    }

    #[tokio::test]
    async fn test_load_picks_up_external_edits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bvconfig.json");
        let store = SettingsStore::open(&path).await.unwrap();

        std::fs::write(&path, r#"{ "requires_login": false }"#).unwrap();

        assert!(!store.load().await.unwrap().requires_login);
    }

    #[tokio::test]
    async fn test_concurrent_updates_from_clones_are_not_lost() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("bvconfig.json"))
            .await
            .unwrap();

        let a = store.clone();
        let b = store.clone();
        let (ra, rb) = tokio::join!(
            a.set_cached_probe_identifier("BV1234567890"),
            b.set_requires_login(false),
        );
        ra.unwrap();
        rb.unwrap();

        let settings = store.load().await.unwrap();
        assert_eq!(settings.cached_probe_identifier, "BV1234567890");
        assert!(!settings.requires_login);
    }

    #[tokio::test]
    async fn test_corrupt_document_errors_but_load_or_default_recovers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bvconfig.json");
        let store = SettingsStore::open(&path).await.unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            store.load().await,
            Err(crate::Error::Serialization(_))
        ));
        assert_eq!(store.load_or_default().await, Settings::default());
    }
}
