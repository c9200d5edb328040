use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};

use super::{ImageStore, StorageError, StoredObject};

/// Images written to a local directory and served by the app itself
pub struct LocalImageStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalImageStore {
    pub fn new(root: PathBuf, url_prefix: &str) -> Self {
        Self {
            root,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dir(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(self.root.join("products"))
            .await
            .with_context(|| format!("Failed to create upload directory {}", self.root.display()))
    }

    /// Map a key to a path under the root, refusing anything that escapes it
    fn path_for(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return None;
        }
        Some(self.root.join(relative))
    }

}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<String, StorageError> {
        let path = self
            .path_for(key)
            .ok_or_else(|| StorageError::Backend(format!("invalid key {}", key)))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(format!("{}/{}", self.url_prefix, key))
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        // Seeded listings point at external URLs; nothing to remove locally
        let Some(key) = self.key_for(url) else {
            return Ok(());
        };
        let path = self
            .path_for(&key)
            .ok_or_else(|| StorageError::Backend(format!("invalid key {}", key)))?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    async fn is_available(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let start = self
            .path_for(prefix.trim_end_matches('/'))
            .ok_or_else(|| StorageError::Backend(format!("invalid prefix {}", prefix)))?;

        let mut objects = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Backend(e.to_string())),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?
            {
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                let path = entry.path();
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                objects.push(StoredObject {
                    url: format!("{}/{}", self.url_prefix, key),
                    key,
                    modified: meta.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }
        Ok(objects)
    }

    fn key_for(&self, url: &str) -> Option<String> {
        url.strip_prefix(self.url_prefix.as_str())?
            .strip_prefix('/')
            .map(str::to_string)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path().to_path_buf(), "/uploads/");

        let url = store
            .put("products/x.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert_eq!(url, "/uploads/products/x.png");
        assert_eq!(
            std::fs::read(dir.path().join("products/x.png")).unwrap(),
            b"png"
        );

        store.delete(&url).await.unwrap();
        assert!(!dir.path().join("products/x.png").exists());

        // Deleting twice is fine
        store.delete(&url).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path().to_path_buf(), "/uploads");

        let err = store
            .put("../escape.png", Bytes::from_static(b"x"), "image/png")
            .await;
        assert!(err.is_err());
        assert!(store.delete("/uploads/../../etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_external_urls_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path().to_path_buf(), "/uploads");
        assert!(store
            .delete("https://images.example.com/bike.jpg")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_list_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path().to_path_buf(), "/uploads");
        assert!(store.list("products/").await.unwrap().is_empty());

        store
            .put("products/a/1.png", Bytes::from_static(b"1"), "image/png")
            .await
            .unwrap();
        store
            .put("products/b/2.png", Bytes::from_static(b"2"), "image/png")
            .await
            .unwrap();

        let mut keys: Vec<_> = store
            .list("products/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| (o.key, o.url, o.modified.is_some()))
            .collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ("products/a/1.png".to_string(), "/uploads/products/a/1.png".to_string(), true),
                ("products/b/2.png".to_string(), "/uploads/products/b/2.png".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_key_for_url() {
        let store = LocalImageStore::new(PathBuf::from("/srv/uploads"), "/uploads");
        assert_eq!(
            store.key_for("/uploads/products/a/b.png").as_deref(),
            Some("products/a/b.png")
        );
        assert!(store.key_for("/uploadsx/b.png").is_none());
        assert!(store.key_for("https://images.example.com/bike.jpg").is_none());
    }

    #[tokio::test]
    async fn test_availability() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path().to_path_buf(), "/uploads");
        assert!(store.is_available().await);

        let missing = LocalImageStore::new(dir.path().join("missing"), "/uploads");
        assert!(!missing.is_available().await);
        missing.ensure_dir().await.unwrap();
        assert!(missing.is_available().await);
    }
}
