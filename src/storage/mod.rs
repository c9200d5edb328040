//! Product image storage.
//!
//! Uploads are checked with [`validate_upload`] and then handed to an
//! [`ImageStore`]: a directory under the data dir served at `/uploads`, or
//! an S3-compatible bucket.

mod local;
mod s3;

pub use local::LocalImageStore;
pub use s3::S3ImageStore;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, StorageBackend, StorageConfig};
use crate::error::ApiError;

/// Every product image key lives under this prefix
pub const IMAGE_PREFIX: &str = "products/";

pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("At least one image is required")]
    NoFiles,
    #[error("At most {max} images are allowed")]
    TooManyFiles { max: usize },
    #[error("{name} is empty")]
    EmptyFile { name: String },
    #[error("{name} is larger than {limit_mb} MB")]
    TooLarge { name: String, limit_mb: usize },
    #[error("{name} is not a supported image type (JPEG, PNG, WebP or GIF)")]
    UnsupportedType { name: String },
    #[error("{url} is not one of your uploaded images")]
    NotOwned { url: String },
    #[error("Image storage failed: {0}")]
    Backend(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TooLarge { .. } => ApiError::payload_too_large(err.to_string()),
            StorageError::Backend(_) => {
                tracing::error!(error = %err, "Image storage error");
                ApiError::storage("Image upload failed, please try again")
            }
            _ => ApiError::validation_field("images", err.to_string()),
        }
    }
}

/// One uploaded file as read from a multipart body
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// An object found by [`ImageStore::list`]
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store an object and return its public URL
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError>;
    /// Remove an object by the URL `put` returned
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
    async fn is_available(&self) -> bool;
    /// Every object whose key starts with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;
    /// Object key behind a URL this store handed out, if it is one of ours
    fn key_for(&self, url: &str) -> Option<String>;
    /// Backend name for logs and startup checks
    fn name(&self) -> &'static str;
}

/// Check count, size and type limits for one listing's images.
pub fn validate_upload(files: &[UploadFile], config: &StorageConfig) -> Result<(), StorageError> {
    if files.is_empty() {
        return Err(StorageError::NoFiles);
    }
    if files.len() > config.max_images {
        return Err(StorageError::TooManyFiles {
            max: config.max_images,
        });
    }

    for file in files {
        if file.bytes.is_empty() {
            return Err(StorageError::EmptyFile {
                name: file.file_name.clone(),
            });
        }
        if file.bytes.len() > config.max_file_bytes {
            return Err(StorageError::TooLarge {
                name: file.file_name.clone(),
                limit_mb: config.max_file_bytes / (1024 * 1024),
            });
        }
        if extension_for(&file.content_type).is_none() {
            return Err(StorageError::UnsupportedType {
                name: file.file_name.clone(),
            });
        }
    }

    Ok(())
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Key prefix for the images one seller uploads
pub fn owner_prefix(owner: Uuid) -> String {
    format!("{}{}/", IMAGE_PREFIX, owner)
}

/// Object key for a new product image: `products/<owner>/<uuid>.<ext>`
pub fn image_key(owner: Uuid, content_type: &str) -> Option<String> {
    extension_for(content_type)
        .map(|ext| format!("{}{}.{}", owner_prefix(owner), Uuid::new_v4(), ext))
}

/// True when `url` is a stored object directly under `owner`'s prefix.
pub fn is_owned_by(store: &dyn ImageStore, url: &str, owner: Uuid) -> bool {
    let Some(key) = store.key_for(url) else {
        return false;
    };
    key.strip_prefix(owner_prefix(owner).as_str())
        .is_some_and(|name| !name.is_empty() && !name.contains('/') && !name.starts_with('.'))
}

/// Reject stored-image URLs that were not uploaded by `owner`.
///
/// External URLs are left alone; the store never deletes them.
pub fn check_image_owner(
    store: &dyn ImageStore,
    owner: Uuid,
    urls: &[String],
) -> Result<(), StorageError> {
    match urls
        .iter()
        .find(|url| store.key_for(url).is_some() && !is_owned_by(store, url, owner))
    {
        Some(url) => Err(StorageError::NotOwned { url: url.clone() }),
        None => Ok(()),
    }
}

/// Validate and store a batch of images, returning their URLs in order.
///
/// If a later file fails, the ones already stored are removed again.
pub async fn store_images(
    store: &dyn ImageStore,
    owner: Uuid,
    files: Vec<UploadFile>,
    config: &StorageConfig,
) -> Result<Vec<String>, StorageError> {
    validate_upload(&files, config)?;

    let mut urls = Vec::with_capacity(files.len());
    for file in files {
        let key = image_key(owner, &file.content_type).ok_or_else(|| StorageError::UnsupportedType {
            name: file.file_name.clone(),
        })?;
        match store.put(&key, file.bytes, &file.content_type).await {
            Ok(url) => urls.push(url),
            Err(e) => {
                delete_images(store, owner, &urls).await;
                return Err(e);
            }
        }
    }

    info!(count = urls.len(), backend = store.name(), "Stored product images");
    Ok(urls)
}

/// Best-effort removal of `owner`'s images; failures are only logged.
///
/// URLs outside the owner's prefix are skipped, so a listing that points at
/// someone else's upload can never remove it.
pub async fn delete_images(store: &dyn ImageStore, owner: Uuid, urls: &[String]) {
    for url in urls {
        if !is_owned_by(store, url, owner) {
            debug!(url = %url, owner = %owner, "Skipping image not owned by seller");
            continue;
        }
        if let Err(e) = store.delete(url).await {
            warn!(url = %url, error = %e, "Failed to delete stored image");
        }
    }
}

/// Remove uploads that no listing references and that were stored before
/// `cutoff`. Younger files may belong to a listing form still being filled in.
pub async fn prune_unreferenced(
    store: &dyn ImageStore,
    referenced: &HashSet<String>,
    cutoff: DateTime<Utc>,
) -> Result<usize, StorageError> {
    let mut removed = 0;
    for object in store.list(IMAGE_PREFIX).await? {
        let stale = object.modified.is_some_and(|modified| modified < cutoff);
        if !stale || referenced.contains(&object.url) {
            continue;
        }
        match store.delete(&object.url).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(key = %object.key, error = %e, "Failed to prune image"),
        }
    }
    info!(removed, backend = store.name(), "Pruned unreferenced images");
    Ok(removed)
}

/// Build the configured image store.
pub async fn build_store(config: &Config) -> Result<Arc<dyn ImageStore>> {
    match config.storage.backend {
        StorageBackend::Local => {
            let store = LocalImageStore::new(config.uploads_dir(), "/uploads");
            store.ensure_dir().await?;
            info!(path = %config.uploads_dir().display(), "Using local image storage");
            Ok(Arc::new(store))
        }
        StorageBackend::S3 => {
            let store = S3ImageStore::from_config(&config.storage.s3).await?;
            info!(bucket = %store.bucket(), "Using S3 image storage");
            Ok(Arc::new(store))
        }
    }
}
