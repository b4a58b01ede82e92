//! Object storage for uploaded media

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::StorageError;
use crate::config::MediaConfig;
use crate::helpers::encode_segment;

/// Metadata of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub path: String,
    pub size: u64,
    pub content_type: String,
}

/// A bucket of media objects addressed by slash-separated paths
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `path`. Never overwrites an existing object.
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    /// Public URL an object is served from, if the store has one
    fn public_url(&self, path: &str) -> Option<String>;
}

/// Blob store on the local filesystem, served by the HTTP server
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    bucket: String,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new<P: AsRef<Path>>(dir: P, bucket: &str, base_url: &str) -> Self {
        Self {
            root: dir.as_ref().join(bucket),
            bucket: bucket.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(base_dir: &Path, config: &MediaConfig) -> Self {
        Self::new(base_dir.join(&config.dir), &config.bucket, &config.base_url)
    }

    /// Directory objects of this bucket are written to
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

/// Write a new object, removing it again if the write fails part way
async fn write_object<W: AsyncWrite + Unpin>(
    mut writer: W,
    target: &Path,
    bytes: &[u8],
) -> std::io::Result<()> {
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(writer);
        if let Err(remove) = fs::remove_file(target).await {
            tracing::warn!("Failed to remove partial object {:?}: {}", target, remove);
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        write_object(file, &target, bytes).await?;

        tracing::info!("Stored {} ({} bytes, {})", path, bytes.len(), content_type);
        Ok(StoredObject {
            path: path.to_string(),
            size: bytes.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    fn public_url(&self, path: &str) -> Option<String> {
        if self.base_url.is_empty() {
            return None;
        }
        let encoded: Vec<String> = path.split('/').map(encode_segment).collect();
        Some(format!("{}/{}/{}", self.base_url, self.bucket, encoded.join("/")))
    }
}
