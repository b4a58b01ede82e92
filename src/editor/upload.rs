//! Media uploads for the editing surface.
//!
//! Files are stored under a fresh unique name and referenced by the public
//! URL the blob store hands back. Uploads run one at a time in the order
//! they were queued.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::error::EditorError;
use crate::storage::BlobStore;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A file handed to the editor by paste, drop or a file picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Media kind from the MIME type, `None` for anything else
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.content_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let mime = content_type.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    fn default_ext(self) -> &'static str {
        match self {
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
        }
    }

    fn prefix(self, config: &MediaConfig) -> &str {
        match self {
            MediaKind::Image => &config.image_prefix,
            MediaKind::Video => &config.video_prefix,
        }
    }
}

/// Progress of the upload queue as reported to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading { pending: usize },
    Done { url: String },
    Error { message: String },
}

/// `{millis}-{uuid}.{ext}`.
///
/// The lowercased extension of `name` is kept when it is served as the
/// declared content type. Otherwise the extension comes from the declared
/// type, so the stored object is served with the type it was uploaded with.
pub fn unique_filename(name: &str, content_type: &str, kind: MediaKind) -> String {
    let declared = essence(content_type);
    let from_name = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    let ext = match from_name {
        Some(ext) if declared.is_empty() || served_as(&ext, &declared) => ext,
        from_name => ext_for_mime(&declared, kind)
            .map(str::to_string)
            .or(from_name)
            .unwrap_or_else(|| kind.default_ext().to_string()),
    };
    format!("{}-{}.{}", Utc::now().timestamp_millis(), Uuid::new_v4(), ext)
}

/// Lowercased `type/subtype` without parameters
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether a file with this extension is served as `mime`
fn served_as(ext: &str, mime: &str) -> bool {
    mime_guess::from_ext(ext)
        .first_raw()
        .is_some_and(|guess| guess.eq_ignore_ascii_case(mime))
}

/// Extension a file of type `mime` is stored under, preferring the kind's
/// default and then the subtype name
fn ext_for_mime(mime: &str, kind: MediaKind) -> Option<&'static str> {
    let candidates: Vec<&'static str> = mime_guess::get_mime_extensions_str(mime)?
        .iter()
        .copied()
        .filter(|ext| served_as(ext, mime))
        .collect();
    let subtype = mime.split('/').nth(1).unwrap_or_default();
    candidates
        .iter()
        .copied()
        .find(|ext| *ext == kind.default_ext())
        .or_else(|| candidates.iter().copied().find(|ext| *ext == subtype))
        .or_else(|| candidates.first().copied())
}

/// Object path of an uploaded file inside the bucket
pub fn object_path(config: &MediaConfig, kind: MediaKind, filename: &str) -> String {
    let prefix = kind.prefix(config).trim_matches('/');
    if prefix.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", prefix, filename)
    }
}

/// Store one file and return its public URL
pub async fn store_media(
    store: &dyn BlobStore,
    config: &MediaConfig,
    file: &MediaFile,
    kind: MediaKind,
) -> Result<String, EditorError> {
    let path = object_path(config, kind, &unique_filename(&file.name, &file.content_type, kind));
    let content_type = match file.content_type.trim() {
        "" => FALLBACK_CONTENT_TYPE,
        declared => declared,
    };

    store
        .upload(&path, &file.bytes, content_type)
        .await
        .map_err(|e| EditorError::UploadFailed(e.to_string()))?;

    store
        .public_url(&path)
        .ok_or_else(|| EditorError::UploadFailed(format!("no public URL for {}", path)))
}

/// A file waiting for its turn
#[derive(Debug, Clone)]
pub(crate) struct QueuedUpload {
    pub file: MediaFile,
    pub kind: MediaKind,
    /// Use the file name as the image alt text
    pub name_as_alt: bool,
}

/// FIFO of pending uploads in front of a blob store
pub struct UploadPipeline {
    store: Arc<dyn BlobStore>,
    config: MediaConfig,
    queue: VecDeque<QueuedUpload>,
    in_flight: bool,
}

impl UploadPipeline {
    pub fn new(store: Arc<dyn BlobStore>, config: MediaConfig) -> Self {
        Self {
            store,
            config,
            queue: VecDeque::new(),
            in_flight: false,
        }
    }

    pub(crate) fn enqueue(&mut self, upload: QueuedUpload) -> usize {
        self.queue.push_back(upload);
        self.pending()
    }

    /// Take the next file; it counts as in flight until uploaded
    pub(crate) fn next(&mut self) -> Option<QueuedUpload> {
        let next = self.queue.pop_front();
        self.in_flight = next.is_some();
        next
    }

    /// Uploads queued or running
    pub fn pending(&self) -> usize {
        self.queue.len() + usize::from(self.in_flight)
    }

    pub fn is_uploading(&self) -> bool {
        self.pending() > 0
    }

    /// Upload one file right away
    pub async fn upload(&mut self, file: &MediaFile, kind: MediaKind) -> Result<String, EditorError> {
        self.in_flight = true;
        let result = store_media(self.store.as_ref(), &self.config, file, kind).await;
        self.in_flight = false;
        match &result {
            Ok(url) => tracing::info!("Uploaded {} to {}", file.name, url),
            Err(e) => tracing::error!("Failed to upload {}: {}", file.name, e),
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::storage::{StorageError, StoredObject};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory blob store that records every upload
    #[derive(Default)]
    pub struct MemoryBlobStore {
        pub objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
        pub order: Mutex<Vec<String>>,
        pub fail: bool,
        pub no_public_url: bool,
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn upload(
            &self,
            path: &str,
            bytes: &[u8],
            content_type: &str,
        ) -> Result<StoredObject, StorageError> {
            if self.fail {
                return Err(StorageError::Invalid("bucket unavailable".to_string()));
            }
            tokio::task::yield_now().await;
            let mut objects = self.objects.lock().unwrap();
            if objects.contains_key(path) {
                return Err(StorageError::AlreadyExists(path.to_string()));
            }
            objects.insert(path.to_string(), (bytes.to_vec(), content_type.to_string()));
            self.order.lock().unwrap().push(path.to_string());
            Ok(StoredObject {
                path: path.to_string(),
                size: bytes.len() as u64,
                content_type: content_type.to_string(),
            })
        }

        fn public_url(&self, path: &str) -> Option<String> {
            (!self.no_public_url).then(|| format!("https://cdn.example/{}", path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryBlobStore;
    use super::*;

    #[test]
    fn test_media_kind() {
        assert_eq!(MediaKind::from_mime("image/png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("Video/MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("application/pdf"), None);
    }

    #[test]
    fn test_unique_filename() {
        let name = unique_filename("House Front.JPG", "image/jpeg", MediaKind::Image);
        assert!(name.ends_with(".jpg"));
        let (millis, rest) = name.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(rest.len(), 36 + 4);

        assert!(unique_filename("clip", "", MediaKind::Video).ends_with(".mp4"));
        assert!(unique_filename("shot.", "", MediaKind::Image).ends_with(".png"));
        assert_ne!(
            unique_filename("a.png", "image/png", MediaKind::Image),
            unique_filename("a.png", "image/png", MediaKind::Image)
        );
    }

    #[test]
    fn test_extension_follows_declared_type() {
        let ext = |name: &str, mime: &str, kind| {
            unique_filename(name, mime, kind)
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_string())
                .unwrap()
        };
        assert_eq!(ext("clip", "video/webm", MediaKind::Video), "webm");
        assert_eq!(ext("clip.mp4", "video/webm", MediaKind::Video), "webm");
        assert_eq!(ext("tour.MOV", "video/quicktime", MediaKind::Video), "mov");
        assert_eq!(ext("photo.png", "image/jpeg", MediaKind::Image), "jpeg");
        assert_eq!(ext("photo", "image/png; charset=binary", MediaKind::Image), "png");
        assert_eq!(ext("scan.heif2", "image/x-made-up", MediaKind::Image), "heif2");
        assert_eq!(ext("scan", "image/x-made-up", MediaKind::Image), "png");
    }

    #[test]
    fn test_object_path() {
        let config = MediaConfig::default();
        assert_eq!(object_path(&config, MediaKind::Image, "x.png"), "tiptap/x.png");
        assert_eq!(object_path(&config, MediaKind::Video, "x.mp4"), "tiptap/videos/x.mp4");
    }

    #[tokio::test]
    async fn test_store_media() {
        let store = MemoryBlobStore::default();
        let file = MediaFile::new("tour.mov", "", b"bytes".to_vec());
        let url = store_media(&store, &MediaConfig::default(), &file, MediaKind::Video)
            .await
            .unwrap();
        assert!(url.starts_with("https://cdn.example/tiptap/videos/"));
        assert!(url.ends_with(".mov"));

        let objects = store.objects.lock().unwrap();
        let (bytes, content_type) = objects.values().next().unwrap();
        assert_eq!(bytes, b"bytes");
        assert_eq!(content_type, FALLBACK_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_missing_public_url_is_an_error() {
        let store = MemoryBlobStore {
            no_public_url: true,
            ..Default::default()
        };
        let file = MediaFile::new("a.png", "image/png", vec![1]);
        let err = store_media(&store, &MediaConfig::default(), &file, MediaKind::Image)
            .await
            .unwrap_err();
        assert!(matches!(err, EditorError::UploadFailed(_)));
    }

    #[tokio::test]
    async fn test_pipeline_tracks_in_flight() {
        let mut pipeline =
            UploadPipeline::new(Arc::new(MemoryBlobStore::default()), MediaConfig::default());
        let file = MediaFile::new("a.png", "image/png", vec![1]);
        assert_eq!(
            pipeline.enqueue(QueuedUpload {
                file: file.clone(),
                kind: MediaKind::Image,
                name_as_alt: false,
            }),
            1
        );
        assert!(pipeline.is_uploading());
        let next = pipeline.next().unwrap();
        assert_eq!(pipeline.pending(), 1);
        assert!(pipeline.upload(&next.file, next.kind).await.is_ok());
        assert!(!pipeline.is_uploading());
    }
}
