//! Persistence for posts and uploaded media
//!
//! Posts live as one JSON file each under the data directory. Media goes to
//! a [`BlobStore`].

pub mod blob;

pub use blob::{BlobStore, LocalBlobStore, StoredObject};

use chrono::Local;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::SiteConfig;
use crate::content::{format_date, is_valid_id, slug_base, unique_id, NewPost, Post};
use crate::document::Document;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid object path {0:?}")]
    InvalidPath(String),
    #[error("{0}")]
    Invalid(String),
}

/// Access to stored posts
pub trait PostStore: Send + Sync {
    /// All posts, newest first
    fn load_posts(&self) -> Result<Vec<Post>, StorageError>;

    fn load_post(&self, id: &str) -> Result<Post, StorageError>;

    /// The raw stored body of a post, `None` when it has none
    fn load_post_content(&self, id: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.load_post(id)?.content)
    }

    /// Replace a post's body, returning the updated record
    fn save_post_content(&self, id: &str, doc: &Document) -> Result<Post, StorageError>;

    fn create_post(&self, new: NewPost) -> Result<Post, StorageError>;

    fn delete_post(&self, id: &str) -> Result<(), StorageError>;
}

/// Values filled into new posts
#[derive(Debug, Clone)]
pub struct PostDefaults {
    pub category: String,
    pub image: String,
    pub words_per_minute: usize,
}

impl From<&SiteConfig> for PostDefaults {
    fn from(config: &SiteConfig) -> Self {
        Self {
            category: config.default_category.clone(),
            image: config.default_image.clone(),
            words_per_minute: config.words_per_minute,
        }
    }
}

/// One `<id>.json` file per post
#[derive(Debug, Clone)]
pub struct JsonPostStore {
    dir: PathBuf,
    defaults: PostDefaults,
}

impl JsonPostStore {
    pub fn new<P: AsRef<Path>>(dir: P, defaults: PostDefaults) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            defaults,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_id(id) {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    fn write(&self, post: &Post) -> Result<(), StorageError> {
        let path = self.path_for(&post.id)?;
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(post)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl PostStore for JsonPostStore {
    fn load_posts(&self) -> Result<Vec<Post>, StorageError> {
        let mut posts = Vec::new();
        if !self.dir.exists() {
            return Ok(posts);
        }

        for entry in WalkDir::new(&self.dir)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read(path)
                .map_err(StorageError::from)
                .and_then(|bytes| serde_json::from_slice::<Post>(&bytes).map_err(StorageError::from))
            {
                Ok(post) => posts.push(post),
                Err(e) => tracing::warn!("Failed to load post {:?}: {}", path, e),
            }
        }

        // Newest first; undated posts last, ties by id
        posts.sort_by(|a, b| {
            b.parsed_date()
                .cmp(&a.parsed_date())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(posts)
    }

    fn load_post(&self, id: &str) -> Result<Post, StorageError> {
        let path = self.path_for(id)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save_post_content(&self, id: &str, doc: &Document) -> Result<Post, StorageError> {
        let mut post = self.load_post(id)?;
        post.set_document(doc.clone(), self.defaults.words_per_minute);
        self.write(&post)?;
        tracing::debug!("Saved content of post {}", id);
        Ok(post)
    }

    fn create_post(&self, new: NewPost) -> Result<Post, StorageError> {
        let title = new.title.trim();
        let excerpt = new.excerpt.trim();
        if title.is_empty() || excerpt.is_empty() {
            return Err(StorageError::Invalid("title and excerpt are required".to_string()));
        }

        let base = slug_base(title);
        let id = unique_id(&base, |candidate| {
            self.dir.join(format!("{}.json", candidate)).exists()
        });

        let doc = new.content.unwrap_or_default();
        let mut post = Post {
            id,
            title: title.to_string(),
            excerpt: excerpt.to_string(),
            category: new
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| self.defaults.category.clone()),
            kind: new.kind,
            image: new
                .image
                .filter(|i| !i.trim().is_empty())
                .unwrap_or_else(|| self.defaults.image.clone()),
            date: format_date(&Local::now()),
            read_time: String::new(),
            published: true,
            content: None,
        };
        post.set_document(doc, self.defaults.words_per_minute);
        self.write(&post)?;
        tracing::info!("Created post {}", post.id);
        Ok(post)
    }

    fn delete_post(&self, id: &str) -> Result<(), StorageError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
