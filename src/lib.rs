//! richdoc-rs: rich post documents for a small real-estate blog
//!
//! This crate holds the document model behind the blog's posts, the editing
//! surface that changes documents, the HTML renderer that displays them, and
//! the coercion that reads whatever older versions of the site stored.

pub mod commands;
pub mod config;
pub mod content;
pub mod document;
pub mod editor;
pub mod error;
pub mod helpers;
pub mod render;
pub mod server;
pub mod storage;

use anyhow::Result;
use std::path::Path;

use render::{HtmlRenderer, RenderOptions};
use storage::{JsonPostStore, LocalBlobStore, PostDefaults};

/// The main application: a site directory and its configuration
#[derive(Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: std::path::PathBuf,
    /// Post records directory
    pub data_dir: std::path::PathBuf,
    /// Public (output) directory
    pub public_dir: std::path::PathBuf,
    /// Uploaded media directory
    pub media_dir: std::path::PathBuf,
}

impl Site {
    /// Create a new Site instance from a directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        let data_dir = base_dir.join(&config.data_dir);
        let public_dir = base_dir.join(&config.public_dir);
        let media_dir = base_dir.join(&config.media.dir);

        Ok(Self {
            config,
            base_dir,
            data_dir,
            public_dir,
            media_dir,
        })
    }

    /// Store of the site's posts
    pub fn post_store(&self) -> JsonPostStore {
        JsonPostStore::new(&self.data_dir, PostDefaults::from(&self.config))
    }

    /// Store of uploaded media
    pub fn blob_store(&self) -> LocalBlobStore {
        LocalBlobStore::from_config(&self.base_dir, &self.config.media)
    }

    pub fn renderer(&self) -> HtmlRenderer {
        HtmlRenderer::new(RenderOptions::from_config(&self.config))
    }

    /// Initialize a new site
    pub fn init(&self) -> Result<()> {
        commands::init::run(self)
    }

    /// Render posts into the public directory
    pub fn render(&self) -> Result<usize> {
        commands::render::run(self, None)
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
