//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,

    // URL
    pub url: String,
    pub root: String,
    pub post_dir: String,

    // Directory
    pub data_dir: String,
    pub public_dir: String,

    // Writing
    pub default_category: String,
    pub default_image: String,
    pub words_per_minute: usize,

    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Realty Blog".to_string(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),
            post_dir: "blog".to_string(),

            data_dir: "data".to_string(),
            public_dir: "public".to_string(),

            default_category: "Uncategorized".to_string(),
            default_image: "/remax_logo.png".to_string(),
            words_per_minute: 200,

            media: MediaConfig::default(),
            editor: EditorConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

/// Blob store configuration for uploaded media
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory the local blob store writes into
    pub dir: String,
    /// Bucket name, the first path segment of every stored object
    pub bucket: String,
    /// Public base URL objects are served from
    pub base_url: String,
    /// Prefix for uploaded editor images
    pub image_prefix: String,
    /// Prefix for uploaded editor videos
    pub video_prefix: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: "media".to_string(),
            bucket: "blog-images".to_string(),
            base_url: "/media".to_string(),
            image_prefix: "tiptap".to_string(),
            video_prefix: "tiptap/videos".to_string(),
        }
    }
}

/// Editing surface defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub youtube_width: u32,
    pub youtube_height: u32,
    pub min_image_px: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            youtube_width: 640,
            youtube_height: 360,
            min_image_px: 160.0,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name of the environment variable holding the editor token
    pub admin_token_env: String,
    /// Largest accepted upload body, in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            admin_token_env: "ADMIN_TOKEN".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.editor.youtube_width, 640);
        assert_eq!(config.media.image_prefix, "tiptap");
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: Carver County Homes
url: https://homes.example
media:
  bucket: uploads
editor:
  youtube_height: 480
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "Carver County Homes");
        assert_eq!(config.media.bucket, "uploads");
        assert_eq!(config.media.dir, "media");
        assert_eq!(config.editor.youtube_height, 480);
        assert_eq!(config.editor.youtube_width, 640);
        assert_eq!(config.server.admin_token_env, "ADMIN_TOKEN");
    }

    #[test]
    fn test_unused_keys_are_ignored() {
        let config: SiteConfig = serde_yaml::from_str("title: Lakeside\nauthor: Someone\n").unwrap();
        assert_eq!(config.title, "Lakeside");
        let written = serde_yaml::to_string(&config).unwrap();
        assert!(!written.contains("author"));
    }
}
