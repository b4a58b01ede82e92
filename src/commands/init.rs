//! Initialize a new site

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::config::SiteConfig;
use crate::content::NewPost;
use crate::document::{Document, Inline, ListItem, Mark, Node, TextRun};
use crate::storage::PostStore;
use crate::Site;

const CONFIG_TEMPLATE: &str = r#"# richdoc-rs configuration

# Site
title: Realty Blog

# URL
url: http://example.com
root: /
post_dir: blog

# Directory
data_dir: data
public_dir: public

# Writing
default_category: Uncategorized
default_image: /remax_logo.png
words_per_minute: 200

# Uploaded media
media:
  dir: media
  bucket: blog-images
  base_url: /media
  image_prefix: tiptap
  video_prefix: tiptap/videos

# Editor
editor:
  youtube_width: 640
  youtube_height: 360
  min_image_px: 160.0

# Server
server:
  admin_token_env: ADMIN_TOKEN
  max_upload_bytes: 52428800
"#;

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let defaults = SiteConfig::default();
    fs::create_dir_all(target_dir)?;
    fs::create_dir_all(target_dir.join(&defaults.data_dir))?;
    fs::create_dir_all(target_dir.join(&defaults.media.dir))?;

    let config_path = target_dir.join("_config.yml");
    if config_path.exists() {
        tracing::info!("Keeping existing {:?}", config_path);
    } else {
        fs::write(&config_path, CONFIG_TEMPLATE)?;
    }

    let site = Site::new(target_dir)?;
    let store = site.post_store();
    if store.load_posts()?.is_empty() {
        let post = store.create_post(NewPost {
            title: "Welcome to the Blog".to_string(),
            excerpt: "Market updates, home tours and selling tips.".to_string(),
            content: Some(welcome_document()),
            ..Default::default()
        })?;
        tracing::info!("Created sample post {}", post.id);
    }

    Ok(())
}

fn welcome_document() -> Document {
    let run = |text: &str, marks: Vec<Mark>| {
        Inline::Text(TextRun {
            text: text.to_string(),
            marks,
        })
    };
    Document::new(vec![
        Node::Heading {
            level: 2,
            content: vec![Inline::text("Hello from the team")],
        },
        Node::Paragraph {
            content: vec![
                Inline::text("This is your very first post. Open it in the editor to add "),
                run("photos", vec![Mark::Bold]),
                Inline::text(", videos and "),
                run(
                    "YouTube tours",
                    vec![Mark::Link {
                        href: "https://www.youtube.com".to_string(),
                    }],
                ),
                Inline::text("."),
            ],
        },
        Node::BulletList {
            items: ["Create posts with `richdoc-rs new`", "Render them with `richdoc-rs render`"]
                .iter()
                .map(|text| ListItem {
                    content: vec![Node::paragraph(text)],
                })
                .collect(),
        },
    ])
}

/// Run the init command with an existing Site instance
pub fn run(site: &Site) -> Result<()> {
    init_site(&site.base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_site() {
        let dir = TempDir::new().unwrap();
        init_site(dir.path()).unwrap();

        let site = Site::new(dir.path()).unwrap();
        assert_eq!(site.config.title, "Realty Blog");
        assert_eq!(site.config.editor.min_image_px, 160.0);
        assert!(site.media_dir.is_dir());

        let posts = site.post_store().load_posts().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "welcome-to-the-blog");
        assert!(posts[0].document().has_content());

        // Running again keeps what is there
        init_site(dir.path()).unwrap();
        assert_eq!(site.post_store().load_posts().unwrap().len(), 1);
    }
}
