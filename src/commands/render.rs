//! Render posts into static pages

use anyhow::Result;
use std::fs;

use crate::render::{post_path, render_post_page};
use crate::storage::PostStore;
use crate::Site;

/// Render one post, or every published post, to
/// `<public_dir>/<post_dir>/<id>/index.html`. Returns the number of pages.
pub fn run(site: &Site, id: Option<&str>) -> Result<usize> {
    let store = site.post_store();
    let posts = match id {
        Some(id) => vec![store.load_post(id)?],
        None => store
            .load_posts()?
            .into_iter()
            .filter(|p| p.published)
            .collect(),
    };

    fs::create_dir_all(&site.public_dir)?;
    let renderer = site.renderer();

    for post in &posts {
        let html = render_post_page(&site.config, &renderer, post);

        let output_path = site
            .public_dir
            .join(post_path(&site.config, &post.id))
            .join("index.html");
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Failed to create dir {:?}: {}", parent, e))?;
        }
        fs::write(&output_path, &html)
            .map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", output_path, e))?;
        tracing::debug!("Rendered post: {:?}", output_path);
    }

    Ok(posts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init::init_site;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_render_all_and_one() {
        let dir = TempDir::new().unwrap();
        init_site(dir.path()).unwrap();
        let site = Site::new(dir.path()).unwrap();

        fs::write(
            site.data_dir.join("hidden.json"),
            json!({"id": "hidden", "title": "Hidden", "published": false, "content": "Draft *notes*"})
                .to_string(),
        )
        .unwrap();

        assert_eq!(run(&site, None).unwrap(), 1);
        let page = fs::read_to_string(site.public_dir.join("blog/welcome-to-the-blog/index.html")).unwrap();
        assert!(page.contains("<h2>Hello from the team</h2>"));
        assert!(!site.public_dir.join("blog/hidden").exists());

        assert_eq!(run(&site, Some("hidden")).unwrap(), 1);
        let page = fs::read_to_string(site.public_dir.join("blog/hidden/index.html")).unwrap();
        assert!(page.contains("<p>Draft <em>notes</em></p>"));

        assert!(run(&site, Some("missing")).is_err());
    }
}
