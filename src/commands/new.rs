//! Create a new post

use anyhow::Result;

use crate::content::{NewPost, Post, PostKind};
use crate::storage::PostStore;
use crate::Site;

/// Create a post with an empty body
pub fn create_post(
    site: &Site,
    title: &str,
    excerpt: &str,
    category: Option<&str>,
    kind: PostKind,
) -> Result<Post> {
    let post = site.post_store().create_post(NewPost {
        title: title.to_string(),
        excerpt: excerpt.to_string(),
        category: category.map(String::from),
        kind,
        ..Default::default()
    })?;

    println!("Created: {:?}", site.data_dir.join(format!("{}.json", post.id)));

    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_post() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();

        let post = create_post(&site, "Spring Market", "Prices are up", None, PostKind::Article).unwrap();
        assert_eq!(post.id, "spring-market");
        assert_eq!(post.category, "Uncategorized");
        assert!(site.data_dir.join("spring-market.json").exists());

        let video = create_post(&site, "Spring Market", "Tour", Some("Tours"), PostKind::Video).unwrap();
        assert_eq!(video.id, "spring-market-1");
        assert_eq!(video.read_time, "5 min watch");

        assert!(create_post(&site, "  ", "x", None, PostKind::Article).is_err());
    }
}
