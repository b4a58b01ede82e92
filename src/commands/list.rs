//! List site content

use anyhow::Result;
use std::collections::HashMap;

use crate::storage::PostStore;
use crate::Site;

/// List site content by type
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    let posts = site.post_store().load_posts()?;

    match content_type {
        "post" | "posts" => {
            println!("Posts ({}):", posts.len());
            for post in posts {
                let draft = if post.published { "" } else { " (unpublished)" };
                println!(
                    "  {} - {} [{}] {}, {}{}",
                    post.date,
                    post.title,
                    post.id,
                    post.kind.as_str(),
                    post.read_time,
                    draft
                );
            }
        }
        "category" | "categories" => {
            let mut categories: HashMap<String, usize> = HashMap::new();
            for post in &posts {
                *categories.entry(post.category.clone()).or_insert(0) += 1;
            }
            println!("Categories ({}):", categories.len());
            let mut categories: Vec<_> = categories.into_iter().collect();
            categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            for (category, count) in categories {
                println!("  {} ({})", category, count);
            }
        }
        _ => {
            anyhow::bail!("Unknown type: {}. Available: post, category", content_type);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_types() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        assert!(run(&site, "posts").is_ok());
        assert!(run(&site, "category").is_ok());
        assert!(run(&site, "tag").is_err());
    }
}
