//! Report stored post bodies that cannot be read

use anyhow::Result;

use crate::document::try_coerce;
use crate::storage::PostStore;
use crate::Site;

/// Try to read every stored body and print the ones that fail. Returns the
/// number of failures.
pub fn run(site: &Site) -> Result<usize> {
    let posts = site.post_store().load_posts()?;
    let mut failures = 0;
    let mut empty = 0;

    for post in &posts {
        let Some(raw) = &post.content else {
            empty += 1;
            continue;
        };
        match try_coerce(raw) {
            Ok(doc) if !doc.has_content() => empty += 1,
            Ok(_) => {}
            Err(e) => {
                failures += 1;
                println!("  {} - {}", post.id, e);
            }
        }
    }

    println!(
        "Checked {} post(s): {} unreadable, {} without a body",
        posts.len(),
        failures,
        empty
    );
    Ok(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_check_counts_failures() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        fs::create_dir_all(&site.data_dir).unwrap();
        for (id, content) in [
            ("ok", json!("Some text")),
            ("bad", json!({"kind": "quill", "doc": {}})),
            ("worse", json!([1, 2])),
        ] {
            fs::write(
                site.data_dir.join(format!("{}.json", id)),
                json!({"id": id, "title": id, "content": content}).to_string(),
            )
            .unwrap();
        }

        assert_eq!(run(&site).unwrap(), 2);
    }
}
