//! Rewrite stored post bodies in the current content format

use anyhow::Result;
use serde_json::Value;

use crate::document::coerce::CONTENT_VERSION;
use crate::document::RichContent;
use crate::storage::PostStore;
use crate::Site;

/// Whether a stored body is already a current, canonical envelope
fn is_current(raw: &Value) -> bool {
    serde_json::from_value::<RichContent>(raw.clone())
        .map(|content| content.version == CONTENT_VERSION && content.to_value() == *raw)
        .unwrap_or(false)
}

/// Coerce every stored body and write it back as an envelope. Returns the
/// number of posts that needed it.
pub fn run(site: &Site, dry_run: bool) -> Result<usize> {
    let store = site.post_store();
    let mut rewritten = 0;

    for post in store.load_posts()? {
        let Some(raw) = &post.content else {
            continue;
        };
        if is_current(raw) {
            continue;
        }

        rewritten += 1;
        if dry_run {
            println!("Would normalize: {}", post.id);
            continue;
        }
        store.save_post_content(&post.id, &post.document())?;
        println!("Normalized: {}", post.id);
    }

    tracing::info!("{} post(s) needed normalizing", rewritten);
    Ok(rewritten)
}
