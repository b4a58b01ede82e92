//! Upload a media file and append it to a post

use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;

use crate::editor::{Editor, MediaFile, MediaKind};
use crate::storage::PostStore;
use crate::Site;

/// MIME type of an image or video file by its extension, matching what the
/// server's media route serves it as
pub fn content_type_for(name: &str) -> Option<&'static str> {
    mime_guess::from_path(name)
        .first_raw()
        .filter(|mime| mime.starts_with("image/") || mime.starts_with("video/"))
}

/// Store `file` as post media and append it to the post's body.
/// Returns the public URL of the upload.
pub async fn run(site: &Site, id: &str, file: &Path) -> Result<String> {
    let store = site.post_store();
    let post = store.load_post(id)?;

    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid file name: {:?}", file))?
        .to_string();
    let content_type = content_type_for(&name)
        .ok_or_else(|| anyhow!("Not an image or video: {:?}", file))?;
    let bytes = tokio::fs::read(file).await?;
    let media = MediaFile::new(name, content_type, bytes);

    let mut editor = Editor::new(post.document(), &site.config, Arc::new(site.blob_store()));
    let url = match media.kind() {
        Some(MediaKind::Video) => editor.upload_video(media).await?,
        _ => editor.upload_image(media).await?,
    };
    store.save_post_content(id, editor.document())?;

    println!("Uploaded {} to post {}", url, id);
    Ok(url)
}
