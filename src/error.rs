//! Errors reported by editing commands

use thiserror::Error;

/// Why an editor command was refused. Commands that fail leave the document
/// unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("not a usable YouTube URL: {0}")]
    InvalidUrl(String),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("link target is empty")]
    EmptyLink,
    #[error("media source is empty")]
    EmptyMediaSource,
    #[error("nothing is selected")]
    NoSelection,
    #[error("node is not an image")]
    NotAnImage,
}
