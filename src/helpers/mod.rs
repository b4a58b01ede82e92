//! Helper functions shared by the renderer, the editor and the server
//!
//! URL generation and the video link normalizer live in `url`, HTML
//! escaping and tag building in `html`.

mod html;
mod url;

pub use html::*;
pub use url::*;
