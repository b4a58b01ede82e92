//! Configuration module

mod site;

pub use site::EditorConfig;
pub use site::MediaConfig;
pub use site::ServerConfig;
pub use site::SiteConfig;
