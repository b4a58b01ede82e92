//! CLI commands

pub mod check;
pub mod clean;
pub mod init;
pub mod list;
pub mod new;
pub mod normalize;
pub mod render;
pub mod upload;
