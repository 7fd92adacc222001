//! xlint Media Checker
//!
//! Media format checks for `<img>`, `<object>`, `<embed>`, `<video>` and
//! `<audio>`, run as an HTML traversal hook.

mod hook;
mod types;

pub use hook::{MediaHook, MediaRef};
pub use types::{mime_essence, url_extension, MediaTypes};

/// Result type for media checking
pub type Result<T> = std::result::Result<T, MediaError>;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("invalid media type table: {0}")]
    Table(#[from] serde_json::Error),
}
