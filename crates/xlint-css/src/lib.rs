//! xlint CSS Checker
//!
//! CSS rule-tree parsing, value type classification and the per-platform
//! compatibility check with vendor-prefix equivalence.

mod catalog;
mod checker;
mod parser;
pub mod value;

pub use catalog::{PropertyCatalog, PropertyInfo};
pub use checker::CssChecker;
pub use parser::{
    parse_stylesheet, CssParser, CssRule, Declaration, RuleDirectives, RuleId, StyleRule, Stylesheet, SyntaxError,
};

/// Result type for CSS checking
pub type Result<T> = std::result::Result<T, CssError>;

/// CSS checker errors
#[derive(Debug, thiserror::Error)]
pub enum CssError {
    #[error(transparent)]
    Core(#[from] xlint_core::Error),

    #[error("invalid property catalog: {0}")]
    Catalog(String),
}

impl From<serde_json::Error> for CssError {
    fn from(err: serde_json::Error) -> Self {
        CssError::Catalog(err.to_string())
    }
}
