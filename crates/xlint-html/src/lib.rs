//! xlint HTML Checker
//!
//! HTML markup compatibility checks:
//! - position-annotated tree built on the html5ever tokenizer
//! - hierarchical ignore scopes from config and `xlint.*` comments
//! - tag / attribute / value support per target platform
//! - traversal hooks for checks that live in other crates

mod checker;
mod scope;
mod tree;

pub use checker::{HookContext, HtmlChecker, TraversalHook};
pub use scope::{parse_directives, Directive, Scope};
pub use tree::{parse_document, Document, Element, HtmlParser, HtmlSyntaxError, Node, NodeData, NodeId};

/// Result type for HTML checking
pub type Result<T> = std::result::Result<T, HtmlError>;

/// HTML checker errors
#[derive(Debug, thiserror::Error)]
pub enum HtmlError {
    #[error(transparent)]
    Core(#[from] xlint_core::Error),
}
