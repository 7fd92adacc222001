//! xlint
//!
//! Cross-platform compatibility checker for CSS, HTML and embedded media.
//!
//! # Example
//! ```rust,ignore
//! use xlint::{Config, Linter};
//!
//! let mut linter = Linter::new("data");
//! linter.init_blocking(Config::from_path(".xlintrc")?)?;
//! let result = linter.check_css("a { -webkit-transform: scale(1) }")?;
//! ```

mod linter;

pub use linter::{LintError, Linter};
pub use xlint_core::{CheckResult, Config, Feature, Platforms, Problem, ProblemLevel, ProblemType};

// Re-export sub-crates for advanced usage
pub use xlint_core as core;
pub use xlint_css as css;
pub use xlint_html as html;
pub use xlint_media as media;

/// Result type for linter operations
pub type Result<T> = std::result::Result<T, LintError>;

/// xlint version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
