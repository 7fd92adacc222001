//! xlint Core
//!
//! Shared building blocks for the xlint compatibility checkers:
//! - platform catalog and platform-id resolution
//! - the compatibility data store (load once, read many)
//! - the problem model returned by every checker
//! - project configuration

mod location;
mod platform;
mod problem;
mod store;
pub mod config;

pub use config::{Config, ConfigError, IgnoreAttr, IgnoreValue, RawConfig};
pub use location::{locate, Location, Locator};
pub use platform::{canonical_platform_id, CatalogPlatform, Feature, PlatformSpec, TargetPlatform, CATALOG};
pub use problem::{CheckResult, DeclarationInfo, Platforms, Problem, ProblemLevel, ProblemType};
pub use store::{member, status_of, CompatStore, Dataset, Status};

use std::path::PathBuf;

/// Result type for xlint core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring xlint or loading compatibility data
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A platform id that matches no catalog entry
    #[error("no compatibility data for {platform}")]
    NoMatch { platform: String },

    /// A feature without compatibility data
    #[error("no compatibility data for {0}")]
    UnknownFeature(String),

    #[error("Unable to load {feature} data for {platform} from {}: {source}", path.display())]
    DataLoad {
        feature: Feature,
        platform: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse {feature} data for {platform}: {source}")]
    DataParse {
        feature: Feature,
        platform: String,
        #[source]
        source: serde_json::Error,
    },

    /// Data was requested before it was loaded
    #[error("no {feature} compatibility data loaded for {platform}")]
    DataNotLoaded { feature: Feature, platform: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
