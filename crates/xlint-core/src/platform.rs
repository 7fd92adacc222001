//! Platforms and features
//!
//! The fixed catalog of platforms xlint has compatibility data for, and the
//! fuzzy matching of user platform ids against it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A catalog entry: a platform name and a version pattern.
///
/// An `x` in the pattern matches any character at that position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogPlatform {
    pub name: &'static str,
    pub version: &'static str,
}

impl CatalogPlatform {
    /// Canonical platform id, also used to name data files
    pub fn id(&self) -> String {
        format!("{}_{}", self.name, self.version)
    }
}

/// Platforms with compatibility data
pub const CATALOG: &[CatalogPlatform] = &[
    CatalogPlatform { name: "android", version: "2.3.x" },
    CatalogPlatform { name: "android", version: "4.0.x" },
    CatalogPlatform { name: "android", version: "4.1.x" },
    CatalogPlatform { name: "android", version: "4.2.x" },
    CatalogPlatform { name: "android", version: "4.3.x" },
    CatalogPlatform { name: "android", version: "4.4" },
    CatalogPlatform { name: "ios", version: "6.x" },
    CatalogPlatform { name: "ios", version: "7.x" },
    CatalogPlatform { name: "winph", version: "8.0" },
    CatalogPlatform { name: "chrome", version: "31" },
];

/// Resolve a user platform id (`name_version`) to a canonical catalog id.
///
/// The catalog is scanned from its last entry; the first match wins.
/// `android_4.0.4` and `android_4.0` both resolve to `android_4.0.x`.
pub fn canonical_platform_id(raw: &str) -> Option<String> {
    let lowered = raw.to_ascii_lowercase();
    let mut parts = lowered.split('_');
    let name = parts.next()?;
    let version = parts.next()?;

    CATALOG
        .iter()
        .rev()
        .find(|platform| platform.name == name && version_matches(version, platform.version))
        .map(CatalogPlatform::id)
}

fn version_matches(version: &str, pattern: &str) -> bool {
    let v = version.as_bytes();
    let p = pattern.as_bytes();

    let mut j = 0;
    while j < v.len() && j < p.len() {
        if v[j] == p[j] || v[j].eq_ignore_ascii_case(&b'x') || p[j].eq_ignore_ascii_case(&b'x') {
            j += 1;
            continue;
        }
        break;
    }

    if j < v.len() && j < p.len() {
        return false;
    }

    v.len() == p.len()
        || (j < v.len() && version[j..].eq_ignore_ascii_case(".x"))
        || (j < p.len() && pattern[j..].eq_ignore_ascii_case(".x"))
}

/// A kind of checked content, each with its own data set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Css,
    Html,
    Media,
}

impl Feature {
    /// Every feature with compatibility data
    pub const ALL: [Feature; 3] = [Feature::Css, Feature::Html, Feature::Media];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Css => "css",
            Feature::Html => "html",
            Feature::Media => "media",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "css" => Ok(Feature::Css),
            "html" => Ok(Feature::Html),
            "media" => Ok(Feature::Media),
            _ => Err(Error::UnknownFeature(s.to_string())),
        }
    }
}

/// A platform as written in configuration (`android-4.0`, `ios_7`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSpec {
    pub name: String,
    pub version: Option<String>,
}

impl PlatformSpec {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// Split at the first `-` or `_`
    pub fn parse(s: &str) -> Self {
        match s.trim().split_once(['-', '_']) {
            Some((name, version)) => Self::new(name, version),
            None => Self {
                name: s.trim().to_string(),
                version: None,
            },
        }
    }

    /// Lowercased `name_version` id
    pub fn platform_id(&self) -> String {
        match &self.version {
            Some(version) => format!("{}_{}", self.name, version).to_lowercase(),
            None => self.name.to_lowercase(),
        }
    }
}

/// A platform the checkers report against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPlatform {
    pub platform_id: String,
}

impl TargetPlatform {
    pub fn new(platform_id: impl Into<String>) -> Self {
        Self {
            platform_id: platform_id.into(),
        }
    }
}

impl From<&PlatformSpec> for TargetPlatform {
    fn from(spec: &PlatformSpec) -> Self {
        Self::new(spec.platform_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_exact_version() {
        assert_eq!(canonical_platform_id("android_4.4").as_deref(), Some("android_4.4"));
        assert_eq!(canonical_platform_id("winph_8.0").as_deref(), Some("winph_8.0"));
        assert_eq!(canonical_platform_id("chrome_31").as_deref(), Some("chrome_31"));
    }

    #[test]
    fn test_resolve_wildcard_position() {
        assert_eq!(canonical_platform_id("android_4.0.4").as_deref(), Some("android_4.0.x"));
        assert_eq!(canonical_platform_id("android_2.3.7").as_deref(), Some("android_2.3.x"));
    }

    #[test]
    fn test_resolve_trailing_wildcard() {
        assert_eq!(canonical_platform_id("android_2.3").as_deref(), Some("android_2.3.x"));
        assert_eq!(canonical_platform_id("ios_7").as_deref(), Some("ios_7.x"));
        assert_eq!(canonical_platform_id("ios_6.1").as_deref(), Some("ios_6.x"));
        assert_eq!(canonical_platform_id("android_4.1.x").as_deref(), Some("android_4.1.x"));
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        assert_eq!(canonical_platform_id("Android_4.2").as_deref(), Some("android_4.2.x"));
        assert_eq!(canonical_platform_id("IOS_7.X").as_deref(), Some("ios_7.x"));
    }

    #[test]
    fn test_resolve_last_entry_wins() {
        // 4.x fits every android 4 entry; the scan runs from the end of the catalog
        assert_eq!(canonical_platform_id("android_4.x").as_deref(), Some("android_4.4"));
    }

    #[test]
    fn test_resolve_no_match() {
        assert_eq!(canonical_platform_id("android_4"), None);
        assert_eq!(canonical_platform_id("android_5.0"), None);
        assert_eq!(canonical_platform_id("firefox_31"), None);
        assert_eq!(canonical_platform_id("chrome"), None);
        assert_eq!(canonical_platform_id("winph_8.01"), None);
    }

    #[test]
    fn test_feature_from_str() {
        assert_eq!("CSS".parse::<Feature>().unwrap(), Feature::Css);
        assert_eq!("media".parse::<Feature>().unwrap(), Feature::Media);
        assert!(matches!("js".parse::<Feature>(), Err(Error::UnknownFeature(f)) if f == "js"));
    }

    #[test]
    fn test_platform_spec_parse() {
        let spec = PlatformSpec::parse("Android-4.0");
        assert_eq!(spec, PlatformSpec::new("Android", "4.0"));
        assert_eq!(spec.platform_id(), "android_4.0");

        let spec = PlatformSpec::parse("winph_8.0");
        assert_eq!(spec.platform_id(), "winph_8.0");

        let spec = PlatformSpec::parse("chrome");
        assert_eq!(spec.version, None);
        assert_eq!(spec.platform_id(), "chrome");
    }
}
