//! Configuration
//!
//! `RawConfig` mirrors a project's `.xlintrc` JSON file; `RawConfig::resolve`
//! validates it into the `Config` the checkers consume.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::platform::{Feature, PlatformSpec, TargetPlatform};
use crate::Result;

/// Platforms checked when a config names none
pub const DEFAULT_TARGET_PLATFORMS: &[&str] = &[
    "android-2.3",
    "android-4.0",
    "android-4.1",
    "android-4.2",
    "android-4.3",
    "ios-6",
    "ios-7",
    "winph-8.0",
];

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("a target platform must be a string")]
    InvalidTargetPlatform,

    #[error("ignoreHTMLAttr option must be a array of objects with 'tag' and 'attr' properties")]
    InvalidIgnoreAttr,

    #[error("ignoreHTMLValue option must be a array of objects with 'tag', 'attr' and 'value' properties")]
    InvalidIgnoreValue,

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An ignored (tag, attribute) pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreAttr {
    pub tag: String,
    pub attr: String,
}

impl IgnoreAttr {
    pub fn new(tag: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attr: attr.into(),
        }
    }

    pub fn matches(&self, tag: &str, attr: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag) && self.attr.eq_ignore_ascii_case(attr)
    }
}

/// An ignored (tag, attribute, value) triple
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreValue {
    pub tag: String,
    pub attr: String,
    pub value: String,
}

impl IgnoreValue {
    pub fn new(tag: impl Into<String>, attr: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attr: attr.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, tag: &str, attr: &str, value: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
            && self.attr.eq_ignore_ascii_case(attr)
            && self.value.eq_ignore_ascii_case(value)
    }
}

/// Unvalidated configuration, as written in `.xlintrc`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawConfig {
    pub target_platforms: Option<Vec<String>>,
    pub ignore_platforms: Vec<String>,
    pub ignore_property: Vec<String>,
    #[serde(rename = "ignoreHTMLTag")]
    pub ignore_html_tag: Vec<String>,
    #[serde(rename = "ignoreHTMLAttr")]
    pub ignore_html_attr: Vec<IgnoreAttr>,
    #[serde(rename = "ignoreHTMLValue")]
    pub ignore_html_value: Vec<IgnoreValue>,
    pub ignore_media_format: Vec<String>,
    pub features: Option<Vec<String>>,
}

impl RawConfig {
    /// Validate and normalize
    pub fn resolve(&self) -> Result<Config> {
        let ignored: Vec<String> = self
            .ignore_platforms
            .iter()
            .map(|p| p.replace('*', "").trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        let targets: Vec<String> = match &self.target_platforms {
            Some(targets) => targets.clone(),
            None => DEFAULT_TARGET_PLATFORMS.iter().map(|t| t.to_string()).collect(),
        };

        let mut target_platforms: Vec<TargetPlatform> = Vec::new();
        for target in targets {
            let target = target.trim().to_lowercase();
            if target.is_empty() {
                return Err(ConfigError::InvalidTargetPlatform.into());
            }
            if ignored.iter().any(|p| target.contains(p.as_str())) {
                tracing::debug!("Ignoring target platform {}", target);
                continue;
            }
            let platform = TargetPlatform::from(&PlatformSpec::parse(&target));
            if !target_platforms.contains(&platform) {
                target_platforms.push(platform);
            }
        }

        if self.ignore_html_attr.iter().any(|a| a.tag.trim().is_empty() || a.attr.trim().is_empty()) {
            return Err(ConfigError::InvalidIgnoreAttr.into());
        }
        if self
            .ignore_html_value
            .iter()
            .any(|v| v.tag.trim().is_empty() || v.attr.trim().is_empty() || v.value.trim().is_empty())
        {
            return Err(ConfigError::InvalidIgnoreValue.into());
        }

        let features = match &self.features {
            None => Feature::ALL.to_vec(),
            Some(names) => {
                let mut features = Vec::new();
                for name in names {
                    let feature: Feature = name.parse()?;
                    if !features.contains(&feature) {
                        features.push(feature);
                    }
                }
                features
            }
        };

        Ok(Config {
            target_platforms,
            ignore_property: self.ignore_property.clone(),
            ignore_html_tag: self.ignore_html_tag.clone(),
            ignore_html_attr: self.ignore_html_attr.clone(),
            ignore_html_value: self.ignore_html_value.clone(),
            ignore_media_format: self.ignore_media_format.clone(),
            features,
        })
    }
}

/// Validated configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub target_platforms: Vec<TargetPlatform>,
    pub ignore_property: Vec<String>,
    pub ignore_html_tag: Vec<String>,
    pub ignore_html_attr: Vec<IgnoreAttr>,
    pub ignore_html_value: Vec<IgnoreValue>,
    pub ignore_media_format: Vec<String>,
    pub features: Vec<Feature>,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_platforms(DEFAULT_TARGET_PLATFORMS)
    }
}

impl Config {
    /// Config with only target platforms set (`-` or `_` separated ids)
    pub fn for_platforms(ids: &[&str]) -> Self {
        Self {
            target_platforms: ids
                .iter()
                .map(|id| TargetPlatform::from(&PlatformSpec::parse(id)))
                .collect(),
            ignore_property: Vec::new(),
            ignore_html_tag: Vec::new(),
            ignore_html_attr: Vec::new(),
            ignore_html_value: Vec::new(),
            ignore_media_format: Vec::new(),
            features: Feature::ALL.to_vec(),
        }
    }

    /// Parse and resolve `.xlintrc` contents
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text).map_err(ConfigError::from)?;
        raw.resolve()
    }

    /// Read, parse and resolve a `.xlintrc` file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn platform_ids(&self) -> impl Iterator<Item = &str> {
        self.target_platforms.iter().map(|t| t.platform_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_default_targets() {
        let config = RawConfig::default().resolve().unwrap();
        let ids: Vec<&str> = config.platform_ids().collect();
        assert_eq!(
            ids,
            ["android_2.3", "android_4.0", "android_4.1", "android_4.2", "android_4.3", "ios_6", "ios_7", "winph_8.0"]
        );
        assert_eq!(config.features, Feature::ALL.to_vec());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_ignore_platforms_by_substring() {
        let config = Config::from_json_str(r#"{"ignorePlatforms": ["Android*"]}"#).unwrap();
        let ids: Vec<&str> = config.platform_ids().collect();
        assert_eq!(ids, ["ios_6", "ios_7", "winph_8.0"]);
    }

    #[test]
    fn test_targets_are_normalized_and_deduplicated() {
        let config = Config::from_json_str(r#"{"targetPlatforms": ["iOS-7", "ios_7", "android-4.0-x"]}"#).unwrap();
        let ids: Vec<&str> = config.platform_ids().collect();
        assert_eq!(ids, ["ios_7", "android_4.0-x"]);
    }

    #[test]
    fn test_for_platforms_matches_resolved_ids() {
        let targets = ["iOS-7", " Android_4.0 ", "chrome"];
        let config = Config::for_platforms(&targets);
        let ids: Vec<&str> = config.platform_ids().collect();
        assert_eq!(ids, ["ios_7", "android_4.0", "chrome"]);

        let raw = RawConfig {
            target_platforms: Some(targets.iter().map(|t| t.to_string()).collect()),
            ..RawConfig::default()
        };
        assert_eq!(raw.resolve().unwrap().target_platforms, config.target_platforms);
    }

    #[test]
    fn test_html_ignore_options() {
        let config = Config::from_json_str(
            r#"{
                "ignoreHTMLTag": ["blink"],
                "ignoreHTMLAttr": [{"tag": "video", "attr": "preload"}],
                "ignoreHTMLValue": [{"tag": "input", "attr": "type", "value": "date"}],
                "ignoreMediaFormat": ["ogg"],
                "ignoreProperty": ["zoom"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.ignore_html_tag, ["blink"]);
        assert!(config.ignore_html_attr[0].matches("VIDEO", "preload"));
        assert!(config.ignore_html_value[0].matches("input", "type", "Date"));
        assert_eq!(config.ignore_media_format, ["ogg"]);
        assert_eq!(config.ignore_property, ["zoom"]);
    }

    #[test]
    fn test_empty_ignore_attr_is_error() {
        let err = Config::from_json_str(r#"{"ignoreHTMLAttr": [{"tag": "video"}]}"#).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidIgnoreAttr)));

        let err = Config::from_json_str(r#"{"ignoreHTMLValue": [{"tag": "a", "attr": "b", "value": " "}]}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ignoreHTMLValue option must be a array of objects with 'tag', 'attr' and 'value' properties"
        );
    }

    #[test]
    fn test_empty_target_is_error() {
        let err = Config::from_json_str(r#"{"targetPlatforms": [""]}"#).unwrap_err();
        assert_eq!(err.to_string(), "a target platform must be a string");
    }

    #[test]
    fn test_type_errors_come_from_json() {
        let err = Config::from_json_str(r#"{"targetPlatforms": "ios-7"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Json(_))));
    }

    #[test]
    fn test_features() {
        let config = Config::from_json_str(r#"{"features": ["CSS", "css", "html"]}"#).unwrap();
        assert_eq!(config.features, vec![Feature::Css, Feature::Html]);

        let err = Config::from_json_str(r#"{"features": ["js"]}"#).unwrap_err();
        assert_eq!(err.to_string(), "no compatibility data for js");
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".xlintrc");
        std::fs::write(&path, r#"{"targetPlatforms": ["winph-8.0"]}"#).unwrap();
        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.target_platforms, vec![TargetPlatform::new("winph_8.0")]);

        let err = Config::from_path(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Io { .. })));
    }
}
