//! Media Type Resolution
//!
//! File extension and MIME type handling for embedded content.

use std::collections::HashMap;

use crate::Result;

const EXT_TO_MEDIA_TYPE_JSON: &str = include_str!("../data/ext2mediatype.json");

/// Base that relative references are resolved against
const PLACEHOLDER_BASE: &str = "http://xlint.invalid/";

/// Extension to media type table
#[derive(Debug, Clone)]
pub struct MediaTypes {
    by_extension: HashMap<String, String>,
}

impl MediaTypes {
    /// The table shipped with xlint
    pub fn builtin() -> Result<Self> {
        Self::from_json(EXT_TO_MEDIA_TYPE_JSON)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let table: HashMap<String, String> = serde_json::from_str(json)?;
        let by_extension = table
            .into_iter()
            .map(|(ext, media_type)| (ext.to_ascii_lowercase(), media_type.to_ascii_lowercase()))
            .collect();
        Ok(Self { by_extension })
    }

    pub fn for_extension(&self, ext: &str) -> Option<&str> {
        self.by_extension.get(&ext.to_ascii_lowercase()).map(String::as_str)
    }

    /// Whether xlint knows the media type at all
    pub fn is_observed(&self, media_type: &str) -> bool {
        self.by_extension.values().any(|t| t == media_type)
    }

    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

/// `type/subtype` of a MIME type, lowercased, parameters dropped
pub fn mime_essence(mime: &str) -> Option<String> {
    let essence = mime.split(';').next()?.trim();
    let (kind, subtype) = essence.split_once('/')?;
    if kind.trim().is_empty() || subtype.trim().is_empty() || subtype.contains('/') {
        return None;
    }
    Some(format!("{}/{}", kind.trim(), subtype.trim()).to_ascii_lowercase())
}

/// File extension of the last path segment of a URL, without the dot.
///
/// Query and fragment are ignored; no extension gives an empty string.
pub fn url_extension(src: &str) -> String {
    let Ok(base) = url::Url::parse(PLACEHOLDER_BASE) else {
        return String::new();
    };
    let Ok(url) = base.join(src.trim()) else {
        return String::new();
    };
    let filename = url.path().rsplit('/').next().unwrap_or_default();
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_string(),
        None => String::new(),
    }
}
