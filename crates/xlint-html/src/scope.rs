//! Ignore Scopes
//!
//! The ignore configuration in effect for one sibling list: the parent's
//! scope plus the `xlint.*` directives written in comments among the
//! siblings.
//!
//! ```text
//! <!-- xlint.ignoretag blink, 2; xlint.ignoreattr video/preload -->
//! <!-- xlint.ignorevalue input/type/date; xlint.ignoremedia ogg, webm -->
//! ```

use std::ops::RangeInclusive;

use xlint_core::{Config, IgnoreAttr, IgnoreValue};

use crate::tree::{Document, NodeData, NodeId};

const IGNORE_TAG: &str = "xlint.ignoretag";
const IGNORE_ATTR: &str = "xlint.ignoreattr";
const IGNORE_VALUE: &str = "xlint.ignorevalue";
const IGNORE_MEDIA: &str = "xlint.ignoremedia";

/// One inline directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    IgnoreTag(String),
    /// Skip this many siblings after the comment
    IgnoreNext(usize),
    IgnoreAttr(IgnoreAttr),
    IgnoreValue(IgnoreValue),
    IgnoreMedia(String),
}

/// Parse the directives of a comment; unknown text is ignored
pub fn parse_directives(comment: &str) -> Vec<Directive> {
    let mut directives = Vec::new();
    for directive in comment.trim().to_lowercase().split(';') {
        let directive = directive.trim();
        if let Some(params) = directive.strip_prefix(IGNORE_TAG) {
            for param in list(params) {
                if param.bytes().all(|b| b.is_ascii_digit()) {
                    directives.push(Directive::IgnoreNext(param.parse().unwrap_or(usize::MAX)));
                } else {
                    directives.push(Directive::IgnoreTag(param.to_string()));
                }
            }
        } else if let Some(params) = directive.strip_prefix(IGNORE_ATTR) {
            for param in list(params) {
                if let &[tag, attr] = parts(param).as_slice() {
                    directives.push(Directive::IgnoreAttr(IgnoreAttr::new(tag, attr)));
                }
            }
        } else if let Some(params) = directive.strip_prefix(IGNORE_VALUE) {
            for param in list(params) {
                if let &[tag, attr, value] = parts(param).as_slice() {
                    directives.push(Directive::IgnoreValue(IgnoreValue::new(tag, attr, value)));
                }
            }
        } else if let Some(params) = directive.strip_prefix(IGNORE_MEDIA) {
            directives.extend(list(params).map(|ext| Directive::IgnoreMedia(ext.to_string())));
        }
    }
    directives
}

fn list(params: &str) -> impl Iterator<Item = &str> {
    params.split(',').map(str::trim).filter(|param| !param.is_empty())
}

/// `tag/attr[/value]` with no empty part
fn parts(param: &str) -> Vec<&str> {
    let parts: Vec<&str> = param.split('/').map(str::trim).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Vec::new();
    }
    parts
}

/// Ignore configuration for a sibling list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub ignore_tag: Vec<String>,
    pub ignore_attr: Vec<IgnoreAttr>,
    pub ignore_value: Vec<IgnoreValue>,
    pub ignore_media_format: Vec<String>,
    /// Sibling indexes skipped at this level only
    pub ignore_tag_by_index: Vec<RangeInclusive<usize>>,
}

impl Scope {
    /// Document-level scope from the configured ignore lists
    pub fn from_config(config: &Config) -> Self {
        Self {
            ignore_tag: config.ignore_html_tag.clone(),
            ignore_attr: config.ignore_html_attr.clone(),
            ignore_value: config.ignore_html_value.clone(),
            ignore_media_format: config.ignore_media_format.clone(),
            ignore_tag_by_index: Vec::new(),
        }
    }

    /// Scope of a sibling list: this scope, without its index ignores, plus
    /// the directives found in comments among `siblings`
    pub fn for_siblings(&self, document: &Document, siblings: &[NodeId]) -> Scope {
        let mut scope = Scope {
            ignore_tag_by_index: Vec::new(),
            ..self.clone()
        };
        for (index, &id) in siblings.iter().enumerate() {
            if let NodeData::Comment(text) = &document.node(id).data {
                for directive in parse_directives(text) {
                    scope.apply(directive, index);
                }
            }
        }
        scope
    }

    /// Add a directive written at sibling `index`
    pub fn apply(&mut self, directive: Directive, index: usize) {
        match directive {
            Directive::IgnoreTag(tag) => self.ignore_tag.push(tag),
            Directive::IgnoreNext(0) => {}
            Directive::IgnoreNext(count) => self
                .ignore_tag_by_index
                .push(index.saturating_add(1)..=index.saturating_add(count)),
            Directive::IgnoreAttr(attr) => self.ignore_attr.push(attr),
            Directive::IgnoreValue(value) => self.ignore_value.push(value),
            Directive::IgnoreMedia(ext) => self.ignore_media_format.push(ext),
        }
    }

    pub fn ignores_tag(&self, tag: &str) -> bool {
        self.ignore_tag.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn ignores_index(&self, index: usize) -> bool {
        self.ignore_tag_by_index.iter().any(|range| range.contains(&index))
    }

    pub fn ignores_attr(&self, tag: &str, attr: &str) -> bool {
        self.ignore_attr.iter().any(|a| a.matches(tag, attr))
    }

    pub fn ignores_value(&self, tag: &str, attr: &str, value: &str) -> bool {
        self.ignore_value.iter().any(|v| v.matches(tag, attr, value))
    }

    pub fn ignores_media_format(&self, ext: &str) -> bool {
        self.ignore_media_format.iter().any(|f| f.eq_ignore_ascii_case(ext))
    }
}
