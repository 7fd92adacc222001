//! Observed Property Catalog
//!
//! The CSS properties xlint checks, their vendor-prefixed and equivalent
//! spellings, and the value types known for each.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use crate::value::{classify, parse_value, ValueDescriptor, ValueKind};
use crate::{CssError, Result};

const PROPERTIES_JSON: &str = include_str!("../data/properties.json");
const KNOWN_VALUES_JSON: &str = include_str!("../data/known_values.json");

/// Catalog entry of one property
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyInfo {
    pub prefixes: Vec<String>,
    pub equivalents: Vec<String>,
    pub known_values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(rename = "type")]
    kind: String,
    value: Option<String>,
    name: Option<String>,
}

/// Observed properties and value type descriptors
#[derive(Debug, Clone)]
pub struct PropertyCatalog {
    properties: HashMap<String, PropertyInfo>,
    descriptors: HashMap<String, ValueDescriptor>,
}

impl PropertyCatalog {
    /// The catalog shipped with xlint
    pub fn builtin() -> Result<Self> {
        Self::from_json(PROPERTIES_JSON, KNOWN_VALUES_JSON)
    }

    /// Build a catalog from property and value-type JSON
    pub fn from_json(properties: &str, known_values: &str) -> Result<Self> {
        let base: BTreeMap<String, PropertyInfo> = serde_json::from_str(properties)?;
        let raw: BTreeMap<String, RawDescriptor> = serde_json::from_str(known_values)?;

        let mut descriptors = HashMap::with_capacity(raw.len());
        for (tag, raw) in raw {
            let descriptor = match (raw.kind.as_str(), raw.value, raw.name) {
                ("IDENT", Some(value), _) => ValueDescriptor::Ident(value),
                ("FUNCTION", _, Some(name)) => ValueDescriptor::Function(name),
                (kind, ..) => match ValueKind::from_name(kind) {
                    Some(kind) if kind != ValueKind::Ident && kind != ValueKind::Function => {
                        ValueDescriptor::Literal(kind)
                    }
                    _ => return Err(CssError::Catalog(format!("bad descriptor for value type {tag}"))),
                },
            };
            descriptors.insert(tag, descriptor);
        }

        let properties = expand_prefixes(base);
        tracing::debug!(
            "Property catalog: {} properties, {} value types",
            properties.len(),
            descriptors.len()
        );
        Ok(Self { properties, descriptors })
    }

    pub fn is_observed(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.get(name)
    }

    /// Substitutable spellings of `name`: its prefixed forms, then its
    /// equivalents. `None` when the property is not observed.
    pub fn equivalents(&self, name: &str) -> Option<Vec<String>> {
        let info = self.properties.get(name)?;
        let mut result: Vec<String> = info.prefixes.iter().map(|prefix| format!("{prefix}{name}")).collect();
        result.extend(info.equivalents.iter().cloned());
        Some(result)
    }

    pub fn descriptor(&self, tag: &str) -> Option<&ValueDescriptor> {
        self.descriptors.get(tag)
    }

    /// Value types of a declaration value, in node order.
    ///
    /// Unparsable values and properties without known values yield nothing.
    pub fn value_types(&self, property: &str, value: &str) -> Vec<String> {
        let Some(info) = self.properties.get(property) else {
            return Vec::new();
        };
        if info.known_values.is_empty() {
            return Vec::new();
        }

        let nodes = match parse_value(value) {
            Ok(nodes) => nodes,
            Err(err) => {
                tracing::debug!("Cannot classify {}: {}: {}", property, value, err);
                return Vec::new();
            }
        };

        let known: Vec<(&str, &ValueDescriptor)> = info
            .known_values
            .iter()
            .filter_map(|tag| self.descriptors.get(tag).map(|d| (tag.as_str(), d)))
            .collect();
        classify(&nodes, &known)
    }
}

/// Add an entry per prefixed spelling of every property with prefixes.
///
/// A prefixed entry shares the base's known values and lists the base, the
/// other prefixed spellings and the base's equivalents as its equivalents.
fn expand_prefixes(base: BTreeMap<String, PropertyInfo>) -> HashMap<String, PropertyInfo> {
    let mut properties: HashMap<String, PropertyInfo> =
        base.iter().map(|(name, info)| (name.clone(), info.clone())).collect();

    for (name, info) in &base {
        for prefix in &info.prefixes {
            let prefixed = format!("{prefix}{name}");
            if properties.contains_key(&prefixed) {
                continue;
            }

            let mut equivalents = vec![name.clone()];
            equivalents.extend(
                info.prefixes
                    .iter()
                    .filter(|other| *other != prefix)
                    .map(|other| format!("{other}{name}")),
            );
            equivalents.extend(info.equivalents.iter().cloned());

            properties.insert(
                prefixed,
                PropertyInfo {
                    prefixes: Vec::new(),
                    equivalents,
                    known_values: info.known_values.clone(),
                },
            );
        }
    }
    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PropertyCatalog {
        PropertyCatalog::builtin().unwrap()
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = catalog();
        assert!(catalog.is_observed("transform"));
        assert!(catalog.is_observed("-webkit-transform"));
        assert!(catalog.is_observed("color"));
        assert!(!catalog.is_observed("-webkit-color"));
        assert!(!catalog.is_observed("float"));
    }

    #[test]
    fn test_every_known_value_is_described() {
        let catalog = catalog();
        for (name, info) in &catalog.properties {
            for tag in &info.known_values {
                assert!(catalog.descriptor(tag).is_some(), "{name}: {tag}");
            }
        }
    }

    #[test]
    fn test_base_equivalents() {
        let catalog = catalog();
        let equivalents = catalog.equivalents("transform").unwrap();
        assert_eq!(equivalents, ["-webkit-transform", "-moz-transform", "-ms-transform", "-o-transform"]);
        assert_eq!(catalog.equivalents("opacity").unwrap(), Vec::<String>::new());
        assert!(catalog.equivalents("float").is_none());
    }

    #[test]
    fn test_prefixed_equivalents() {
        let catalog = catalog();
        let equivalents = catalog.equivalents("-moz-transform").unwrap();
        assert_eq!(equivalents, ["transform", "-webkit-transform", "-ms-transform", "-o-transform"]);

        let equivalents = catalog.equivalents("-webkit-flex").unwrap();
        assert_eq!(equivalents, ["flex", "-ms-flex", "-webkit-box-flex", "-moz-box-flex"]);
        assert_eq!(
            catalog.get("-webkit-transform").unwrap().known_values,
            catalog.get("transform").unwrap().known_values
        );
    }

    #[test]
    fn test_value_types() {
        let catalog = catalog();
        assert_eq!(catalog.value_types("display", "-webkit-box"), ["-webkit-box"]);
        assert_eq!(catalog.value_types("-webkit-transform", "scale(1) rotate(2deg)"), ["scale()", "rotate()"]);
        assert_eq!(catalog.value_types("width", "calc(100% - 2rem)"), ["calc()", "REMS"]);
        assert!(catalog.value_types("color", "red").is_empty());
        assert!(catalog.value_types("opacity", "0.5").is_empty());
        assert!(catalog.value_types("transform", "scale(1").is_empty());
    }

    #[test]
    fn test_bad_descriptor_is_error() {
        let err = PropertyCatalog::from_json("{}", r#"{"x": {"type": "IDENT"}}"#).unwrap_err();
        assert!(matches!(err, CssError::Catalog(_)));
    }
}
