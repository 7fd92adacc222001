//! CSS Compatibility Checker
//!
//! Checks every declaration of a stylesheet against the CSS compatibility
//! data of each target platform.
//!
//! Declared properties of a rule are grouped with their declared
//! vendor-prefixed and equivalent spellings. A group is supported on a
//! platform as soon as one of its items is: findings of the other items are
//! kept per platform while the group is scanned and only recorded once the
//! scan ends without such an item.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use xlint_core::{
    locate, member, status_of, CheckResult, CompatStore, Config, Dataset, Feature, Platforms, Problem, ProblemType,
    Status,
};

use crate::catalog::PropertyCatalog;
use crate::parser::{parse_stylesheet, Declaration, RuleDirectives, RuleId, StyleRule, Stylesheet, SyntaxError};
use crate::Result;

/// Problem identity inside one style rule:
/// (item order, category rank, declaration index, value type index)
type FindingKey = (usize, u8, usize, usize);

/// A problem found for one platform, not yet recorded
struct Finding {
    key: FindingKey,
    kind: ProblemType,
    reason: String,
    declaration: usize,
}

/// Output order of problem categories for one item
fn rank(kind: ProblemType) -> u8 {
    match kind {
        ProblemType::CssPropertyPartiallySupported => 0,
        ProblemType::CssPropertyNotSupported => 1,
        ProblemType::CssValuePartiallySupported => 2,
        _ => 3,
    }
}

/// CSS compatibility checker
pub struct CssChecker {
    store: Arc<CompatStore>,
    catalog: PropertyCatalog,
    config: Config,
}

impl CssChecker {
    /// Create a checker over already loaded CSS data
    pub fn new(store: Arc<CompatStore>, config: Config) -> Result<Self> {
        Ok(Self {
            store,
            catalog: PropertyCatalog::builtin()?,
            config,
        })
    }

    /// Replace the active configuration
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &PropertyCatalog {
        &self.catalog
    }

    /// Check CSS source text.
    ///
    /// A syntax error is reported as a single problem for all platforms.
    pub fn check(&self, css: &str) -> Result<CheckResult> {
        match parse_stylesheet(css) {
            Ok(sheet) => self.check_stylesheet(&sheet),
            Err(err) => {
                tracing::debug!("CSS parse error at {}: {}", err.offset, err.reason);
                Ok(CheckResult::new(vec![parse_error(css, &err)]))
            }
        }
    }

    /// Check a parsed (and possibly annotated) stylesheet
    pub fn check_stylesheet(&self, sheet: &Stylesheet) -> Result<CheckResult> {
        let mut datasets = Vec::with_capacity(self.config.target_platforms.len());
        for platform_id in self.config.platform_ids() {
            datasets.push((platform_id, self.store.require(Feature::Css, platform_id)?));
        }

        let mut root = sheet.root_directives().clone();
        root.ignored_properties
            .extend(self.config.ignore_property.iter().map(|p| p.to_ascii_lowercase()));

        let mut problems = Vec::new();
        self.check_rules(sheet, sheet.rules(), &root, &datasets, &mut problems);
        Ok(CheckResult::new(problems))
    }

    fn check_rules(
        &self,
        sheet: &Stylesheet,
        ids: &[RuleId],
        parent: &RuleDirectives,
        datasets: &[(&str, Arc<Dataset>)],
        problems: &mut Vec<Problem>,
    ) {
        for &id in ids {
            let directives = parent.inherit(sheet.directives(id));
            if directives.ignore == Some(true) {
                continue;
            }

            let rule = sheet.rule(id);
            if let Some(style) = rule.style() {
                self.check_style_rule(style, &directives, datasets, problems);
            } else if !rule.children().is_empty() {
                self.check_rules(sheet, rule.children(), &directives, datasets, problems);
            }
        }
    }

    fn check_style_rule(
        &self,
        rule: &StyleRule,
        directives: &RuleDirectives,
        datasets: &[(&str, Arc<Dataset>)],
        problems: &mut Vec<Problem>,
    ) {
        let groups = self.group_properties(rule);
        let order: Vec<&str> = {
            let mut seen = HashSet::new();
            groups.iter().flatten().copied().filter(|name| seen.insert(*name)).collect()
        };

        let mut recorded: BTreeMap<FindingKey, Problem> = BTreeMap::new();
        for (platform_id, dataset) in datasets {
            for group in &groups {
                let mut pending = Vec::new();
                let mut supported = false;

                for name in group {
                    if directives.ignores_property(name) || !self.catalog.is_observed(name) {
                        continue;
                    }
                    let item = order.iter().position(|n| n == name).unwrap_or_default();
                    if self.check_item(item, name, rule, directives, dataset, &mut pending) {
                        supported = true;
                        break;
                    }
                }

                if supported {
                    continue;
                }
                for finding in pending {
                    let decl = &rule.declarations[finding.declaration];
                    recorded
                        .entry(finding.key)
                        .or_insert_with(|| declaration_problem(finding.kind, finding.reason, decl))
                        .influenced_platforms
                        .push(platform_id);
                }
            }
        }

        problems.extend(recorded.into_values().filter(|p| !p.influenced_platforms.is_empty()));
    }

    /// Check every occurrence of `name` on one platform.
    ///
    /// Returns true if the item makes its group supported.
    fn check_item(
        &self,
        item: usize,
        name: &str,
        rule: &StyleRule,
        directives: &RuleDirectives,
        dataset: &Dataset,
        pending: &mut Vec<Finding>,
    ) -> bool {
        let entry = dataset.entry(name);
        let status = entry.map(status_of).unwrap_or(Status::Unknown);
        let property_problem = match status {
            Status::Yes => None,
            Status::Maybe => Some((
                ProblemType::CssPropertyPartiallySupported,
                format!("Property \"{name}\" may not be supported on some devices."),
            )),
            Status::No | Status::Unknown => Some((
                ProblemType::CssPropertyNotSupported,
                format!("Property \"{name}\" is not supported."),
            )),
        };

        let mut occurrences = 0;
        let mut problematic = 0;
        for (index, decl) in rule.declarations.iter().enumerate() {
            if decl.name != name {
                continue;
            }
            occurrences += 1;
            if directives.ignores_index(index) {
                continue;
            }

            if let Some((kind, reason)) = &property_problem {
                pending.push(Finding {
                    key: (item, rank(*kind), index, 0),
                    kind: *kind,
                    reason: reason.clone(),
                    declaration: index,
                });
            }

            let Some(entry) = entry else {
                continue;
            };
            let mut value_problem = false;
            for (type_index, tag) in self.value_types(name, &decl.value).iter().enumerate() {
                let status = member(entry, tag).map(status_of).unwrap_or(Status::No);
                let (kind, reason) = match status {
                    Status::Yes => continue,
                    Status::Maybe => (
                        ProblemType::CssValuePartiallySupported,
                        format!("Value \"{}\" may not be supported on some devices.", decl.value),
                    ),
                    Status::No | Status::Unknown => (
                        ProblemType::CssValueNotSupported,
                        format!("Value \"{}\" is not supported.", decl.value),
                    ),
                };
                value_problem = true;
                pending.push(Finding {
                    key: (item, rank(kind), index, type_index),
                    kind,
                    reason,
                    declaration: index,
                });
            }
            if value_problem {
                problematic += 1;
            }
        }

        property_problem.is_none() && problematic < occurrences
    }

    /// Distinct value types of a declaration value, in first-seen order
    fn value_types(&self, property: &str, value: &str) -> Vec<String> {
        let mut types = self.catalog.value_types(property, value);
        let mut seen = HashSet::new();
        types.retain(|tag| seen.insert(tag.clone()));
        types
    }

    /// Partition the declared properties of a rule into substitutable groups,
    /// in first-declaration order
    fn group_properties<'r>(&self, rule: &'r StyleRule) -> Vec<Vec<&'r str>> {
        let mut declared: Vec<&str> = Vec::new();
        for decl in &rule.declarations {
            if !declared.contains(&decl.name.as_str()) {
                declared.push(&decl.name);
            }
        }

        let mut grouped: HashSet<&str> = HashSet::new();
        let mut groups = Vec::new();
        for &name in &declared {
            if grouped.contains(name) {
                continue;
            }
            grouped.insert(name);
            let mut group = vec![name];
            if let Some(equivalents) = self.catalog.equivalents(name) {
                for equivalent in equivalents {
                    if let Some(&declared_name) = declared.iter().find(|d| **d == equivalent) {
                        grouped.insert(declared_name);
                        group.push(declared_name);
                    }
                }
            }
            groups.push(group);
        }
        groups
    }
}

fn declaration_problem(kind: ProblemType, reason: String, decl: &Declaration) -> Problem {
    Problem::error(kind, reason)
        .with_evidence(decl.text.clone())
        .located(decl.location)
        .with_info(decl.name.clone(), decl.value.clone())
}

fn parse_error(css: &str, err: &SyntaxError) -> Problem {
    let evidence = css
        .get(err.offset..)
        .and_then(|rest| rest.chars().next())
        .map(String::from)
        .unwrap_or_default();
    Problem::error(ProblemType::CssParseError, err.reason.clone())
        .with_evidence(evidence)
        .located(locate(css, err.offset))
        .for_platforms(Platforms::All)
}
