//! HTML Compatibility Checker
//!
//! Walks the document depth first. Each element is checked for tag,
//! attribute and attribute value support on every target platform, then
//! handed to the registered traversal hooks.

use std::sync::Arc;

use xlint_core::{
    status_of, CheckResult, CompatStore, Config, Dataset, Feature, Platforms, Problem, ProblemType, Status,
};

use crate::scope::Scope;
use crate::tree::{parse_document, Document, Element, NodeId};
use crate::Result;

/// What a hook sees besides the node itself
pub struct HookContext<'a> {
    pub document: &'a Document,
    pub store: &'a CompatStore,
    pub config: &'a Config,
}

/// A check run on every element the checker visits
pub trait TraversalHook: Send + Sync {
    /// Registry key
    fn name(&self) -> &str;

    /// Problems for one element, checked with the scope of its sibling list
    fn check(&self, ctx: &HookContext<'_>, node: NodeId, element: &Element, scope: &Scope) -> Result<Vec<Problem>>;
}

/// HTML compatibility checker
pub struct HtmlChecker {
    store: Arc<CompatStore>,
    config: Config,
    /// Most recently registered first
    hooks: Vec<Box<dyn TraversalHook>>,
}

impl HtmlChecker {
    /// Create a checker over already loaded HTML data
    pub fn new(store: Arc<CompatStore>, config: Config) -> Self {
        Self {
            store,
            config,
            hooks: Vec::new(),
        }
    }

    /// Replace the active configuration
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register a hook; false if one with the same name exists
    pub fn register(&mut self, hook: Box<dyn TraversalHook>) -> bool {
        if self.hooks.iter().any(|h| h.name() == hook.name()) {
            return false;
        }
        tracing::debug!("Registered traversal hook {}", hook.name());
        self.hooks.insert(0, hook);
        true
    }

    /// Remove a hook by name
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|h| h.name() != name);
        before != self.hooks.len()
    }

    /// Names of the registered hooks, in run order
    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    /// Check markup.
    ///
    /// Markup that cannot be parsed is reported as a single problem for all
    /// platforms.
    pub fn check(&self, html: &str) -> Result<CheckResult> {
        match parse_document(html) {
            Ok(document) => self.check_document(&document),
            Err(err) => Ok(CheckResult::new(vec![
                Problem::error(ProblemType::HtmlParseError, err.reason).for_platforms(Platforms::All),
            ])),
        }
    }

    /// Check a parsed document
    pub fn check_document(&self, document: &Document) -> Result<CheckResult> {
        let mut datasets = Vec::with_capacity(self.config.target_platforms.len());
        for platform_id in self.config.platform_ids() {
            datasets.push((platform_id, self.store.require(Feature::Html, platform_id)?));
        }

        let ctx = HookContext {
            document,
            store: &self.store,
            config: &self.config,
        };
        let scope = Scope::from_config(&self.config).for_siblings(document, document.roots());

        let mut problems = Vec::new();
        self.walk(&ctx, &datasets, document.roots(), &scope, &mut problems)?;
        Ok(CheckResult::new(problems))
    }

    fn walk(
        &self,
        ctx: &HookContext<'_>,
        datasets: &[(&str, Arc<Dataset>)],
        siblings: &[NodeId],
        scope: &Scope,
        problems: &mut Vec<Problem>,
    ) -> Result<()> {
        for (index, &id) in siblings.iter().enumerate() {
            if scope.ignores_index(index) {
                continue;
            }
            let Some(element) = ctx.document.element(id) else {
                continue;
            };
            if scope.ignores_tag(&element.name) {
                continue;
            }

            check_element(element, scope, datasets, problems);
            for hook in &self.hooks {
                problems.extend(hook.check(ctx, id, element, scope)?);
            }

            let children = ctx.document.children(id);
            if !children.is_empty() {
                let child_scope = scope.for_siblings(ctx.document, children);
                self.walk(ctx, datasets, children, &child_scope, problems)?;
            }
        }
        Ok(())
    }
}

fn tag_status(dataset: &Dataset, tag: &str) -> Status {
    dataset.entry(tag).map(status_of).unwrap_or(Status::Unknown)
}

/// Attribute support, falling back to the `*` tag
fn attr_status(dataset: &Dataset, tag: &str, attr: &str) -> Status {
    dataset
        .get_path(&[tag, attr])
        .or_else(|| dataset.get_path(&["*", attr]))
        .map(status_of)
        .unwrap_or(Status::Unknown)
}

/// Attribute value support, falling back to the `*` tag
fn value_status(dataset: &Dataset, tag: &str, attr: &str, value: &str) -> Status {
    dataset
        .get_path(&[tag, attr, value])
        .or_else(|| dataset.get_path(&["*", attr, value]))
        .map(status_of)
        .unwrap_or(Status::Unknown)
}

/// Tag, attribute and value problems of one element, one per category with
/// every platform it applies to
fn check_element(element: &Element, scope: &Scope, datasets: &[(&str, Arc<Dataset>)], problems: &mut Vec<Problem>) {
    let tag = element.name.as_str();
    let mut tag_platforms = Platforms::none();
    let mut attr_platforms: Vec<(&str, Platforms)> = Vec::new();
    let mut value_platforms: Vec<(&str, &str, Platforms)> = Vec::new();

    for (platform_id, dataset) in datasets {
        match tag_status(dataset, tag) {
            Status::No => {
                tag_platforms.push(platform_id);
                continue;
            }
            Status::Maybe => continue,
            Status::Yes | Status::Unknown => {}
        }

        for (attr, value) in &element.attrs {
            if scope.ignores_attr(tag, attr) {
                continue;
            }
            match attr_status(dataset, tag, attr) {
                Status::No => match attr_platforms.iter_mut().find(|(a, _)| a == attr) {
                    Some((_, platforms)) => platforms.push(platform_id),
                    None => attr_platforms.push((attr.as_str(), Platforms::List(vec![platform_id.to_string()]))),
                },
                Status::Yes => {
                    if value.is_empty()
                        || scope.ignores_value(tag, attr, value)
                        || value_status(dataset, tag, attr, value) != Status::No
                    {
                        continue;
                    }
                    match value_platforms.iter_mut().find(|(a, ..)| a == attr) {
                        Some((.., platforms)) => platforms.push(platform_id),
                        None => value_platforms.push((
                            attr.as_str(),
                            value.as_str(),
                            Platforms::List(vec![platform_id.to_string()]),
                        )),
                    }
                }
                Status::Maybe | Status::Unknown => {}
            }
        }
    }

    let problem = |kind: ProblemType, reason: String, evidence: &str, platforms: Platforms| {
        Problem::error(kind, reason)
            .with_evidence(evidence)
            .with_context(element.raw.clone())
            .at_line(element.location.line, element.location.column)
            .for_platforms(platforms)
    };

    if !tag_platforms.is_empty() {
        problems.push(problem(
            ProblemType::HtmlTagNotSupported,
            format!("Tag \"{tag}\" is not supported."),
            tag,
            tag_platforms,
        ));
    }
    for (attr, platforms) in attr_platforms {
        problems.push(problem(
            ProblemType::HtmlAttrNotSupported,
            format!("Attribute \"{attr}\" is not supported."),
            attr,
            platforms,
        ));
    }
    for (attr, value, platforms) in value_platforms {
        problems.push(problem(
            ProblemType::HtmlValueNotSupported,
            format!("Value \"{value}\" for attribute \"{attr}\" is not supported."),
            value,
            platforms,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    const HTML_DATA: &str = r#"{
        "blink": {"_supported": "n"},
        "marquee": {"_supported": "m", "behavior": {"_supported": "n"}},
        "video": {"preload": {"_supported": "n"}, "controls": {}},
        "input": {"type": {"date": {"_supported": "n"}, "text": {}}},
        "*": {"contenteditable": {"_supported": "n"}, "dir": {"auto": {"_supported": "n"}}},
        "_private": {"_supported": "n"}
    }"#;

    fn checker(platforms: &[&str]) -> HtmlChecker {
        let store = Arc::new(CompatStore::new("/nonexistent"));
        for platform in platforms {
            let dataset = Dataset::from_json(&format!(r#"{{"compatibility-data": {HTML_DATA}}}"#)).unwrap();
            store.insert_dataset(Feature::Html, platform, dataset).unwrap();
        }
        HtmlChecker::new(store, Config::for_platforms(platforms))
    }

    fn kinds(result: &CheckResult) -> Vec<u8> {
        result.problems.iter().map(|p| p.kind.code()).collect()
    }

    /// Records the elements it is called for
    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl TraversalHook for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn check(&self, _ctx: &HookContext<'_>, _node: NodeId, element: &Element, _scope: &Scope) -> Result<Vec<Problem>> {
            self.seen.lock().push(format!("{}:{}", self.name, element.name));
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_unsupported_tag() {
        let checker = checker(&["ios_7", "android_4.0"]);
        let result = checker.check("<div>\n  <blink>hi</blink>\n</div>").unwrap();

        assert_eq!(result.problems.len(), 1);
        let problem = &result.problems[0];
        assert_eq!(problem.kind, ProblemType::HtmlTagNotSupported);
        assert_eq!(problem.reason, "Tag \"blink\" is not supported.");
        assert_eq!(problem.evidence.as_deref(), Some("blink"));
        assert_eq!(problem.context.as_deref(), Some("<blink>"));
        assert_eq!((problem.line, problem.column, problem.position), (2, 3, -1));
        assert_eq!(problem.influenced_platforms.ids(), ["ios_7".to_string(), "android_4.0".to_string()]);
    }

    #[test]
    fn test_attributes_and_values() {
        let checker = checker(&["ios_7"]);
        let result = checker
            .check(r#"<video preload="auto" controls></video><input type="date"><input type="text">"#)
            .unwrap();
        assert_eq!(kinds(&result), [22, 23]);
        assert_eq!(result.problems[0].reason, "Attribute \"preload\" is not supported.");
        assert_eq!(
            result.problems[1].reason,
            "Value \"date\" for attribute \"type\" is not supported."
        );
        assert_eq!(result.problems[1].evidence.as_deref(), Some("date"));
    }

    #[test]
    fn test_wildcard_fallback() {
        let checker = checker(&["ios_7"]);
        let result = checker.check(r#"<p contenteditable dir="auto">x</p>"#).unwrap();
        assert_eq!(kinds(&result), [22, 23]);
        assert_eq!(result.problems[0].evidence.as_deref(), Some("contenteditable"));
    }

    #[test]
    fn test_maybe_tag_skips_attributes() {
        let checker = checker(&["ios_7"]);
        assert!(checker.check(r#"<marquee behavior="alternate">x</marquee>"#).unwrap().is_clean());
    }

    #[test]
    fn test_index_directive_skips_siblings() {
        let checker = checker(&["ios_7"]);
        let html = "<!--xlint.ignoretag 2--><blink>a</blink><blink>b</blink><blink>c</blink>";
        let result = checker.check(html).unwrap();
        assert_eq!(result.problems.len(), 1);
        assert_eq!(result.problems[0].column, 57);
    }

    #[test]
    fn test_named_directives_apply_to_subtree() {
        let checker = checker(&["ios_7"]);
        let html = r#"<div><!-- xlint.ignoretag blink; xlint.ignoreattr video/preload; xlint.ignorevalue input/type/date -->
            <section><blink>a</blink><video preload="none"></video><input type="DATE"></section>
        </div><blink>b</blink>"#;
        let result = checker.check(html).unwrap();
        assert_eq!(kinds(&result), [21]);
        assert_eq!(result.problems[0].line, 3);
    }

    #[test]
    fn test_config_ignores() {
        let mut checker = checker(&["ios_7"]);
        let mut config = checker.config().clone();
        config.ignore_html_tag = vec!["BLINK".into()];
        config.ignore_html_attr = vec![xlint_core::IgnoreAttr::new("video", "preload")];
        checker.set_config(config);
        assert!(checker.check(r#"<blink></blink><video preload></video>"#).unwrap().is_clean());
    }

    #[test]
    fn test_parse_error() {
        let checker = checker(&["ios_7"]);
        let result = checker.check("<div><blink").unwrap();
        assert_eq!(result.problems.len(), 1);
        let problem = &result.problems[0];
        assert_eq!(problem.kind, ProblemType::HtmlParseError);
        assert_eq!(problem.influenced_platforms, Platforms::All);
        assert_eq!((problem.line, problem.column), (-1, -1));
        assert!(problem.evidence.is_none());
    }

    #[test]
    fn test_apostrophe_in_unquoted_value() {
        let checker = checker(&["ios_7"]);
        let result = checker.check("<img alt=don't src=a.png>\n<blink>x</blink>").unwrap();
        assert_eq!(kinds(&result), [21]);
        assert_eq!(result.problems[0].line, 2);
    }

    #[test]
    fn test_hook_registry() {
        let mut checker = checker(&["ios_7"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook = |name| Box::new(Recorder { name, seen: seen.clone() });

        assert!(checker.register(hook("first")));
        assert!(checker.register(hook("second")));
        assert!(!checker.register(hook("first")));
        assert_eq!(checker.hook_names(), ["second", "first"]);

        checker.check("<p><!--xlint.ignoretag 1--><blink></blink><i></i></p>").unwrap();
        assert_eq!(*seen.lock(), ["second:p", "first:p", "second:i", "first:i"]);

        assert!(checker.unregister("second"));
        assert!(!checker.unregister("second"));
        assert_eq!(checker.hook_names(), ["first"]);
    }

    #[test]
    fn test_unloaded_platform_is_error() {
        let checker = HtmlChecker::new(Arc::new(CompatStore::new("/nonexistent")), Config::for_platforms(&["ios_7"]));
        assert!(checker.check("<p></p>").is_err());
    }
}
