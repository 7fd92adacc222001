//! Media Hook
//!
//! Traversal hook reporting embedded media in formats a target platform
//! cannot play. `<video>` and `<audio>` with `<source>` children are
//! reported only where every alternative fails.

use tracing::trace;
use xlint_core::{status_of, Feature, Platforms, Problem, ProblemType, Status};
use xlint_html::{Element, HookContext, NodeId, Scope, TraversalHook};

use crate::types::{mime_essence, url_extension, MediaTypes};

/// What a media reference points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    /// Extension ignored in scope
    Ignored,
    /// No observed media type
    Unresolved,
    Type(String),
}

/// The `media` traversal hook
#[derive(Debug, Clone)]
pub struct MediaHook {
    types: MediaTypes,
}

impl MediaHook {
    pub const NAME: &'static str = "media";

    /// Hook using the built-in extension table
    pub fn new() -> crate::Result<Self> {
        Ok(Self::with_types(MediaTypes::builtin()?))
    }

    pub fn with_types(types: MediaTypes) -> Self {
        Self { types }
    }

    pub fn types(&self) -> &MediaTypes {
        &self.types
    }

    /// Resolve a reference from its URL and declared MIME type.
    ///
    /// A declared type wins if observed and skips the reference otherwise;
    /// without one the URL's extension decides.
    pub fn resolve(&self, src: Option<&str>, declared: Option<&str>, scope: &Scope) -> MediaRef {
        let ext = src.map(url_extension).unwrap_or_default();
        if !ext.is_empty() && scope.ignores_media_format(&ext) {
            return MediaRef::Ignored;
        }

        if let Some(declared) = declared.filter(|d| !d.trim().is_empty()) {
            return match mime_essence(declared) {
                Some(media_type) if self.types.is_observed(&media_type) => MediaRef::Type(media_type),
                _ => MediaRef::Unresolved,
            };
        }

        match src.and_then(|_| self.types.for_extension(&ext)) {
            Some(media_type) => MediaRef::Type(media_type.to_string()),
            None => MediaRef::Unresolved,
        }
    }

    /// Platforms that do not support `media_type`
    fn unsupported_on(&self, ctx: &HookContext<'_>, media_type: &str) -> xlint_html::Result<Platforms> {
        let mut platforms = Platforms::none();
        for platform_id in ctx.config.platform_ids() {
            let dataset = ctx.store.require(Feature::Media, platform_id)?;
            if dataset.entry(media_type).map(status_of) == Some(Status::No) {
                platforms.push(platform_id);
            }
        }
        Ok(platforms)
    }

    fn problem_for(&self, ctx: &HookContext<'_>, media: MediaRef, element: &Element) -> xlint_html::Result<Option<Problem>> {
        let MediaRef::Type(media_type) = media else {
            return Ok(None);
        };
        let platforms = self.unsupported_on(ctx, &media_type)?;
        if platforms.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            Problem::error(
                ProblemType::MediaFormatNotSupported,
                format!("Media type \"{media_type}\" is not supported."),
            )
            .with_evidence(element.raw.clone())
            .with_context(element.raw.clone())
            .at_line(element.location.line, element.location.column)
            .for_platforms(platforms),
        ))
    }

    /// `<source>` alternatives of a `<video>` or `<audio>`
    fn check_sources(&self, ctx: &HookContext<'_>, node: NodeId, scope: &Scope) -> xlint_html::Result<Vec<Problem>> {
        let sources: Vec<&Element> = ctx
            .document
            .child_elements(node)
            .map(|(_, element)| element)
            .filter(|element| element.name == "source" && element.has_attrs())
            .collect();
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let mut problems = Vec::new();
        for source in &sources {
            let media = self.resolve(source.attr("src"), source.attr("type"), scope);
            if media == MediaRef::Ignored {
                return Ok(Vec::new());
            }
            problems.extend(self.problem_for(ctx, media, source)?);
        }
        if problems.len() < sources.len() {
            trace!("{} of {} <source> alternatives playable", sources.len() - problems.len(), sources.len());
            return Ok(Vec::new());
        }

        let failing_everywhere: Vec<String> = ctx
            .config
            .platform_ids()
            .filter(|id| problems.iter().all(|p| p.influenced_platforms.contains(id)))
            .map(String::from)
            .collect();
        for problem in &mut problems {
            problem.influenced_platforms = Platforms::List(
                problem
                    .influenced_platforms
                    .ids()
                    .iter()
                    .filter(|id| failing_everywhere.contains(id))
                    .cloned()
                    .collect(),
            );
        }
        problems.retain(|p| !p.influenced_platforms.is_empty());
        Ok(problems)
    }
}

impl TraversalHook for MediaHook {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, ctx: &HookContext<'_>, node: NodeId, element: &Element, scope: &Scope) -> xlint_html::Result<Vec<Problem>> {
        let media = match element.name.as_str() {
            "object" => {
                let (data, declared) = (element.attr("data"), element.attr("type"));
                if data.is_none() && declared.is_none() {
                    return Ok(Vec::new());
                }
                self.resolve(data, declared, scope)
            }
            "embed" => {
                let (src, declared) = (element.attr("src"), element.attr("type"));
                if src.is_none() && declared.is_none() {
                    return Ok(Vec::new());
                }
                self.resolve(src, declared, scope)
            }
            "img" => match element.attr("src") {
                Some(src) => self.resolve(Some(src), None, scope),
                None => return Ok(Vec::new()),
            },
            "video" | "audio" => match element.attr("src").filter(|src| !src.is_empty()) {
                Some(src) => self.resolve(Some(src), None, scope),
                None => return self.check_sources(ctx, node, scope),
            },
            _ => return Ok(Vec::new()),
        };

        Ok(self.problem_for(ctx, media, element)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use xlint_core::{CheckResult, CompatStore, Config, Dataset};
    use xlint_html::HtmlChecker;

    const IOS_MEDIA: &str = r#"{
        "video/webm": {"_supported": "n"},
        "video/ogg": {"_supported": "n"},
        "video/x-flv": {"_supported": "n"},
        "image/webp": {"_supported": "n"},
        "application/x-shockwave-flash": {"_supported": "n"},
        "video/mp4": {}
    }"#;

    const ANDROID_MEDIA: &str = r#"{
        "video/mp4": {"_supported": "n"},
        "video/x-flv": {"_supported": "n"},
        "application/x-shockwave-flash": {"_supported": "n"},
        "video/webm": {},
        "video/ogg": {}
    }"#;

    fn dataset(json: &str) -> Dataset {
        Dataset::from_json(&format!(r#"{{"compatibility-data": {json}}}"#)).unwrap()
    }

    fn checker() -> HtmlChecker {
        let store = Arc::new(CompatStore::new("/nonexistent"));
        for (platform, media) in [("ios_7", IOS_MEDIA), ("android_4.0", ANDROID_MEDIA)] {
            store.insert_dataset(Feature::Html, platform, dataset("{}")).unwrap();
            store.insert_dataset(Feature::Media, platform, dataset(media)).unwrap();
        }
        let mut checker = HtmlChecker::new(store, Config::for_platforms(&["ios_7", "android_4.0"]));
        assert!(checker.register(Box::new(MediaHook::new().unwrap())));
        checker
    }

    fn platforms(result: &CheckResult) -> Vec<Vec<String>> {
        result
            .problems
            .iter()
            .map(|p| p.influenced_platforms.ids().to_vec())
            .collect()
    }

    #[test]
    fn test_sources_covering_all_platforms() {
        let html = r#"<video><source src="clip.mp4"><source src="clip.webm"></video>"#;
        assert!(checker().check(html).unwrap().is_clean());
    }

    #[test]
    fn test_sources_failing_together() {
        let html = "<video>\n<source src=a.flv>\n<source src=a.ogv>\n</video>";
        let result = checker().check(html).unwrap();
        assert_eq!(platforms(&result), [vec!["ios_7".to_string()], vec!["ios_7".to_string()]]);

        let problem = &result.problems[0];
        assert_eq!(problem.kind, ProblemType::MediaFormatNotSupported);
        assert_eq!(problem.reason, "Media type \"video/x-flv\" is not supported.");
        assert_eq!(problem.evidence.as_deref(), Some("<source src=a.flv>"));
        assert_eq!(problem.line, 2);
        assert_eq!(result.problems[1].line, 3);
    }

    #[test]
    fn test_source_without_problem_clears_set() {
        let html = r#"<audio><source src="a.flv"><source src="a.xyz"><source type="text/plain" src="b.flv"></audio>"#;
        assert!(checker().check(html).unwrap().is_clean());
    }

    #[test]
    fn test_ignored_source_skips_set() {
        let html = r#"<!--xlint.ignoremedia ogv--><video><source src="a.flv"><source src="a.OGV"></video>"#;
        assert!(checker().check(html).unwrap().is_clean());
    }

    #[test]
    fn test_single_reference_elements() {
        let html = r#"<img src="pic.webp?size=2#top"><object type="application/x-shockwave-flash"></object><embed src="movie.swf"><embed src="movie.swf" type="text/plain"><video src="clip.mp4" type="video/webm"></video>"#;
        let result = checker().check(html).unwrap();
        assert_eq!(
            platforms(&result),
            [
                vec!["ios_7".to_string()],
                vec!["ios_7".to_string(), "android_4.0".to_string()],
                vec!["ios_7".to_string(), "android_4.0".to_string()],
                vec!["android_4.0".to_string()],
            ]
        );
        assert_eq!(result.problems[0].context.as_deref(), Some(r#"<img src="pic.webp?size=2#top">"#));
        assert_eq!(result.problems[3].reason, "Media type \"video/mp4\" is not supported.");
    }

    #[test]
    fn test_declared_type_parameters() {
        let html = r#"<object data="x.bin" type="Video/WebM; codecs=vp8"></object>"#;
        let result = checker().check(html).unwrap();
        assert_eq!(platforms(&result), [vec!["ios_7".to_string()]]);
    }

    #[test]
    fn test_ignored_extension_in_config() {
        let mut checker = checker();
        let mut config = checker.config().clone();
        config.ignore_media_format = vec!["SWF".into()];
        checker.set_config(config);
        assert!(checker.check(r#"<embed src="movie.swf">"#).unwrap().is_clean());
    }

    #[test]
    fn test_resolve() {
        let hook = MediaHook::new().unwrap();
        let scope = Scope::default();
        assert_eq!(hook.resolve(Some("a.mp4"), None, &scope), MediaRef::Type("video/mp4".into()));
        assert_eq!(hook.resolve(Some("a.mp4"), Some("image/x-unknown"), &scope), MediaRef::Unresolved);
        assert_eq!(hook.resolve(None, Some("audio/ogg"), &scope), MediaRef::Type("audio/ogg".into()));
        assert_eq!(hook.resolve(Some("noext"), None, &scope), MediaRef::Unresolved);
    }
}
