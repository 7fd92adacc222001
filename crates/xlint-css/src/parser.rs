//! CSS Rule Tree Parser
//!
//! Builds the rule tree the checker walks, on top of `cssparser` tokens.
//! Rules live in an arena addressed by [`RuleId`]; ignore directives are
//! kept in a side table so parsed rules stay immutable.

use cssparser::{ParseError, ParseErrorKind, Parser, ParserInput, SourcePosition, Token};
use std::collections::HashMap;
use std::ops::{Range, RangeInclusive};
use xlint_core::{Location, Locator};

/// Index of a rule in its stylesheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub usize);

/// A `property: value` declaration as written in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercased property name
    pub name: String,
    /// Value text without `!important`
    pub value: String,
    pub important: bool,
    /// Byte span from the start of the name to the end of the value
    pub span: Range<usize>,
    pub location: Location,
    /// Source text covered by `span`
    pub text: String,
}

/// A selector (or keyframe key) with its declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: String,
    pub declarations: Vec<Declaration>,
}

/// CSS rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssRule {
    Style(StyleRule),
    /// A rule inside `@keyframes`; the selector holds the key text
    Keyframe(StyleRule),
    Media { condition: String, rules: Vec<RuleId> },
    /// `@keyframes` or a vendor-prefixed variant
    Keyframes { at_keyword: String, name: String, rules: Vec<RuleId> },
    FontFace { declarations: Vec<Declaration> },
    Import { href: String },
    /// Any other at-rule
    Other { name: String },
}

impl CssRule {
    /// Nested rules of `@media` and `@keyframes`
    pub fn children(&self) -> &[RuleId] {
        match self {
            CssRule::Media { rules, .. } | CssRule::Keyframes { rules, .. } => rules,
            _ => &[],
        }
    }

    /// The style block of a style or keyframe rule
    pub fn style(&self) -> Option<&StyleRule> {
        match self {
            CssRule::Style(rule) | CssRule::Keyframe(rule) => Some(rule),
            _ => None,
        }
    }
}

/// Ignore directives attached to a rule (or to the whole stylesheet)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleDirectives {
    /// `Some(true)` skips the rule and, unless they say otherwise, its children
    pub ignore: Option<bool>,
    pub ignored_properties: Vec<String>,
    /// Declaration indexes excluded from checking
    pub ignored_ranges: Vec<RangeInclusive<usize>>,
}

impl RuleDirectives {
    pub fn ignores_property(&self, name: &str) -> bool {
        self.ignored_properties.iter().any(|p| p == name)
    }

    pub fn ignores_index(&self, index: usize) -> bool {
        self.ignored_ranges.iter().any(|range| range.contains(&index))
    }

    /// Directives in effect for a child rule
    pub fn inherit(&self, own: Option<&RuleDirectives>) -> RuleDirectives {
        let mut effective = own.cloned().unwrap_or_default();
        effective.ignored_properties.extend(self.ignored_properties.iter().cloned());
        if effective.ignore.is_none() {
            effective.ignore = self.ignore;
        }
        effective
    }
}

/// Parsed stylesheet
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    arena: Vec<CssRule>,
    rules: Vec<RuleId>,
    root: RuleDirectives,
    directives: HashMap<RuleId, RuleDirectives>,
}

impl Stylesheet {
    /// Top-level rules
    pub fn rules(&self) -> &[RuleId] {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> &CssRule {
        &self.arena[id.0]
    }

    /// Every rule, nested ones included
    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &CssRule)> {
        self.arena.iter().enumerate().map(|(i, rule)| (RuleId(i), rule))
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn root_directives(&self) -> &RuleDirectives {
        &self.root
    }

    pub fn root_directives_mut(&mut self) -> &mut RuleDirectives {
        &mut self.root
    }

    pub fn directives(&self, id: RuleId) -> Option<&RuleDirectives> {
        self.directives.get(&id)
    }

    pub fn directives_mut(&mut self, id: RuleId) -> &mut RuleDirectives {
        self.directives.entry(id).or_default()
    }
}

/// A CSS syntax error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct SyntaxError {
    pub reason: String,
    /// Byte offset of the offending token, or the input length
    pub offset: usize,
}

type ParseResult<'i, T> = Result<T, ParseError<'i, SyntaxError>>;

/// CSS Parser
pub struct CssParser;

impl CssParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a stylesheet into a rule tree
    pub fn parse(&self, css: &str) -> Result<Stylesheet, SyntaxError> {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut builder = TreeBuilder {
            arena: Vec::new(),
            locator: Locator::new(css),
            end: css.len(),
        };

        match builder.rule_list(&mut parser, false) {
            Ok(rules) => Ok(Stylesheet {
                arena: builder.arena,
                rules,
                root: RuleDirectives::default(),
                directives: HashMap::new(),
            }),
            Err(err) => Err(match err.kind {
                ParseErrorKind::Custom(err) => err,
                ParseErrorKind::Basic(_) => SyntaxError {
                    reason: "Unexpected end of input".into(),
                    offset: css.len(),
                },
            }),
        }
    }
}

impl Default for CssParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a CSS stylesheet
pub fn parse_stylesheet(css: &str) -> Result<Stylesheet, SyntaxError> {
    CssParser::new().parse(css)
}

struct TreeBuilder<'a> {
    arena: Vec<CssRule>,
    locator: Locator<'a>,
    end: usize,
}

fn syntax_error<'i>(parser: &Parser<'i, '_>, reason: String, offset: usize) -> ParseError<'i, SyntaxError> {
    parser.new_custom_error(SyntaxError { reason, offset })
}

fn unmatched<'i>(parser: &Parser<'i, '_>, closer: char, at: SourcePosition) -> ParseError<'i, SyntaxError> {
    syntax_error(parser, format!("Unmatched \"{closer}\""), at.byte_index())
}

impl TreeBuilder<'_> {
    fn push(&mut self, rule: CssRule) -> RuleId {
        self.arena.push(rule);
        RuleId(self.arena.len() - 1)
    }

    /// Top level, `@media` and `@keyframes` bodies
    fn rule_list<'i>(&mut self, parser: &mut Parser<'i, '_>, keyframes: bool) -> ParseResult<'i, Vec<RuleId>> {
        let mut ids = Vec::new();
        loop {
            parser.skip_whitespace();
            let start = parser.position();
            let token = match parser.next() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };

            let id = match token {
                Token::CDO | Token::CDC | Token::Semicolon => continue,
                Token::AtKeyword(ref name) => self.at_rule(parser, name, start)?,
                Token::CloseCurlyBracket => return Err(unmatched(parser, '}', start)),
                Token::CloseParenthesis => return Err(unmatched(parser, ')', start)),
                Token::CloseSquareBracket => return Err(unmatched(parser, ']', start)),
                Token::CurlyBracketBlock => {
                    return Err(syntax_error(parser, "Missing selector".into(), start.byte_index()));
                }
                _ => self.qualified_rule(parser, start, keyframes)?,
            };
            ids.push(id);
        }
        Ok(ids)
    }

    /// A style rule (or keyframe) whose first prelude token was consumed
    fn qualified_rule<'i>(
        &mut self,
        parser: &mut Parser<'i, '_>,
        start: SourcePosition,
        keyframe: bool,
    ) -> ParseResult<'i, RuleId> {
        loop {
            parser.skip_whitespace();
            let before = parser.position();
            let token = match parser.next() {
                Ok(token) => token.clone(),
                Err(_) => return Err(syntax_error(parser, "Missing \"{\"".into(), self.end)),
            };
            match token {
                Token::CurlyBracketBlock => {
                    let selector = parser.slice(start..before).trim().to_string();
                    let declarations = self.declaration_block(parser)?;
                    let rule = StyleRule { selector, declarations };
                    return Ok(self.push(if keyframe { CssRule::Keyframe(rule) } else { CssRule::Style(rule) }));
                }
                Token::CloseCurlyBracket => return Err(unmatched(parser, '}', before)),
                Token::CloseParenthesis => return Err(unmatched(parser, ')', before)),
                Token::CloseSquareBracket => return Err(unmatched(parser, ']', before)),
                _ => {}
            }
        }
    }

    fn at_rule<'i>(&mut self, parser: &mut Parser<'i, '_>, name: &str, start: SourcePosition) -> ParseResult<'i, RuleId> {
        let at_keyword = name.to_ascii_lowercase();
        let prelude_start = parser.position();

        let (prelude_end, has_block) = loop {
            parser.skip_whitespace();
            let before = parser.position();
            let token = match parser.next() {
                Ok(token) => token.clone(),
                Err(_) => break (before, false),
            };
            match token {
                Token::Semicolon => break (before, false),
                Token::CurlyBracketBlock => break (before, true),
                Token::CloseCurlyBracket => return Err(unmatched(parser, '}', before)),
                Token::CloseParenthesis => return Err(unmatched(parser, ')', before)),
                Token::CloseSquareBracket => return Err(unmatched(parser, ']', before)),
                _ => {}
            }
        };
        let prelude = parser.slice(prelude_start..prelude_end).trim().to_string();

        let rule = match at_keyword.as_str() {
            "media" if has_block => {
                let end = self.end;
                let rules = closed_block(parser, end, |p| self.rule_list(p, false))?;
                CssRule::Media { condition: prelude, rules }
            }
            keyword if keyword.ends_with("keyframes") && has_block => {
                let end = self.end;
                let rules = closed_block(parser, end, |p| self.rule_list(p, true))?;
                CssRule::Keyframes {
                    at_keyword,
                    name: prelude,
                    rules,
                }
            }
            "font-face" if has_block => {
                let declarations = self.declaration_block(parser)?;
                CssRule::FontFace { declarations }
            }
            "import" => CssRule::Import { href: prelude },
            _ => {
                if has_block {
                    closed_block(parser, self.end, skip_contents)?;
                }
                tracing::trace!("Skipping @{} at {}", at_keyword, start.byte_index());
                CssRule::Other { name: at_keyword }
            }
        };
        Ok(self.push(rule))
    }

    fn declaration_block<'i>(&mut self, parser: &mut Parser<'i, '_>) -> ParseResult<'i, Vec<Declaration>> {
        let end = self.end;
        closed_block(parser, end, |p| self.declarations(p))
    }

    fn declarations<'i>(&mut self, parser: &mut Parser<'i, '_>) -> ParseResult<'i, Vec<Declaration>> {
        let mut declarations = Vec::new();
        loop {
            parser.skip_whitespace();
            let start = parser.position();
            let token = match parser.next() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };

            match token {
                Token::Semicolon => {}
                Token::Ident(ref name) => {
                    declarations.push(self.declaration(parser, name, start)?);
                }
                Token::CloseParenthesis => return Err(unmatched(parser, ')', start)),
                Token::CloseSquareBracket => return Err(unmatched(parser, ']', start)),
                _ => skip_to_semicolon(parser),
            }
        }
        Ok(declarations)
    }

    /// The rest of a declaration whose name was consumed
    fn declaration<'i>(
        &mut self,
        parser: &mut Parser<'i, '_>,
        name: &str,
        start: SourcePosition,
    ) -> ParseResult<'i, Declaration> {
        parser.skip_whitespace();
        let colon_at = parser.position();
        if !matches!(parser.next(), Ok(Token::Colon)) {
            return Err(syntax_error(
                parser,
                format!("Missing \":\" after \"{name}\""),
                colon_at.byte_index(),
            ));
        }

        let value_start = parser.position();
        let mut value_end = value_start;
        loop {
            let before = parser.position();
            let token = match parser.next_including_whitespace_and_comments() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };
            match token {
                Token::Semicolon => break,
                Token::CloseParenthesis => return Err(unmatched(parser, ')', before)),
                Token::CloseSquareBracket => return Err(unmatched(parser, ']', before)),
                Token::WhiteSpace(_) | Token::Comment(_) => {}
                Token::Function(_)
                | Token::ParenthesisBlock
                | Token::SquareBracketBlock
                | Token::CurlyBracketBlock => {
                    skip_block(parser)?;
                    value_end = parser.position();
                }
                _ => value_end = parser.position(),
            }
        }

        let (value, important) = strip_important(parser.slice(value_start..value_end).trim());
        Ok(Declaration {
            name: name.to_ascii_lowercase(),
            value,
            important,
            span: start.byte_index()..value_end.byte_index(),
            location: self.locator.locate(start.byte_index()),
            text: parser.slice(start..value_end).to_string(),
        })
    }
}

/// Parse the `{}` block just returned by the parser.
///
/// Fails with `Missing "}"` at `end` if the input ran out before the block's
/// own closing token.
fn closed_block<'i, T>(
    parser: &mut Parser<'i, '_>,
    end: usize,
    parse: impl FnOnce(&mut Parser<'i, '_>) -> ParseResult<'i, T>,
) -> ParseResult<'i, T> {
    let mut inner_end = 0;
    let parsed = parser.parse_nested_block(|p| {
        let parsed = parse(p);
        inner_end = p.position().byte_index();
        parsed
    })?;
    if parser.position().byte_index() > inner_end {
        Ok(parsed)
    } else {
        Err(syntax_error(parser, "Missing \"}\"".into(), end))
    }
}

fn skip_contents<'i>(parser: &mut Parser<'i, '_>) -> ParseResult<'i, ()> {
    while parser.next_including_whitespace_and_comments().is_ok() {}
    Ok(())
}

/// Consume the contents of the block just returned by the parser
fn skip_block<'i>(parser: &mut Parser<'i, '_>) -> ParseResult<'i, ()> {
    parser.parse_nested_block(skip_contents)
}

fn skip_to_semicolon(parser: &mut Parser<'_, '_>) {
    loop {
        match parser.next() {
            Ok(Token::Semicolon) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

fn strip_important(value: &str) -> (String, bool) {
    if let Some(bang) = value.rfind('!')
        && value[bang + 1..].trim().eq_ignore_ascii_case("important")
    {
        return (value[..bang].trim_end().to_string(), true);
    }
    (value.to_string(), false)
}
