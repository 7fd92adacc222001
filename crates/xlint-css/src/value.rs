//! CSS Value Classifier
//!
//! Tokenizes a declaration value into a small lexical grammar, builds a
//! tree of value nodes (functions nest their arguments) and classifies the
//! nodes against a property's known value types.

use cssparser::{Parser, ParserInput, Token, UnicodeRange};

/// Lexical kind of a value token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Pxs,
    Cms,
    Mms,
    Ins,
    Pts,
    Pcs,
    Vhs,
    Vws,
    Vmins,
    Vmaxs,
    Ems,
    Exs,
    Chs,
    Rems,
    Degs,
    Rads,
    Grads,
    Turns,
    Msecs,
    Secs,
    Hertz,
    Khertz,
    Percentage,
    Hex,
    Dimen,
    UnicodeRange,
    Ident,
    Uri,
    String,
    Number,
    Function,
}

impl ValueKind {
    /// Name used by value type descriptors (`"PXS"`, `"IDENT"`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Pxs => "PXS",
            ValueKind::Cms => "CMS",
            ValueKind::Mms => "MMS",
            ValueKind::Ins => "INS",
            ValueKind::Pts => "PTS",
            ValueKind::Pcs => "PCS",
            ValueKind::Vhs => "VHS",
            ValueKind::Vws => "VWS",
            ValueKind::Vmins => "VMINS",
            ValueKind::Vmaxs => "VMAXS",
            ValueKind::Ems => "EMS",
            ValueKind::Exs => "EXS",
            ValueKind::Chs => "CHS",
            ValueKind::Rems => "REMS",
            ValueKind::Degs => "DEGS",
            ValueKind::Rads => "RADS",
            ValueKind::Grads => "GRADS",
            ValueKind::Turns => "TURNS",
            ValueKind::Msecs => "MSECS",
            ValueKind::Secs => "SECS",
            ValueKind::Hertz => "HERTZ",
            ValueKind::Khertz => "KHERTZ",
            ValueKind::Percentage => "PERCENTAGE",
            ValueKind::Hex => "HEX",
            ValueKind::Dimen => "DIMEN",
            ValueKind::UnicodeRange => "UNICODERANGE",
            ValueKind::Ident => "IDENT",
            ValueKind::Uri => "URI",
            ValueKind::String => "STRING",
            ValueKind::Number => "NUMBER",
            ValueKind::Function => "FUNCTION",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "PXS" => ValueKind::Pxs,
            "CMS" => ValueKind::Cms,
            "MMS" => ValueKind::Mms,
            "INS" => ValueKind::Ins,
            "PTS" => ValueKind::Pts,
            "PCS" => ValueKind::Pcs,
            "VHS" => ValueKind::Vhs,
            "VWS" => ValueKind::Vws,
            "VMINS" => ValueKind::Vmins,
            "VMAXS" => ValueKind::Vmaxs,
            "EMS" => ValueKind::Ems,
            "EXS" => ValueKind::Exs,
            "CHS" => ValueKind::Chs,
            "REMS" => ValueKind::Rems,
            "DEGS" => ValueKind::Degs,
            "RADS" => ValueKind::Rads,
            "GRADS" => ValueKind::Grads,
            "TURNS" => ValueKind::Turns,
            "MSECS" => ValueKind::Msecs,
            "SECS" => ValueKind::Secs,
            "HERTZ" => ValueKind::Hertz,
            "KHERTZ" => ValueKind::Khertz,
            "PERCENTAGE" => ValueKind::Percentage,
            "HEX" => ValueKind::Hex,
            "DIMEN" => ValueKind::Dimen,
            "UNICODERANGE" => ValueKind::UnicodeRange,
            "IDENT" => ValueKind::Ident,
            "URI" => ValueKind::Uri,
            "STRING" => ValueKind::String,
            "NUMBER" => ValueKind::Number,
            "FUNCTION" => ValueKind::Function,
            _ => return None,
        };
        Some(kind)
    }

    fn from_unit(unit: &str) -> Self {
        match unit.to_ascii_lowercase().as_str() {
            "px" => ValueKind::Pxs,
            "cm" => ValueKind::Cms,
            "mm" => ValueKind::Mms,
            "in" => ValueKind::Ins,
            "pt" => ValueKind::Pts,
            "pc" => ValueKind::Pcs,
            "vh" => ValueKind::Vhs,
            "vw" => ValueKind::Vws,
            "vmin" => ValueKind::Vmins,
            "vmax" => ValueKind::Vmaxs,
            "em" => ValueKind::Ems,
            "ex" => ValueKind::Exs,
            "ch" => ValueKind::Chs,
            "rem" => ValueKind::Rems,
            "deg" => ValueKind::Degs,
            "rad" => ValueKind::Rads,
            "grad" => ValueKind::Grads,
            "turn" => ValueKind::Turns,
            "ms" => ValueKind::Msecs,
            "s" => ValueKind::Secs,
            "hz" => ValueKind::Hertz,
            "khz" => ValueKind::Khertz,
            _ => ValueKind::Dimen,
        }
    }
}

/// A lexical value token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueToken {
    Value { kind: ValueKind, text: String },
    /// Function name, without the opening parenthesis
    Function(String),
    CloseParen,
}

/// Tokenize a declaration value.
///
/// Whitespace, comments, separators and `!important` are dropped.
pub fn tokenize(value: &str) -> Vec<ValueToken> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut tokens = Vec::new();
    collect_tokens(&mut parser, &mut tokens);
    tokens
}

fn collect_tokens<'i>(parser: &mut Parser<'i, '_>, tokens: &mut Vec<ValueToken>) {
    let mut after_bang = false;
    loop {
        let state = parser.state();
        let start = parser.position();
        let token = match parser.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        if after_bang {
            after_bang = false;
            if matches!(&token, Token::Ident(name) if name.eq_ignore_ascii_case("important")) {
                continue;
            }
        }

        match token {
            Token::Dimension { ref unit, .. } => {
                push_value(tokens, ValueKind::from_unit(unit), parser.slice_from(start));
            }
            Token::Percentage { .. } => push_value(tokens, ValueKind::Percentage, parser.slice_from(start)),
            Token::Number { .. } => push_value(tokens, ValueKind::Number, parser.slice_from(start)),
            Token::Hash(ref name) | Token::IDHash(ref name) => {
                if name.chars().all(|c| c.is_ascii_hexdigit()) {
                    push_value(tokens, ValueKind::Hex, parser.slice_from(start));
                }
            }
            Token::Ident(ref name) => {
                if name.eq_ignore_ascii_case("u") {
                    parser.reset(&state);
                    if UnicodeRange::parse(parser).is_ok() {
                        push_value(tokens, ValueKind::UnicodeRange, parser.slice_from(start));
                        continue;
                    }
                    parser.reset(&state);
                    let _ = parser.next_including_whitespace();
                }
                push_value(tokens, ValueKind::Ident, parser.slice_from(start));
            }
            Token::UnquotedUrl(_) | Token::BadUrl(_) => {
                push_value(tokens, ValueKind::Uri, parser.slice_from(start));
            }
            Token::QuotedString(_) | Token::BadString(_) => {
                push_value(tokens, ValueKind::String, parser.slice_from(start));
            }
            Token::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                collect_nested(parser, &mut Vec::new());
                push_value(tokens, ValueKind::Uri, parser.slice_from(start));
            }
            Token::Function(ref name) => {
                tokens.push(ValueToken::Function(name.to_string()));
                if collect_nested(parser, tokens) {
                    tokens.push(ValueToken::CloseParen);
                }
            }
            Token::ParenthesisBlock => {
                collect_nested(parser, tokens);
            }
            Token::CloseParenthesis => tokens.push(ValueToken::CloseParen),
            Token::Delim('!') => after_bang = true,
            _ => {}
        }
    }
}

/// Collect the tokens of the block just returned; true if it was closed
fn collect_nested<'i>(parser: &mut Parser<'i, '_>, tokens: &mut Vec<ValueToken>) -> bool {
    let mut inner_end = 0;
    let _ = parser.parse_nested_block(|p| {
        collect_tokens(p, tokens);
        inner_end = p.position().byte_index();
        Ok::<(), cssparser::ParseError<'i, ()>>(())
    });
    parser.position().byte_index() > inner_end
}

fn push_value(tokens: &mut Vec<ValueToken>, kind: ValueKind, text: &str) {
    tokens.push(ValueToken::Value {
        kind,
        text: text.trim().to_string(),
    });
}

/// A node of the value tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueNode {
    Value { kind: ValueKind, text: String },
    Function { name: String, args: Vec<ValueNode> },
}

impl ValueNode {
    pub fn kind(&self) -> ValueKind {
        match self {
            ValueNode::Value { kind, .. } => *kind,
            ValueNode::Function { .. } => ValueKind::Function,
        }
    }
}

/// Value tree errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("missing \")\"")]
    MissingCloseParen,
    #[error("unexpected \")\"")]
    UnexpectedCloseParen,
}

/// Parse a declaration value into a value tree
pub fn parse_value(value: &str) -> Result<Vec<ValueNode>, ValueError> {
    let tokens = tokenize(value);
    let mut iter = tokens.into_iter();
    parse_nodes(&mut iter, 0)
}

fn parse_nodes(tokens: &mut impl Iterator<Item = ValueToken>, depth: usize) -> Result<Vec<ValueNode>, ValueError> {
    let mut nodes = Vec::new();
    while let Some(token) = tokens.next() {
        match token {
            ValueToken::Value { kind, text } => nodes.push(ValueNode::Value { kind, text }),
            ValueToken::Function(name) => {
                let args = parse_nodes(tokens, depth + 1)?;
                nodes.push(ValueNode::Function { name, args });
            }
            ValueToken::CloseParen if depth == 0 => return Err(ValueError::UnexpectedCloseParen),
            ValueToken::CloseParen => return Ok(nodes),
        }
    }

    if depth > 0 {
        return Err(ValueError::MissingCloseParen);
    }
    Ok(nodes)
}

/// Shape a value type tag stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueDescriptor {
    /// Any token of this kind
    Literal(ValueKind),
    /// A keyword
    Ident(String),
    /// A call of this function
    Function(String),
}

impl ValueDescriptor {
    pub fn matches(&self, node: &ValueNode) -> bool {
        match (self, node) {
            (ValueDescriptor::Function(expected), ValueNode::Function { name, .. }) => expected == name,
            (ValueDescriptor::Ident(expected), ValueNode::Value { kind: ValueKind::Ident, text }) => expected == text,
            (ValueDescriptor::Literal(kind), node) => *kind == node.kind(),
            _ => false,
        }
    }
}

/// Classify value nodes against known value types, in node order.
///
/// Each node takes the first known type it matches; function arguments
/// follow their function. Repeated matches are kept.
pub fn classify(nodes: &[ValueNode], known: &[(&str, &ValueDescriptor)]) -> Vec<String> {
    let mut types = Vec::new();
    for node in nodes {
        if let Some((tag, _)) = known.iter().find(|(_, descriptor)| descriptor.matches(node)) {
            types.push(tag.to_string());
        }
        if let ValueNode::Function { args, .. } = node {
            types.extend(classify(args, known));
        }
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(value: &str) -> Vec<&'static str> {
        tokenize(value)
            .iter()
            .map(|token| match token {
                ValueToken::Value { kind, .. } => kind.as_str(),
                ValueToken::Function(_) => "FUNCTION",
                ValueToken::CloseParen => ")",
            })
            .collect()
    }

    #[test]
    fn test_tokenize_units() {
        assert_eq!(kinds("10px 2em 3rem 50% 1.5"), ["PXS", "EMS", "REMS", "PERCENTAGE", "NUMBER"]);
        assert_eq!(kinds("90deg 2s 200ms 1kHz 3Q"), ["DEGS", "SECS", "MSECS", "KHERTZ", "DIMEN"]);
        assert_eq!(kinds("1vmin 1vmax 1ch"), ["VMINS", "VMAXS", "CHS"]);
    }

    #[test]
    fn test_tokenize_misc() {
        assert_eq!(kinds("#fff #zzz"), ["HEX"]);
        assert_eq!(kinds("url(a.png) url(\"b.png\") 'x'"), ["URI", "URI", "STRING"]);
        assert_eq!(kinds("red !important"), ["IDENT"]);
        assert_eq!(kinds("U+0025-00FF"), ["UNICODERANGE"]);
        assert_eq!(kinds("underline"), ["IDENT"]);
    }

    #[test]
    fn test_tokenize_functions() {
        assert_eq!(kinds("scale(1) translate(1px, 2px)"), ["FUNCTION", "NUMBER", ")", "FUNCTION", "PXS", "PXS", ")"]);
        assert_eq!(tokenize("calc(1px")[0], ValueToken::Function("calc".into()));
        assert_eq!(kinds("calc(1px"), ["FUNCTION", "PXS"]);
    }

    #[test]
    fn test_parse_nested_functions() {
        let nodes = parse_value("-webkit-gradient(linear, rgba(0,0,0,0.5)) 10px").unwrap();
        assert_eq!(nodes.len(), 2);
        match &nodes[0] {
            ValueNode::Function { name, args } => {
                assert_eq!(name, "-webkit-gradient");
                assert_eq!(args[0].kind(), ValueKind::Ident);
                assert!(matches!(&args[1], ValueNode::Function { name, args } if name == "rgba" && args.len() == 4));
            }
            other => panic!("expected function, got {other:?}"),
        }
        assert_eq!(nodes[1].kind(), ValueKind::Pxs);
    }

    #[test]
    fn test_parse_paren_errors() {
        assert_eq!(parse_value("scale(1"), Err(ValueError::MissingCloseParen));
        assert_eq!(parse_value("1px)"), Err(ValueError::UnexpectedCloseParen));
    }

    #[test]
    fn test_classify_in_order_with_duplicates() {
        let px = ValueDescriptor::Literal(ValueKind::Pxs);
        let flex = ValueDescriptor::Ident("flex".into());
        let calc = ValueDescriptor::Function("calc".into());
        let known = [("PXS", &px), ("flex", &flex), ("calc()", &calc)];

        let nodes = parse_value("flex calc(10px) 2px block").unwrap();
        assert_eq!(classify(&nodes, &known), ["flex", "calc()", "PXS", "PXS"]);
    }

    #[test]
    fn test_classify_first_match_wins() {
        let ident = ValueDescriptor::Literal(ValueKind::Ident);
        let auto = ValueDescriptor::Ident("auto".into());
        let known = [("auto", &auto), ("IDENT", &ident)];
        let nodes = parse_value("auto none").unwrap();
        assert_eq!(classify(&nodes, &known), ["auto", "IDENT"]);
    }

    #[test]
    fn test_keywords_and_functions_match_exactly() {
        let flex = ValueDescriptor::Ident("flex".into());
        let calc = ValueDescriptor::Function("calc".into());
        let known = [("flex", &flex), ("calc()", &calc)];
        let nodes = parse_value("FLEX Calc(1px) flex calc(2px)").unwrap();
        assert_eq!(classify(&nodes, &known), ["flex", "calc()"]);
    }

    #[test]
    fn test_classify_is_stable() {
        let scale = ValueDescriptor::Function("scale".into());
        let known = [("scale()", &scale)];
        let first = classify(&parse_value("scale(1) scale(2)").unwrap(), &known);
        let second = classify(&parse_value("scale(1) scale(2)").unwrap(), &known);
        assert_eq!(first, second);
        assert_eq!(first, ["scale()", "scale()"]);
    }
}
