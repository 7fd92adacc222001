//! Position-annotated HTML tree
//!
//! Built from `html5ever`'s tokenizer rather than its tree builder: the
//! checker needs every element where it was written, with its source
//! location and raw start tag, and without implied or re-parented nodes.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use std::cell::RefCell;
use xlint_core::{Location, Locator};

/// Elements that never take children
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Node index in its document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// An element with its source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name
    pub name: String,
    /// Attributes in source order, names lowercased
    pub attrs: Vec<(String, String)>,
    /// Raw start tag, `<` to `>`
    pub raw: String,
    /// Location of the `<`
    pub location: Location,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attrs(&self) -> bool {
        !self.attrs.is_empty()
    }
}

/// Node payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
    Comment(String),
}

/// A tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Parsed HTML document
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl Document {
    /// Top-level nodes
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Child elements of `id`, in source order
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Element)> {
        self.children(id)
            .iter()
            .filter_map(|&child| self.element(child).map(|element| (child, element)))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// HTML that cannot be turned into a tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct HtmlSyntaxError {
    pub reason: String,
}

/// HTML parser
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse markup into a document
    pub fn parse(&self, html: &str) -> Result<Document, HtmlSyntaxError> {
        let sink = DocumentSink {
            builder: RefCell::new(TreeBuilder::new(html)),
        };
        let tokenizer = Tokenizer::new(sink, TokenizerOpts::default());

        let input = BufferQueue::default();
        input.push_back(StrTendril::from_slice(html));
        let _ = tokenizer.feed(&input);
        tokenizer.end();

        let builder = tokenizer.sink.builder.into_inner();
        builder.finish()
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an HTML document
pub fn parse_document(html: &str) -> Result<Document, HtmlSyntaxError> {
    HtmlParser::new().parse(html)
}

struct DocumentSink<'a> {
    builder: RefCell<TreeBuilder<'a>>,
}

impl TokenSink for DocumentSink<'_> {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        self.builder.borrow_mut().process(token)
    }
}

struct TreeBuilder<'a> {
    source: &'a str,
    locator: Locator<'a>,
    /// Byte offset up to which the source has been matched to tokens
    cursor: usize,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    open: Vec<NodeId>,
    /// Raw text element whose end tag has not been seen
    raw_text: Option<String>,
    /// Character tokens not yet turned into a text node
    text: String,
    error: Option<String>,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            locator: Locator::new(source),
            cursor: 0,
            nodes: Vec::new(),
            roots: Vec::new(),
            open: Vec::new(),
            raw_text: None,
            text: String::new(),
            error: None,
        }
    }

    fn process(&mut self, token: Token) -> TokenSinkResult<()> {
        if self.error.is_some() {
            return TokenSinkResult::Continue;
        }
        match &token {
            Token::CharacterTokens(text) => {
                self.text.push_str(text);
                return TokenSinkResult::Continue;
            }
            Token::ParseError(err) => {
                tracing::trace!("HTML tokenizer: {}", err);
                return TokenSinkResult::Continue;
            }
            Token::NullCharacterToken => return TokenSinkResult::Continue,
            _ => self.flush_text(),
        }

        match token {
            Token::TagToken(tag) => {
                let name = tag.name.to_string();
                match tag.kind {
                    TagKind::StartTag => {
                        let attrs = tag
                            .attrs
                            .iter()
                            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                            .collect();
                        return self.start_tag(name, attrs, tag.self_closing);
                    }
                    TagKind::EndTag => self.end_tag(&name),
                }
            }
            Token::CommentToken(text) => self.comment(text.to_string()),
            Token::DoctypeToken(_) => {
                if let Some(start) = find_from(self.source, self.cursor, "<!") {
                    match find_from(self.source, start, ">") {
                        Some(end) => self.cursor = end + 1,
                        None => self.fail("Unexpected end of input in doctype"),
                    }
                }
            }
            Token::CharacterTokens(_) | Token::ParseError(_) | Token::NullCharacterToken | Token::EOFToken => {}
        }
        TokenSinkResult::Continue
    }

    fn start_tag(&mut self, name: String, attrs: Vec<(String, String)>, self_closing: bool) -> TokenSinkResult<()> {
        let Some(start) = find_tag(self.source, self.cursor, "<", &name) else {
            tracing::debug!("No source position for <{}>", name);
            return TokenSinkResult::Continue;
        };
        let Some(end) = tag_end(self.source, start + 1 + name.len()) else {
            self.fail(&format!("Unexpected end of input in <{name}>"));
            return TokenSinkResult::Continue;
        };
        self.cursor = end + 1;

        let element = Element {
            raw: self.source[start..=end].to_string(),
            location: self.locator.locate(start),
            attrs,
            name,
        };
        let void = self_closing || VOID_ELEMENTS.contains(&element.name.as_str());
        let raw_kind = match element.name.as_str() {
            "script" => Some(TokenSinkResult::RawData(RawKind::ScriptData)),
            "style" | "xmp" | "iframe" | "noembed" | "noframes" => Some(TokenSinkResult::RawData(RawKind::Rawtext)),
            "textarea" | "title" => Some(TokenSinkResult::RawData(RawKind::Rcdata)),
            "plaintext" => Some(TokenSinkResult::Plaintext),
            _ => None,
        };
        let name = element.name.clone();

        let id = self.append(NodeData::Element(element));
        if void {
            return TokenSinkResult::Continue;
        }
        self.open.push(id);
        match raw_kind {
            Some(result) => {
                self.raw_text = Some(name);
                result
            }
            None => TokenSinkResult::Continue,
        }
    }

    fn end_tag(&mut self, name: &str) {
        if let Some(start) = find_tag(self.source, self.cursor, "</", name) {
            match tag_end(self.source, start + 2 + name.len()) {
                Some(end) => self.cursor = end + 1,
                None => return self.fail(&format!("Unexpected end of input in </{name}>")),
            }
        }
        if self.raw_text.as_deref() == Some(name) {
            self.raw_text = None;
        }

        let matching = self.open.iter().rposition(|&id| {
            matches!(&self.nodes[id.0].data, NodeData::Element(element) if element.name == name)
        });
        match matching {
            Some(depth) => self.open.truncate(depth),
            None => tracing::trace!("Ignoring stray </{}>", name),
        }
    }

    fn comment(&mut self, text: String) {
        let opener = ["<!", "<?", "</"]
            .iter()
            .filter_map(|opener| find_from(self.source, self.cursor, opener))
            .min();
        if let Some(start) = opener {
            let end = if self.source[start..].starts_with("<!--") {
                let body = start + 4;
                if self.source[body..].starts_with('>') {
                    Some(body)
                } else if self.source[body..].starts_with("->") {
                    Some(body + 1)
                } else {
                    find_from(self.source, body, "-->").map(|end| end + 2)
                }
            } else {
                find_from(self.source, start, ">")
            };
            match end {
                Some(end) => self.cursor = end + 1,
                None => return self.fail("Unexpected end of input in comment"),
            }
        }
        self.append(NodeData::Comment(text));
    }

    /// Whitespace-only text is dropped
    fn flush_text(&mut self) {
        let text = std::mem::take(&mut self.text);
        if !text.trim().is_empty() {
            self.append(NodeData::Text(text));
        }
    }

    fn append(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = self.open.last().copied();
        self.nodes.push(Node {
            data,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    fn fail(&mut self, reason: &str) {
        tracing::debug!("HTML parse error: {}", reason);
        self.error = Some(reason.to_string());
    }

    fn finish(mut self) -> Result<Document, HtmlSyntaxError> {
        self.flush_text();
        if self.error.is_none() && self.raw_text.is_none() && has_unterminated_markup(&self.source[self.cursor..]) {
            self.fail("Unexpected end of input in tag");
        }
        if let Some(reason) = self.error {
            return Err(HtmlSyntaxError { reason });
        }
        tracing::debug!("Parsed {} HTML nodes", self.nodes.len());
        Ok(Document {
            nodes: self.nodes,
            roots: self.roots,
        })
    }
}

fn find_from(source: &str, from: usize, needle: &str) -> Option<usize> {
    source.get(from..)?.find(needle).map(|found| from + found)
}

/// Start of the next `<name` (or `</name`) tag at or after `from`
fn find_tag(source: &str, from: usize, opener: &str, name: &str) -> Option<usize> {
    let mut at = from;
    loop {
        let start = find_from(source, at, opener)?;
        let after = start + opener.len();
        let rest = &source[after..];
        let name_matches = rest.get(..name.len()).is_some_and(|head| head.eq_ignore_ascii_case(name));
        if name_matches {
            let boundary = rest[name.len()..].chars().next();
            if boundary.is_none_or(|c| c.is_ascii_whitespace() || c == '/' || c == '>') {
                return Some(start);
            }
        }
        at = after;
    }
}

/// Where `tag_end` is inside a tag
#[derive(Clone, Copy)]
enum TagScan {
    Attrs,
    /// After `=`, before the value
    ValueStart,
    Unquoted,
    Quoted(char),
}

/// Offset of the `>` closing a tag. Quotes only count where they open an
/// attribute value.
fn tag_end(source: &str, from: usize) -> Option<usize> {
    let mut state = TagScan::Attrs;
    for (offset, c) in source.get(from..)?.char_indices() {
        state = match (state, c) {
            (TagScan::Quoted(q), c) if c == q => TagScan::Attrs,
            (TagScan::Quoted(q), _) => TagScan::Quoted(q),
            (_, '>') => return Some(from + offset),
            (TagScan::Attrs, '=') => TagScan::ValueStart,
            (TagScan::ValueStart, '"' | '\'') => TagScan::Quoted(c),
            (TagScan::ValueStart, c) if c.is_ascii_whitespace() => TagScan::ValueStart,
            (TagScan::ValueStart, _) => TagScan::Unquoted,
            (TagScan::Unquoted, c) if c.is_ascii_whitespace() => TagScan::Attrs,
            (state, _) => state,
        };
    }
    None
}

/// A `<` that starts a tag, end tag or markup declaration
fn has_unterminated_markup(rest: &str) -> bool {
    rest.match_indices('<').any(|(at, _)| {
        let mut next = rest[at + 1..].chars();
        match next.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '!' || c == '?' => true,
            Some('/') => next.next().is_some_and(|c| c.is_ascii_alphabetic()),
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(doc: &Document, id: NodeId) -> &Element {
        doc.element(id).unwrap()
    }

    #[test]
    fn test_parse_nested_elements() {
        let doc = parse_document("<div id=a>\n  <p>Hi <b>there</b></p>\n</div>").unwrap();
        assert_eq!(doc.roots().len(), 1);

        let div = doc.roots()[0];
        assert_eq!(element(&doc, div).name, "div");
        assert_eq!(element(&doc, div).attr("id"), Some("a"));
        assert_eq!(element(&doc, div).raw, "<div id=a>");

        let p = doc.children(div)[0];
        let p_element = element(&doc, p);
        assert_eq!(p_element.name, "p");
        assert_eq!((p_element.location.line, p_element.location.column), (2, 3));
        assert_eq!(p_element.location.position, 13);
        assert_eq!(doc.children(p).len(), 2);
        assert!(matches!(&doc.node(doc.children(p)[0]).data, NodeData::Text(text) if text == "Hi "));
        assert_eq!(doc.node(p).parent, Some(div));
    }

    #[test]
    fn test_whitespace_text_is_dropped() {
        let doc = parse_document("<ul>\n  <li>a</li>\n  <li>b</li>\n</ul>").unwrap();
        let ul = doc.roots()[0];
        assert_eq!(doc.children(ul).len(), 2);
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let doc = parse_document("<video><source src=a.mp4><source src=b.webm></video><br/><span/>x").unwrap();
        let video = doc.roots()[0];
        let sources: Vec<&str> = doc.child_elements(video).map(|(_, e)| e.attr("src").unwrap()).collect();
        assert_eq!(sources, ["a.mp4", "b.webm"]);
        assert_eq!(doc.roots().len(), 4);
    }

    #[test]
    fn test_names_are_lowercased() {
        let doc = parse_document("<VIDEO PreLoad=\"auto\"></Video>").unwrap();
        let video = element(&doc, doc.roots()[0]);
        assert_eq!(video.name, "video");
        assert_eq!(video.attrs, vec![("preload".to_string(), "auto".to_string())]);
        assert_eq!(video.raw, "<VIDEO PreLoad=\"auto\">");
    }

    #[test]
    fn test_comments_are_kept_as_siblings() {
        let doc = parse_document("<!--xlint.ignoretag 1--><blink>x</blink><p>y</p>").unwrap();
        assert_eq!(doc.roots().len(), 3);
        assert!(matches!(&doc.node(doc.roots()[0]).data, NodeData::Comment(text) if text == "xlint.ignoretag 1"));
        assert_eq!(element(&doc, doc.roots()[2]).location.position, 40);
    }

    #[test]
    fn test_script_content_is_raw_text() {
        let doc = parse_document("<script>if (a<b) { x = '<p>'; }</script><p>z</p>").unwrap();
        assert_eq!(doc.roots().len(), 2);
        let script = doc.roots()[0];
        assert_eq!(doc.children(script).len(), 1);
        assert_eq!(element(&doc, doc.roots()[1]).location.position, 40);
    }

    #[test]
    fn test_quoted_gt_in_attribute() {
        let doc = parse_document("<a title='1 > 0'>x</a><b>y</b>").unwrap();
        assert_eq!(element(&doc, doc.roots()[0]).raw, "<a title='1 > 0'>");
        assert_eq!(element(&doc, doc.roots()[1]).location.position, 22);
    }

    #[test]
    fn test_quote_inside_unquoted_value() {
        let doc = parse_document("<img alt=don't src=a.png>\n<blink>x</blink><i title = \"a'b\">y</i>").unwrap();
        let img = element(&doc, doc.roots()[0]);
        assert_eq!(img.raw, "<img alt=don't src=a.png>");
        assert_eq!(img.attr("alt"), Some("don't"));

        let blink = element(&doc, doc.roots()[1]);
        assert_eq!((blink.location.line, blink.location.column), (2, 1));
        assert_eq!(element(&doc, doc.roots()[2]).raw, "<i title = \"a'b\">");
    }

    #[test]
    fn test_stray_end_tag_is_ignored() {
        let doc = parse_document("<div></span><p></p></div>").unwrap();
        let div = doc.roots()[0];
        assert_eq!(doc.children(div).len(), 1);
    }

    #[test]
    fn test_unterminated_markup_is_error() {
        assert!(parse_document("<div><p class=\"a").is_err());
        assert!(parse_document("<p>x</p><!-- open").is_err());
        assert!(parse_document("<p>1 < 2</p>").is_ok());
    }
}
