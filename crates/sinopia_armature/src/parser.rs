//! Template parser.
//!
//! This parser uses the tokenizer to build a [`Document`]. It is lenient in the
//! way browsers are: problems are reported as [`ParseError`]s and the tree is
//! always produced.

use std::borrow::Cow;

use sinopia_carton::{is_raw_text_tag, is_void_tag};

use crate::dom::{Document, NodeId};
use crate::errors::{ErrorCode, ParseError};
use crate::tokenizer::{Callbacks, QuoteType, Tokenizer};

/// Parser context for building the document
pub struct Parser<'a> {
    /// Source code
    source: &'a str,
    /// Document under construction
    doc: Document,
    /// Open elements
    stack: Vec<NodeId>,
    /// Element whose start tag is being read
    current_element: Option<NodeId>,
    /// Attribute being read: name and raw value range
    current_attr: Option<(&'a str, Option<(usize, usize)>)>,
    /// Errors collected during parsing
    errors: Vec<ParseError>,
    /// Newline offsets for line calculation
    newlines: Vec<usize>,
}

impl<'a> Parser<'a> {
    /// Create a new parser
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            doc: Document::new(),
            stack: Vec::new(),
            current_element: None,
            current_attr: None,
            errors: Vec::new(),
            newlines: source
                .bytes()
                .enumerate()
                .filter_map(|(i, b)| (b == b'\n').then_some(i))
                .collect(),
        }
    }

    /// Parse the source with the default `[[`/`]]` markers
    pub fn parse(self) -> (Document, Vec<ParseError>) {
        self.parse_with_markers("[[", "]]")
    }

    /// Parse the source, treating `open … close` runs as opaque fragments
    pub fn parse_with_markers(mut self, open: &str, close: &str) -> (Document, Vec<ParseError>) {
        let source = self.source;
        let tokenizer = Tokenizer::with_markers(
            source,
            ParserCallbacks { parser: &mut self },
            open.as_bytes(),
            close.as_bytes(),
        );
        tokenizer.tokenize();

        self.handle_unclosed_elements();
        (self.doc, self.errors)
    }

    /// 1-based line of a byte offset
    fn line_at(&self, offset: usize) -> u32 {
        let line = match self.newlines.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i + 1,
        };
        line as u32
    }

    fn error(&mut self, code: ErrorCode, offset: usize) {
        let line = self.line_at(offset);
        self.errors.push(ParseError { code, line });
    }

    /// Current insertion point (stack top or document)
    fn current_parent(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.doc.root())
    }

    fn in_raw_text(&self) -> bool {
        self.stack
            .last()
            .and_then(|&n| self.doc.tag(n))
            .is_some_and(is_raw_text_tag)
    }

    /// Handle unclosed elements at end of parsing
    fn handle_unclosed_elements(&mut self) {
        while let Some(node) = self.stack.pop() {
            let line = self.doc.line(node);
            self.errors.push(ParseError {
                code: ErrorCode::MissingEndTag,
                line,
            });
        }
    }

    fn on_text_impl(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let source = self.source;
        let raw = &source[start..end];
        let content = if self.in_raw_text() {
            Cow::Borrowed(raw)
        } else {
            htmlize::unescape(raw)
        };
        let parent = self.current_parent();

        // Adjacent text runs (e.g. a stray `<`) merge into one node.
        if let Some(&last) = self.doc.children(parent).last() {
            if let Some(existing) = self.doc.text(last).filter(|_| self.doc.is_text(last)) {
                let merged = format!("{existing}{content}");
                self.doc.set_text(last, merged);
                return;
            }
        }
        let node = self.doc.create_text(content.into_owned());
        self.doc.set_line(node, self.line_at(start));
        self.doc.append_child(parent, node);
    }

    fn on_open_tag_name_impl(&mut self, start: usize, end: usize) {
        let node = self.doc.create_element(&self.source[start..end]);
        self.doc.set_line(node, self.line_at(start));
        self.current_element = Some(node);
    }

    fn on_open_tag_end_impl(&mut self, self_closing: bool) {
        let Some(node) = self.current_element.take() else {
            return;
        };
        let parent = self.current_parent();
        self.doc.append_child(parent, node);
        let is_void = self.doc.tag(node).is_some_and(is_void_tag);
        if !self_closing && !is_void {
            self.stack.push(node);
        }
    }

    fn on_close_tag_impl(&mut self, start: usize, end: usize) {
        let source = self.source;
        let tag = &source[start..end];

        // Find matching open element
        let Some(i) = self
            .stack
            .iter()
            .rposition(|&n| self.doc.tag(n).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
        else {
            if !is_void_tag(tag) {
                self.error(ErrorCode::InvalidEndTag, start);
            }
            return;
        };

        // Report errors for unclosed elements (except the matching one)
        for &node in &self.stack[i + 1..] {
            self.errors.push(ParseError {
                code: ErrorCode::MissingEndTag,
                line: self.doc.line(node),
            });
        }
        self.stack.truncate(i);
    }

    fn on_attrib_name_impl(&mut self, start: usize, end: usize) {
        let source = self.source;
        self.current_attr = Some((&source[start..end], None));
    }

    fn on_attrib_data_impl(&mut self, start: usize, end: usize) {
        if let Some((_, value)) = self.current_attr.as_mut() {
            *value = Some(match *value {
                Some((s, _)) => (s, end),
                None => (start, end),
            });
        }
    }

    fn on_attrib_end_impl(&mut self) {
        let (Some((name, range)), Some(node)) = (self.current_attr.take(), self.current_element)
        else {
            return;
        };
        let source = self.source;
        let value = range
            .map(|(s, e)| htmlize::unescape(&source[s..e]).into_owned())
            .unwrap_or_default();
        let name = name.to_ascii_lowercase();
        // First occurrence wins.
        if !self.doc.has_attr(node, &name) {
            self.doc.set_attr(node, &name, value);
        }
    }

    fn on_comment_impl(&mut self, start: usize, end: usize) {
        let node = self.doc.create_comment(&self.source[start..end]);
        self.doc.set_line(node, self.line_at(start));
        let parent = self.current_parent();
        self.doc.append_child(parent, node);
    }

    fn on_declaration_impl(&mut self, start: usize, end: usize) {
        let decl = &self.source[start..end];
        if decl.len() >= 7 && decl[..7].eq_ignore_ascii_case("doctype") {
            let node = self.doc.create_doctype(decl[7..].trim());
            self.doc.set_line(node, self.line_at(start));
            let parent = self.current_parent();
            self.doc.append_child(parent, node);
        }
    }
}

/// Wrapper struct for implementing Callbacks
struct ParserCallbacks<'a, 'p> {
    parser: &'p mut Parser<'a>,
}

impl<'a, 'p> Callbacks for ParserCallbacks<'a, 'p> {
    fn on_text(&mut self, start: usize, end: usize) {
        self.parser.on_text_impl(start, end);
    }

    fn on_open_tag_name(&mut self, start: usize, end: usize) {
        self.parser.on_open_tag_name_impl(start, end);
    }

    fn on_open_tag_end(&mut self, _end: usize) {
        self.parser.on_open_tag_end_impl(false);
    }

    fn on_self_closing_tag(&mut self, _end: usize) {
        self.parser.on_open_tag_end_impl(true);
    }

    fn on_close_tag(&mut self, start: usize, end: usize) {
        self.parser.on_close_tag_impl(start, end);
    }

    fn on_attrib_name(&mut self, start: usize, end: usize) {
        self.parser.on_attrib_name_impl(start, end);
    }

    fn on_attrib_data(&mut self, start: usize, end: usize) {
        self.parser.on_attrib_data_impl(start, end);
    }

    fn on_attrib_end(&mut self, _quote: QuoteType, _end: usize) {
        self.parser.on_attrib_end_impl();
    }

    fn on_comment(&mut self, start: usize, end: usize) {
        self.parser.on_comment_impl(start, end);
    }

    fn on_declaration(&mut self, start: usize, end: usize) {
        self.parser.on_declaration_impl(start, end);
    }

    fn on_end(&mut self) {}

    fn on_error(&mut self, code: ErrorCode, index: usize) {
        self.parser.error(code, index);
    }
}

/// Parse an HTML document with the default markers.
pub fn parse(source: &str) -> (Document, Vec<ParseError>) {
    Parser::new(source).parse()
}

/// Parse an HTML document with custom fragment markers.
pub fn parse_with_markers(source: &str, open: &str, close: &str) -> (Document, Vec<ParseError>) {
    Parser::new(source).parse_with_markers(open, close)
}

/// Parse `source` and import its top-level nodes into `doc`, detached.
pub fn parse_fragment(doc: &mut Document, source: &str) -> (Vec<NodeId>, Vec<ParseError>) {
    let (fragment, errors) = parse(source);
    let nodes = fragment
        .children(fragment.root())
        .iter()
        .map(|&n| doc.import(&fragment, n))
        .collect();
    (nodes, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeData;

    fn first_element(doc: &Document) -> NodeId {
        doc.document_element().unwrap()
    }

    #[test]
    fn test_parse_simple_element() {
        let (doc, errors) = parse("<div id=\"a\">hello</div>");
        assert!(errors.is_empty());
        let div = first_element(&doc);
        assert_eq!(doc.tag(div), Some("div"));
        assert_eq!(doc.attr(div, "id"), Some("a"));
        assert_eq!(doc.text_content(div), "hello");
    }

    #[test]
    fn test_parse_nested_elements() {
        let (doc, _) = parse("<ul><li>a</li><li>b</li></ul>");
        let ul = first_element(&doc);
        assert_eq!(doc.children(ul).len(), 2);
        assert_eq!(doc.text_content(ul), "ab");
    }

    #[test]
    fn test_parse_void_and_self_closing() {
        let (doc, errors) = parse("<p><br><img src=x/><span/>t</p>");
        assert!(errors.is_empty());
        let p = first_element(&doc);
        let tags: Vec<_> = doc
            .children(p)
            .iter()
            .map(|&n| doc.tag(n).unwrap_or("#text"))
            .collect();
        assert_eq!(tags, ["br", "img", "span", "#text"]);
        assert_eq!(doc.attr(doc.children(p)[1], "src"), Some("x"));
    }

    #[test]
    fn test_parse_boolean_attribute() {
        let (doc, _) = parse("<input disabled>");
        let input = first_element(&doc);
        assert_eq!(doc.attr(input, "disabled"), Some(""));
    }

    #[test]
    fn test_parse_entities() {
        let (doc, _) = parse("<p title=\"a &amp; b\">x &lt; y</p>");
        let p = first_element(&doc);
        assert_eq!(doc.attr(p, "title"), Some("a & b"));
        assert_eq!(doc.text_content(p), "x < y");
    }

    #[test]
    fn test_parse_fragments_stay_intact() {
        let (doc, _) = parse("<p v=[[ a > 1 ]]>[[ a < b ]]</p>");
        let p = first_element(&doc);
        assert_eq!(doc.attr(p, "v"), Some("[[ a > 1 ]]"));
        assert_eq!(doc.text_content(p), "[[ a < b ]]");
    }

    #[test]
    fn test_parse_comment_and_doctype() {
        let (doc, _) = parse("<!DOCTYPE html><html><!--t:0--></html>");
        let children = doc.children(doc.root());
        assert_eq!(doc.data(children[0]), &NodeData::Doctype("html".into()));
        let html = first_element(&doc);
        assert_eq!(doc.comment(doc.children(html)[0]), Some("t:0"));
    }

    #[test]
    fn test_parse_raw_text() {
        let (doc, _) = parse("<script>a &amp;&amp; b < c</script>");
        let script = first_element(&doc);
        assert_eq!(doc.text_content(script), "a &amp;&amp; b < c");
    }

    #[test]
    fn test_parse_error_missing_end_tag() {
        let (doc, errors) = parse("<div>\n<span></div>");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::MissingEndTag);
        assert_eq!(errors[0].line, 2);
        assert_eq!(doc.children(first_element(&doc)).len(), 2);
    }

    #[test]
    fn test_parse_error_invalid_end_tag() {
        let (_, errors) = parse("<div></p></div>");
        assert_eq!(errors[0].code, ErrorCode::InvalidEndTag);
    }

    #[test]
    fn test_parse_fragment() {
        let mut doc = Document::new();
        let (nodes, errors) = parse_fragment(&mut doc, "<b>x</b><i></i>");
        assert!(errors.is_empty());
        assert_eq!(nodes.len(), 2);
        assert_eq!(doc.tag(nodes[0]), Some("b"));
        assert_eq!(doc.parent(nodes[0]), None);
    }
}
