//! Simple selectors.
//!
//! Supports one compound selector made of an optional tag name followed by any
//! number of `#id`, `.class`, `[attr]` and `[attr=value]` parts. Combinators
//! are not supported.

use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Tag(String),
    Id(String),
    Class(String),
    Attr(String, Option<String>),
}

/// A parsed compound selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    parts: Vec<Part>,
}

impl Selector {
    /// Parse a selector; `None` when it is empty or malformed.
    pub fn parse(source: &str) -> Option<Self> {
        let source = source.trim();
        let bytes = source.as_bytes();
        let mut parts = Vec::new();
        let mut i = 0;

        let ident_end = |from: usize| {
            bytes[from..]
                .iter()
                .position(|&b| matches!(b, b'#' | b'.' | b'[' | b' '))
                .map_or(bytes.len(), |p| from + p)
        };

        while i < bytes.len() {
            match bytes[i] {
                b'#' | b'.' => {
                    let end = ident_end(i + 1);
                    let name = &source[i + 1..end];
                    if name.is_empty() {
                        return None;
                    }
                    parts.push(if bytes[i] == b'#' {
                        Part::Id(name.to_string())
                    } else {
                        Part::Class(name.to_string())
                    });
                    i = end;
                }
                b'[' => {
                    let close = source[i..].find(']')? + i;
                    let inner = &source[i + 1..close];
                    let part = match inner.split_once('=') {
                        Some((name, value)) => Part::Attr(
                            name.trim().to_ascii_lowercase(),
                            Some(value.trim().trim_matches(['"', '\'']).to_string()),
                        ),
                        None => Part::Attr(inner.trim().to_ascii_lowercase(), None),
                    };
                    parts.push(part);
                    i = close + 1;
                }
                b' ' => return None,
                _ if i == 0 => {
                    let end = ident_end(0);
                    parts.push(Part::Tag(source[..end].to_ascii_lowercase()));
                    i = end;
                }
                _ => return None,
            }
        }

        (!parts.is_empty()).then_some(Self { parts })
    }

    /// Whether `node` matches.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        self.parts.iter().all(|part| match part {
            Part::Tag(t) => t == "*" || t == tag,
            Part::Id(id) => doc.attr(node, "id") == Some(id.as_str()),
            Part::Class(class) => doc
                .attr(node, "class")
                .is_some_and(|c| c.split_ascii_whitespace().any(|c| c == class)),
            Part::Attr(name, None) => doc.has_attr(node, name),
            Part::Attr(name, Some(value)) => doc.attr(node, name) == Some(value.as_str()),
        })
    }
}

/// First descendant of `root` matching `selector`, in document order.
pub fn query_selector(doc: &Document, root: NodeId, selector: &str) -> Option<NodeId> {
    let selector = Selector::parse(selector)?;
    doc.descendants(root)
        .into_iter()
        .find(|&n| selector.matches(doc, n))
}

/// All descendants of `root` matching `selector`, in document order.
pub fn query_selector_all(doc: &Document, root: NodeId, selector: &str) -> Vec<NodeId> {
    let Some(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    doc.descendants(root)
        .into_iter()
        .filter(|&n| selector.matches(doc, n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_parse() {
        assert!(Selector::parse("").is_none());
        assert!(Selector::parse("a b").is_none());
        assert!(Selector::parse("#").is_none());
        assert!(Selector::parse("li.item[data-x=\"1\"]").is_some());
    }

    #[test]
    fn test_query() {
        let (doc, _) = parse(
            r#"<main><p id="a" class="x y">1</p><p class="y" data-k="v">2</p><span data-k>3</span></main>"#,
        );
        let root = doc.root();
        let first = query_selector(&doc, root, "#a").unwrap();
        assert_eq!(doc.text_content(first), "1");
        assert_eq!(query_selector_all(&doc, root, ".y").len(), 2);
        assert_eq!(query_selector_all(&doc, root, "p.y").len(), 2);
        assert_eq!(query_selector_all(&doc, root, "[data-k]").len(), 2);
        let second = query_selector(&doc, root, "p[data-k=v]").unwrap();
        assert_eq!(doc.text_content(second), "2");
        assert!(query_selector(&doc, root, "table").is_none());
    }
}
