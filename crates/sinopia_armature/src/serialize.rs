//! HTML serialization.

use sinopia_carton::{is_raw_text_tag, is_void_tag};

use crate::dom::{Document, NodeData, NodeId};

/// Serialize `node` including its own tag.
pub fn outer_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, node, &mut out);
    out
}

/// Serialize the children of `node`.
pub fn inner_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    for &child in doc.children(node) {
        write_node(doc, child, &mut out);
    }
    out
}

/// Serialize a whole document.
pub fn to_html(doc: &Document) -> String {
    inner_html(doc, doc.root())
}

fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    match doc.data(node) {
        NodeData::Document => {
            for &child in doc.children(node) {
                write_node(doc, child, out);
            }
        }
        NodeData::Doctype(text) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(text);
            out.push('>');
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Text(text) => {
            let raw = doc
                .parent(node)
                .and_then(|p| doc.tag(p))
                .is_some_and(is_raw_text_tag);
            if raw {
                out.push_str(text);
            } else {
                out.push_str(&htmlize::escape_text(text.as_str()));
            }
        }
        NodeData::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for attr in &el.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                if !attr.value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&htmlize::escape_attribute(attr.value.as_str()));
                    out.push('"');
                }
            }
            out.push('>');
            if is_void_tag(&el.tag) {
                return;
            }
            for &child in doc.children(node) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_round_trip() {
        let source = "<!DOCTYPE html><div id=\"a\" hidden><br><!--t:0-->x<!--/t:0--></div>";
        let (doc, _) = parse(source);
        assert_eq!(to_html(&doc), source);
    }

    #[test]
    fn test_escaping() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        doc.append_child(doc.root(), p);
        doc.set_attr(p, "title", "\"a\" & b");
        let text = doc.create_text("1 < 2");
        doc.append_child(p, text);
        assert_eq!(
            outer_html(&doc, p),
            "<p title=\"&quot;a&quot; &amp; b\">1 &lt; 2</p>"
        );
    }

    #[test]
    fn test_raw_text_is_verbatim() {
        let (doc, _) = parse("<style>a > b {}</style>");
        assert_eq!(to_html(&doc), "<style>a > b {}</style>");
    }
}
