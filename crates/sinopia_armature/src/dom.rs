//! Arena-backed DOM.
//!
//! Nodes live in a single `Vec` owned by the [`Document`] and are addressed by
//! copyable [`NodeId`] handles. Removing a node only detaches it; detached
//! subtrees stay addressable so callers can re-insert them.

use sinopia_carton::CompactString;

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The document node.
    pub const DOCUMENT: Self = Self(0);

    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: CompactString,
    pub value: String,
}

/// Element payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: CompactString,
    pub attrs: Vec<Attribute>,
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Doctype(String),
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// 1-based source line, 0 when created programmatically.
    line: u32,
}

/// An HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
                line: 0,
            }],
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
            line: 0,
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(Element {
            tag: CompactString::from(tag.to_ascii_lowercase()),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(text.into()))
    }

    pub fn create_doctype(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Doctype(text.into()))
    }

    /// The document node.
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::DOCUMENT
    }

    /// First element child of the document.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(NodeId::DOCUMENT)
            .iter()
            .copied()
            .find(|&n| self.is_element(n))
    }

    #[inline]
    pub fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.index()].data
    }

    #[inline]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    #[inline]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.index()].children
    }

    #[inline]
    pub fn line(&self, node: NodeId) -> u32 {
        self.nodes[node.index()].line
    }

    pub fn set_line(&mut self, node: NodeId, line: u32) {
        self.nodes[node.index()].line = line;
    }

    #[inline]
    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.data(node), NodeData::Element(_))
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match self.data(node) {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[node.index()].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    /// Set an attribute, keeping its position when it already exists.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(el) = self.element_mut(node) {
            match el.attrs.iter_mut().find(|a| a.name == name) {
                Some(attr) => attr.value = value,
                None => el.attrs.push(Attribute {
                    name: CompactString::from(name),
                    value,
                }),
            }
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(el) = self.element_mut(node) {
            el.attrs.retain(|a| a.name != name);
        }
    }

    /// Character data of a text or comment node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.data(node) {
            NodeData::Text(t) | NodeData::Comment(t) => Some(t),
            _ => None,
        }
    }

    /// Replace the character data of a text or comment node.
    pub fn set_text(&mut self, node: NodeId, value: impl Into<String>) {
        match &mut self.nodes[node.index()].data {
            NodeData::Text(t) | NodeData::Comment(t) => *t = value.into(),
            _ => {}
        }
    }

    #[inline]
    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.data(node), NodeData::Text(_))
    }

    /// Comment text, if `node` is a comment.
    pub fn comment(&self, node: NodeId) -> Option<&str> {
        match self.data(node) {
            NodeData::Comment(t) => Some(t),
            _ => None,
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for n in self.descendants(node) {
            if let NodeData::Text(t) = self.data(n) {
                out.push_str(t);
            }
        }
        out
    }

    /// Detach `node` from its parent.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|&c| c != node);
        }
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.remove(child);
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Insert `child` before `reference`, or append when `reference` is `None`
    /// or not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.remove(child);
        let siblings = &self.nodes[parent.index()].children;
        let at = reference
            .and_then(|r| siblings.iter().position(|&c| c == r))
            .unwrap_or(siblings.len());
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.insert(at, child);
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let at = siblings.iter().position(|&c| c == node)?;
        siblings.get(at + 1).copied()
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let at = siblings.iter().position(|&c| c == node)?;
        at.checked_sub(1).map(|i| siblings[i])
    }

    /// Pre-order descendants of `node`, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Whether `ancestor` contains `node` (or is `node`).
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.parent(n);
        }
        false
    }

    /// Deep-copy `node` into a new detached subtree.
    pub fn deep_clone(&mut self, node: NodeId) -> NodeId {
        let copy = self.alloc(self.data(node).clone());
        self.nodes[copy.index()].line = self.line(node);
        let children = self.children(node).to_vec();
        for child in children {
            let child_copy = self.deep_clone(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Copy `node` and its subtree from another document into this one.
    pub fn import(&mut self, other: &Document, node: NodeId) -> NodeId {
        let copy = self.alloc(other.data(node).clone());
        self.nodes[copy.index()].line = other.line(node);
        for &child in other.children(node) {
            let child_copy = self.import(other, child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Number of allocated nodes, attached or not.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_building() {
        let mut doc = Document::new();
        let html = doc.create_element("HTML");
        doc.append_child(doc.root(), html);
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(html, b);
        doc.insert_before(html, a, Some(b));
        assert_eq!(doc.tag(html), Some("html"));
        assert_eq!(doc.children(html), &[a, b]);
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.previous_sibling(b), Some(a));
        assert_eq!(doc.document_element(), Some(html));

        doc.remove(a);
        assert_eq!(doc.children(html), &[b]);
        assert_eq!(doc.parent(a), None);
    }

    #[test]
    fn test_attributes() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.set_attr(el, "id", "x");
        doc.set_attr(el, "class", "c");
        doc.set_attr(el, "id", "y");
        assert_eq!(doc.attr(el, "id"), Some("y"));
        assert_eq!(doc.element(el).unwrap().attrs[0].name, "id");
        doc.remove_attr(el, "id");
        assert!(!doc.has_attr(el, "id"));
    }

    #[test]
    fn test_deep_clone() {
        let mut doc = Document::new();
        let el = doc.create_element("ul");
        let li = doc.create_element("li");
        let text = doc.create_text("hi");
        doc.append_child(el, li);
        doc.append_child(li, text);
        let copy = doc.deep_clone(el);
        assert_ne!(copy, el);
        assert_eq!(doc.parent(copy), None);
        assert_eq!(doc.text_content(copy), "hi");
        let copied_text = doc.descendants(copy)[1];
        doc.set_text(copied_text, "changed");
        assert_eq!(doc.text_content(el), "hi");
    }
}
