//! Template compiler.
//!
//! Walks a parsed template and produces the static descriptor tree. Along the
//! way the document is rewritten into the markup the runtime expects:
//! directive attributes are removed, every scope element gets its structural
//! marker and every dynamic text node is wrapped in numbered placeholder
//! comments.

use serde::{Deserialize, Serialize};
use sinopia_armature::{parse_with_markers, to_html, Document, NodeData, NodeId};
use sinopia_carton::{camelize, is_raw_text_tag, is_simple_identifier, is_template_tag, FxHashSet};
use sinopia_relief::keys::{
    self, AKA_ATTR, DATA_KEY, EVENT_ATTR_PREFIX, MARKER_ATTR, OUTER_PROPERTY, REFRESH_PROPERTY,
    VALUE_ATTR_PREFIX,
};
use sinopia_relief::{CompilerError, CompilerOptions, ScopeDescriptor, ValueDescriptor};

use crate::preprocess::{has_fragment, preprocess};
use crate::qualify::{handler_source, is_function_literal, qualify_function, qualify_value};

/// Output of [`compile_template`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledTemplate {
    /// Rewritten markup the runtime parses.
    pub markup: String,
    /// Descriptor of the root scope.
    pub root: ScopeDescriptor,
    /// Diagnostics, errors and warnings alike.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<CompilerError>,
}

impl CompiledTemplate {
    /// Whether any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(CompilerError::is_error)
    }
}

/// How a fragment is turned into an evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Value,
    Listener,
}

struct Compiler<'o> {
    options: &'o CompilerOptions,
    errors: Vec<CompilerError>,
    next_id: u32,
}

/// Compile template source into markup plus descriptors.
pub fn compile_template(source: &str, options: &CompilerOptions) -> CompiledTemplate {
    let (mut doc, parse_errors) =
        parse_with_markers(source, options.open_marker(), options.close_marker());

    let mut errors: Vec<CompilerError> = parse_errors
        .into_iter()
        .map(|e| CompilerError::warn(e.code.to_string(), &options.origin, e.line))
        .collect();

    let (root, compile_errors) = compile_document(&mut doc, options);
    errors.extend(compile_errors);

    CompiledTemplate {
        markup: to_html(&doc),
        root,
        errors,
    }
}

/// Compile a parsed template in place, returning the root descriptor and the
/// diagnostics.
pub fn compile_document(
    doc: &mut Document,
    options: &CompilerOptions,
) -> (ScopeDescriptor, Vec<CompilerError>) {
    let mut compiler = Compiler {
        options,
        errors: Vec::new(),
        next_id: 0,
    };

    let Some(root) = doc.document_element() else {
        compiler
            .errors
            .push(CompilerError::error("template has no root element", &options.origin, 1));
        return (ScopeDescriptor::new("0"), compiler.errors);
    };

    let descriptor = compiler.compile_scope(doc, root);
    (descriptor, compiler.errors)
}

impl Compiler<'_> {
    fn has_fragment(&self, text: &str) -> bool {
        has_fragment(text, self.options.open_marker(), self.options.close_marker())
    }

    /// Whether an element opens a new scope.
    fn is_scope_element(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = doc.element(node) else {
            return false;
        };
        is_template_tag(&element.tag)
            || element.attrs.iter().any(|attr| {
                attr.name.starts_with(VALUE_ATTR_PREFIX) || self.has_fragment(&attr.value)
            })
    }

    fn compile_scope(&mut self, doc: &mut Document, node: NodeId) -> ScopeDescriptor {
        let id = self.next_id;
        self.next_id += 1;
        let mut descriptor = ScopeDescriptor::new(id.to_string());

        self.compile_attributes(doc, node, &mut descriptor);
        doc.set_attr(node, MARKER_ATTR, id.to_string());

        let mut text_index = 0;
        self.compile_content(doc, node, &mut descriptor, &mut text_index);
        descriptor
    }

    fn compile_attributes(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        descriptor: &mut ScopeDescriptor,
    ) {
        let line = doc.line(node);
        let attrs = doc.element(node).map(|el| el.attrs.clone()).unwrap_or_default();

        for attr in attrs {
            let name = attr.name.as_str();
            let value = attr.value.as_str();

            if name == AKA_ATTR {
                doc.remove_attr(node, name);
                if is_simple_identifier(value) && !is_reserved(value) {
                    descriptor.name = Some(value.to_string());
                } else {
                    self.warn(format!("invalid scope name \"{value}\""), line);
                }
                continue;
            }

            if let Some(declared) = name.strip_prefix(VALUE_ATTR_PREFIX) {
                doc.remove_attr(node, name);
                if let Some(event) = declared.strip_prefix(EVENT_ATTR_PREFIX) {
                    let key = keys::event_key(event);
                    let value = self.compile_value(&key, value, Mode::Listener, line);
                    descriptor.values.push(value);
                    continue;
                }
                let key = camelize(declared);
                if !is_simple_identifier(&key) || is_reserved(&key) {
                    self.warn(format!("invalid value name \"{declared}\""), line);
                    continue;
                }
                let value = if self.has_fragment(value) {
                    let mut value = self.compile_value(&key, value, Mode::Value, line);
                    value.reflect = key != DATA_KEY && value.is_computed();
                    value
                } else {
                    ValueDescriptor::literal(key.as_str(), parse_literal(value))
                };
                descriptor.values.push(value);
                continue;
            }

            if self.has_fragment(value) {
                doc.remove_attr(node, name);
                let key = keys::attr_key(name);
                let value = self.compile_value(&key, value, Mode::Value, line);
                descriptor.values.push(value);
            }
        }

        if descriptor.values.iter().any(|v| v.key == DATA_KEY && !v.is_computed()) {
            self.warn("list source `data` should be a script fragment", line);
        }
    }

    /// Compile the content of `parent` into `descriptor`, stopping at nested
    /// scope elements.
    fn compile_content(
        &mut self,
        doc: &mut Document,
        parent: NodeId,
        descriptor: &mut ScopeDescriptor,
        text_index: &mut usize,
    ) {
        if doc.tag(parent).is_some_and(is_raw_text_tag) {
            return;
        }

        for child in doc.children(parent).to_vec() {
            match doc.data(child) {
                NodeData::Element(_) => {
                    if self.is_scope_element(doc, child) {
                        let scope = self.compile_scope(doc, child);
                        descriptor.children.push(scope);
                    } else {
                        self.compile_content(doc, child, descriptor, text_index);
                    }
                }
                NodeData::Text(text) if self.has_fragment(text) => {
                    let text = text.clone();
                    let index = *text_index;
                    *text_index += 1;

                    let key = keys::text_key(index);
                    let value = self.compile_value(&key, &text, Mode::Value, doc.line(child));
                    descriptor.values.push(value);

                    let open = doc.create_comment(keys::text_open_marker(index).as_str());
                    let close = doc.create_comment(keys::text_close_marker(index).as_str());
                    doc.insert_before(parent, open, Some(child));
                    let next = doc.next_sibling(child);
                    doc.insert_before(parent, close, next);
                    doc.set_text(child, "");
                }
                _ => {}
            }
        }
    }

    fn compile_value(&mut self, key: &str, raw: &str, mode: Mode, line: u32) -> ValueDescriptor {
        let source = preprocess(raw, self.options.open_marker(), self.options.close_marker());
        if source.trim().is_empty() {
            return ValueDescriptor::literal(key, serde_json::Value::Null);
        }

        let mut references = FxHashSet::default();
        let result = match mode {
            Mode::Value => qualify_value(&source, Some(key), &mut references),
            Mode::Listener if is_function_literal(&source) => {
                qualify_function(&source, &mut references)
            }
            Mode::Listener => qualify_function(&handler_source(&source), &mut references),
        };

        match result {
            Ok(evaluator) => {
                let mut names: Vec<String> = references.into_iter().collect();
                names.sort();
                let mut value = ValueDescriptor::computed(key, evaluator, names);
                value.passive = mode == Mode::Listener;
                value
            }
            Err(err) => {
                self.errors.push(CompilerError::error(
                    format!("{key}: {err}"),
                    &self.options.origin,
                    line,
                ));
                ValueDescriptor::literal(key, serde_json::Value::Null)
            }
        }
    }

    fn warn(&mut self, message: impl Into<String>, line: u32) {
        self.errors
            .push(CompilerError::warn(message, &self.options.origin, line));
    }
}

fn is_reserved(name: &str) -> bool {
    name == OUTER_PROPERTY || name == REFRESH_PROPERTY
}

/// A literal declaration is JSON when it parses as JSON, otherwise a string.
fn parse_literal(value: &str) -> serde_json::Value {
    serde_json::from_str(value.trim())
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(source: &str) -> CompiledTemplate {
        compile_template(source, &CompilerOptions::default())
    }

    #[test]
    fn test_plain_root_is_scope_zero() {
        let out = compile("<div>static</div>");
        assert_eq!(out.markup, "<div data-sn=\"0\">static</div>");
        assert_eq!(out.root.id, "0");
        assert!(out.root.values.is_empty());
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_literal_declarations() {
        let out = compile(r#"<div :x="1" :label="hi" :item-count="[1]"></div>"#);
        assert_eq!(out.root.value("x").unwrap().literal, Some(json!(1)));
        assert_eq!(out.root.value("label").unwrap().literal, Some(json!("hi")));
        assert_eq!(out.root.value("itemCount").unwrap().literal, Some(json!([1])));
        assert_eq!(out.markup, "<div data-sn=\"0\"></div>");
    }

    #[test]
    fn test_computed_declarations_reflect() {
        let out = compile(r#"<ul :v=[[x]] :x="1"><li :data="[[ x ]]"></li></ul>"#);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert!(out.root.value("v").unwrap().reflect);
        assert!(!out.root.value("x").unwrap().reflect);
        assert!(!out.root.children[0].value("data").unwrap().reflect);
    }

    #[test]
    fn test_statement_sequence_fragment() {
        let out = compile(r#"<p :a="2">[[ let t = a * 2; t + 1 ]]</p>"#);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let text = out.root.value("text_0").unwrap();
        assert_eq!(
            text.evaluator.as_deref(),
            Some("function () {\nlet t = this.a * 2; return (t + 1)\n}")
        );
        assert_eq!(text.referenced_names, ["a"]);
    }

    #[test]
    fn test_attribute_and_text_values() {
        let out = compile("<p title=\"n=[[n]]\">Hello [[ who ]]!</p>");
        let title = out.root.value("attr_title").unwrap();
        assert_eq!(
            title.evaluator.as_deref(),
            Some("function () { return ('n='+__nn((this.n))); }")
        );
        assert_eq!(title.referenced_names, ["n"]);
        let text = out.root.value("text_0").unwrap();
        assert_eq!(text.referenced_names, ["who"]);
        assert_eq!(out.markup, "<p data-sn=\"0\"><!--t:0--><!--/t:0--></p>");
    }

    #[test]
    fn test_nested_scopes_and_text_numbering() {
        let out = compile("<ul><li :aka=\"first\">[[a]]</li><b>[[b]]</b><i>[[c]]</i></ul>");
        assert_eq!(out.root.children.len(), 1);
        let child = &out.root.children[0];
        assert_eq!(child.id, "1");
        assert_eq!(child.name.as_deref(), Some("first"));
        assert!(child.value("text_0").is_some());
        assert!(out.root.value("text_0").is_some());
        assert!(out.root.value("text_1").is_some());
    }

    #[test]
    fn test_listener_modes() {
        let out = compile("<button :on-click=\"[[ () => n++ ]]\" :on-focus=\"[[ n = 0 ]]\"></button>");
        let click = out.root.value("on_click").unwrap();
        assert!(click.passive);
        assert_eq!(click.evaluator.as_deref(), Some("() => this.n++"));
        let focus = out.root.value("on_focus").unwrap();
        assert!(focus.passive);
        assert_eq!(
            focus.evaluator.as_deref(),
            Some("function (event) {\nthis.n = 0\n}")
        );
    }

    #[test]
    fn test_errors_do_not_abort() {
        let out = compile("<p a=\"[[ 1 + ]]\" b=\"[[ ok ]]\"></p>");
        assert_eq!(out.errors.len(), 1);
        assert!(out.has_errors());
        assert_eq!(out.root.value("attr_a").unwrap().literal, Some(json!(null)));
        assert!(out.root.value("attr_b").unwrap().is_computed());
    }

    #[test]
    fn test_invalid_names_warn() {
        let out = compile("<p :aka=\"1x\" :$outer=\"1\"></p>");
        assert_eq!(out.errors.len(), 2);
        assert!(!out.has_errors());
        assert!(out.root.name.is_none());
        assert!(out.root.values.is_empty());
    }
}
