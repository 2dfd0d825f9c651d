//! Scope construction from descriptors.

use std::rc::Rc;

use indexmap::IndexMap;
use sinopia_armature::{parse_fragment, query_selector, NodeId};
use sinopia_carton::{hyphenate, is_template_tag};
use sinopia_relief::keys::{parse_text_marker, DATA_KEY, MARKER_ATTR};
use sinopia_relief::{KeyKind, ScopeDescriptor, ValueDescriptor};
use tracing::debug;

use crate::cell::{Formula, SyncTarget, Value, ValueId};
use crate::error::PageError;
use crate::page::Page;
use crate::scope::{descriptor_id, is_clone_id, Scope, ScopeId};
use crate::script::ast::FunctionDef;
use crate::script::{compile_function, instantiate};
use crate::value::JsValue;

/// Where a scope being built comes from.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Origin {
    Root,
    Child,
    Clone { template: ScopeId, index: usize },
}

impl Page {
    /// Build a scope bound to `element`, with its values and (unless the
    /// element is an inert `<template>`) its child scopes.
    pub(crate) fn build_scope(
        &mut self,
        descriptor: Rc<ScopeDescriptor>,
        parent: Option<ScopeId>,
        element: NodeId,
        origin: Origin,
    ) -> Result<ScopeId, PageError> {
        let (id, prefix) = match origin {
            Origin::Clone { template, index } => {
                let template = self.scope(template).ok_or(PageError::UnknownScope)?;
                let id = format!("{}.{index}", template.id);
                (id.clone(), Some(id))
            }
            Origin::Root | Origin::Child => {
                let prefix = parent
                    .and_then(|p| self.scope(p))
                    .and_then(|p| p.prefix.clone());
                let id = match &prefix {
                    Some(prefix) => format!("{prefix}/{}", descriptor.id),
                    None => descriptor.id.clone(),
                };
                (id, prefix)
            }
        };

        self.document.set_attr(element, MARKER_ATTR, id.as_str());
        let is_list = matches!(origin, Origin::Child)
            && descriptor
                .value(DATA_KEY)
                .is_some_and(ValueDescriptor::is_computed);
        let pristine = is_list.then(|| self.document.deep_clone(element));

        let scope_id = ScopeId::new(self.scopes.len());
        self.scopes.push(Some(Scope {
            id: id.clone(),
            descriptor,
            parent,
            element,
            texts: Vec::new(),
            values: IndexMap::new(),
            source: None,
            children: Vec::new(),
            clones: Vec::new(),
            clone_of: match origin {
                Origin::Clone { template, index } => Some((template, index)),
                _ => None,
            },
            prefix,
            pristine,
            listeners: Vec::new(),
            hidden: false,
        }));
        self.registry.insert(id, scope_id);

        if let Err(err) = self.populate(scope_id, origin) {
            self.free_scope(scope_id, false);
            return Err(err);
        }
        Ok(scope_id)
    }

    fn populate(&mut self, scope: ScopeId, origin: Origin) -> Result<(), PageError> {
        let Some(s) = self.scope(scope) else {
            return Err(PageError::UnknownScope);
        };
        let (descriptor, element) = (Rc::clone(&s.descriptor), s.element);

        // Children first, so nested scope elements carry their markers
        // before the text scan.
        if !self.document.tag(element).is_some_and(is_template_tag) {
            for child in &descriptor.children {
                let child = Rc::new(child.clone());
                let child_element = self.bind_element(element, &child)?;
                let child_id = self.build_scope(child, Some(scope), child_element, Origin::Child)?;
                if let Some(s) = self.scope_mut(scope) {
                    s.children.push(child_id);
                }
            }
        }

        self.scan_texts(scope);

        for value in &descriptor.values {
            self.create_value(scope, value, origin)?;
        }
        Ok(())
    }

    /// Locate the element of a child scope inside `parent_element`.
    pub(crate) fn bind_element(
        &mut self,
        parent_element: NodeId,
        descriptor: &ScopeDescriptor,
    ) -> Result<NodeId, PageError> {
        if let Some(selector) = &descriptor.dom_selector {
            return query_selector(&self.document, parent_element, selector)
                .ok_or_else(|| PageError::MissingElement(descriptor.id.clone()));
        }

        if let Some(markup) = &descriptor.inline_markup {
            let (nodes, errors) = parse_fragment(&mut self.document, markup);
            let element = nodes
                .into_iter()
                .find(|&n| self.document.is_element(n))
                .ok_or_else(|| PageError::InlineMarkup {
                    id: descriptor.id.clone(),
                    reason: errors
                        .first()
                        .map_or_else(|| "no element in markup".to_string(), ToString::to_string),
                })?;
            self.document.append_child(parent_element, element);
            return Ok(element);
        }

        self.find_marker(parent_element, &descriptor.id)
            .ok_or_else(|| PageError::MissingElement(descriptor.id.clone()))
    }

    /// First descendant marked with descriptor id `id`, skipping clone
    /// subtrees.
    fn find_marker(&self, root: NodeId, id: &str) -> Option<NodeId> {
        let doc = &self.document;
        let mut stack: Vec<NodeId> = doc.children(root).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if let Some(marker) = doc.attr(node, MARKER_ATTR) {
                if is_clone_id(marker) {
                    continue;
                }
                if descriptor_id(marker) == id {
                    return Some(node);
                }
            }
            stack.extend(doc.children(node).iter().rev().copied());
        }
        None
    }

    /// Collect the text placeholders of `scope`, stopping at nested scopes,
    /// and make sure each opening marker is followed by a text node.
    fn scan_texts(&mut self, scope: ScopeId) {
        let Some(element) = self.scope(scope).map(Scope::element) else {
            return;
        };
        let mut texts: Vec<Option<NodeId>> = Vec::new();
        let mut stack: Vec<NodeId> = self
            .document
            .children(element)
            .iter()
            .rev()
            .copied()
            .collect();

        while let Some(node) = stack.pop() {
            if self.document.is_element(node) {
                if !self.document.has_attr(node, MARKER_ATTR) {
                    stack.extend(self.document.children(node).iter().rev().copied());
                }
                continue;
            }
            let Some((index, false)) = self.document.comment(node).and_then(parse_text_marker) else {
                continue;
            };
            let text = match self.document.next_sibling(node) {
                Some(next) if self.document.is_text(next) => next,
                next => {
                    let Some(parent) = self.document.parent(node) else {
                        continue;
                    };
                    let text = self.document.create_text("");
                    self.document.insert_before(parent, text, next);
                    text
                }
            };
            if texts.len() <= index {
                texts.resize(index + 1, None);
            }
            texts[index] = Some(text);
        }

        if let Some(s) = self.scope_mut(scope) {
            s.texts = texts;
        }
    }

    fn create_value(
        &mut self,
        scope: ScopeId,
        descriptor: &ValueDescriptor,
        origin: Origin,
    ) -> Result<(), PageError> {
        let key = descriptor.key.as_str();
        let kind = KeyKind::of(key);
        let passive = descriptor.passive || matches!(kind, KeyKind::Event(_));

        let mut value = match &descriptor.evaluator {
            Some(source) if passive => {
                let def = self.function(key, source)?;
                let mut value = Value::literal(
                    key,
                    Some(scope),
                    instantiate(def, Some(JsValue::Scope(scope))),
                );
                value.passive = true;
                value
            }
            Some(source) if kind == KeyKind::Data => self.data_value(scope, descriptor, source, origin)?,
            Some(source) => {
                let def = self.function(key, source)?;
                Value::computed(
                    key,
                    scope,
                    Formula::Script(instantiate(def, None)),
                    descriptor.referenced_names.clone(),
                )
            }
            None => {
                let literal = descriptor
                    .literal
                    .as_ref()
                    .map_or(JsValue::Undefined, JsValue::from_json);
                Value::literal(key, Some(scope), literal)
            }
        };
        value.sync = match kind {
            KeyKind::Attribute(name) => Some(SyncTarget::Attribute(hyphenate(name).to_string())),
            KeyKind::Text(index) => Some(SyncTarget::Text(index)),
            KeyKind::Plain(name) if descriptor.reflect => {
                Some(SyncTarget::Attribute(hyphenate(name).to_string()))
            }
            _ => None,
        };

        let is_literal = value.formula.is_none() && !value.passive;
        let id = self.alloc_value(value);
        if let Some(s) = self.scope_mut(scope) {
            s.values.insert(key.to_string(), id);
        }
        if is_literal {
            self.sync(id);
            if let Some(value) = self.value_mut(id) {
                value.synced = true;
            }
        }
        Ok(())
    }

    /// The `data` value of a scope. List templates move the formula into a
    /// hidden source and read its last element; clones read their index.
    fn data_value(
        &mut self,
        scope: ScopeId,
        descriptor: &ValueDescriptor,
        source: &str,
        origin: Origin,
    ) -> Result<Value, PageError> {
        if let Origin::Clone { template, index } = origin {
            if let Some(list) = self.scope(template).and_then(Scope::source) {
                let formula = Formula::Item {
                    source: list,
                    index: Some(index),
                };
                return Ok(Value::computed(DATA_KEY, scope, formula, Vec::new()));
            }
        }

        let def = self.function(DATA_KEY, source)?;
        let formula = Formula::Script(instantiate(def, None));
        let names = descriptor.referenced_names.clone();
        if self.scope(scope).is_some_and(|s| s.pristine.is_none()) {
            return Ok(Value::computed(DATA_KEY, scope, formula, names));
        }

        let list = self.alloc_value(Value::computed(DATA_KEY, scope, formula, names));
        if let Some(s) = self.scope_mut(scope) {
            s.source = Some(list);
        }
        debug!(scope = ?scope, "list template");
        let formula = Formula::Item {
            source: list,
            index: None,
        };
        Ok(Value::computed(DATA_KEY, scope, formula, Vec::new()))
    }

    /// Compiled evaluator for `source`, cached by source text.
    fn function(&mut self, key: &str, source: &str) -> Result<Rc<FunctionDef>, PageError> {
        if let Some(def) = self.functions.get(source) {
            return Ok(Rc::clone(def));
        }
        let def = compile_function(source).map_err(|err| PageError::Evaluator {
            key: key.to_string(),
            source: err,
        })?;
        self.functions.insert(source.to_string(), Rc::clone(&def));
        Ok(def)
    }

    /// Release `scope`, its clones and children, and every value they own.
    /// `detach` also removes the element from the document.
    pub(crate) fn free_scope(&mut self, scope: ScopeId, detach: bool) {
        let Some(s) = self.scopes.get_mut(scope.index()).and_then(Option::take) else {
            return;
        };
        if detach {
            self.document.remove(s.element);
        }
        for &clone in &s.clones {
            self.free_scope(clone, true);
        }
        for &child in &s.children {
            self.free_scope(child, false);
        }
        for value in s.all_values() {
            self.free_value(value);
        }
        if self.registry.get(&s.id) == Some(&scope) {
            self.registry.remove(&s.id);
        }
    }

    fn free_value(&mut self, id: ValueId) {
        let Some(value) = self.values.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        for up in value.upstream {
            if let Some(up) = self.value_mut(up) {
                up.downstream.remove(&id);
            }
        }
        for down in value.downstream {
            if let Some(down) = self.value_mut(down) {
                down.upstream.remove(&id);
            }
        }
    }
}
