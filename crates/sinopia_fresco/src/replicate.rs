//! Dynamic structure: clones, disposal, mounting and list reconciliation.
//!
//! A list template keeps `len - 1` clones. Clone `i` has id `<id>.<i>`, sits
//! right before the template element in the document, and its `data` reads
//! element `i` of the template's source. The template itself reads the last
//! element.

use std::rc::Rc;

use sinopia_armature::NodeId;
use sinopia_relief::keys::MARKER_ATTR;
use sinopia_relief::ScopeDescriptor;
use tracing::debug;

use crate::build::Origin;
use crate::error::PageError;
use crate::page::{Page, Phase};
use crate::scope::{is_clone_id, ScopeId};
use crate::value::JsValue;

const HIDDEN_ATTR: &str = "hidden";

impl Page {
    /// Create clone `at_index` of `template`, which must be the next free
    /// index. The clone is linked but not evaluated.
    pub fn clone_scope(&mut self, template: ScopeId, at_index: usize) -> Result<ScopeId, PageError> {
        let t = self.scope(template).ok_or(PageError::UnknownScope)?;
        let expected = t.clones.len();
        if at_index != expected {
            return Err(PageError::CloneIndex {
                id: t.id.clone(),
                index: at_index,
                expected,
            });
        }
        let not_clonable = || PageError::NotClonable(t.id.clone());
        let parent = t.parent.ok_or_else(not_clonable)?;
        let dom_parent = self.document.parent(t.element).ok_or_else(not_clonable)?;
        let (descriptor, element, pristine) = (Rc::clone(&t.descriptor), t.element, t.pristine);

        let copy = match pristine {
            Some(pristine) => self.document.deep_clone(pristine),
            None => {
                let copy = self.document.deep_clone(element);
                self.strip_clones(copy);
                copy
            }
        };
        self.document.insert_before(dom_parent, copy, Some(element));

        let origin = Origin::Clone {
            template,
            index: at_index,
        };
        let clone = match self.build_scope(descriptor, Some(parent), copy, origin) {
            Ok(clone) => clone,
            Err(err) => {
                self.document.remove(copy);
                return Err(err);
            }
        };
        if let Some(t) = self.scope_mut(template) {
            t.clones.push(clone);
        }
        self.walk(clone, Phase::Link)?;
        debug!(template = ?template, index = at_index, "clone created");
        Ok(clone)
    }

    /// Remove `scope` and its subtree: every owned value is unlinked on both
    /// ends and freed, and the element leaves the document. Clones must be
    /// disposed from the end.
    pub fn dispose(&mut self, scope: ScopeId) -> Result<(), PageError> {
        if scope == self.root() {
            return Err(PageError::RootDisposal);
        }
        let s = self.scope(scope).ok_or(PageError::UnknownScope)?;
        let (parent, clone_of) = (s.parent, s.clone_of);

        match clone_of {
            Some((template, _)) => {
                let is_last = self
                    .scope(template)
                    .map_or(true, |t| t.clones.last() == Some(&scope));
                if !is_last {
                    return Err(PageError::NotLastClone(s.id.clone()));
                }
                if let Some(t) = self.scope_mut(template) {
                    t.clones.pop();
                }
            }
            None => {
                if let Some(p) = parent.and_then(|p| self.scope_mut(p)) {
                    p.children.retain(|&c| c != scope);
                }
            }
        }
        debug!(scope = ?scope, "dispose");
        self.free_scope(scope, true);
        Ok(())
    }

    /// Build `descriptor` as a new child of `parent` and link it.
    pub fn mount(&mut self, parent: ScopeId, descriptor: &ScopeDescriptor) -> Result<ScopeId, PageError> {
        let parent_element = self.scope(parent).ok_or(PageError::UnknownScope)?.element;
        let descriptor = Rc::new(descriptor.clone());
        let element = self.bind_element(parent_element, &descriptor)?;
        let inline = descriptor.dom_selector.is_none() && descriptor.inline_markup.is_some();

        let scope = match self.build_scope(descriptor, Some(parent), element, Origin::Child) {
            Ok(scope) => scope,
            Err(err) => {
                if inline {
                    self.document.remove(element);
                }
                return Err(err);
            }
        };
        if let Some(p) = self.scope_mut(parent) {
            p.children.push(scope);
        }
        self.walk(scope, Phase::Link)?;
        Ok(scope)
    }

    /// Match the clones of a list template to its evaluated source.
    pub(crate) fn reconcile(&mut self, scope: ScopeId) -> Result<(), PageError> {
        let Some(source) = self.scope(scope).and_then(|s| s.source) else {
            return Ok(());
        };
        let length = match self.value(source).map(|v| &v.result) {
            Some(JsValue::Array(items)) => Some(items.borrow().len()),
            _ => None,
        };
        let wanted = length.map_or(0, |n| n.saturating_sub(1));

        while let Some(last) = self
            .scope(scope)
            .filter(|s| s.clones.len() > wanted)
            .and_then(|s| s.clones.last().copied())
        {
            self.dispose(last)?;
        }
        loop {
            let Some(have) = self.scope(scope).map(|s| s.clones.len()) else {
                return Ok(());
            };
            if have >= wanted {
                break;
            }
            self.clone_scope(scope, have)?;
        }

        self.set_hidden(scope, length == Some(0));
        Ok(())
    }

    fn set_hidden(&mut self, scope: ScopeId, hide: bool) {
        let Some(s) = self.scope_mut(scope) else {
            return;
        };
        if s.hidden == hide {
            return;
        }
        s.hidden = hide;
        let element = s.element;
        if hide {
            self.document.set_attr(element, HIDDEN_ATTR, "");
        } else {
            self.document.remove_attr(element, HIDDEN_ATTR);
        }
    }

    /// Detach every clone element below `node`.
    fn strip_clones(&mut self, node: NodeId) {
        let clones: Vec<NodeId> = self
            .document
            .descendants(node)
            .into_iter()
            .filter(|&n| self.document.attr(n, MARKER_ATTR).is_some_and(is_clone_id))
            .collect();
        for clone in clones {
            self.document.remove(clone);
        }
    }
}
