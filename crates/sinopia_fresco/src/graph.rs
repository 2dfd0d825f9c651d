//! Dependency graph maintenance and evaluation.
//!
//! Every edge is written on both ends in the same call, so
//! `b ∈ a.upstream ⇔ a ∈ b.downstream` holds between calls.

use sinopia_carton::FxHashSet;
use sinopia_relief::keys::{OUTER_PROPERTY, REFRESH_PROPERTY};
use tracing::debug;

use crate::cell::{Formula, Links, SyncTarget, Value, ValueId};
use crate::error::{EvalError, EvalResult};
use crate::page::Page;
use crate::scope::{Scope, ScopeId};
use crate::script::{call_function, Native};
use crate::value::JsValue;

impl Page {
    /// Drop every upstream edge of `id`. Idempotent.
    pub fn unlink_value(&mut self, id: ValueId) {
        let Some(value) = self.value_mut(id) else {
            return;
        };
        let upstream: Vec<ValueId> = value.upstream.drain().collect();
        for up in upstream {
            if let Some(up) = self.value_mut(up) {
                up.downstream.remove(&id);
            }
        }
    }

    /// Resolve the referenced names of `id` against its owner and add edges
    /// to every match. Unresolved names are skipped.
    pub fn link_value(&mut self, id: ValueId) {
        let Some(value) = self.value(id) else {
            return;
        };
        if !value.is_linkable() {
            return;
        }
        let Some(owner) = value.owner else {
            return;
        };

        let mut resolved: Links = value
            .referenced_names
            .iter()
            .filter_map(|name| self.resolve(owner, name, *name == value.key))
            .collect();
        if let Some(Formula::Item { source, .. }) = &value.formula {
            resolved.push(*source);
        }
        resolved.retain(|up| *up != id);
        resolved.sort_unstable();
        resolved.dedup();

        for &up in &resolved {
            if let Some(up) = self.value_mut(up) {
                up.downstream.insert(id);
            }
        }
        let Some(value) = self.value_mut(id) else {
            return;
        };
        value.upstream.extend(resolved.iter().copied());
        if value.last_link != resolved {
            debug!(key = %value.key, upstream = resolved.len(), "dependencies changed");
            value.last_link = resolved;
            value.dirty = true;
            self.mark_downstream_dirty(id);
        }
    }

    /// Current result of `id`, evaluating it first when stale.
    pub fn get_value(&mut self, id: ValueId) -> EvalResult<JsValue> {
        self.evaluate(id)
    }

    /// Store `result` as the literal result of `id`.
    ///
    /// A computed value loses its formula for good. Its upstream edges stay
    /// until the next unlink.
    pub fn set_value(&mut self, id: ValueId, result: JsValue) {
        let Some(value) = self.value_mut(id) else {
            return;
        };
        if value.formula.take().is_some() {
            debug!(key = %value.key, "value detached from its formula");
        }
        value.dirty = false;
        value.result = result;
        value.synced = true;
        self.sync(id);
        self.mark_downstream_dirty(id);
    }

    pub(crate) fn evaluate(&mut self, id: ValueId) -> EvalResult<JsValue> {
        let Some(value) = self.value_mut(id) else {
            return Ok(JsValue::Undefined);
        };
        // A value read while it is being evaluated yields its cached result.
        if !value.dirty || value.evaluating || value.passive {
            return Ok(value.result.clone());
        }
        let Some(formula) = value.formula.clone() else {
            value.dirty = false;
            return Ok(value.result.clone());
        };
        let this = value.owner.map_or(JsValue::Undefined, JsValue::Scope);
        value.evaluating = true;
        value.dirty = false;

        let result = match formula {
            Formula::Script(func) => call_function(self, &func, this, Vec::new()),
            Formula::Item { source, index } => self
                .evaluate(source)
                .map(|items| item_at(&items, index)),
        };

        let Some(value) = self.value_mut(id) else {
            return result;
        };
        value.evaluating = false;
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                value.dirty = true;
                return Err(err);
            }
        };
        // Assigned while evaluating: the assignment wins.
        if value.formula.is_none() {
            return Ok(value.result.clone());
        }
        self.store(id, result.clone());
        Ok(result)
    }

    /// Evaluate `id` even when it is not marked dirty.
    pub(crate) fn force(&mut self, id: ValueId) -> EvalResult<()> {
        if let Some(value) = self.value_mut(id) {
            if value.is_linkable() {
                value.dirty = true;
            }
        }
        self.evaluate(id).map(drop)
    }

    fn store(&mut self, id: ValueId, result: JsValue) {
        let Some(value) = self.value_mut(id) else {
            return;
        };
        let changed = !value.result.same_value_zero(&result);
        if !changed && value.synced {
            return;
        }
        value.result = result;
        value.synced = true;
        self.sync(id);
        if changed {
            self.mark_downstream_dirty(id);
        }
    }

    fn mark_downstream_dirty(&mut self, id: ValueId) {
        let mut stack: Vec<ValueId> = match self.value(id) {
            Some(value) => value.downstream.iter().copied().collect(),
            None => return,
        };
        let mut seen = FxHashSet::default();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            if let Some(value) = self.value_mut(next) {
                if value.formula.is_some() {
                    value.dirty = true;
                }
                stack.extend(value.downstream.iter().copied());
            }
        }
    }

    /// Write the result of `id` to its DOM target.
    pub(crate) fn sync(&mut self, id: ValueId) {
        let Some(value) = self.value(id) else {
            return;
        };
        let (Some(target), Some(owner)) = (value.sync.as_ref(), value.owner) else {
            return;
        };
        let Some(scope) = self.scope(owner) else {
            return;
        };
        let text = (!value.result.is_nullish()).then(|| value.result.to_string());

        match target {
            SyncTarget::Attribute(name) => {
                let (element, name) = (scope.element, name.clone());
                match text {
                    Some(text) => self.document.set_attr(element, &name, text),
                    None => self.document.remove_attr(element, &name),
                }
            }
            SyncTarget::Text(index) => {
                if let Some(node) = scope.text_node(*index) {
                    self.document.set_text(node, text.unwrap_or_default());
                }
            }
        }
    }

    /// Value `name` resolves to for linking: named values of `scope` and its
    /// ancestors nearest first, then globals. `skip_own` starts at the parent.
    pub(crate) fn resolve(&self, scope: ScopeId, name: &str, skip_own: bool) -> Option<ValueId> {
        let mut current = if skip_own {
            self.scope(scope).and_then(Scope::parent)
        } else {
            Some(scope)
        };
        while let Some(id) = current {
            let Some(s) = self.scope(id) else {
                break;
            };
            if let Some(value) = s.named_value(name) {
                return Some(value);
            }
            current = s.parent;
        }
        self.globals.get(name).copied()
    }

    /// Property read on a scope accessor.
    pub(crate) fn scope_get(&mut self, scope: ScopeId, name: &str) -> EvalResult<JsValue> {
        let Some(s) = self.scope(scope) else {
            return Ok(JsValue::Undefined);
        };
        match name {
            OUTER_PROPERTY => return Ok(s.parent.map_or(JsValue::Undefined, JsValue::Scope)),
            REFRESH_PROPERTY => return Ok(JsValue::native(Native::Refresh(scope))),
            _ => {}
        }
        if let Some(value) = s.value(name) {
            return self.evaluate(value);
        }

        let mut current = Some(scope);
        while let Some(id) = current {
            let Some(s) = self.scope(id) else {
                break;
            };
            if let Some(value) = s.named_value(name) {
                return self.evaluate(value);
            }
            if let Some(child) = self.named_child(s, name) {
                return Ok(JsValue::Scope(child));
            }
            current = s.parent;
        }
        match self.globals.get(name) {
            Some(&value) => self.evaluate(value),
            None => Ok(JsValue::Undefined),
        }
    }

    /// Property write on a scope accessor.
    pub(crate) fn scope_set(&mut self, scope: ScopeId, name: &str, result: JsValue) -> EvalResult<()> {
        let Some(s) = self.scope(scope) else {
            return Err(EvalError::Type(format!(
                "cannot set `{name}` on a disposed scope"
            )));
        };
        if name == OUTER_PROPERTY || name == REFRESH_PROPERTY {
            return Err(EvalError::Type(format!("`{name}` is read-only")));
        }
        let target = s.value(name).or_else(|| self.resolve(scope, name, false));
        match target {
            Some(id) => self.set_value(id, result),
            None => {
                debug!(name, "declaring value on first assignment");
                let mut value = Value::literal(name, Some(scope), result);
                value.synced = true;
                let id = self.alloc_value(value);
                if let Some(s) = self.scope_mut(scope) {
                    s.values.insert(name.to_string(), id);
                }
            }
        }
        Ok(())
    }

    fn named_child(&self, scope: &Scope, name: &str) -> Option<ScopeId> {
        scope
            .children
            .iter()
            .copied()
            .find(|&child| self.scope(child).and_then(Scope::name) == Some(name))
    }
}

/// Element of a list source; `None` picks the last element. A non-array
/// source passes through whole.
fn item_at(items: &JsValue, index: Option<usize>) -> JsValue {
    match items {
        JsValue::Array(items) => {
            let items = items.borrow();
            let index = match index {
                Some(index) => Some(index),
                None => items.len().checked_sub(1),
            };
            index
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default()
        }
        other if index.is_none() => other.clone(),
        _ => JsValue::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_at() {
        let list = JsValue::array(vec![1.into(), 2.into(), 3.into()]);
        assert_eq!(item_at(&list, Some(0)).to_string(), "1");
        assert_eq!(item_at(&list, None).to_string(), "3");
        assert!(matches!(item_at(&list, Some(7)), JsValue::Undefined));
        assert!(matches!(
            item_at(&JsValue::array(Vec::new()), None),
            JsValue::Undefined
        ));
        assert_eq!(item_at(&JsValue::from("x"), None).to_string(), "x");
        assert!(matches!(item_at(&JsValue::from("x"), Some(0)), JsValue::Undefined));
    }
}
