//! Event dispatch.
//!
//! Listeners come from two places: `on_<type>` values declared in the
//! template, and callbacks registered with [`Page::add_event_listener`].
//! Dispatch maps a DOM node to its scope through the marker attribute,
//! bubbles outwards through parent scopes, then refreshes the page.

use sinopia_armature::NodeId;
use sinopia_relief::keys::{self, MARKER_ATTR};
use tracing::warn;

use crate::error::PageError;
use crate::page::Page;
use crate::scope::ScopeId;
use crate::script::call_function;
use crate::value::{JsValue, Properties};

/// Event property that stops bubbling when set truthy by a listener.
const CANCEL_BUBBLE: &str = "cancelBubble";

impl Page {
    /// Register `listener` for `event_type` on `scope`.
    pub fn add_event_listener(
        &mut self,
        scope: ScopeId,
        event_type: &str,
        listener: JsValue,
    ) -> Result<(), PageError> {
        let s = self.scope_mut(scope).ok_or(PageError::UnknownScope)?;
        s.listeners.push((event_type.to_string(), listener));
        Ok(())
    }

    /// Scope owning `node`: the nearest element carrying a live marker.
    pub fn scope_of_node(&self, node: NodeId) -> Option<ScopeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some(scope) = self
                .document
                .attr(n, MARKER_ATTR)
                .and_then(|marker| self.find_scope(marker))
            {
                return Some(scope);
            }
            current = self.document.parent(n);
        }
        None
    }

    /// Deliver an event at `node` and refresh.
    ///
    /// Each listener is called with its scope as `this` and an event object
    /// `{ type, detail, target }`. Listener errors are logged and kept as the
    /// last error without stopping delivery. Returns the number of listeners
    /// called.
    pub fn dispatch_event(
        &mut self,
        node: NodeId,
        event_type: &str,
        detail: JsValue,
    ) -> Result<usize, PageError> {
        let target = self.scope_of_node(node).ok_or(PageError::UnknownScope)?;

        let mut props = Properties::new();
        props.insert("type".to_string(), JsValue::from(event_type));
        props.insert("detail".to_string(), detail);
        props.insert("target".to_string(), JsValue::Scope(target));
        let event = JsValue::object(props);

        let key = keys::event_key(event_type);
        let mut called = 0;
        let mut current = Some(target);
        while let Some(scope) = current {
            let Some(s) = self.scope(scope) else {
                break;
            };
            current = s.parent;

            let declared = s
                .value(&key)
                .and_then(|id| self.value(id))
                .map(|v| v.cached().clone())
                .filter(JsValue::is_callable);
            let registered = s
                .listeners
                .iter()
                .filter(|(t, _)| t == event_type)
                .map(|(_, listener)| listener.clone());
            let listeners: Vec<JsValue> = declared.into_iter().chain(registered).collect();

            for listener in listeners {
                called += 1;
                if let Err(err) =
                    call_function(self, &listener, JsValue::Scope(scope), vec![event.clone()])
                {
                    warn!(event = event_type, scope = ?scope, "listener failed: {err}");
                    self.last_error = Some(err.into());
                }
            }
            if cancelled(&event) {
                break;
            }
        }

        self.refresh();
        Ok(called)
    }
}

fn cancelled(event: &JsValue) -> bool {
    match event {
        JsValue::Object(props) => props
            .borrow()
            .get(CANCEL_BUBBLE)
            .is_some_and(JsValue::truthy),
        _ => false,
    }
}
