//! Runtime scope tree nodes.
//!
//! Scopes live in the page's arena and refer to each other by [`ScopeId`].
//! A child never owns its parent; the parent id is only used for name
//! resolution and DOM placement.

use std::rc::Rc;

use indexmap::IndexMap;
use sinopia_armature::NodeId;
use sinopia_relief::{KeyKind, ScopeDescriptor};

use crate::cell::ValueId;
use crate::value::JsValue;

/// Handle to a [`Scope`] owned by a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    #[inline]
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One structural template location.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Runtime id, also written to the element's marker attribute.
    pub(crate) id: String,
    pub(crate) descriptor: Rc<ScopeDescriptor>,
    pub(crate) parent: Option<ScopeId>,
    pub(crate) element: NodeId,
    /// Text node per placeholder index.
    pub(crate) texts: Vec<Option<NodeId>>,
    /// Values by declared key, in declaration order.
    pub(crate) values: IndexMap<String, ValueId>,
    /// Hidden list source of a replicable scope.
    pub(crate) source: Option<ValueId>,
    pub(crate) children: Vec<ScopeId>,
    pub(crate) clones: Vec<ScopeId>,
    /// Template and index for clones.
    pub(crate) clone_of: Option<(ScopeId, usize)>,
    /// Prefix shared by every scope built inside the same clone.
    pub(crate) prefix: Option<String>,
    /// Untouched copy of the element, taken before construction.
    pub(crate) pristine: Option<NodeId>,
    pub(crate) listeners: Vec<(String, JsValue)>,
    /// Whether the element was hidden for an empty list.
    pub(crate) hidden: bool,
}

impl Scope {
    /// Runtime id (`"3"`, `"3.0"`, `"3.0/5"`).
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn descriptor(&self) -> &ScopeDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> Option<&str> {
        self.descriptor.name.as_deref()
    }

    #[inline]
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    #[inline]
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// Bound text node of the n-th placeholder.
    pub fn text_node(&self, index: usize) -> Option<NodeId> {
        self.texts.get(index).copied().flatten()
    }

    pub fn text_count(&self) -> usize {
        self.texts.len()
    }

    /// Value declared under `key`.
    pub fn value(&self, key: &str) -> Option<ValueId> {
        self.values.get(key).copied()
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, ValueId)> + '_ {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn source(&self) -> Option<ValueId> {
        self.source
    }

    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    pub fn clones(&self) -> &[ScopeId] {
        &self.clones
    }

    /// Template this scope was cloned from.
    pub fn template(&self) -> Option<ScopeId> {
        self.clone_of.map(|(template, _)| template)
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Value reachable by `name` from evaluators.
    pub(crate) fn named_value(&self, name: &str) -> Option<ValueId> {
        if !KeyKind::of(name).is_named() {
            return None;
        }
        self.values.get(name).copied()
    }

    /// Every owned value, the hidden source first.
    pub(crate) fn all_values(&self) -> Vec<ValueId> {
        self.source
            .into_iter()
            .chain(self.values.values().copied())
            .collect()
    }
}

/// Descriptor id encoded in a runtime id (`"3.0/5.1"` → `"5"`).
pub fn descriptor_id(runtime_id: &str) -> &str {
    let last = runtime_id.rsplit('/').next().unwrap_or(runtime_id);
    last.split('.').next().unwrap_or(last)
}

/// Whether a runtime id names a clone.
pub fn is_clone_id(runtime_id: &str) -> bool {
    runtime_id
        .rsplit('/')
        .next()
        .is_some_and(|last| last.contains('.'))
}
