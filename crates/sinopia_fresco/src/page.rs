//! The page: root driver of one scope tree.
//!
//! A [`Page`] owns the document, every [`Scope`] and [`Value`] (in arenas
//! addressed by [`ScopeId`] and [`ValueId`]), the global values built from
//! an [`Environment`], and the runtime-id registry used by event dispatch.
//!
//! ```
//! use sinopia_armature::parse;
//! use sinopia_atelier::{compile_template, CompilerOptions};
//! use sinopia_fresco::{Environment, Page};
//!
//! let compiled = compile_template(r#"<div :v=[[x]] :x="1"></div>"#, &CompilerOptions::default());
//! let (doc, _) = parse(&compiled.markup);
//! let mut page = Page::new(doc, &compiled.root, Environment::default()).unwrap();
//! page.refresh();
//! assert_eq!(page.to_html(), r#"<div data-sn="0" v="1"></div>"#);
//! ```

use std::rc::Rc;

use sinopia_armature::{to_html, Document, NodeId};
use sinopia_carton::FxHashMap;
use sinopia_relief::keys::MARKER_ATTR;
use sinopia_relief::ScopeDescriptor;
use tracing::{debug, warn};

use crate::build::Origin;
use crate::cell::{Value, ValueId};
use crate::environment::Environment;
use crate::error::{EvalResult, PageError};
use crate::scope::{Scope, ScopeId};
use crate::script::ast::FunctionDef;
use crate::script::{globals, Host};
use crate::value::JsValue;

/// One of the three refresh walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Unlink,
    Link,
    Update,
}

/// Root driver of a scope tree bound to a document.
pub struct Page {
    pub(crate) document: Document,
    pub(crate) scopes: Vec<Option<Scope>>,
    pub(crate) values: Vec<Option<Value>>,
    pub(crate) globals: FxHashMap<String, ValueId>,
    /// Runtime id to live scope.
    pub(crate) registry: FxHashMap<String, ScopeId>,
    /// Compiled evaluators by source text.
    pub(crate) functions: FxHashMap<String, Rc<FunctionDef>>,
    pub(crate) last_error: Option<PageError>,
    root: ScopeId,
    depth: u32,
    refresh_count: u64,
}

impl Page {
    /// Build the scope tree for `root` over `document`.
    ///
    /// The root element is the element carrying the root marker, or the
    /// document element when no marker is present.
    pub fn new(
        document: Document,
        root: &ScopeDescriptor,
        environment: Environment,
    ) -> Result<Self, PageError> {
        let mut page = Self {
            document,
            scopes: Vec::new(),
            values: Vec::new(),
            globals: FxHashMap::default(),
            registry: FxHashMap::default(),
            functions: FxHashMap::default(),
            last_error: None,
            root: ScopeId::new(0),
            depth: 0,
            refresh_count: 0,
        };
        page.install_globals(environment);

        let element = page
            .root_element(&root.id)
            .ok_or_else(|| PageError::MissingElement(root.id.clone()))?;
        page.root = page.build_scope(Rc::new(root.clone()), None, element, Origin::Root)?;
        debug!(
            scopes = page.scopes.len(),
            values = page.values.len(),
            "page built"
        );
        Ok(page)
    }

    fn install_globals(&mut self, environment: Environment) {
        let builtins = globals()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value));
        let configured = environment
            .globals
            .iter()
            .map(|(name, json)| (name.clone(), JsValue::from_json(json)));
        for (name, result) in builtins.chain(configured) {
            let id = self.alloc_value(Value::literal(name.as_str(), None, result));
            self.globals.insert(name, id);
        }
    }

    fn root_element(&self, id: &str) -> Option<NodeId> {
        self.document
            .descendants(self.document.root())
            .into_iter()
            .find(|&n| self.document.attr(n, MARKER_ATTR) == Some(id))
            .or_else(|| self.document.document_element())
    }

    #[inline]
    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Serialize the current document.
    pub fn to_html(&self) -> String {
        to_html(&self.document)
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id.index()).and_then(Option::as_ref)
    }

    /// Every live value, globals included.
    pub fn iter_values(&self) -> impl Iterator<Item = (ValueId, &Value)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (ValueId::new(i), v)))
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.scopes.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub(crate) fn value_mut(&mut self, id: ValueId) -> Option<&mut Value> {
        self.values.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub(crate) fn alloc_value(&mut self, value: Value) -> ValueId {
        let id = ValueId::new(self.values.len());
        self.values.push(Some(value));
        id
    }

    /// Live scope by runtime id.
    pub fn find_scope(&self, runtime_id: &str) -> Option<ScopeId> {
        self.registry.get(runtime_id).copied()
    }

    /// Global value bound to `name`.
    pub fn global(&self, name: &str) -> Option<ValueId> {
        self.globals.get(name).copied()
    }

    /// Number of top-level refreshes that ran all three walks.
    #[inline]
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    /// Whether a refresh is in progress.
    #[inline]
    pub fn is_refreshing(&self) -> bool {
        self.depth > 0
    }

    /// Last error swallowed by a refresh or an event listener.
    pub fn last_error(&self) -> Option<&PageError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<PageError> {
        self.last_error.take()
    }

    /// Named get/set on a scope, the same view evaluators get as `this`.
    pub fn accessor(&mut self, scope: ScopeId) -> Accessor<'_> {
        Accessor { page: self, scope }
    }

    /// Refresh the whole tree.
    pub fn refresh(&mut self) {
        let root = self.root;
        self.refresh_from(root);
    }

    /// Run the unlink, link and update walks over the subtree of `scope`.
    ///
    /// Errors abort the remaining walks and are swallowed: they are logged and
    /// kept as [`Page::last_error`]. Nested calls run their own three walks to
    /// completion; only an outermost call that completes bumps the refresh
    /// counter.
    pub fn refresh_from(&mut self, scope: ScopeId) {
        self.depth += 1;
        let result = self.run_walks(scope);
        self.depth -= 1;

        let completed = result.is_ok();
        if let Err(err) = result {
            warn!(scope = ?scope, depth = self.depth, "refresh aborted: {err}");
            self.last_error = Some(err);
        }
        if self.depth == 0 && completed {
            self.refresh_count += 1;
        }
    }

    fn run_walks(&mut self, scope: ScopeId) -> Result<(), PageError> {
        if self.scope(scope).is_none() {
            return Err(PageError::UnknownScope);
        }
        for phase in [Phase::Unlink, Phase::Link, Phase::Update] {
            self.walk(scope, phase)?;
            for clone in self.clones_of(scope) {
                self.walk(clone, phase)?;
            }
        }
        Ok(())
    }

    /// Depth-first walk; clones follow their template.
    pub(crate) fn walk(&mut self, scope: ScopeId, phase: Phase) -> Result<(), PageError> {
        if self.scope(scope).is_none() {
            return Ok(());
        }
        self.apply(scope, phase)?;
        for child in self.children_of(scope) {
            self.walk(child, phase)?;
            for clone in self.clones_of(child) {
                self.walk(clone, phase)?;
            }
        }
        Ok(())
    }

    fn apply(&mut self, scope: ScopeId, phase: Phase) -> Result<(), PageError> {
        match phase {
            Phase::Unlink => self.unlink_values(scope),
            Phase::Link => self.link_values(scope),
            Phase::Update => self.update_values(scope)?,
        }
        Ok(())
    }

    /// Unlink every value owned by `scope`.
    pub fn unlink_values(&mut self, scope: ScopeId) {
        for id in self.values_of(scope) {
            self.unlink_value(id);
        }
    }

    /// Link every value owned by `scope`.
    pub fn link_values(&mut self, scope: ScopeId) {
        for id in self.values_of(scope) {
            self.link_value(id);
        }
    }

    /// Evaluate every value owned by `scope`, reconciling clones of a list
    /// template after its source.
    pub fn update_values(&mut self, scope: ScopeId) -> Result<(), PageError> {
        let Some(s) = self.scope(scope) else {
            return Ok(());
        };
        let source = s.source;
        let values: Vec<ValueId> = s.values.values().copied().collect();

        if let Some(source) = source {
            self.force(source)?;
            self.reconcile(scope)?;
        }
        for id in values {
            self.force(id)?;
        }
        Ok(())
    }

    fn values_of(&self, scope: ScopeId) -> Vec<ValueId> {
        self.scope(scope).map(Scope::all_values).unwrap_or_default()
    }

    pub(crate) fn children_of(&self, scope: ScopeId) -> Vec<ScopeId> {
        self.scope(scope)
            .map(|s| s.children.clone())
            .unwrap_or_default()
    }

    pub(crate) fn clones_of(&self, scope: ScopeId) -> Vec<ScopeId> {
        self.scope(scope).map(|s| s.clones.clone()).unwrap_or_default()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("root", &self.root)
            .field("scopes", &self.scopes.iter().flatten().count())
            .field("values", &self.values.iter().flatten().count())
            .field("refresh_count", &self.refresh_count)
            .finish_non_exhaustive()
    }
}

impl Host for Page {
    fn get_property(&mut self, scope: ScopeId, name: &str) -> EvalResult<JsValue> {
        self.scope_get(scope, name)
    }

    fn set_property(&mut self, scope: ScopeId, name: &str, value: JsValue) -> EvalResult<()> {
        self.scope_set(scope, name, value)
    }

    fn refresh(&mut self, scope: ScopeId) {
        self.refresh_from(scope);
    }
}

/// Named view of one scope.
pub struct Accessor<'p> {
    page: &'p mut Page,
    scope: ScopeId,
}

impl Accessor<'_> {
    #[inline]
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Read `name`, evaluating the resolved value when stale.
    pub fn get(&mut self, name: &str) -> EvalResult<JsValue> {
        self.page.scope_get(self.scope, name)
    }

    /// Write `name`; an unresolved name becomes a new value of this scope.
    pub fn set(&mut self, name: &str, value: impl Into<JsValue>) -> EvalResult<()> {
        self.page.scope_set(self.scope, name, value.into())
    }
}
