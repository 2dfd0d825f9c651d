//! Reactive cells.
//!
//! A [`Value`] caches one result and keeps mutual dependency edges:
//! `b ∈ a.upstream` exactly when `a ∈ b.downstream`. The operations that
//! touch more than one cell (link, evaluate, set) live on the page, which
//! owns every cell in one arena.

use sinopia_carton::{FxHashSet, SmallVec};

use crate::scope::ScopeId;
use crate::value::JsValue;

/// Upstream set of one link pass; most formulas read a handful of names.
pub(crate) type Links = SmallVec<[ValueId; 4]>;

/// Handle to a [`Value`] owned by a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u32);

impl ValueId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a computed cell produces its result.
#[derive(Debug, Clone)]
pub enum Formula {
    /// Instantiated evaluator, called with the owning scope as `this`.
    Script(JsValue),
    /// One element of a list source. `None` reads the last element, or the
    /// source itself when it is not an array.
    Item {
        source: ValueId,
        index: Option<usize>,
    },
}

/// DOM location a cell writes its result to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    /// Attribute of the owning scope's element (hyphenated name).
    Attribute(String),
    /// n-th text location of the owning scope.
    Text(usize),
}

/// One reactive cell.
#[derive(Debug, Clone)]
pub struct Value {
    pub(crate) key: String,
    /// `None` for globals.
    pub(crate) owner: Option<ScopeId>,
    pub(crate) result: JsValue,
    pub(crate) formula: Option<Formula>,
    pub(crate) sync: Option<SyncTarget>,
    pub(crate) referenced_names: Vec<String>,
    pub(crate) passive: bool,
    pub(crate) dirty: bool,
    pub(crate) evaluating: bool,
    /// Whether the result has been written to the sync target yet.
    pub(crate) synced: bool,
    pub(crate) upstream: FxHashSet<ValueId>,
    pub(crate) downstream: FxHashSet<ValueId>,
    /// Upstream set resolved by the previous link, sorted.
    pub(crate) last_link: Links,
}

impl Value {
    pub(crate) fn literal(key: impl Into<String>, owner: Option<ScopeId>, result: JsValue) -> Self {
        Self {
            key: key.into(),
            owner,
            result,
            formula: None,
            sync: None,
            referenced_names: Vec::new(),
            passive: false,
            dirty: false,
            evaluating: false,
            synced: false,
            upstream: FxHashSet::default(),
            downstream: FxHashSet::default(),
            last_link: Links::new(),
        }
    }

    pub(crate) fn computed(
        key: impl Into<String>,
        owner: ScopeId,
        formula: Formula,
        referenced_names: Vec<String>,
    ) -> Self {
        Self {
            formula: Some(formula),
            referenced_names,
            dirty: true,
            ..Self::literal(key, Some(owner), JsValue::Undefined)
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn owner(&self) -> Option<ScopeId> {
        self.owner
    }

    /// Cached result, possibly stale.
    #[inline]
    pub fn cached(&self) -> &JsValue {
        &self.result
    }

    #[inline]
    pub fn is_computed(&self) -> bool {
        self.formula.is_some()
    }

    #[inline]
    pub fn is_passive(&self) -> bool {
        self.passive
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn sync_target(&self) -> Option<&SyncTarget> {
        self.sync.as_ref()
    }

    pub fn referenced_names(&self) -> &[String] {
        &self.referenced_names
    }

    pub fn upstream(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.upstream.iter().copied()
    }

    pub fn downstream(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.downstream.iter().copied()
    }

    /// Whether the cell takes part in dependency tracking.
    #[inline]
    pub(crate) fn is_linkable(&self) -> bool {
        !self.passive && self.formula.is_some()
    }
}
