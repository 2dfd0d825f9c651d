//! Global bindings injected into a page.

use serde::{Deserialize, Serialize};

/// Names visible to every evaluator after scope lookup fails.
///
/// Each entry becomes a literal global value when the page is built and is
/// dropped with the page. Entries shadow the JavaScript builtins of the same
/// name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub globals: serde_json::Map<String, serde_json::Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.globals.insert(name.into(), value);
        self
    }
}
