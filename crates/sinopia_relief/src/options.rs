//! Compiler options.

use serde::{Deserialize, Serialize};

/// Compiler options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Fragment markers (default: `["[[", "]]"]`)
    pub markers: (String, String),
    /// Source name reported in diagnostics
    pub origin: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            markers: (String::from("[["), String::from("]]")),
            origin: String::from("<template>"),
        }
    }
}

impl CompilerOptions {
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn open_marker(&self) -> &str {
        &self.markers.0
    }

    #[inline]
    pub fn close_marker(&self) -> &str {
        &self.markers.1
    }
}
