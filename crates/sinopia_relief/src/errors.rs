//! Compiler diagnostics.
//!
//! Diagnostics are collected, never thrown: one broken fragment does not stop
//! the rest of the template from compiling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Error,
    Warn,
}

/// One compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{origin}:{line}: {message}")]
pub struct CompilerError {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub message: String,
    /// Source name the diagnostic refers to.
    pub origin: String,
    /// 1-based line.
    pub line: u32,
}

impl CompilerError {
    pub fn error(message: impl Into<String>, origin: impl Into<String>, line: u32) -> Self {
        Self {
            error_type: ErrorType::Error,
            message: message.into(),
            origin: origin.into(),
            line,
        }
    }

    pub fn warn(message: impl Into<String>, origin: impl Into<String>, line: u32) -> Self {
        Self {
            error_type: ErrorType::Warn,
            message: message.into(),
            origin: origin.into(),
            line,
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.error_type == ErrorType::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_json() {
        let err = CompilerError::error("Unexpected token", "page.html", 3);
        assert_eq!(err.to_string(), "page.html:3: Unexpected token");
        assert!(err.is_error());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["line"], 3);
        assert!(!CompilerError::warn("w", "x", 1).is_error());
    }
}
