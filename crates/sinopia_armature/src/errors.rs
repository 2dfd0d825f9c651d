//! HTML parse diagnostics.

use thiserror::Error;

/// Kinds of recoverable HTML parse problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorCode {
    #[error("unexpected end of input inside a tag")]
    EofInTag,
    #[error("unexpected end of input inside a comment")]
    EofInComment,
    #[error("missing end tag name")]
    MissingEndTagName,
    #[error("element is missing its end tag")]
    MissingEndTag,
    #[error("end tag does not match any open element")]
    InvalidEndTag,
}

/// One HTML parse problem with its 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {code}")]
pub struct ParseError {
    pub code: ErrorCode,
    pub line: u32,
}
