//! HTML tag tables.
//!
//! Uses compile-time perfect hash sets (phf) for O(1) lookup.

use phf::phf_set;

/// Elements that never have children or a closing tag.
static VOID_TAGS: phf::Set<&'static str> = phf_set! {
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "param", "source", "track", "wbr",
};

/// Elements whose content is raw text (no markup, no entities).
static RAW_TEXT_TAGS: phf::Set<&'static str> = phf_set! {
    "script", "style",
};

/// Check if a tag is a void element.
#[inline]
pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(tag.to_ascii_lowercase().as_str())
}

/// Check if a tag holds raw text.
#[inline]
pub fn is_raw_text_tag(tag: &str) -> bool {
    RAW_TEXT_TAGS.contains(tag.to_ascii_lowercase().as_str())
}

/// Check if a tag is the inert `<template>` container.
#[inline]
pub fn is_template_tag(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("template")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_tables() {
        assert!(is_void_tag("br"));
        assert!(is_void_tag("IMG"));
        assert!(!is_void_tag("div"));
        assert!(is_raw_text_tag("script"));
        assert!(!is_raw_text_tag("p"));
        assert!(is_template_tag("template"));
    }
}
