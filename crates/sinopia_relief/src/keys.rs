//! Key naming conventions shared by the compiler and the runtime.
//!
//! | key           | meaning                                        |
//! |---------------|------------------------------------------------|
//! | `attr_<name>` | HTML attribute `<name>` (camelCase → hyphen)   |
//! | `text_<n>`    | n-th text placeholder of the scope's markup    |
//! | `on_<event>`  | event listener (passive)                       |
//! | `data`        | list source of a replicable scope              |
//! | anything else | plain named value                              |

use sinopia_carton::{camelize, CompactString};

pub const ATTR_PREFIX: &str = "attr_";
pub const TEXT_PREFIX: &str = "text_";
pub const EVENT_PREFIX: &str = "on_";
pub const DATA_KEY: &str = "data";

/// Accessor property reaching the enclosing scope.
pub const OUTER_PROPERTY: &str = "$outer";
/// Accessor property holding a function that refreshes the scope.
pub const REFRESH_PROPERTY: &str = "$refresh";

/// DOM attribute carrying a scope's structural id.
pub const MARKER_ATTR: &str = "data-sn";
/// Template attribute prefix declaring a value.
pub const VALUE_ATTR_PREFIX: char = ':';
/// Template attribute naming a scope.
pub const AKA_ATTR: &str = ":aka";
/// Template attribute prefix declaring a listener (after the value prefix).
pub const EVENT_ATTR_PREFIX: &str = "on-";

/// Stringify-if-not-null helper emitted by the expression preprocessor.
pub const NOT_NULL_HELPER: &str = "__nn";

const TEXT_MARKER: &str = "t:";
const TEXT_MARKER_CLOSE: &str = "/t:";

/// Classification of a value key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind<'a> {
    /// Attribute value; holds the camelCase attribute name.
    Attribute(&'a str),
    /// Text placeholder index.
    Text(usize),
    /// Event listener; holds the event type.
    Event(&'a str),
    /// List source.
    Data,
    /// Plain named value.
    Plain(&'a str),
}

impl<'a> KeyKind<'a> {
    pub fn of(key: &'a str) -> Self {
        if let Some(name) = key.strip_prefix(ATTR_PREFIX) {
            return Self::Attribute(name);
        }
        if let Some(n) = key.strip_prefix(TEXT_PREFIX) {
            if let Ok(index) = n.parse() {
                return Self::Text(index);
            }
        }
        if let Some(event) = key.strip_prefix(EVENT_PREFIX) {
            return Self::Event(event);
        }
        if key == DATA_KEY {
            return Self::Data;
        }
        Self::Plain(key)
    }

    /// Whether a value with this key is reachable by name from evaluators.
    #[inline]
    pub fn is_named(&self) -> bool {
        matches!(self, Self::Data | Self::Plain(_))
    }
}

/// Key for an attribute value (`data-id` → `attr_dataId`).
pub fn attr_key(attr_name: &str) -> String {
    let mut key = String::from(ATTR_PREFIX);
    key.push_str(&camelize(attr_name));
    key
}

/// Key for the n-th text placeholder.
pub fn text_key(index: usize) -> String {
    format!("{TEXT_PREFIX}{index}")
}

/// Key for an event listener (`on-click` → `on_click`).
pub fn event_key(event: &str) -> String {
    let mut key = String::from(EVENT_PREFIX);
    key.push_str(event);
    key
}

/// Comment text opening the n-th text placeholder.
pub fn text_open_marker(index: usize) -> CompactString {
    let mut s = CompactString::from(TEXT_MARKER);
    s.push_str(&index.to_string());
    s
}

/// Comment text closing the n-th text placeholder.
pub fn text_close_marker(index: usize) -> CompactString {
    let mut s = CompactString::from(TEXT_MARKER_CLOSE);
    s.push_str(&index.to_string());
    s
}

/// Parse a placeholder comment; returns the index and whether it closes.
pub fn parse_text_marker(comment: &str) -> Option<(usize, bool)> {
    if let Some(n) = comment.strip_prefix(TEXT_MARKER_CLOSE) {
        return n.parse().ok().map(|i| (i, true));
    }
    comment
        .strip_prefix(TEXT_MARKER)
        .and_then(|n| n.parse().ok())
        .map(|i| (i, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(KeyKind::of("attr_dataId"), KeyKind::Attribute("dataId"));
        assert_eq!(KeyKind::of("text_3"), KeyKind::Text(3));
        assert_eq!(KeyKind::of("text_x"), KeyKind::Plain("text_x"));
        assert_eq!(KeyKind::of("on_click"), KeyKind::Event("click"));
        assert_eq!(KeyKind::of("data"), KeyKind::Data);
        assert_eq!(KeyKind::of("count"), KeyKind::Plain("count"));
        assert!(KeyKind::of("count").is_named());
        assert!(!KeyKind::of("text_0").is_named());
    }

    #[test]
    fn test_builders() {
        assert_eq!(attr_key("data-id"), "attr_dataId");
        assert_eq!(text_key(2), "text_2");
        assert_eq!(event_key("click"), "on_click");
    }

    #[test]
    fn test_text_markers() {
        assert_eq!(text_open_marker(4), "t:4");
        assert_eq!(text_close_marker(4), "/t:4");
        assert_eq!(parse_text_marker("t:4"), Some((4, false)));
        assert_eq!(parse_text_marker("/t:4"), Some((4, true)));
        assert_eq!(parse_text_marker(" hello "), None);
        assert_eq!(parse_text_marker("t:x"), None);
    }
}
