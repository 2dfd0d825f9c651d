//! Static descriptor tree.
//!
//! Produced once by the compiler and consumed by the runtime when it builds
//! Scopes and Values. The JSON form is camelCase and omits empty fields.

use serde::{Deserialize, Serialize};

/// Static description of one reactive cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueDescriptor {
    /// Declared key (see [`crate::keys`] for the conventions).
    pub key: String,
    /// Initial literal result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<serde_json::Value>,
    /// JavaScript source of the evaluator function expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<String>,
    /// Passive cells hold a function and never take part in dependency tracking.
    #[serde(default, skip_serializing_if = "is_false")]
    pub passive: bool,
    /// Also written to the element attribute of the same (hyphenated) name.
    #[serde(default, skip_serializing_if = "is_false")]
    pub reflect: bool,
    /// Free identifiers read by the evaluator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_names: Vec<String>,
}

impl ValueDescriptor {
    /// A literal cell.
    pub fn literal(key: impl Into<String>, literal: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            literal: Some(literal),
            ..Default::default()
        }
    }

    /// A computed cell.
    pub fn computed(
        key: impl Into<String>,
        evaluator: impl Into<String>,
        referenced_names: Vec<String>,
    ) -> Self {
        Self {
            key: key.into(),
            evaluator: Some(evaluator.into()),
            referenced_names,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_computed(&self) -> bool {
        self.evaluator.is_some()
    }
}

/// Static description of one structural template location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDescriptor {
    /// Structural position, unique within the template.
    pub id: String,
    /// Name under which the parent's accessor exposes this scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Simple selector locating the element inside the parent element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_selector: Option<String>,
    /// Markup materialized and appended to the parent element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_markup: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ValueDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ScopeDescriptor>,
}

impl ScopeDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Find a value descriptor by key.
    pub fn value(&self, key: &str) -> Option<&ValueDescriptor> {
        self.values.iter().find(|v| v.key == key)
    }

    /// Depth-first search for a descendant (or self) by id.
    pub fn find(&self, id: &str) -> Option<&ScopeDescriptor> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let mut scope = ScopeDescriptor::new("0");
        scope
            .values
            .push(ValueDescriptor::literal("x", serde_json::json!("1")));
        scope.values.push(ValueDescriptor::computed(
            "attr_v",
            "function () { return (this.x); }",
            vec!["x".into()],
        ));
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "0",
                "values": [
                    { "key": "x", "literal": "1" },
                    {
                        "key": "attr_v",
                        "evaluator": "function () { return (this.x); }",
                        "referencedNames": ["x"]
                    }
                ]
            })
        );
        let back: ScopeDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, scope);
    }

    #[test]
    fn test_find() {
        let mut root = ScopeDescriptor::new("0");
        let mut child = ScopeDescriptor::new("1");
        child.children.push(ScopeDescriptor::new("2"));
        root.children.push(child);
        assert_eq!(root.find("2").map(|s| s.id.as_str()), Some("2"));
        assert!(root.find("9").is_none());
    }
}
