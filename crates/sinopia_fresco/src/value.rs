//! JavaScript values as seen by evaluators.
//!
//! Arrays and objects have reference identity (`Rc<RefCell<…>>`), so two
//! reads of the same cell compare strictly equal until the cell is
//! reassigned.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::scope::ScopeId;
use crate::script::{Closure, Native};

/// Property map of a plain object, in insertion order.
pub type Properties = IndexMap<String, JsValue>;

/// A JavaScript value.
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<JsValue>>>),
    Object(Rc<RefCell<Properties>>),
    /// A function defined by evaluator code.
    Function(Rc<Closure>),
    /// A builtin function.
    Native(Rc<Native>),
    /// The accessor of a Scope.
    Scope(ScopeId),
}

impl JsValue {
    pub fn string(s: impl AsRef<str>) -> Self {
        Self::String(Rc::from(s.as_ref()))
    }

    pub fn array(items: Vec<JsValue>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(props: Properties) -> Self {
        Self::Object(Rc::new(RefCell::new(props)))
    }

    pub(crate) fn native(native: Native) -> Self {
        Self::Native(Rc::new(native))
    }

    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_) | Self::Native(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) | Self::Native(_) => "function",
            Self::Null | Self::Array(_) | Self::Object(_) | Self::Scope(_) => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Array(_) => string_to_number(&self.to_string()),
            _ => f64::NAN,
        }
    }

    /// ToInt32, used by the bitwise operators.
    pub fn to_int32(&self) -> i32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        (n.trunc() as i64) as i32
    }

    /// `===`
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => Rc::ptr_eq(a, b),
            (Self::Scope(a), Self::Scope(b)) => a == b,
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Self::Number(_), Self::String(_)) | (Self::String(_), Self::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Self::Bool(_), _) => JsValue::Number(self.to_number()).loose_equals(other),
            (_, Self::Bool(_)) => self.loose_equals(&JsValue::Number(other.to_number())),
            (Self::Array(_), Self::String(_) | Self::Number(_)) => {
                JsValue::string(self.to_string()).loose_equals(other)
            }
            (Self::String(_) | Self::Number(_), Self::Array(_)) => {
                self.loose_equals(&JsValue::string(other.to_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// SameValueZero, used by `includes`.
    pub fn same_value_zero(&self, other: &JsValue) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::string(s),
            serde_json::Value::Array(items) => {
                Self::array(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON the way `JSON.stringify` sees the value.
    ///
    /// Returns `None` for values `JSON.stringify` skips (undefined and
    /// functions). Non-finite numbers become `null`.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;
        Some(match self {
            Self::Undefined | Self::Function(_) | Self::Native(_) => return None,
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    Json::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number)
                }
            }
            Self::String(s) => Json::String(s.to_string()),
            Self::Array(items) => Json::Array(
                items
                    .borrow()
                    .iter()
                    .map(|item| item.to_json().unwrap_or(Json::Null))
                    .collect(),
            ),
            Self::Object(props) => Json::Object(
                props
                    .borrow()
                    .iter()
                    .filter_map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect(),
            ),
            Self::Scope(_) => Json::Object(serde_json::Map::new()),
        })
    }
}

/// ToNumber applied to a string.
pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    let lower = s.to_ascii_lowercase();
    if lower.contains("inf") || lower.contains("nan") {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// Number::toString with radix 10.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

/// String conversion, as `String(value)`.
impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&number_to_string(*n)),
            Self::String(s) => f.write_str(s),
            Self::Array(items) => {
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Self::Object(_) | Self::Scope(_) => f.write_str("[object Object]"),
            Self::Function(closure) => write!(
                f,
                "function {}() {{ [code] }}",
                closure.name().unwrap_or_default()
            ),
            Self::Native(native) => write!(f, "function {}() {{ [native code] }}", native.name()),
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Self::Object(props) => f.debug_map().entries(props.borrow().iter()).finish(),
            Self::Scope(id) => write!(f, "Scope({})", id.index()),
            other => write!(f, "{other}"),
        }
    }
}

impl From<bool> for JsValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for JsValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for JsValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for JsValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for JsValue {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}

impl From<serde_json::Value> for JsValue {
    fn from(value: serde_json::Value) -> Self {
        Self::from_json(&value)
    }
}

impl From<Vec<JsValue>> for JsValue {
    fn from(value: Vec<JsValue>) -> Self {
        Self::array(value)
    }
}
