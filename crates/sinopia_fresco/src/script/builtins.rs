//! Builtin functions and methods available to evaluators.

use std::cmp::Ordering;

use tracing::{error, info, warn};

use super::interp::{checked_length, Host, Interpreter};
use crate::error::{EvalError, EvalResult};
use crate::scope::ScopeId;
use crate::value::{number_to_string, JsValue, Properties};

/// A function implemented by the runtime.
#[derive(Debug)]
pub enum Native {
    /// Stringify-if-not-null helper used by preprocessed templates.
    NotNull,
    /// Free function, by its global path (`"Math.max"`).
    Global(&'static str),
    /// Method with its receiver bound.
    Method(JsValue, &'static str),
    /// `$refresh` of a scope accessor.
    Refresh(ScopeId),
}

impl Native {
    pub fn name(&self) -> &str {
        match self {
            Self::NotNull => "__nn",
            Self::Global(path) => path.rsplit('.').next().unwrap_or(path),
            Self::Method(_, name) => name,
            Self::Refresh(_) => "$refresh",
        }
    }
}

const ARRAY_METHODS: &[&str] = &[
    "at", "concat", "every", "filter", "find", "findIndex", "flat", "forEach", "includes",
    "indexOf", "join", "lastIndexOf", "map", "pop", "push", "reduce", "reverse", "shift", "slice",
    "some", "sort", "splice", "toString", "unshift",
];

const STRING_METHODS: &[&str] = &[
    "at", "charAt", "concat", "endsWith", "includes", "indexOf", "padEnd", "padStart", "repeat",
    "replace", "replaceAll", "slice", "split", "startsWith", "substring", "toLowerCase",
    "toString", "toUpperCase", "trim", "trimEnd", "trimStart",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toString"];

/// Bound method `key` of a primitive or array, or `undefined`.
pub(crate) fn method(receiver: &JsValue, key: &str) -> JsValue {
    let table = match receiver {
        JsValue::Array(_) => ARRAY_METHODS,
        JsValue::String(_) => STRING_METHODS,
        JsValue::Number(_) => NUMBER_METHODS,
        _ => return JsValue::Undefined,
    };
    match table.iter().find(|m| **m == key) {
        Some(name) => JsValue::native(Native::Method(receiver.clone(), *name)),
        None => JsValue::Undefined,
    }
}

/// Enumerable own keys, as `Object.keys` and `for…in` see them.
pub(crate) fn own_keys(value: &JsValue) -> Vec<String> {
    match value {
        JsValue::Object(props) => props.borrow().keys().cloned().collect(),
        JsValue::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
        JsValue::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn global(path: &'static str) -> JsValue {
    JsValue::native(Native::Global(path))
}

fn namespace(members: &[(&'static str, JsValue)]) -> JsValue {
    let mut props = Properties::new();
    for (name, value) in members {
        props.insert((*name).to_string(), value.clone());
    }
    JsValue::object(props)
}

/// Global bindings installed on every page.
pub fn globals() -> Vec<(&'static str, JsValue)> {
    let math = namespace(&[
        ("PI", JsValue::Number(std::f64::consts::PI)),
        ("E", JsValue::Number(std::f64::consts::E)),
        ("abs", global("Math.abs")),
        ("ceil", global("Math.ceil")),
        ("floor", global("Math.floor")),
        ("max", global("Math.max")),
        ("min", global("Math.min")),
        ("pow", global("Math.pow")),
        ("round", global("Math.round")),
        ("sign", global("Math.sign")),
        ("sqrt", global("Math.sqrt")),
        ("trunc", global("Math.trunc")),
    ]);
    let json = namespace(&[
        ("parse", global("JSON.parse")),
        ("stringify", global("JSON.stringify")),
    ]);
    let console = namespace(&[
        ("log", global("console.log")),
        ("info", global("console.log")),
        ("warn", global("console.warn")),
        ("error", global("console.error")),
    ]);
    let object = namespace(&[
        ("assign", global("Object.assign")),
        ("entries", global("Object.entries")),
        ("keys", global("Object.keys")),
        ("values", global("Object.values")),
    ]);
    let array = namespace(&[
        ("from", global("Array.from")),
        ("isArray", global("Array.isArray")),
    ]);

    vec![
        ("undefined", JsValue::Undefined),
        ("NaN", JsValue::Number(f64::NAN)),
        ("Infinity", JsValue::Number(f64::INFINITY)),
        ("Math", math),
        ("JSON", json),
        ("console", console),
        ("Object", object),
        ("Array", array),
        ("String", global("String")),
        ("Number", global("Number")),
        ("Boolean", global("Boolean")),
        ("parseInt", global("parseInt")),
        ("parseFloat", global("parseFloat")),
        ("isNaN", global("isNaN")),
        ("isFinite", global("isFinite")),
    ]
}

fn arg(args: &[JsValue], i: usize) -> JsValue {
    args.get(i).cloned().unwrap_or_default()
}

/// Resolve a relative index (negative counts from the end) against `len`.
fn relative(value: &JsValue, len: usize, default: usize) -> usize {
    if matches!(value, JsValue::Undefined) {
        return default;
    }
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

fn thrown(name: &str, message: impl Into<String>) -> EvalError {
    let mut props = Properties::new();
    props.insert("name".to_string(), JsValue::from(name));
    props.insert("message".to_string(), JsValue::from(message.into()));
    EvalError::Thrown(JsValue::object(props))
}

fn parse_float(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    end = digits(end);
    if bytes.get(end) == Some(&b'.') {
        end = digits(end + 1);
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_int(s: &str, radix: Option<u32>) -> f64 {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, s) = match radix {
        Some(16) | None if s.starts_with("0x") || s.starts_with("0X") => (16, &s[2..]),
        Some(radix) if (2..=36).contains(&radix) => (radix, s),
        Some(_) => return f64::NAN,
        None => (10, s),
    };
    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    if negative {
        -value
    } else {
        value
    }
}

pub(crate) fn call_native<H: Host + ?Sized>(
    interp: &mut Interpreter<'_, H>,
    native: &Native,
    args: Vec<JsValue>,
) -> EvalResult<JsValue> {
    match native {
        Native::NotNull => {
            let value = arg(&args, 0);
            Ok(if value.is_nullish() {
                JsValue::from("")
            } else {
                JsValue::from(value.to_string())
            })
        }
        Native::Refresh(scope) => {
            interp.host.refresh(*scope);
            Ok(JsValue::Undefined)
        }
        Native::Global(path) => call_global(interp, path, args),
        Native::Method(receiver, name) => match receiver {
            JsValue::Array(_) => array_method(interp, receiver, name, args),
            JsValue::String(s) => string_method(s, name, &args),
            JsValue::Number(n) => number_method(*n, name, &args),
            other => Err(EvalError::Type(format!("{other:?}.{name} is not a function"))),
        },
    }
}

fn call_global<H: Host + ?Sized>(
    interp: &mut Interpreter<'_, H>,
    path: &str,
    args: Vec<JsValue>,
) -> EvalResult<JsValue> {
    let num = |i: usize| arg(&args, i).to_number();
    Ok(match path {
        "String" => JsValue::from(match args.first() {
            Some(value) => value.to_string(),
            None => String::new(),
        }),
        "Number" => JsValue::Number(args.first().map_or(0.0, JsValue::to_number)),
        "Boolean" => JsValue::Bool(arg(&args, 0).truthy()),
        "parseFloat" => JsValue::Number(parse_float(&arg(&args, 0).to_string())),
        "parseInt" => {
            let radix = match arg(&args, 1) {
                JsValue::Undefined => None,
                r => Some(r.to_number() as u32),
            };
            JsValue::Number(parse_int(&arg(&args, 0).to_string(), radix))
        }
        "isNaN" => JsValue::Bool(num(0).is_nan()),
        "isFinite" => JsValue::Bool(num(0).is_finite()),
        "Math.abs" => JsValue::Number(num(0).abs()),
        "Math.ceil" => JsValue::Number(num(0).ceil()),
        "Math.floor" => JsValue::Number(num(0).floor()),
        "Math.round" => JsValue::Number((num(0) + 0.5).floor()),
        "Math.sign" => {
            let n = num(0);
            JsValue::Number(if n == 0.0 || n.is_nan() { n } else { n.signum() })
        }
        "Math.sqrt" => JsValue::Number(num(0).sqrt()),
        "Math.trunc" => JsValue::Number(num(0).trunc()),
        "Math.pow" => JsValue::Number(num(0).powf(num(1))),
        "Math.max" => JsValue::Number(args.iter().map(JsValue::to_number).fold(
            f64::NEG_INFINITY,
            |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) },
        )),
        "Math.min" => JsValue::Number(args.iter().map(JsValue::to_number).fold(
            f64::INFINITY,
            |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) },
        )),
        "JSON.stringify" => {
            let Some(json) = arg(&args, 0).to_json() else {
                return Ok(JsValue::Undefined);
            };
            let text = if arg(&args, 2).truthy() {
                serde_json::to_string_pretty(&json)
            } else {
                serde_json::to_string(&json)
            };
            JsValue::from(text.map_err(|e| EvalError::Type(e.to_string()))?)
        }
        "JSON.parse" => {
            let text = arg(&args, 0).to_string();
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| thrown("SyntaxError", e.to_string()))?;
            JsValue::from_json(&json)
        }
        "console.log" | "console.warn" | "console.error" => {
            let line = args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            match path {
                "console.warn" => warn!(target: "sinopia::console", "{line}"),
                "console.error" => error!(target: "sinopia::console", "{line}"),
                _ => info!(target: "sinopia::console", "{line}"),
            }
            JsValue::Undefined
        }
        "Object.keys" => JsValue::array(
            own_keys(&arg(&args, 0))
                .into_iter()
                .map(JsValue::from)
                .collect(),
        ),
        "Object.values" | "Object.entries" => {
            let object = arg(&args, 0);
            let mut out = Vec::new();
            for key in own_keys(&object) {
                let value = interp.get_member(&object, &key)?;
                out.push(if path == "Object.values" {
                    value
                } else {
                    JsValue::array(vec![JsValue::from(key), value])
                });
            }
            JsValue::array(out)
        }
        "Object.assign" => {
            let target = arg(&args, 0);
            for source in args.iter().skip(1) {
                for key in own_keys(source) {
                    let value = interp.get_member(source, &key)?;
                    interp.set_member(&target, &key, value)?;
                }
            }
            target
        }
        "Array.isArray" => JsValue::Bool(matches!(arg(&args, 0), JsValue::Array(_))),
        "Array.from" => {
            let source = arg(&args, 0);
            let items = match &source {
                JsValue::Array(_) | JsValue::String(_) => interp.iterate(&source)?,
                JsValue::Object(_) => {
                    let len = interp.get_member(&source, "length")?.to_number();
                    let len = if len.is_finite() && len > 0.0 {
                        checked_length(len.trunc(), "array length")?
                    } else {
                        0
                    };
                    (0..len)
                        .map(|i| interp.get_member(&source, &i.to_string()))
                        .collect::<EvalResult<Vec<_>>>()?
                }
                _ => Vec::new(),
            };
            let mapper = arg(&args, 1);
            if mapper.is_callable() {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(interp.call(&mapper, JsValue::Undefined, vec![item, JsValue::from(i as f64)])?);
                }
                JsValue::array(out)
            } else {
                JsValue::array(items)
            }
        }
        other => return Err(EvalError::Type(format!("{other} is not a function"))),
    })
}

/// Call `callback(item, index, array)` for each element until `stop` says so.
fn each<H: Host + ?Sized>(
    interp: &mut Interpreter<'_, H>,
    receiver: &JsValue,
    callback: &JsValue,
    mut visit: impl FnMut(usize, &JsValue, JsValue) -> bool,
) -> EvalResult<()> {
    if !callback.is_callable() {
        return Err(EvalError::Type(format!("{callback:?} is not a function")));
    }
    let items = interp.iterate(receiver)?;
    for (i, item) in items.into_iter().enumerate() {
        let result = interp.call(
            callback,
            JsValue::Undefined,
            vec![item.clone(), JsValue::from(i as f64), receiver.clone()],
        )?;
        if !visit(i, &item, result) {
            break;
        }
    }
    Ok(())
}

fn array_method<H: Host + ?Sized>(
    interp: &mut Interpreter<'_, H>,
    receiver: &JsValue,
    name: &str,
    args: Vec<JsValue>,
) -> EvalResult<JsValue> {
    let JsValue::Array(cell) = receiver else {
        return Ok(JsValue::Undefined);
    };
    let len = cell.borrow().len();
    let callback = arg(&args, 0);

    Ok(match name {
        "push" => {
            let mut items = cell.borrow_mut();
            items.extend(args);
            JsValue::Number(items.len() as f64)
        }
        "pop" => cell.borrow_mut().pop().unwrap_or_default(),
        "shift" => {
            let mut items = cell.borrow_mut();
            if items.is_empty() {
                JsValue::Undefined
            } else {
                items.remove(0)
            }
        }
        "unshift" => {
            let mut items = cell.borrow_mut();
            let tail = std::mem::take(&mut *items);
            items.extend(args);
            items.extend(tail);
            JsValue::Number(items.len() as f64)
        }
        "splice" => {
            let start = relative(&arg(&args, 0), len, 0);
            let count = match args.get(1) {
                None => len - start,
                Some(n) => (n.to_number().max(0.0) as usize).min(len - start),
            };
            let inserted = args.into_iter().skip(2);
            let removed: Vec<JsValue> = cell
                .borrow_mut()
                .splice(start..start + count, inserted)
                .collect();
            JsValue::array(removed)
        }
        "reverse" => {
            cell.borrow_mut().reverse();
            receiver.clone()
        }
        "sort" => {
            let mut items = cell.borrow().clone();
            // insertion sort; the comparator may fail or be inconsistent
            for i in 1..items.len() {
                let mut j = i;
                while j > 0 {
                    let ordering = if callback.is_callable() {
                        let n = interp
                            .call(
                                &callback,
                                JsValue::Undefined,
                                vec![items[j - 1].clone(), items[j].clone()],
                            )?
                            .to_number();
                        if n > 0.0 {
                            Ordering::Greater
                        } else {
                            Ordering::Less
                        }
                    } else {
                        match (&items[j - 1], &items[j]) {
                            (JsValue::Undefined, _) => Ordering::Greater,
                            (_, JsValue::Undefined) => Ordering::Less,
                            (a, b) => a.to_string().cmp(&b.to_string()),
                        }
                    };
                    if ordering != Ordering::Greater {
                        break;
                    }
                    items.swap(j - 1, j);
                    j -= 1;
                }
            }
            *cell.borrow_mut() = items;
            receiver.clone()
        }
        "slice" => {
            let start = relative(&arg(&args, 0), len, 0);
            let end = relative(&arg(&args, 1), len, len);
            let items = cell.borrow();
            JsValue::array(items.get(start..end.max(start)).unwrap_or_default().to_vec())
        }
        "concat" => {
            let mut out = cell.borrow().clone();
            for value in args {
                match value {
                    JsValue::Array(other) => out.extend(other.borrow().iter().cloned()),
                    other => out.push(other),
                }
            }
            JsValue::array(out)
        }
        "flat" => {
            let mut out = Vec::with_capacity(len);
            for value in cell.borrow().iter() {
                match value {
                    JsValue::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            JsValue::array(out)
        }
        "join" | "toString" => {
            let separator = match arg(&args, 0) {
                JsValue::Undefined => ",".to_string(),
                sep if name == "join" => sep.to_string(),
                _ => ",".to_string(),
            };
            let items = cell.borrow();
            let parts: Vec<String> = items
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_string() })
                .collect();
            JsValue::from(parts.join(&separator))
        }
        "at" => {
            let n = arg(&args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            if index < 0.0 {
                JsValue::Undefined
            } else {
                cell.borrow().get(index as usize).cloned().unwrap_or_default()
            }
        }
        "indexOf" | "lastIndexOf" | "includes" => {
            let needle = arg(&args, 0);
            let items = cell.borrow();
            let found = if name == "lastIndexOf" {
                items.iter().rposition(|v| v.strict_equals(&needle))
            } else if name == "includes" {
                items.iter().position(|v| v.same_value_zero(&needle))
            } else {
                items.iter().position(|v| v.strict_equals(&needle))
            };
            if name == "includes" {
                JsValue::Bool(found.is_some())
            } else {
                JsValue::Number(found.map_or(-1.0, |i| i as f64))
            }
        }
        "map" => {
            let mut out = Vec::with_capacity(len);
            each(interp, receiver, &callback, |_, _, result| {
                out.push(result);
                true
            })?;
            JsValue::array(out)
        }
        "filter" => {
            let mut out = Vec::new();
            each(interp, receiver, &callback, |_, item, result| {
                if result.truthy() {
                    out.push(item.clone());
                }
                true
            })?;
            JsValue::array(out)
        }
        "forEach" => {
            each(interp, receiver, &callback, |_, _, _| true)?;
            JsValue::Undefined
        }
        "find" | "findIndex" => {
            let mut found = None;
            each(interp, receiver, &callback, |i, item, result| {
                if result.truthy() {
                    found = Some((i, item.clone()));
                    false
                } else {
                    true
                }
            })?;
            match (name, found) {
                ("find", Some((_, item))) => item,
                ("find", None) => JsValue::Undefined,
                (_, Some((i, _))) => JsValue::Number(i as f64),
                (_, None) => JsValue::Number(-1.0),
            }
        }
        "some" | "every" => {
            let want = name == "some";
            let mut outcome = !want;
            each(interp, receiver, &callback, |_, _, result| {
                if result.truthy() == want {
                    outcome = want;
                    false
                } else {
                    true
                }
            })?;
            JsValue::Bool(outcome)
        }
        "reduce" => {
            if !callback.is_callable() {
                return Err(EvalError::Type(format!("{callback:?} is not a function")));
            }
            let items = cell.borrow().clone();
            let mut iter = items.into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(EvalError::Type(
                            "Reduce of empty array with no initial value".to_string(),
                        ))
                    }
                },
            };
            for (i, item) in iter {
                acc = interp.call(
                    &callback,
                    JsValue::Undefined,
                    vec![acc, item, JsValue::from(i as f64), receiver.clone()],
                )?;
            }
            acc
        }
        other => return Err(EvalError::Type(format!("{other} is not a function"))),
    })
}

fn char_slice(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// Char index of the first match of `needle` at or after char `from`.
fn char_find(s: &str, needle: &str, from: usize) -> Option<usize> {
    let byte_from = s.char_indices().nth(from).map_or(s.len(), |(b, _)| b);
    s.get(byte_from..)?
        .find(needle)
        .map(|b| s[..byte_from + b].chars().count())
}

fn pad(s: &str, args: &[JsValue], at_start: bool) -> String {
    let target = arg(args, 0).to_number();
    let filler = match arg(args, 1) {
        JsValue::Undefined => " ".to_string(),
        f => f.to_string(),
    };
    let len = s.chars().count();
    if !target.is_finite() || target as usize <= len || filler.is_empty() {
        return s.to_string();
    }
    let padding: String = filler.chars().cycle().take(target as usize - len).collect();
    if at_start {
        padding + s
    } else {
        format!("{s}{padding}")
    }
}

fn string_method(s: &str, name: &str, args: &[JsValue]) -> EvalResult<JsValue> {
    let len = s.chars().count();
    let text = |i: usize| arg(args, i).to_string();
    Ok(match name {
        "toUpperCase" => JsValue::from(s.to_uppercase()),
        "toLowerCase" => JsValue::from(s.to_lowercase()),
        "trim" => JsValue::from(s.trim()),
        "trimStart" => JsValue::from(s.trim_start()),
        "trimEnd" => JsValue::from(s.trim_end()),
        "toString" => JsValue::from(s),
        "includes" => JsValue::Bool(s.contains(text(0).as_str())),
        "startsWith" => JsValue::Bool(s.starts_with(text(0).as_str())),
        "endsWith" => JsValue::Bool(s.ends_with(text(0).as_str())),
        "indexOf" => {
            let from = relative(&arg(args, 1), len, 0);
            JsValue::Number(char_find(s, &text(0), from).map_or(-1.0, |i| i as f64))
        }
        "slice" => {
            let start = relative(&arg(args, 0), len, 0);
            let end = relative(&arg(args, 1), len, len);
            JsValue::from(char_slice(s, start, end))
        }
        "substring" => {
            let clamp = |v: JsValue, default: usize| match v {
                JsValue::Undefined => default,
                v => {
                    let n = v.to_number();
                    if n.is_nan() || n < 0.0 {
                        0
                    } else {
                        (n as usize).min(len)
                    }
                }
            };
            let a = clamp(arg(args, 0), 0);
            let b = clamp(arg(args, 1), len);
            JsValue::from(char_slice(s, a.min(b), a.max(b)))
        }
        "charAt" => {
            let i = arg(args, 0).to_number();
            let i = if i.is_nan() { 0.0 } else { i };
            if i < 0.0 {
                JsValue::from("")
            } else {
                JsValue::from(char_slice(s, i as usize, i as usize + 1))
            }
        }
        "at" => {
            let n = arg(args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            if index < 0.0 || index as usize >= len {
                JsValue::Undefined
            } else {
                JsValue::from(char_slice(s, index as usize, index as usize + 1))
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for value in args {
                out.push_str(&value.to_string());
            }
            JsValue::from(out)
        }
        "repeat" => {
            let n = arg(args, 0).to_number();
            if n < 0.0 || !n.is_finite() {
                return Err(EvalError::Range(format!("Invalid count value: {}", number_to_string(n))));
            }
            checked_length((n.trunc() * s.len() as f64).max(0.0), "string length")?;
            JsValue::from(s.repeat(n as usize))
        }
        "padStart" | "padEnd" => {
            let target = arg(args, 0).to_number();
            if target.is_finite() && target > 0.0 {
                checked_length(target.trunc(), "string length")?;
            }
            JsValue::from(pad(s, args, name == "padStart"))
        }
        "split" => match arg(args, 0) {
            JsValue::Undefined => JsValue::array(vec![JsValue::from(s)]),
            sep => {
                let sep = sep.to_string();
                let parts: Vec<JsValue> = if sep.is_empty() {
                    s.chars().map(|c| JsValue::from(c.to_string())).collect()
                } else {
                    s.split(sep.as_str()).map(JsValue::from).collect()
                };
                JsValue::array(parts)
            }
        },
        "replace" => JsValue::from(s.replacen(text(0).as_str(), &text(1), 1)),
        "replaceAll" => JsValue::from(s.replace(text(0).as_str(), &text(1))),
        other => return Err(EvalError::Type(format!("{other} is not a function"))),
    })
}

fn number_method(n: f64, name: &str, args: &[JsValue]) -> EvalResult<JsValue> {
    Ok(match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0.0 } else { digits };
            if !(0.0..=100.0).contains(&digits) {
                return Err(EvalError::Range(
                    "toFixed() digits argument must be between 0 and 100".to_string(),
                ));
            }
            if !n.is_finite() {
                JsValue::from(number_to_string(n))
            } else {
                JsValue::from(format!("{:.*}", digits as usize, n))
            }
        }
        "toString" => match arg(args, 0) {
            JsValue::Undefined => JsValue::from(number_to_string(n)),
            radix => {
                let radix = radix.to_number() as u32;
                if !(2..=36).contains(&radix) {
                    return Err(EvalError::Range(
                        "toString() radix must be between 2 and 36".to_string(),
                    ));
                }
                if radix == 10 || n.fract() != 0.0 || !n.is_finite() {
                    JsValue::from(number_to_string(n))
                } else {
                    let mut value = n.abs() as u64;
                    let mut digits = Vec::new();
                    loop {
                        let d = (value % u64::from(radix)) as u32;
                        digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
                        value /= u64::from(radix);
                        if value == 0 {
                            break;
                        }
                    }
                    if n < 0.0 {
                        digits.push('-');
                    }
                    JsValue::from(digits.iter().rev().collect::<String>())
                }
            }
        },
        other => return Err(EvalError::Type(format!("{other} is not a function"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float("3.5px"), 3.5);
        assert_eq!(parse_float("  -2e3x"), -2000.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert!(parse_float("px").is_nan());
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42abc", None), 42.0);
        assert_eq!(parse_int("-0x1F", None), -31.0);
        assert_eq!(parse_int("101", Some(2)), 5.0);
        assert!(parse_int("z", None).is_nan());
    }

    #[test]
    fn test_string_methods() {
        let call = |name: &str, args: &[JsValue]| string_method("héllo", name, args).unwrap().to_string();
        assert_eq!(call("toUpperCase", &[]), "HÉLLO");
        assert_eq!(call("slice", &[JsValue::from(-3)]), "llo");
        assert_eq!(call("indexOf", &[JsValue::from("l")]), "2");
        assert_eq!(call("padStart", &[JsValue::from(7), JsValue::from("*")]), "**héllo");
        assert_eq!(call("split", &[JsValue::from("l")]), "hé,,o");
        assert_eq!(call("replace", &[JsValue::from("l"), JsValue::from("L")]), "héLlo");
    }

    #[test]
    fn test_number_methods() {
        assert_eq!(number_method(1.005, "toFixed", &[JsValue::from(1)]).unwrap().to_string(), "1.0");
        assert_eq!(number_method(255.0, "toString", &[JsValue::from(16)]).unwrap().to_string(), "ff");
    }

    #[test]
    fn test_method_lookup() {
        let arr = JsValue::array(vec![]);
        assert!(method(&arr, "map").is_callable());
        assert!(!method(&arr, "nope").is_callable());
        assert!(method(&JsValue::from("x"), "trim").is_callable());
        assert!(!method(&JsValue::Null, "trim").is_callable());
    }
}
