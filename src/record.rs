//! Field resolution and value coercion over dynamic records.
//!
//! A record is any [`serde_json::Value`]. Paths use dots between segments
//! and may index lists either with brackets (`serbatoi[0].volume`) or with a
//! numeric segment (`serbatoi.0.volume`). Resolution never fails: a path that
//! walks through a missing, null or non-indexable value resolves to `None`,
//! the absent sentinel, which is distinct from a resolved `null`.

use std::borrow::Cow;

use serde_json::Value;

/// The nested data object supplied to a render invocation.
pub type Record = Value;

/// Resolve a dotted path against a value.
///
/// Returns `None` when any step is missing or cannot be indexed. A final
/// `null` is returned as `Some(Value::Null)`. The pseudo-key `length` yields
/// the length of a list or string when no such key exists.
pub fn resolve<'a>(value: &'a Value, path: &str) -> Option<Cow<'a, Value>> {
    let mut current = Cow::Borrowed(value);
    for segment in path.split('.') {
        current = step(current, segment)?;
    }
    Some(current)
}

/// Resolve a sequence of already-split path segments.
pub fn resolve_segments<'a, S: AsRef<str>>(
    value: &'a Value,
    segments: &[S],
) -> Option<Cow<'a, Value>> {
    let mut current = Cow::Borrowed(value);
    for segment in segments {
        current = step(current, segment.as_ref())?;
    }
    Some(current)
}

fn step<'a>(value: Cow<'a, Value>, segment: &str) -> Option<Cow<'a, Value>> {
    if let Some((name, index)) = split_indexed(segment) {
        let list = lookup(value, name)?;
        return lookup_index(list, index);
    }
    lookup(value, segment)
}

fn lookup<'a>(value: Cow<'a, Value>, key: &str) -> Option<Cow<'a, Value>> {
    match value {
        Cow::Borrowed(v) => lookup_ref(v, key),
        Cow::Owned(v) => lookup_ref(&v, key).map(|found| Cow::Owned(found.into_owned())),
    }
}

fn lookup_ref<'a>(value: &'a Value, key: &str) -> Option<Cow<'a, Value>> {
    match value {
        Value::Object(map) => map.get(key).map(Cow::Borrowed),
        Value::Array(items) => {
            if key == "length" {
                return Some(Cow::Owned(Value::from(items.len())));
            }
            key.parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .map(Cow::Borrowed)
        }
        Value::String(s) if key == "length" => {
            Some(Cow::Owned(Value::from(s.encode_utf16().count())))
        }
        _ => None,
    }
}

fn lookup_index(value: Cow<'_, Value>, index: usize) -> Option<Cow<'_, Value>> {
    match value {
        Cow::Borrowed(Value::Array(items)) => items.get(index).map(Cow::Borrowed),
        Cow::Owned(Value::Array(mut items)) if index < items.len() => {
            Some(Cow::Owned(items.swap_remove(index)))
        }
        _ => None,
    }
}

/// Split `name[3]` into `("name", 3)`.
fn split_indexed(segment: &str) -> Option<(&str, usize)> {
    let inner = segment.strip_suffix(']')?;
    let open = inner.find('[')?;
    let (name, index) = (&inner[..open], &inner[open + 1..]);
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    index.parse().ok().map(|i| (name, i))
}

/// Numeric coercion with script-language semantics.
///
/// Absent and objects become NaN, null and the empty string become 0,
/// booleans become 0/1, strings are parsed after trimming.
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_number(s),
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => parse_number(&to_display_string(Some(single))),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => {
            let lower = trimmed.to_ascii_lowercase();
            if lower.contains("inf") || lower.contains("nan") {
                return f64::NAN;
            }
            trimmed.parse::<f64>().unwrap_or(f64::NAN)
        }
    }
}

/// Build a JSON value from a float.
///
/// Integral values are stored as integers so they print without a fraction.
/// Non-finite values have no JSON representation and are stored as the
/// strings `NaN`, `Infinity` and `-Infinity`.
pub fn number(n: f64) -> Value {
    if !n.is_finite() {
        return Value::String(format_number(n));
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Format a float the way a script runtime prints it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// String coercion with script-language semantics.
///
/// Absent becomes `undefined`, lists are joined with commas and maps print
/// as `[object Object]`.
pub fn to_display_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => format_number(n.as_f64().unwrap_or(f64::NAN)),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_display_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

/// Text emitted for a placeholder: absent and null print nothing.
pub fn to_output_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        other => to_display_string(other),
    }
}

/// Script-language truthiness.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty() && s != "NaN",
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Truthiness used by template blocks: like [`is_truthy`] but an empty list is falsy.
pub fn is_block_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Array(items)) => !items.is_empty(),
        other => is_truthy(other),
    }
}

/// Emptiness: absent, null, the empty string, or the empty list.
pub fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

/// Type-sensitive equality.
///
/// Numbers compare by value regardless of integer/float storage, so `1`
/// equals `1.0` but never `"1"`. NaN is unequal to everything.
pub fn strict_equals(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(Value::Null), Some(Value::Null)) => true,
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a == b,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(Value::String(a)), Some(Value::String(b))) => a == b,
        (Some(Value::Array(a)), Some(Value::Array(b))) => {
            a.len() == b.len()
                && a
                    .iter()
                    .zip(b)
                    .all(|(x, y)| strict_equals(Some(x), Some(y)))
        }
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| strict_equals(Some(v), b.get(k)))
        }
        _ => false,
    }
}
