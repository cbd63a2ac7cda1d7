//! Helper registry and the built-in helper set.
//!
//! A [`HelperRegistry`] maps helper names to pure functions of their
//! evaluated arguments. Registries are plain values: every [`super::Engine`]
//! owns its own, so helpers registered for one render never leak into
//! another.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::record::{self, is_truthy, number, strict_equals, to_display_string, to_number};

/// Sentinel emitted by the `pageBreak` helper and consumed by the markup parser.
pub const PAGE_BREAK: &str = "[PAGE_BREAK]";

/// Error raised by a helper function.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct HelperError(pub String);

impl HelperError {
    /// Create a helper error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Signature shared by all helpers.
pub type HelperFn = dyn Fn(&HelperCall<'_>) -> Result<Value, HelperError> + Send + Sync;

/// Arguments of one helper invocation.
///
/// Absent arguments (unresolved paths, or fewer arguments than the helper
/// declares) are `None`, which lets helpers apply defaults the way optional
/// parameters do.
pub struct HelperCall<'a> {
    name: &'a str,
    args: &'a [Option<Value>],
    registry: &'a HelperRegistry,
}

impl<'a> HelperCall<'a> {
    /// Name the helper was invoked under.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Argument at `index`, `None` when absent.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index).and_then(Option::as_ref)
    }

    /// All arguments as passed.
    pub fn args(&self) -> &[Option<Value>] {
        self.args
    }

    /// Argument coerced to a number.
    pub fn number(&self, index: usize) -> f64 {
        to_number(self.arg(index))
    }

    /// The registry the helper was called from.
    pub fn registry(&self) -> &HelperRegistry {
        self.registry
    }
}

/// Mapping from helper name to function.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    helpers: HashMap<String, Arc<HelperFn>>,
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("helpers", &self.names())
            .finish()
    }
}

impl HelperRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in helper.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }

    /// Register a helper, replacing any helper with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&HelperCall<'_>) -> Result<Value, HelperError> + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Arc::new(helper));
    }

    /// Check whether a helper is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Registered helper names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.helpers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invoke a helper by name. Returns `None` when it is not registered.
    pub fn invoke(
        &self,
        name: &str,
        args: &[Option<Value>],
    ) -> Option<Result<Value, HelperError>> {
        let helper = self.helpers.get(name)?;
        let call = HelperCall {
            name,
            args,
            registry: self,
        };
        Some(helper(&call))
    }
}

/// Outcome of the pressure-equipment classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InspectionRequirement {
    /// Commissioning verification required
    #[serde(rename = "VERIFICA")]
    Verification,
    /// Declaration of commissioning required
    #[serde(rename = "DICHIARAZIONE")]
    Declaration,
    /// Outside the scope of inspection
    #[serde(rename = "ESCLUSO")]
    Excluded,
}

impl InspectionRequirement {
    /// Label written into documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionRequirement::Verification => "VERIFICA",
            InspectionRequirement::Declaration => "DICHIARAZIONE",
            InspectionRequirement::Excluded => "ESCLUSO",
        }
    }
}

impl fmt::Display for InspectionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pressure vessels below this volume (litres) are excluded.
pub const VESSEL_MIN_VOLUME: f64 = 50.0;
/// Pressure vessels above this PS×V product (bar·litres) need verification.
pub const VESSEL_PS_V_LIMIT: f64 = 8000.0;
/// Separators and exchangers below this volume (litres) are excluded.
pub const EXCHANGER_MIN_VOLUME: f64 = 25.0;
/// Separators and exchangers above this pressure (bar) need verification.
pub const EXCHANGER_PS_LIMIT: f64 = 12.0;

/// Classify a piece of equipment by kind (`tipo`), `volume` and `ps_pressione_max`.
///
/// Missing values count as 0. Values that are present but not numeric also
/// count as 0 and are reported with a warning.
pub fn classify_equipment(equipment: Option<&Value>) -> InspectionRequirement {
    let Some(item) = equipment.filter(|v| is_truthy(Some(*v))) else {
        return InspectionRequirement::Excluded;
    };
    let kind = item.get("tipo").and_then(Value::as_str).unwrap_or_default();
    let volume = measurement(item, "volume");
    let ps = measurement(item, "ps_pressione_max");

    match kind {
        "serbatoio" => {
            if volume < VESSEL_MIN_VOLUME {
                InspectionRequirement::Excluded
            } else if ps * volume > VESSEL_PS_V_LIMIT {
                InspectionRequirement::Verification
            } else {
                InspectionRequirement::Declaration
            }
        }
        "disoleatore" | "scambiatore" | "recipiente_filtro" => {
            if volume < EXCHANGER_MIN_VOLUME {
                InspectionRequirement::Excluded
            } else if ps > EXCHANGER_PS_LIMIT {
                InspectionRequirement::Verification
            } else {
                InspectionRequirement::Declaration
            }
        }
        _ => InspectionRequirement::Excluded,
    }
}

fn measurement(item: &Value, key: &str) -> f64 {
    let raw = item.get(key);
    let value = or_zero(raw);
    if value.is_nan() {
        log::warn!(
            "Equipment field '{}' is not numeric ({}), classifying with 0",
            key,
            to_display_string(raw)
        );
        return 0.0;
    }
    value
}

/// `Number(x || 0)`: falsy values become 0 before coercion.
fn or_zero(value: Option<&Value>) -> f64 {
    if is_truthy(value) {
        to_number(value)
    } else {
        0.0
    }
}

/// Fixed-point formatting; exact midpoints round away from zero.
pub fn to_fixed(value: f64, decimals: usize) -> String {
    if !value.is_finite() || value.abs() >= 1e21 {
        return record::format_number(value);
    }
    let abs = value.abs();
    let exact = format!("{:.*}", decimals + 30, abs);
    let (int_part, frac) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let is_tie = frac.as_bytes().get(decimals) == Some(&b'5')
        && frac.as_bytes()[decimals + 1..].iter().all(|b| *b == b'0');

    let digits = if is_tie {
        let kept = if decimals == 0 {
            int_part.to_string()
        } else {
            format!("{}.{}", int_part, &frac[..decimals])
        };
        increment_decimal(&kept)
    } else {
        format!("{:.*}", decimals, abs)
    };

    if value < 0.0 {
        format!("-{}", digits)
    } else {
        digits
    }
}

fn increment_decimal(digits: &str) -> String {
    let mut bytes = digits.as_bytes().to_vec();
    let mut i = bytes.len();
    loop {
        if i == 0 {
            bytes.insert(0, b'1');
            break;
        }
        i -= 1;
        match bytes[i] {
            b'.' => continue,
            b'9' => bytes[i] = b'0',
            d => {
                bytes[i] = d + 1;
                break;
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|d| d.date_naive())
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|d| d.date())
                })
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|d| d.date())
                })
                .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .or_else(|| NaiveDate::parse_from_str(s, "%Y/%m/%d").ok())
        }
        Value::Number(n) => {
            let millis = n.as_f64()?;
            Utc.timestamp_millis_opt(millis as i64)
                .single()
                .map(|d| d.date_naive())
        }
        _ => None,
    }
}

/// Replace the first `dd`, `MM`, `yyyy` and `yy` in `format`, in that order.
pub fn format_date(date: NaiveDate, format: &str) -> String {
    use chrono::Datelike;

    let year = date.year().to_string();
    let short_year = year[year.len().saturating_sub(2)..].to_string();
    format
        .replacen("dd", &format!("{:02}", date.day()), 1)
        .replacen("MM", &format!("{:02}", date.month()), 1)
        .replacen("yyyy", &year, 1)
        .replacen("yy", &short_year, 1)
}

fn relational(call: &HelperCall<'_>, cmp: fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (call.arg(0), call.arg(1)) {
        (Some(Value::String(a)), Some(Value::String(b))) => Some(a.cmp(b)),
        _ => call.number(0).partial_cmp(&call.number(1)),
    };
    Value::Bool(ordering.is_some_and(cmp))
}

fn arithmetic(call: &HelperCall<'_>, op: fn(f64, f64) -> f64) -> Value {
    number(op(call.number(0), call.number(1)))
}

fn property<'v>(item: &'v Value, key: &str) -> Option<&'v Value> {
    item.as_object().and_then(|map| map.get(key))
}

fn matches_property(call: &HelperCall<'_>) -> Option<Vec<bool>> {
    let items = call.arg(0)?.as_array()?;
    let key = to_display_string(call.arg(1));
    Some(
        items
            .iter()
            .map(|item| strict_equals(property(item, &key), call.arg(2)))
            .collect(),
    )
}

/// Apply a two-argument predicate helper to each item's pressure and volume.
fn predicate_results(call: &HelperCall<'_>) -> Result<Option<Vec<Value>>, HelperError> {
    let items = match call.arg(0).and_then(Value::as_array) {
        Some(items) if !items.is_empty() => items,
        _ => return Ok(None),
    };
    let name = to_display_string(call.arg(1));
    if !call.registry().contains(&name) {
        return Ok(None);
    }
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        let args = [
            property(item, "ps_pressione_max").cloned(),
            property(item, "volume").cloned(),
        ];
        if let Some(result) = call.registry().invoke(&name, &args) {
            results.push(result?);
        }
    }
    Ok(Some(results))
}

fn format_address(address: &Value) -> String {
    let field = |key: &str| {
        property(address, key)
            .filter(|v| is_truthy(Some(*v)))
            .map(|v| to_display_string(Some(v)))
    };

    let street: Vec<String> = [
        field("via"),
        field("civico").or_else(|| field("numero_civico")),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut city: Vec<String> = [field("cap"), field("comune").or_else(|| field("citta"))]
        .into_iter()
        .flatten()
        .collect();
    if let Some(province) = field("provincia") {
        city.push(format!("({})", province));
    }

    [street.join(", "), city.join(" ")]
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn register_builtins(r: &mut HelperRegistry) {
    // Comparison
    r.register("eq", |c| Ok(Value::Bool(strict_equals(c.arg(0), c.arg(1)))));
    r.register("ne", |c| Ok(Value::Bool(!strict_equals(c.arg(0), c.arg(1)))));
    r.register("lt", |c| Ok(relational(c, |o| o.is_lt())));
    r.register("lte", |c| Ok(relational(c, |o| o.is_le())));
    r.register("gt", |c| Ok(relational(c, |o| o.is_gt())));
    r.register("gte", |c| Ok(relational(c, |o| o.is_ge())));

    // Logical
    r.register("and", |c| {
        Ok(Value::Bool(c.args().iter().all(|a| is_truthy(a.as_ref()))))
    });
    r.register("or", |c| {
        Ok(Value::Bool(c.args().iter().any(|a| is_truthy(a.as_ref()))))
    });
    r.register("not", |c| Ok(Value::Bool(!is_truthy(c.arg(0)))));

    // Arithmetic
    r.register("add", |c| Ok(arithmetic(c, |a, b| a + b)));
    r.register("subtract", |c| Ok(arithmetic(c, |a, b| a - b)));
    r.register("multiply", |c| Ok(arithmetic(c, |a, b| a * b)));
    r.register("divide", |c| Ok(arithmetic(c, |a, b| a / b)));
    r.register("round", |c| {
        let decimals = match c.arg(1) {
            None => 2.0,
            Some(v) => to_number(Some(v)).trunc(),
        };
        let decimals = if decimals.is_nan() { 0.0 } else { decimals };
        if !(0.0..=100.0).contains(&decimals) {
            return Err(HelperError::new(format!(
                "round: decimals must be between 0 and 100, got {}",
                decimals
            )));
        }
        Ok(Value::String(to_fixed(c.number(0), decimals as usize)))
    });

    // Dates and strings
    r.register("formatDate", |c| {
        let Some(date) = c.arg(0).filter(|v| is_truthy(Some(*v))) else {
            return Ok(Value::String(String::new()));
        };
        let format = match c.arg(1) {
            None | Some(Value::Null) => "dd/MM/yyyy".to_string(),
            other => to_display_string(other),
        };
        Ok(Value::String(
            parse_date(date)
                .map(|d| format_date(d, &format))
                .unwrap_or_default(),
        ))
    });
    r.register("uppercase", |c| Ok(Value::String(text_or_empty(c).to_uppercase())));
    r.register("lowercase", |c| Ok(Value::String(text_or_empty(c).to_lowercase())));
    r.register("capitalize", |c| {
        let text = text_or_empty(c);
        let mut chars = text.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
            None => String::new(),
        };
        Ok(Value::String(capitalized))
    });

    // Arrays
    r.register("length", |c| {
        Ok(Value::from(c.arg(0).and_then(Value::as_array).map_or(0, Vec::len)))
    });
    r.register("first", |c| {
        Ok(c.arg(0)
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .cloned()
            .unwrap_or(Value::Null))
    });
    r.register("last", |c| {
        Ok(c.arg(0)
            .and_then(Value::as_array)
            .and_then(|items| items.last())
            .cloned()
            .unwrap_or(Value::Null))
    });
    r.register("join", |c| {
        let Some(items) = c.arg(0).and_then(Value::as_array) else {
            return Ok(Value::String(String::new()));
        };
        let separator = match c.arg(1) {
            None => ", ".to_string(),
            other => to_display_string(other),
        };
        let joined = items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_display_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(&separator);
        Ok(Value::String(joined))
    });
    r.register("filter", |c| {
        let Some(items) = c.arg(0).and_then(Value::as_array) else {
            return Ok(Value::Array(Vec::new()));
        };
        let key = to_display_string(c.arg(1));
        Ok(Value::Array(
            items
                .iter()
                .filter(|item| strict_equals(property(item, &key), c.arg(2)))
                .cloned()
                .collect(),
        ))
    });
    r.register("some", |c| {
        Ok(Value::Bool(matches_property(c).is_some_and(|m| m.iter().any(|x| *x))))
    });
    r.register("every", |c| {
        Ok(Value::Bool(matches_property(c).is_some_and(|m| m.iter().all(|x| *x))))
    });
    r.register("none", |c| {
        Ok(Value::Bool(matches_property(c).map_or(true, |m| !m.iter().any(|x| *x))))
    });

    // Pressure equipment
    r.register("psXvolume", |c| {
        Ok(number(or_zero(c.arg(0)) * or_zero(c.arg(1))))
    });
    r.register("requiresVerifica", |c| {
        Ok(Value::Bool(or_zero(c.arg(0)) * or_zero(c.arg(1)) > VESSEL_PS_V_LIMIT))
    });
    r.register("requiresVerificaDM329", |c| {
        let (volume, ps) = (or_zero(c.arg(0)), or_zero(c.arg(1)));
        Ok(Value::Bool(volume >= EXCHANGER_MIN_VOLUME && ps > EXCHANGER_PS_LIMIT))
    });
    r.register("tipoVerifica", |c| {
        Ok(Value::String(classify_equipment(c.arg(0)).as_str().to_string()))
    });
    r.register("hasMixed", |c| {
        let mixed = predicate_results(c)?.is_some_and(|results| {
            results.contains(&Value::Bool(true)) && results.contains(&Value::Bool(false))
        });
        Ok(Value::Bool(mixed))
    });
    r.register("allTrue", |c| {
        let all = predicate_results(c)?
            .is_some_and(|results| results.iter().all(|r| *r == Value::Bool(true)));
        Ok(Value::Bool(all))
    });
    r.register("allFalse", |c| {
        let all = predicate_results(c)?
            .is_some_and(|results| results.iter().all(|r| *r == Value::Bool(false)));
        Ok(Value::Bool(all))
    });

    // Formatting and misc
    r.register("formatIndirizzo", |c| {
        Ok(Value::String(
            c.arg(0)
                .filter(|v| is_truthy(Some(*v)))
                .map(format_address)
                .unwrap_or_default(),
        ))
    });
    r.register("default", |c| {
        let value = c.arg(0).filter(|v| !v.is_null() && v.as_str() != Some(""));
        Ok(value.or(c.arg(1)).cloned().unwrap_or(Value::Null))
    });
    r.register("json", |c| match c.arg(0) {
        None => Ok(Value::Null),
        Some(value) => serde_json::to_string_pretty(value)
            .map(Value::String)
            .map_err(|e| HelperError::new(e.to_string())),
    });
    r.register("log", |c| {
        let parts: Vec<String> = c.args().iter().map(|a| to_display_string(a.as_ref())).collect();
        log::debug!("template log: {}", parts.join(" "));
        Ok(Value::String(String::new()))
    });
    r.register("pageBreak", |_| Ok(Value::String(PAGE_BREAK.to_string())));
}

fn text_or_empty(call: &HelperCall<'_>) -> String {
    if is_truthy(call.arg(0)) {
        to_display_string(call.arg(0))
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Vec<Value>) -> Value {
        let registry = HelperRegistry::with_builtins();
        let args: Vec<Option<Value>> = args.into_iter().map(Some).collect();
        registry.invoke(name, &args).unwrap().unwrap()
    }

    #[test]
    fn test_ps_x_volume() {
        assert_eq!(call("psXvolume", vec![json!(13), json!(500)]), json!(6500));
        assert_eq!(call("psXvolume", vec![Value::Null, json!(500)]), json!(0));
        assert_eq!(call("psXvolume", vec![json!("10"), json!("2.5")]), json!(25));
    }

    #[test]
    fn test_round() {
        assert_eq!(call("round", vec![json!(12.345), json!(1)]), json!("12.3"));
        assert_eq!(call("round", vec![json!(2.5), json!(0)]), json!("3"));
        assert_eq!(call("round", vec![json!(1.005), json!(2)]), json!("1.00"));
        assert_eq!(call("round", vec![json!(0.125), json!(2)]), json!("0.13"));
        assert_eq!(call("round", vec![json!(-2.5), json!(0)]), json!("-3"));
        assert_eq!(call("round", vec![json!(9.995), json!(2)]), json!("9.99"));
        assert_eq!(call("round", vec![json!(99.5), json!(0)]), json!("100"));
        assert_eq!(call("round", vec![json!(7)]), json!("7.00"));
        assert_eq!(call("round", vec![json!("abc"), json!(1)]), json!("NaN"));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(call("gt", vec![json!("10"), json!(9)]), json!(true));
        assert_eq!(call("lt", vec![json!("b"), json!("a")]), json!(false));
        assert_eq!(call("gte", vec![json!(25), json!(25)]), json!(true));
        assert_eq!(call("eq", vec![json!(1), json!("1")]), json!(false));
        assert_eq!(call("ne", vec![json!(1), json!("1")]), json!(true));
        assert_eq!(call("gt", vec![json!("abc"), json!(0)]), json!(false));
    }

    #[test]
    fn test_logical() {
        assert_eq!(call("and", vec![json!(true), json!(1), json!("x")]), json!(true));
        assert_eq!(call("and", vec![json!(true), json!(0)]), json!(false));
        assert_eq!(call("or", vec![json!(false), json!("")]), json!(false));
        assert_eq!(call("not", vec![json!([])]), json!(false));
    }

    #[test]
    fn test_vessel_boundary() {
        // 50 l at 160 bar is exactly 8000: declaration, not verification
        let vessel = json!({"tipo": "serbatoio", "volume": 50, "ps_pressione_max": 160});
        assert_eq!(classify_equipment(Some(&vessel)), InspectionRequirement::Declaration);
        assert_eq!(call("requiresVerifica", vec![json!(160), json!(50)]), json!(false));

        let vessel = json!({"tipo": "serbatoio", "volume": 50, "ps_pressione_max": 161});
        assert_eq!(classify_equipment(Some(&vessel)), InspectionRequirement::Verification);

        let small = json!({"tipo": "serbatoio", "volume": 49.9, "ps_pressione_max": 1000});
        assert_eq!(classify_equipment(Some(&small)), InspectionRequirement::Excluded);
    }

    #[test]
    fn test_exchanger_boundary() {
        for tipo in ["disoleatore", "scambiatore", "recipiente_filtro"] {
            let item = json!({"tipo": tipo, "volume": 24, "ps_pressione_max": 300});
            assert_eq!(classify_equipment(Some(&item)), InspectionRequirement::Excluded);

            let item = json!({"tipo": tipo, "volume": 25, "ps_pressione_max": 13});
            assert_eq!(classify_equipment(Some(&item)), InspectionRequirement::Verification);

            let item = json!({"tipo": tipo, "volume": 25, "ps_pressione_max": 12});
            assert_eq!(classify_equipment(Some(&item)), InspectionRequirement::Declaration);
        }
        assert_eq!(call("requiresVerificaDM329", vec![json!(25), json!(12.5)]), json!(true));
        assert_eq!(call("requiresVerificaDM329", vec![json!(24), json!(100)]), json!(false));
    }

    #[test]
    fn test_classifier_other_kinds_and_bad_data() {
        let compressor = json!({"tipo": "compressore", "volume": 500, "ps_pressione_max": 13});
        assert_eq!(classify_equipment(Some(&compressor)), InspectionRequirement::Excluded);
        assert_eq!(classify_equipment(None), InspectionRequirement::Excluded);

        let missing = json!({"tipo": "serbatoio", "ps_pressione_max": 13});
        assert_eq!(classify_equipment(Some(&missing)), InspectionRequirement::Excluded);

        let garbage = json!({"tipo": "serbatoio", "volume": "n.d.", "ps_pressione_max": 13});
        assert_eq!(classify_equipment(Some(&garbage)), InspectionRequirement::Excluded);

        assert_eq!(
            call("tipoVerifica", vec![json!({"tipo": "serbatoio", "volume": 500, "ps_pressione_max": 20})]),
            json!("VERIFICA")
        );
    }

    #[test]
    fn test_array_helpers() {
        let items = json!([
            {"tipo": "serbatoio", "marca": "A"},
            {"tipo": "disoleatore", "marca": "B"},
            {"tipo": "serbatoio", "marca": "C"}
        ]);
        assert_eq!(call("length", vec![items.clone()]), json!(3));
        assert_eq!(call("length", vec![json!("abc")]), json!(0));
        assert_eq!(call("first", vec![items.clone()])["marca"], json!("A"));
        assert_eq!(call("last", vec![json!([])]), Value::Null);
        assert_eq!(call("join", vec![json!(["a", "b", null])]), json!("a, b, "));
        assert_eq!(call("join", vec![json!([1, 2]), json!(" / ")]), json!("1 / 2"));

        let filtered = call("filter", vec![items.clone(), json!("tipo"), json!("serbatoio")]);
        assert_eq!(filtered.as_array().map(Vec::len), Some(2));
        assert_eq!(call("some", vec![items.clone(), json!("marca"), json!("B")]), json!(true));
        assert_eq!(call("every", vec![items.clone(), json!("tipo"), json!("serbatoio")]), json!(false));
        assert_eq!(call("none", vec![json!(null), json!("tipo"), json!("x")]), json!(true));
        assert_eq!(call("every", vec![json!("x"), json!("tipo"), json!("x")]), json!(false));
    }

    #[test]
    fn test_mixed_predicates() {
        let vessels = json!([
            {"ps_pressione_max": 13, "volume": 500},
            {"ps_pressione_max": 10, "volume": 100}
        ]);
        assert_eq!(call("hasMixed", vec![vessels.clone(), json!("requiresVerifica")]), json!(true));
        assert_eq!(call("allTrue", vec![vessels.clone(), json!("requiresVerifica")]), json!(false));
        assert_eq!(call("allFalse", vec![json!([]), json!("requiresVerifica")]), json!(false));
        assert_eq!(call("hasMixed", vec![vessels, json!("noSuchHelper")]), json!(false));
    }

    #[test]
    fn test_format_date() {
        assert_eq!(call("formatDate", vec![json!("2024-03-05")]), json!("05/03/2024"));
        assert_eq!(
            call("formatDate", vec![json!("2024-03-05T10:00:00Z"), json!("yyyy-MM-dd")]),
            json!("2024-03-05")
        );
        assert_eq!(call("formatDate", vec![json!("2024-03-05"), json!("dd.MM.yy")]), json!("05.03.24"));
        assert_eq!(call("formatDate", vec![json!("not a date")]), json!(""));
        assert_eq!(call("formatDate", vec![json!("")]), json!(""));
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(call("uppercase", vec![json!("dm 329")]), json!("DM 329"));
        assert_eq!(call("uppercase", vec![Value::Null]), json!(""));
        assert_eq!(call("capitalize", vec![json!("rOSSI")]), json!("Rossi"));
        assert_eq!(call("lowercase", vec![json!(0)]), json!(""));
    }

    #[test]
    fn test_format_address() {
        let address = json!({
            "via": "Via Roma", "numero_civico": "12", "cap": "20100",
            "comune": "Milano", "citta": "Milan", "provincia": "MI"
        });
        assert_eq!(
            call("formatIndirizzo", vec![address]),
            json!("Via Roma, 12\n20100 Milano (MI)")
        );
        let legacy = json!({"citta": "Torino"});
        assert_eq!(call("formatIndirizzo", vec![legacy]), json!("Torino"));
        assert_eq!(call("formatIndirizzo", vec![json!({})]), json!(""));
    }

    #[test]
    fn test_default_and_page_break() {
        assert_eq!(call("default", vec![json!(""), json!("n.d.")]), json!("n.d."));
        assert_eq!(call("default", vec![json!(0), json!("n.d.")]), json!(0));
        assert_eq!(call("pageBreak", vec![]), json!(PAGE_BREAK));
        assert_eq!(call("json", vec![json!({"a": 1})]), json!("{\n  \"a\": 1\n}"));
    }

    #[test]
    fn test_registries_are_independent() {
        let mut first = HelperRegistry::with_builtins();
        let second = HelperRegistry::with_builtins();
        first.register("firma", |_| Ok(json!("Ing. Bianchi")));
        assert!(first.contains("firma"));
        assert!(!second.contains("firma"));
    }
}
