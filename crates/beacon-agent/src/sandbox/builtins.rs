//! Pure helper functions available to programs.
//!
//! `call`, `parallel` and `error` need the interpreter and live there.

use serde_json::Value;

/// Apply a pure built-in to already-evaluated arguments.
pub(crate) fn apply(name: &str, args: Vec<Value>) -> Result<Value, String> {
    match name {
        "len" => {
            let [value] = exactly::<1>(name, args)?;
            let n = match &value {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(fields) => fields.len(),
                other => {
                    return Err(format!(
                        "len() expects a string, array or object, got {}",
                        kind(other)
                    ));
                }
            };
            Ok(Value::from(n))
        }
        "word_count" => {
            let [value] = exactly::<1>(name, args)?;
            let text = value
                .as_str()
                .ok_or_else(|| format!("word_count() expects a string, got {}", kind(&value)))?;
            Ok(Value::from(text.split_whitespace().count()))
        }
        "sum" => {
            let numbers = numbers(name, args)?;
            number(numbers.iter().sum())
        }
        "min" | "max" => {
            let numbers = numbers(name, args)?;
            let pick = if name == "min" { f64::min } else { f64::max };
            match numbers.into_iter().reduce(pick) {
                Some(n) => number(n),
                None => Ok(Value::Null),
            }
        }
        "round" => {
            let (value, digits) = match args.len() {
                1 | 2 => {
                    let mut args = args.into_iter();
                    let value = args.next().unwrap_or(Value::Null);
                    let digits = args.next().map(|d| d.as_i64().unwrap_or(0)).unwrap_or(0);
                    (value, digits)
                }
                n => return Err(format!("round() takes 1 or 2 arguments, got {}", n)),
            };
            let n = value
                .as_f64()
                .ok_or_else(|| format!("round() expects a number, got {}", kind(&value)))?;
            let factor = 10f64.powi(digits.clamp(0, 12) as i32);
            number((n * factor).round() / factor)
        }
        "str" => {
            let [value] = exactly::<1>(name, args)?;
            Ok(Value::String(to_text(&value)))
        }
        "pluck" => {
            let [items, field] = exactly::<2>(name, args)?;
            let field = field
                .as_str()
                .ok_or_else(|| "pluck() expects a field name string".to_string())?;
            let items = array(name, items)?;
            Ok(Value::Array(
                items
                    .into_iter()
                    .map(|item| item.get(field).cloned().unwrap_or(Value::Null))
                    .collect(),
            ))
        }
        "filter" => {
            let [items, field, expected] = exactly::<3>(name, args)?;
            let field = field
                .as_str()
                .ok_or_else(|| "filter() expects a field name string".to_string())?;
            let items = array(name, items)?;
            Ok(Value::Array(
                items
                    .into_iter()
                    .filter(|item| item.get(field).is_some_and(|v| loosely_equal(v, &expected)))
                    .collect(),
            ))
        }
        "keys" => {
            let [value] = exactly::<1>(name, args)?;
            match value {
                Value::Object(fields) => Ok(Value::Array(
                    fields.keys().cloned().map(Value::String).collect(),
                )),
                other => Err(format!("keys() expects an object, got {}", kind(&other))),
            }
        }
        _ => Err(format!("unknown function '{}'", name)),
    }
}

/// Render a value as program text: strings raw, everything else as JSON.
pub(crate) fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert an arithmetic result back into a JSON number, preferring integers.
pub(crate) fn number(n: f64) -> Result<Value, String> {
    if !n.is_finite() {
        return Err("arithmetic produced a non-finite number".to_string());
    }
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return Ok(Value::from(n as i64));
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| "arithmetic produced an invalid number".to_string())
}

/// Equality that treats `1` and `1.0` as the same number.
pub(crate) fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn exactly<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], String> {
    let got = args.len();
    args.try_into()
        .map_err(|_| format!("{}() takes {} argument(s), got {}", name, N, got))
}

fn array(name: &str, value: Value) -> Result<Vec<Value>, String> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(format!("{}() expects an array, got {}", name, kind(&other))),
    }
}

/// Numbers from either a single array argument or the argument list itself.
fn numbers(name: &str, args: Vec<Value>) -> Result<Vec<f64>, String> {
    let values = match <[Value; 1]>::try_from(args) {
        Ok([Value::Array(items)]) => items,
        Ok([single]) => vec![single],
        Err(args) => args,
    };
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| format!("{}() expects numbers, got {}", name, kind(v)))
        })
        .collect()
}
