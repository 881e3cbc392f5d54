//! Coercion of raw request values into annotated shapes.
//!
//! Query strings, headers and cookies arrive as text, so a parameter
//! annotated `i64` accepts `"42"`. Coercion is lenient in the same places a
//! form-handling web stack is: numeric strings, boolean words, and a single
//! value where a list is expected.

use crate::annotation::Annotation;
use serde_json::{Number, Value};

impl Annotation {
    /// Coerces `value` into this annotation's shape.
    ///
    /// Returns a human-readable reason on failure.
    ///
    /// # Example
    ///
    /// ```
    /// use serde_json::json;
    /// use warden_field::Annotation;
    ///
    /// assert_eq!(Annotation::Integer.coerce(json!("42")).unwrap(), json!(42));
    /// assert_eq!(Annotation::Boolean.coerce(json!("yes")).unwrap(), json!(true));
    /// assert_eq!(
    ///     Annotation::list(Annotation::Integer).coerce(json!("7")).unwrap(),
    ///     json!([7])
    /// );
    /// assert!(Annotation::Integer.coerce(json!("abc")).is_err());
    /// ```
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        match self {
            Self::Any => Ok(value),
            Self::Optional(inner) => match value {
                Value::Null => Ok(Value::Null),
                other => inner.coerce(other),
            },
            _ if value.is_null() => Err("none is not an allowed value".to_string()),
            Self::String => coerce_string(value),
            Self::Integer => coerce_integer(value),
            Self::Float => coerce_float(value),
            Self::Boolean => coerce_bool(value),
            Self::List(inner) => match value {
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        inner
                            .coerce(item)
                            .map_err(|reason| format!("item {index}: {reason}"))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                single => inner.coerce(single).map(|item| Value::Array(vec![item])),
            },
            Self::Model(schema) => schema.coerce_object(value),
            Self::Named(name) => Err(format!("annotation `{name}` was never resolved")),
            Self::Type(tag) => Err(format!("request data can not be converted into `{tag}`")),
            Self::Request | Self::ViewSelf => {
                Err(format!("`{self}` parameters are not read from request data"))
            }
        }
    }
}

fn coerce_string(value: Value) -> Result<Value, String> {
    match value {
        Value::String(_) => Ok(value),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        _ => Err("str type expected".to_string()),
    }
}

fn coerce_integer(value: Value) -> Result<Value, String> {
    const MESSAGE: &str = "value is not a valid integer";
    match value {
        Value::Number(ref n) if n.is_i64() || n.is_u64() => Ok(value),
        Value::Number(n) => match n.as_f64() {
            #[allow(clippy::cast_possible_truncation)]
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Value::from(f as i64)),
            _ => Err(MESSAGE.to_string()),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| MESSAGE.to_string()),
        _ => Err(MESSAGE.to_string()),
    }
}

fn coerce_float(value: Value) -> Result<Value, String> {
    const MESSAGE: &str = "value is not a valid float";
    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| MESSAGE.to_string())
}

fn coerce_bool(value: Value) -> Result<Value, String> {
    const MESSAGE: &str = "value could not be parsed to a boolean";
    match value {
        Value::Bool(_) => Ok(value),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err(MESSAGE.to_string()),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "on" | "t" | "true" | "y" | "yes" => Ok(Value::Bool(true)),
            "0" | "off" | "f" | "false" | "n" | "no" => Ok(Value::Bool(false)),
            _ => Err(MESSAGE.to_string()),
        },
        _ => Err(MESSAGE.to_string()),
    }
}
