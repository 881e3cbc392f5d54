//! Value constraints: numeric bounds, lengths, patterns and enumerations.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use warden_core::ConfigError;

/// A violated constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Constraint name, e.g. `lt`
    pub constraint: &'static str,
    /// Human-readable message
    pub message: String,
}

impl Violation {
    fn new(constraint: &'static str, message: impl Into<String>) -> Self {
        Self {
            constraint,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.constraint)
    }
}

/// Constraints declared on a field.
///
/// Numeric bounds apply to numbers, length bounds to strings (counted in
/// characters) and lists, `pattern` to strings, `one_of` to any value.
/// `null` satisfies every constraint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Constraints {
    /// Exclusive lower bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    /// Inclusive lower bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ge: Option<f64>,
    /// Exclusive upper bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    /// Inclusive upper bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub le: Option<f64>,
    /// The value must be a multiple of this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    /// Minimum length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Regular expression a string must match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Value>>,
    #[serde(skip)]
    regex: Option<Regex>,
}

impl Constraints {
    /// Returns true if no constraint is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gt.is_none()
            && self.ge.is_none()
            && self.lt.is_none()
            && self.le.is_none()
            && self.multiple_of.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.pattern.is_none()
            && self.one_of.is_none()
    }

    /// Compiles the pattern, if any.
    pub fn compile(&mut self, param: &str) -> Result<(), ConfigError> {
        if let Some(pattern) = &self.pattern {
            let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                param: param.to_string(),
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            self.regex = Some(regex);
        }
        Ok(())
    }

    /// Checks `value` against every declared constraint.
    ///
    /// # Example
    ///
    /// ```
    /// use serde_json::json;
    /// use warden_field::Field;
    ///
    /// let field = Field::query().gt(1).lt(10);
    /// let constraints = field.constraints();
    /// assert!(constraints.check(&json!(2)).is_ok());
    /// assert_eq!(constraints.check(&json!(11)).unwrap_err().constraint, "lt");
    /// ```
    pub fn check(&self, value: &Value) -> Result<(), Violation> {
        match value {
            Value::Null => return Ok(()),
            Value::Number(n) => {
                if let Some(v) = n.as_f64() {
                    self.check_number(v)?;
                }
            }
            Value::String(s) => {
                self.check_length(s.chars().count(), "characters")?;
                self.check_pattern(s)?;
            }
            Value::Array(items) => self.check_length(items.len(), "items")?,
            _ => {}
        }
        if let Some(allowed) = &self.one_of {
            if !allowed.contains(value) {
                let rendered: Vec<String> = allowed.iter().map(Value::to_string).collect();
                return Err(Violation::new(
                    "one_of",
                    format!("value is not a valid enumeration member; permitted: {}", rendered.join(", ")),
                ));
            }
        }
        Ok(())
    }

    fn check_number(&self, v: f64) -> Result<(), Violation> {
        if let Some(gt) = self.gt {
            if v <= gt {
                return Err(Violation::new("gt", format!("ensure this value is greater than {gt}")));
            }
        }
        if let Some(ge) = self.ge {
            if v < ge {
                return Err(Violation::new(
                    "ge",
                    format!("ensure this value is greater than or equal to {ge}"),
                ));
            }
        }
        if let Some(lt) = self.lt {
            if v >= lt {
                return Err(Violation::new("lt", format!("ensure this value is less than {lt}")));
            }
        }
        if let Some(le) = self.le {
            if v > le {
                return Err(Violation::new(
                    "le",
                    format!("ensure this value is less than or equal to {le}"),
                ));
            }
        }
        if let Some(step) = self.multiple_of {
            let ratio = v / step;
            if step == 0.0 || (ratio - ratio.round()).abs() > 1e-9 {
                return Err(Violation::new(
                    "multiple_of",
                    format!("ensure this value is a multiple of {step}"),
                ));
            }
        }
        Ok(())
    }

    fn check_length(&self, len: usize, unit: &str) -> Result<(), Violation> {
        if let Some(min) = self.min_length {
            if len < min {
                return Err(Violation::new(
                    "min_length",
                    format!("ensure this value has at least {min} {unit}"),
                ));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Err(Violation::new(
                    "max_length",
                    format!("ensure this value has at most {max} {unit}"),
                ));
            }
        }
        Ok(())
    }

    fn check_pattern(&self, s: &str) -> Result<(), Violation> {
        let Some(pattern) = &self.pattern else {
            return Ok(());
        };
        let matched = match &self.regex {
            Some(regex) => regex.is_match(s),
            None => Regex::new(pattern).map(|r| r.is_match(s)).unwrap_or(false),
        };
        if matched {
            Ok(())
        } else {
            Err(Violation::new(
                "pattern",
                format!("string does not match regex \"{pattern}\""),
            ))
        }
    }

    /// Renders the declared constraints as `name=value` pairs.
    pub(crate) fn render(&self) -> Vec<String> {
        let mut parts = Vec::new();
        let numbers = [
            ("gt", self.gt),
            ("ge", self.ge),
            ("lt", self.lt),
            ("le", self.le),
            ("multiple_of", self.multiple_of),
        ];
        for (name, bound) in numbers {
            if let Some(bound) = bound {
                parts.push(format!("{name}={bound}"));
            }
        }
        if let Some(min) = self.min_length {
            parts.push(format!("min_length={min}"));
        }
        if let Some(max) = self.max_length {
            parts.push(format!("max_length={max}"));
        }
        if let Some(pattern) = &self.pattern {
            parts.push(format!("pattern={pattern:?}"));
        }
        if let Some(allowed) = &self.one_of {
            let rendered: Vec<String> = allowed.iter().map(Value::to_string).collect();
            parts.push(format!("one_of=[{}]", rendered.join(", ")));
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn bounded() -> Constraints {
        Constraints {
            gt: Some(1.0),
            lt: Some(10.0),
            ..Constraints::default()
        }
    }

    #[test]
    fn test_numeric_bounds() {
        let c = bounded();
        assert!(c.check(&json!(2)).is_ok());
        let err = c.check(&json!(11)).unwrap_err();
        assert_eq!(err.constraint, "lt");
        assert_eq!(err.message, "ensure this value is less than 10");
        assert_eq!(c.check(&json!(1)).unwrap_err().constraint, "gt");
        assert!(c.check(&Value::Null).is_ok());
    }

    #[test]
    fn test_inclusive_bounds_and_multiple() {
        let c = Constraints {
            ge: Some(0.0),
            le: Some(1.0),
            multiple_of: Some(0.25),
            ..Constraints::default()
        };
        assert!(c.check(&json!(0)).is_ok());
        assert!(c.check(&json!(0.75)).is_ok());
        assert_eq!(c.check(&json!(0.3)).unwrap_err().constraint, "multiple_of");
        assert_eq!(c.check(&json!(-0.25)).unwrap_err().constraint, "ge");
    }

    #[test]
    fn test_lengths_count_chars() {
        let c = Constraints {
            min_length: Some(2),
            max_length: Some(3),
            ..Constraints::default()
        };
        assert!(c.check(&json!("héé")).is_ok());
        assert_eq!(c.check(&json!("a")).unwrap_err().constraint, "min_length");
        assert_eq!(c.check(&json!([1, 2, 3, 4])).unwrap_err().constraint, "max_length");
    }

    #[test]
    fn test_pattern_compiled_and_lazy() {
        let mut c = Constraints {
            pattern: Some(r"^u\d+$".to_string()),
            ..Constraints::default()
        };
        assert!(c.check(&json!("u1")).is_ok());
        c.compile("uid").unwrap();
        assert!(c.check(&json!("u12345")).is_ok());
        assert_eq!(c.check(&json!("x1")).unwrap_err().constraint, "pattern");
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let mut c = Constraints {
            pattern: Some("(".to_string()),
            ..Constraints::default()
        };
        let err = c.compile("uid").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref param, .. } if param == "uid"));
    }

    #[test]
    fn test_one_of() {
        let c = Constraints {
            one_of: Some(vec![json!("a"), json!("b")]),
            ..Constraints::default()
        };
        assert!(c.check(&json!("a")).is_ok());
        assert_eq!(c.check(&json!("c")).unwrap_err().constraint, "one_of");
    }

    #[test]
    fn test_render() {
        assert_eq!(bounded().render(), vec!["gt=1", "lt=10"]);
        assert!(Constraints::default().is_empty());
        assert!(!bounded().is_empty());
    }

    proptest! {
        #[test]
        fn prop_open_interval(v in -100i64..100) {
            let ok = bounded().check(&json!(v)).is_ok();
            prop_assert_eq!(ok, v > 1 && v < 10);
        }
    }
}
