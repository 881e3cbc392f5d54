//! Plugin tags carried by fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A plugin-specific tag attached to a field.
///
/// Policy plugins scan a route's fields for these tags when the route is
/// loaded and derive their runtime configuration from them.
///
/// Only tags on the handler's own parameters are read. Plugins check the
/// handler's arguments, so a tag on a dependency's field or a model field
/// has no effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtraParam {
    /// The field must be present whenever `main_column` is present.
    Required {
        /// The parameter this one depends on
        main_column: String,
    },
    /// At most one field of `group` may be present.
    AtMostOneOf {
        /// Group name shared by the mutually exclusive fields
        group: String,
    },
}

impl ExtraParam {
    /// Tags a field as required together with `main_column`.
    pub fn required(main_column: impl Into<String>) -> Self {
        Self::Required {
            main_column: main_column.into(),
        }
    }

    /// Tags a field as a member of the mutually exclusive `group`.
    pub fn at_most_one_of(group: impl Into<String>) -> Self {
        Self::AtMostOneOf {
            group: group.into(),
        }
    }
}

impl fmt::Display for ExtraParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required { main_column } => write!(f, "Required(main_column={main_column:?})"),
            Self::AtMostOneOf { group } => write!(f, "AtMostOneOf(group={group:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_tagging() {
        let tag = ExtraParam::required("user_id");
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["kind"], "required");
        assert_eq!(json["main_column"], "user_id");
        let back: ExtraParam = serde_json::from_value(json).unwrap();
        assert_eq!(back, tag);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ExtraParam::at_most_one_of("contact").to_string(),
            "AtMostOneOf(group=\"contact\")"
        );
    }
}
