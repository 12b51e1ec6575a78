//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types and user input.
///
/// These are raised before any store call so a rejected request never
/// produces a partial write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A duration string contained no recognizable `<number><unit>` pair.
    #[error("invalid duration: {input:?} (expected e.g. 1h 30m, 45m, 90s)")]
    InvalidDuration { input: String },

    /// Estimates must be strictly positive; removal is a separate operation.
    #[error("estimate must be greater than zero, got {value_ms}ms")]
    NonPositiveEstimate { value_ms: i64 },

    /// A manual adjustment of zero would insert a meaningless entry.
    #[error("time adjustment cannot be zero")]
    ZeroAdjustment,

    /// An enumerated option did not match any known value.
    #[error("invalid {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

define_string_id!(
    /// A validated work item (card) identifier.
    WorkItemId, "work item ID"
);

define_string_id!(
    /// A validated person (board member) identifier.
    PersonId, "person ID"
);

define_string_id!(
    /// A validated group (board) identifier.
    ///
    /// Every persisted row carries the group it was recorded in so reports can
    /// be scoped to a single board.
    GroupId, "group ID"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_item_id_rejects_empty() {
        assert!(WorkItemId::new("").is_err());
        assert!(WorkItemId::new("   ").is_err());
        assert!(WorkItemId::new("card-1").is_ok());
    }

    #[test]
    fn person_id_reports_field_name() {
        let err = PersonId::new("").unwrap_err();
        assert_eq!(err.to_string(), "person ID cannot be empty");
    }

    #[test]
    fn group_id_serde_roundtrip() {
        let id = GroupId::new("board-9").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"board-9\"");
        let parsed: GroupId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn id_serde_rejects_empty() {
        let result: Result<WorkItemId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn id_parses_from_str() {
        let id: PersonId = "member-7".parse().unwrap();
        assert_eq!(id.as_ref(), "member-7");
    }

    #[test]
    fn validation_messages_are_human_readable() {
        let err = ValidationError::NonPositiveEstimate { value_ms: 0 };
        assert_eq!(err.to_string(), "estimate must be greater than zero, got 0ms");

        let err = ValidationError::InvalidDuration {
            input: "soon".to_string(),
        };
        assert!(err.to_string().contains("\"soon\""));
    }
}
