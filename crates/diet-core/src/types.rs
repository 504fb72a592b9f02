//! Core type definitions with validation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The event kind string is not recognised.
    #[error("unknown event kind: {value}")]
    UnknownEventKind { value: String },

    /// The alert threshold is not one of 50, 70 or 100.
    #[error("unsupported alert threshold: {value}")]
    UnsupportedThreshold { value: u32 },

    /// The repeat interval must be at least one minute.
    #[error("repeat interval must be positive, got {value}")]
    NonPositiveRepeatInterval { value: i64 },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
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

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated application package identifier.
    ///
    /// Package names must be non-empty strings (e.g. `com.google.android.youtube`).
    PackageName, "package name"
);

/// Whole minutes of foreground usage per package.
///
/// A `BTreeMap` keeps iteration order stable for display and persistence.
pub type UsageMinutes = BTreeMap<PackageName, u32>;

/// Daily goal in minutes per package. A goal of `0` means "no goal".
pub type Goals = BTreeMap<PackageName, u32>;

/// Milliseconds in one minute, the unit all usage is floored to.
pub const MILLIS_PER_MINUTE: i64 = 60_000;

/// Formats minutes as `"{h}h {mm}m"` for alert bodies and reports.
pub fn format_minutes(minutes: u32) -> String {
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}
