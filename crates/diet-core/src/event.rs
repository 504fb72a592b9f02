//! Raw app lifecycle events as reported by the OS usage subsystem.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PackageName, ValidationError};

/// Lifecycle transition carried by a [`RawEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The package became the visible foreground app.
    ForegroundEnter,
    /// The package left the foreground.
    ForegroundExit,
    /// The device went non-interactive; every open session ends here.
    ScreenOff,
}

impl EventKind {
    /// Canonical string form used for storage.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ForegroundEnter => "foreground_enter",
            Self::ForegroundExit => "foreground_exit",
            Self::ScreenOff => "screen_off",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "foreground_enter" | "move_to_foreground" | "activity_resumed" => {
                Ok(Self::ForegroundEnter)
            }
            "foreground_exit" | "move_to_background" | "activity_paused" => {
                Ok(Self::ForegroundExit)
            }
            "screen_off" | "screen_non_interactive" => Ok(Self::ScreenOff),
            _ => Err(ValidationError::UnknownEventKind {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single lifecycle signal for one package.
///
/// `ScreenOff` events are device-wide; their `package` is whatever the OS
/// attached (usually the system UI) and is ignored by reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub package: PackageName,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl RawEvent {
    pub const fn new(package: PackageName, timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            package,
            timestamp,
            kind,
        }
    }
}
