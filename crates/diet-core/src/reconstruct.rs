//! Foreground time reconstruction.
//!
//! Replays raw lifecycle events for one window and attributes foreground
//! time to packages.
//!
//! # Algorithm Summary
//!
//! 1. Track at most one open session start per package
//! 2. A repeated enter moves the start instead of stacking a second session
//! 3. An exit closes the package's session; an exit with no open session is ignored
//! 4. Screen-off closes every open session
//! 5. Sessions still open at the end of the window are closed at `window.end`
//! 6. Milliseconds are floored to whole minutes; zero-minute packages are dropped

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventKind, RawEvent};
use crate::types::{MILLIS_PER_MINUTE, PackageName, UsageMinutes};

/// Half-open instant range `[start, end)` a reconstruction runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UsageWindow {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Returns true if `instant` falls inside the window.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Reconstructs per-package foreground minutes for `window`.
///
/// Events must be sorted by timestamp ascending. Events outside the window
/// are skipped. Malformed sequences never fail: they are absorbed by the
/// overwrite-on-enter and ignore-unmatched-exit rules.
pub fn reconstruct_usage(events: &[RawEvent], window: &UsageWindow) -> UsageMinutes {
    let mut open_sessions: HashMap<&PackageName, DateTime<Utc>> = HashMap::new();
    let mut totals_ms: HashMap<&PackageName, i64> = HashMap::new();

    for event in events {
        if !window.contains(event.timestamp) {
            tracing::trace!(
                package = %event.package,
                timestamp = %event.timestamp,
                "skipping event outside window"
            );
            continue;
        }

        match event.kind {
            EventKind::ForegroundEnter => {
                open_sessions.insert(&event.package, event.timestamp);
            }
            EventKind::ForegroundExit => {
                if let Some(start) = open_sessions.remove(&event.package) {
                    add_duration(&mut totals_ms, &event.package, start, event.timestamp);
                }
            }
            EventKind::ScreenOff => {
                for (package, start) in open_sessions.drain() {
                    add_duration(&mut totals_ms, package, start, event.timestamp);
                }
            }
        }
    }

    for (package, start) in open_sessions {
        add_duration(&mut totals_ms, package, start, window.end);
    }

    totals_ms
        .into_iter()
        .filter_map(|(package, ms)| {
            let minutes = u32::try_from(ms / MILLIS_PER_MINUTE).unwrap_or(u32::MAX);
            (minutes > 0).then(|| (package.clone(), minutes))
        })
        .collect()
}

/// Adds `end - start` to the package total when the interval is positive.
fn add_duration<'a>(
    totals: &mut HashMap<&'a PackageName, i64>,
    package: &'a PackageName,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) {
    let delta = (end - start).num_milliseconds();
    if delta > 0 {
        *totals.entry(package).or_insert(0) += delta;
    }
}

/// Removes packages that must never count as usage (the tracker itself, the
/// home-screen launcher).
pub fn exclude_packages<'a, I>(mut usage: UsageMinutes, excluded: I) -> UsageMinutes
where
    I: IntoIterator<Item = &'a str>,
{
    for package in excluded {
        usage.remove(package);
    }
    usage
}
