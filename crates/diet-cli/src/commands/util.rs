//! Shared utilities for CLI commands.

use std::fs::{self, File};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use diet_db::{Database, Store};
use fs2::FileExt;
use regex::Regex;

use crate::Config;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").expect("valid relative time regex")
});

/// Pre-compiled regex for `YYYY-MM` months.
static MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("valid month regex"));

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either RFC 3339 or relative time.
///
/// Supports:
/// - RFC 3339: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    parse_datetime_at(s, Utc::now())
}

/// [`parse_datetime`] with relative times measured back from `now`.
pub fn parse_datetime_at(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use RFC 3339 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Parses `YYYY-MM`, or returns the month of `now` when `raw` is `None`.
pub fn parse_month<Tz: TimeZone>(raw: Option<&str>, now: &DateTime<Tz>) -> Result<(i32, u32)> {
    let Some(raw) = raw else {
        return Ok((now.year(), now.month()));
    };
    let caps = MONTH_RE
        .captures(raw.trim())
        .with_context(|| format!("Invalid month: {raw}. Use YYYY-MM (e.g., 2025-01)"))?;
    let year: i32 = caps[1].parse().context("failed to parse year")?;
    let month: u32 = caps[2].parse().context("failed to parse month")?;
    if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
        anyhow::bail!("Invalid month: {raw}");
    }
    Ok((year, month))
}

/// Open the configured database, ensuring the parent directory exists.
pub fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

pub fn open_store(config: &Config) -> Result<Store> {
    open_database(config).map(Store::new)
}

/// Exclusive lock on the pass lock file, released on drop.
pub struct PassLock {
    file: File,
}

impl PassLock {
    /// Waits until no other process is running a pass.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = File::create(path).context("failed to create lock file")?;
        file.lock_exclusive().context("failed to acquire lock")?;
        Ok(Self { file })
    }

    /// Returns `None` if another process holds the lock.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = File::create(path).context("failed to create lock file")?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file })),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(err) => Err(err).context("failed to acquire lock"),
        }
    }
}

impl Drop for PassLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(error = %err, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parses_rfc3339() {
        let parsed = parse_datetime_at("2025-01-15T10:30:00+01:00", now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_parses_relative_units() {
        assert_eq!(
            parse_datetime_at("30 minutes ago", now()).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 15, 11, 30, 0).unwrap()
        );
        assert_eq!(
            parse_datetime_at("1 day ago", now()).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 14, 12, 0, 0).unwrap()
        );
        assert_eq!(
            parse_datetime_at("2 weeks ago", now()).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rejects_garbage_and_huge_values() {
        assert!(parse_datetime_at("yesterday", now()).is_err());
        assert!(parse_datetime_at("99999999999 weeks ago", now()).is_err());
    }

    #[test]
    fn test_parses_months() {
        assert_eq!(parse_month(Some("2024-02"), &now()).unwrap(), (2024, 2));
        assert_eq!(parse_month(None, &now()).unwrap(), (2025, 1));
        assert!(parse_month(Some("2024-13"), &now()).is_err());
        assert!(parse_month(Some("2024-2"), &now()).is_err());
    }

    #[test]
    fn test_second_try_lock_is_contended() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("diet.lock");
        let held = PassLock::acquire(&path).unwrap();
        assert!(PassLock::try_acquire(&path).unwrap().is_none());
        drop(held);
        assert!(PassLock::try_acquire(&path).unwrap().is_some());
    }
}
