//! Ingest commands for recording single usage records.

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diet_core::{CoarseDailyStat, DATE_FORMAT, EventKind, PackageName, RawEvent, parse_day};
use diet_db::Database;

use crate::commands::util::parse_datetime;

/// Records one lifecycle event. Returns `false` if it was already stored.
pub fn event(db: &mut Database, package: &str, kind: &str, at: Option<&str>) -> Result<bool> {
    let timestamp = match at {
        Some(raw) => parse_datetime(raw)?,
        None => Utc::now(),
    };
    record_event(db, package, kind, timestamp)
}

fn record_event(
    db: &mut Database,
    package: &str,
    kind: &str,
    timestamp: DateTime<Utc>,
) -> Result<bool> {
    let package = PackageName::new(package).context("invalid package")?;
    let kind = EventKind::from_str(kind)?;
    let inserted = db.insert_events(&[RawEvent::new(package, timestamp, kind)])?;
    Ok(inserted > 0)
}

/// Records (or replaces) the coarse total of one app for one day.
pub fn daily(db: &mut Database, date: &str, package: &str, minutes: i64) -> Result<()> {
    let day = parse_day(date)
        .with_context(|| format!("Invalid date: {date}. Use YYYY-MM-DD (e.g., 2025-01-15)"))?;
    let stat = CoarseDailyStat {
        date: day.format(DATE_FORMAT).to_string(),
        package: PackageName::new(package).context("invalid package")?,
        minutes,
    };
    db.upsert_daily_totals(&[stat])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_records_event_with_platform_alias() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(record_event(&mut db, "com.video", "move_to_foreground", ts(9, 0)).unwrap());
        assert!(!record_event(&mut db, "com.video", "foreground_enter", ts(9, 0)).unwrap());

        let events = db.list_events_in_range(ts(0, 0), ts(23, 0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::ForegroundEnter);
    }

    #[test]
    fn test_rejects_unknown_kind_and_blank_package() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(record_event(&mut db, "com.video", "launched", ts(9, 0)).is_err());
        assert!(record_event(&mut db, " ", "screen_off", ts(9, 0)).is_err());
    }

    #[test]
    fn test_daily_rejects_malformed_date() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(daily(&mut db, "15/01/2025", "com.video", 10).is_err());

        daily(&mut db, "2025-01-15", "com.video", 10).unwrap();
        let day = parse_day("2025-01-15").unwrap();
        let stats = db.daily_totals_between(day, day).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].minutes, 10);
    }
}
