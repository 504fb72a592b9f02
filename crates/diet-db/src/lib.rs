//! Storage layer for the screen-time diet tracker.
//!
//! Persists raw usage events, coarse daily totals, user preferences and alert
//! debounce memory using `rusqlite`.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! [`Store`] puts it behind a `Mutex` so it can serve as the shared
//! collaborator of a `RefreshService`.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC with millisecond precision
//! (e.g. `2025-01-15T10:30:00.000Z`), so lexicographic order matches
//! chronological order. Calendar days are stored as `YYYY-MM-DD`.
//!
//! Daily totals keep whatever date string they were written with. Rows whose
//! date does not parse are returned as-is and skipped during aggregation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use diet_core::{
    AppMetadata, BoxError, CoarseDailyStat, DATE_FORMAT, DebounceMemory, DebounceStore, EventKind,
    Goals, NotificationSettings, PackageName, Preferences, RawEvent, UsageSource, UsageWindow,
    ValidationError, parse_day,
};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use uuid::Uuid;

const NOTIFICATION_SETTINGS_KEY: &str = "notification_settings";
const LATCH_DAY_KEY: &str = "debounce_latch_day";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {context}: {timestamp}")]
    TimestampParse {
        context: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored event row no longer validates.
    #[error("invalid event {event_id}")]
    InvalidEvent {
        event_id: String,
        #[source]
        source: ValidationError,
    },
    /// A stored calendar day does not parse.
    #[error("invalid date for {context}: {value}")]
    InvalidDate { context: String, value: String },
    /// Stored settings JSON could not be read or written.
    #[error("invalid settings json: {0}")]
    Json(#[from] serde_json::Error),
    /// A value was rejected before it reached the database.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Row counts and latest event, for status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSummary {
    pub events: u64,
    pub daily_totals: u64,
    pub goals: u64,
    pub tracked: u64,
    pub last_event: Option<DateTime<Utc>>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Lifecycle events reported by the OS usage subsystem
            -- timestamp: RFC 3339 UTC, millisecond precision
            -- kind: 'foreground_enter', 'foreground_exit' or 'screen_off'
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                package TEXT NOT NULL,
                kind TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_events_identity
                ON events(timestamp, package, kind);

            -- Coarse per-day foreground minutes
            CREATE TABLE IF NOT EXISTS daily_totals (
                date TEXT NOT NULL,
                package TEXT NOT NULL,
                minutes INTEGER NOT NULL,
                PRIMARY KEY (date, package)
            );

            CREATE TABLE IF NOT EXISTS goals (
                package TEXT PRIMARY KEY,
                minutes INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tracked_packages (
                package TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS app_labels (
                package TEXT PRIMARY KEY,
                label TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS debounce_latches (
                key TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS debounce_repeats (
                key TEXT PRIMARY KEY,
                fired_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of events, ignoring exact duplicates.
    pub fn insert_events(&mut self, events: &[RawEvent]) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO events (id, timestamp, package, kind)
                VALUES (?, ?, ?, ?)
                ",
            )?;
            for event in events {
                inserted += stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    format_timestamp(event.timestamp),
                    event.package.as_str(),
                    event.kind.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(inserted, total = events.len(), "stored events");
        Ok(inserted)
    }

    /// Lists events within a time range, ordered by timestamp.
    ///
    /// The range is inclusive of `start` and exclusive of `end`.
    pub fn list_events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawEvent>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT id, timestamp, package, kind
            FROM events
            WHERE timestamp >= ? AND timestamp < ?
            ORDER BY timestamp ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([format_timestamp(start), format_timestamp(end)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp, package, kind) = row?;
            events.push(event_from_row(&id, &timestamp, package, &kind)?);
        }
        Ok(events)
    }

    /// Writes coarse daily totals, replacing any existing `(date, package)` row.
    pub fn upsert_daily_totals(&mut self, stats: &[CoarseDailyStat]) -> Result<usize, DbError> {
        if stats.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO daily_totals (date, package, minutes)
                VALUES (?, ?, ?)
                ON CONFLICT(date, package) DO UPDATE SET minutes = excluded.minutes
                ",
            )?;
            for stat in stats {
                written += stmt.execute(params![stat.date, stat.package.as_str(), stat.minutes])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Coarse totals for days in `[since, until]`, ordered by date then package.
    pub fn daily_totals_between(
        &self,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<CoarseDailyStat>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT date, package, minutes
            FROM daily_totals
            WHERE date >= ? AND date <= ?
            ORDER BY date ASC, package ASC
            ",
        )?;
        let rows = stmt.query_map(
            [
                since.format(DATE_FORMAT).to_string(),
                until.format(DATE_FORMAT).to_string(),
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;
        let mut stats = Vec::new();
        for row in rows {
            let (date, package, minutes) = row?;
            stats.push(CoarseDailyStat {
                date,
                package: PackageName::new(package)?,
                minutes,
            });
        }
        Ok(stats)
    }

    /// Sets the daily goal for a package; `0` removes it.
    pub fn set_goal(&self, package: &PackageName, minutes: u32) -> Result<(), DbError> {
        if minutes == 0 {
            self.conn.execute(
                "DELETE FROM goals WHERE package = ?",
                [package.as_str()],
            )?;
        } else {
            self.conn.execute(
                "
                INSERT INTO goals (package, minutes) VALUES (?, ?)
                ON CONFLICT(package) DO UPDATE SET minutes = excluded.minutes
                ",
                params![package.as_str(), minutes],
            )?;
        }
        Ok(())
    }

    pub fn goals(&self) -> Result<Goals, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT package, minutes FROM goals ORDER BY package ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;
        let mut goals = Goals::new();
        for row in rows {
            let (package, minutes) = row?;
            goals.insert(PackageName::new(package)?, minutes);
        }
        Ok(goals)
    }

    /// Adds a package to the tracked set. Returns `false` if already tracked.
    pub fn track(&self, package: &PackageName) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO tracked_packages (package) VALUES (?)",
            [package.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Removes a package from the tracked set. Returns `false` if it was not tracked.
    pub fn untrack(&self, package: &PackageName) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "DELETE FROM tracked_packages WHERE package = ?",
            [package.as_str()],
        )?;
        Ok(changed > 0)
    }

    pub fn tracked(&self) -> Result<BTreeSet<PackageName>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT package FROM tracked_packages ORDER BY package ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut tracked = BTreeSet::new();
        for row in rows {
            tracked.insert(PackageName::new(row?)?);
        }
        Ok(tracked)
    }

    pub fn set_label(&self, package: &PackageName, label: &str) -> Result<(), DbError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(ValidationError::Empty { field: "label" }.into());
        }
        self.conn.execute(
            "
            INSERT INTO app_labels (package, label) VALUES (?, ?)
            ON CONFLICT(package) DO UPDATE SET label = excluded.label
            ",
            params![package.as_str(), label],
        )?;
        Ok(())
    }

    pub fn label(&self, package: &PackageName) -> Result<Option<String>, DbError> {
        let label = self
            .conn
            .query_row(
                "SELECT label FROM app_labels WHERE package = ?",
                [package.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(label)
    }

    /// Stored alert settings, or the defaults if none were saved.
    pub fn notification_settings(&self) -> Result<NotificationSettings, DbError> {
        match self.setting(NOTIFICATION_SETTINGS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(NotificationSettings::default()),
        }
    }

    pub fn set_notification_settings(&self, settings: &NotificationSettings) -> Result<(), DbError> {
        settings.validate()?;
        let raw = serde_json::to_string(settings)?;
        self.conn.execute(
            "
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
            params![NOTIFICATION_SETTINGS_KEY, raw],
        )?;
        Ok(())
    }

    pub fn load_debounce(&self) -> Result<DebounceMemory, DbError> {
        let latch_day = match self.setting(LATCH_DAY_KEY)? {
            Some(raw) => Some(parse_day(&raw).ok_or_else(|| DbError::InvalidDate {
                context: LATCH_DAY_KEY.to_string(),
                value: raw.clone(),
            })?),
            None => None,
        };

        let mut stmt = self
            .conn
            .prepare("SELECT key FROM debounce_latches ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut daily_latches = BTreeSet::new();
        for row in rows {
            daily_latches.insert(row?);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT key, fired_at FROM debounce_repeats ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut repeat_timestamps = BTreeMap::new();
        for row in rows {
            let (key, fired_at) = row?;
            let fired_at = parse_timestamp(&fired_at, &key)?;
            repeat_timestamps.insert(key, fired_at);
        }

        Ok(DebounceMemory {
            latch_day,
            daily_latches,
            repeat_timestamps,
        })
    }

    /// Replaces the stored debounce memory in a single transaction.
    pub fn commit_debounce(&mut self, memory: &DebounceMemory) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM debounce_latches", [])?;
        tx.execute("DELETE FROM debounce_repeats", [])?;
        match memory.latch_day {
            Some(day) => {
                tx.execute(
                    "
                    INSERT INTO settings (key, value) VALUES (?, ?)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value
                    ",
                    params![LATCH_DAY_KEY, day.format(DATE_FORMAT).to_string()],
                )?;
            }
            None => {
                tx.execute("DELETE FROM settings WHERE key = ?", [LATCH_DAY_KEY])?;
            }
        }
        {
            let mut stmt = tx.prepare("INSERT INTO debounce_latches (key) VALUES (?)")?;
            for key in &memory.daily_latches {
                stmt.execute([key])?;
            }
            let mut stmt =
                tx.prepare("INSERT INTO debounce_repeats (key, fired_at) VALUES (?, ?)")?;
            for (key, fired_at) in &memory.repeat_timestamps {
                stmt.execute(params![key, format_timestamp(*fired_at)])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn summary(&self) -> Result<StorageSummary, DbError> {
        let count = |table: &str| -> Result<u64, DbError> {
            let count: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?;
            Ok(u64::try_from(count).unwrap_or(0))
        };
        let last_event: Option<String> = self
            .conn
            .query_row("SELECT MAX(timestamp) FROM events", [], |row| row.get(0))?;
        let last_event = last_event
            .map(|raw| parse_timestamp(&raw, "latest event"))
            .transpose()?;
        Ok(StorageSummary {
            events: count("events")?,
            daily_totals: count("daily_totals")?,
            goals: count("goals")?,
            tracked: count("tracked_packages")?,
            last_event,
        })
    }

    fn setting(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }
}

/// Shared, thread-safe handle that serves the refresh service's collaborators.
pub struct Store {
    db: Mutex<Database>,
}

impl Store {
    pub const fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Locks the underlying database. A poisoned lock is recovered since
    /// every write goes through a transaction.
    pub fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UsageSource for Store {
    fn events(&self, window: &UsageWindow) -> Result<Vec<RawEvent>, BoxError> {
        Ok(self.lock().list_events_in_range(window.start, window.end)?)
    }

    fn daily_totals(
        &self,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<CoarseDailyStat>, BoxError> {
        Ok(self.lock().daily_totals_between(since, until)?)
    }
}

impl Preferences for Store {
    fn goals(&self) -> Result<Goals, BoxError> {
        Ok(self.lock().goals()?)
    }

    fn tracked_packages(&self) -> Result<BTreeSet<PackageName>, BoxError> {
        Ok(self.lock().tracked()?)
    }

    fn notification_settings(&self) -> Result<NotificationSettings, BoxError> {
        Ok(self.lock().notification_settings()?)
    }
}

impl DebounceStore for Store {
    fn load(&self) -> Result<DebounceMemory, BoxError> {
        Ok(self.lock().load_debounce()?)
    }

    fn commit(&self, memory: &DebounceMemory) -> Result<(), BoxError> {
        Ok(self.lock().commit_debounce(memory)?)
    }
}

impl AppMetadata for Store {
    fn label(&self, package: &PackageName) -> Option<String> {
        match self.lock().label(package) {
            Ok(label) => label,
            Err(err) => {
                tracing::warn!(%package, error = %err, "failed to read app label");
                None
            }
        }
    }
}

fn event_from_row(
    id: &str,
    timestamp: &str,
    package: String,
    kind: &str,
) -> Result<RawEvent, DbError> {
    let invalid = |source| DbError::InvalidEvent {
        event_id: id.to_string(),
        source,
    };
    let package = PackageName::new(package).map_err(invalid)?;
    let kind = EventKind::from_str(kind).map_err(invalid)?;
    Ok(RawEvent::new(package, parse_timestamp(timestamp, id)?, kind))
}

fn parse_timestamp(timestamp: &str, context: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            context: context.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pkg(name: &str) -> PackageName {
        PackageName::new(name).expect("valid package")
    }

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, hour, minute, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn day(raw: &str) -> NaiveDate {
        parse_day(raw).expect("valid test date")
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "events"),
            vec!["id", "timestamp", "package", "kind"]
        );
        assert_eq!(
            table_columns(&db.conn, "daily_totals"),
            vec!["date", "package", "minutes"]
        );
        assert_eq!(table_columns(&db.conn, "goals"), vec!["package", "minutes"]);
        assert_eq!(table_columns(&db.conn, "tracked_packages"), vec!["package"]);
        assert_eq!(table_columns(&db.conn, "app_labels"), vec!["package", "label"]);
        assert_eq!(table_columns(&db.conn, "settings"), vec!["key", "value"]);
        assert_eq!(table_columns(&db.conn, "debounce_latches"), vec!["key"]);
        assert_eq!(
            table_columns(&db.conn, "debounce_repeats"),
            vec!["key", "fired_at"]
        );
    }

    #[test]
    fn events_roundtrip_in_range_and_dedupe() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let events = vec![
            RawEvent::new(pkg("com.video"), ts(9, 0), EventKind::ForegroundEnter),
            RawEvent::new(pkg("com.video"), ts(9, 30), EventKind::ForegroundExit),
            RawEvent::new(pkg("com.chat"), ts(11, 0), EventKind::ScreenOff),
        ];
        assert_eq!(db.insert_events(&events).expect("insert"), 3);
        assert_eq!(db.insert_events(&events[..1]).expect("insert again"), 0);

        let listed = db
            .list_events_in_range(ts(9, 0), ts(11, 0))
            .expect("list events");
        assert_eq!(listed, events[..2]);
        assert!(
            db.list_events_in_range(ts(12, 0), ts(11, 0))
                .expect("empty range")
                .is_empty()
        );
    }

    #[test]
    fn corrupt_event_kind_is_reported() {
        let db = Database::open_in_memory().expect("open in-memory db");
        db.conn
            .execute(
                "INSERT INTO events (id, timestamp, package, kind) VALUES ('e1', ?, 'a', 'bogus')",
                [format_timestamp(ts(9, 0))],
            )
            .expect("raw insert");
        let err = db
            .list_events_in_range(ts(0, 0), ts(23, 0))
            .expect_err("bogus kind");
        assert!(matches!(err, DbError::InvalidEvent { ref event_id, .. } if event_id == "e1"));
    }

    #[test]
    fn daily_totals_upsert_and_range() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let stat = |date: &str, package: &str, minutes| CoarseDailyStat {
            date: date.to_string(),
            package: pkg(package),
            minutes,
        };
        db.upsert_daily_totals(&[
            stat("2025-01-10", "a", 30),
            stat("2025-01-14", "a", 40),
            stat("2025-01-14", "b", 5),
        ])
        .expect("upsert");
        db.upsert_daily_totals(&[stat("2025-01-14", "a", 45)])
            .expect("replace");

        let stats = db
            .daily_totals_between(day("2025-01-12"), day("2025-01-15"))
            .expect("query");
        assert_eq!(
            stats,
            vec![stat("2025-01-14", "a", 45), stat("2025-01-14", "b", 5)]
        );
    }

    #[test]
    fn preferences_roundtrip() {
        let db = Database::open_in_memory().expect("open in-memory db");
        db.set_goal(&pkg("a"), 60).expect("set goal");
        db.set_goal(&pkg("b"), 30).expect("set goal");
        db.set_goal(&pkg("b"), 0).expect("clear goal");
        assert_eq!(db.goals().expect("goals"), [(pkg("a"), 60)].into_iter().collect());

        assert!(db.track(&pkg("a")).expect("track"));
        assert!(!db.track(&pkg("a")).expect("track again"));
        assert!(db.track(&pkg("c")).expect("track"));
        assert!(db.untrack(&pkg("c")).expect("untrack"));
        assert!(!db.untrack(&pkg("c")).expect("untrack again"));
        assert_eq!(db.tracked().expect("tracked"), [pkg("a")].into_iter().collect());

        db.set_label(&pkg("a"), " Video ").expect("label");
        assert_eq!(db.label(&pkg("a")).expect("label"), Some("Video".to_string()));
        assert_eq!(db.label(&pkg("b")).expect("label"), None);
        assert!(matches!(
            db.set_label(&pkg("a"), "  "),
            Err(DbError::Validation(ValidationError::Empty { .. }))
        ));
    }

    #[test]
    fn notification_settings_default_and_persist() {
        let db = Database::open_in_memory().expect("open in-memory db");
        assert_eq!(
            db.notification_settings().expect("defaults"),
            NotificationSettings::default()
        );

        let settings = NotificationSettings {
            total_70: false,
            repeat_interval_minutes: 15,
            ..NotificationSettings::default()
        };
        db.set_notification_settings(&settings).expect("save");
        assert_eq!(db.notification_settings().expect("load"), settings);

        let invalid = NotificationSettings {
            repeat_interval_minutes: 0,
            ..NotificationSettings::default()
        };
        assert!(db.set_notification_settings(&invalid).is_err());
        assert_eq!(db.notification_settings().expect("unchanged"), settings);
    }

    #[test]
    fn debounce_commit_replaces_memory() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        assert_eq!(db.load_debounce().expect("empty"), DebounceMemory::default());

        let first = DebounceMemory {
            latch_day: Some(day("2025-01-14")),
            daily_latches: ["app:a:50".to_string(), "total:70".to_string()]
                .into_iter()
                .collect(),
            repeat_timestamps: [("app:a:100".to_string(), ts(10, 0))].into_iter().collect(),
        };
        db.commit_debounce(&first).expect("commit");
        assert_eq!(db.load_debounce().expect("load"), first);

        let second = DebounceMemory {
            latch_day: Some(day("2025-01-15")),
            daily_latches: ["app:b:50".to_string()].into_iter().collect(),
            repeat_timestamps: BTreeMap::new(),
        };
        db.commit_debounce(&second).expect("commit");
        assert_eq!(db.load_debounce().expect("load"), second);
    }

    #[test]
    fn summary_counts_rows() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let empty = db.summary().expect("summary");
        assert_eq!(empty.events, 0);
        assert_eq!(empty.last_event, None);

        db.insert_events(&[
            RawEvent::new(pkg("a"), ts(9, 0), EventKind::ForegroundEnter),
            RawEvent::new(pkg("a"), ts(9, 5), EventKind::ForegroundExit),
        ])
        .expect("insert");
        db.set_goal(&pkg("a"), 10).expect("goal");
        let summary = db.summary().expect("summary");
        assert_eq!(summary.events, 2);
        assert_eq!(summary.goals, 1);
        assert_eq!(summary.tracked, 0);
        assert_eq!(summary.last_event, Some(ts(9, 5)));
    }

    #[test]
    fn store_serves_refresh_pass() {
        use std::sync::Arc;

        use diet_core::{
            AlertDispatcher, Collaborators, FiredAlert, RefreshConfig, RefreshService,
        };

        struct Discard;

        impl AlertDispatcher for Discard {
            fn dispatch(&self, _alert: &FiredAlert) -> Result<(), BoxError> {
                Ok(())
            }
        }

        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.insert_events(&[
            RawEvent::new(pkg("com.video"), ts(9, 0), EventKind::ForegroundEnter),
            RawEvent::new(pkg("com.video"), ts(9, 40), EventKind::ForegroundExit),
        ])
        .expect("insert");
        db.set_goal(&pkg("com.video"), 60).expect("goal");
        db.track(&pkg("com.video")).expect("track");
        db.set_label(&pkg("com.video"), "Video").expect("label");

        let store = Arc::new(Store::new(db));
        let service = RefreshService::new(
            Collaborators {
                source: store.clone(),
                preferences: store.clone(),
                debounce: store.clone(),
                metadata: store.clone(),
                dispatcher: Arc::new(Discard),
            },
            RefreshConfig::default(),
        );

        let report = service.refresh_at(&ts(12, 0)).expect("refresh");
        let video = report.view.app("com.video").expect("video row");
        assert_eq!(video.label, "Video");
        assert_eq!(video.current_usage, 40);
        // 40 / 60 is past 50% for both the app and the total.
        assert_eq!(report.fired.len(), 2);

        let memory = store.lock().load_debounce().expect("load");
        assert_eq!(memory.latch_day, Some(day("2025-01-15")));
        assert!(memory.daily_latches.contains("app:com.video:50"));
        assert!(memory.daily_latches.contains("total:50"));
    }

    #[test]
    fn file_database_persists_across_opens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("diet.db");
        {
            let db = Database::open(&path).expect("open");
            db.set_goal(&pkg("a"), 25).expect("goal");
        }
        let db = Database::open(&path).expect("reopen");
        assert_eq!(db.goals().expect("goals").get("a"), Some(&25));
    }
}
